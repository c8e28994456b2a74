//! Outbound transport port and its HTTP implementation.
//!
//! [`Transport`] is the seam between delivery logic (retry, logging, drain)
//! and the wire. [`HttpTransport`] is the production implementation; tests
//! substitute in-memory transports.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;
use url::Url;

use routing::{Endpoint, InboundEvent};

/// Header marking a request as already validated upstream by the relay.
pub const RELAY_CHAIN_HEADER: &str = "Robot-Chain";
/// Value of [`RELAY_CHAIN_HEADER`] asserting the chain is authenticated.
pub const RELAY_CHAIN_AUTHENTICATED: &str = "Request-Authenticated";

/// One POST to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Target URL.
    pub url: Url,
    /// Headers to send, in addition to whatever the transport adds itself.
    pub headers: BTreeMap<String, String>,
    /// Request body.
    pub body: Bytes,
}

impl OutboundRequest {
    /// Builds the request forwarding `event` to `endpoint`.
    ///
    /// Carries the payload unchanged, the event's forwarded headers, and the
    /// relay-chain marker (which replaces any marker sent by the caller).
    pub fn for_event(event: &InboundEvent, endpoint: &Endpoint) -> Self {
        let mut headers: BTreeMap<String, String> = event
            .headers()
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case(RELAY_CHAIN_HEADER))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        headers.insert(
            RELAY_CHAIN_HEADER.to_owned(),
            RELAY_CHAIN_AUTHENTICATED.to_owned(),
        );

        Self {
            url: endpoint.url.clone(),
            headers,
            body: event.payload().clone(),
        }
    }
}

/// What the subscriber answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Number of body bytes read before the connection was released.
    pub body_bytes: usize,
}

impl TransportResponse {
    /// Returns `true` for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failures that happen before a response status is received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request did not complete within the transport timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Any other I/O failure while sending the request.
    #[error("transport error: {0}")]
    Io(String),

    /// The request itself is malformed (e.g. an invalid header value).
    /// Sending it again cannot succeed.
    #[error("request could not be built: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Returns `true` if another attempt might succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

/// Sends one request and reports the subscriber's answer.
///
/// Implementations must read the response body to completion before
/// returning, whatever the status, so the connection can be reused.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POSTs `request` once. No retries happen here.
    async fn post(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// Whole-request timeout (connect, send, and body read). `None` disables it.
    pub request_timeout: Option<Duration>,
    /// Connection establishment timeout. `None` disables it.
    pub connect_timeout: Option<Duration>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// [`Transport`] over a shared, pooled `reqwest` client.
///
/// System proxies are ignored: subscribers are addressed directly.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds the shared client.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().no_proxy();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self.client.post(request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(request.body.clone())
            .send()
            .await
            .map_err(classify)?;
        let status = response.status().as_u16();

        // The status is already known; a failed body read does not turn the
        // delivery into a transport failure.
        let body_bytes = match response.bytes().await {
            Ok(body) => body.len(),
            Err(e) => {
                debug!(endpoint = %request.url, status, error = %e, "Failed to drain response body");
                0
            }
        };

        Ok(TransportResponse { status, body_bytes })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    let message = error.to_string();
    if error.is_builder() {
        TransportError::InvalidRequest(message)
    } else if error.is_timeout() {
        TransportError::Timeout(message)
    } else if error.is_connect() {
        TransportError::Connect(message)
    } else {
        TransportError::Io(message)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use routing::{DestinationName, RawEvent};

    use super::*;

    fn event(headers: &[(&str, &str)]) -> InboundEvent {
        RawEvent {
            event_type: Some("Push Hook".into()),
            payload: Some(Bytes::from_static(b"{\"ref\":\"main\"}")),
            org: Some("org1".into()),
            repo: Some("repo1".into()),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            logging_fields: BTreeMap::new(),
        }
        .admit()
        .unwrap()
    }

    fn endpoint(url: &str) -> Endpoint {
        Endpoint {
            destination: DestinationName::new("s1").unwrap(),
            url: Url::parse(url).unwrap(),
        }
    }

    #[test]
    fn request_forwards_payload_headers_and_marker() {
        let request = OutboundRequest::for_event(
            &event(&[("content-type", "application/json"), ("x-gitcode-event", "Push Hook")]),
            &endpoint("https://h/e1"),
        );

        assert_eq!(request.url.as_str(), "https://h/e1");
        assert_eq!(&request.body[..], b"{\"ref\":\"main\"}");
        assert_eq!(request.headers["content-type"], "application/json");
        assert_eq!(request.headers["x-gitcode-event"], "Push Hook");
        assert_eq!(request.headers[RELAY_CHAIN_HEADER], RELAY_CHAIN_AUTHENTICATED);
    }

    #[test]
    fn caller_supplied_marker_is_replaced() {
        let request = OutboundRequest::for_event(
            &event(&[("robot-chain", "forged")]),
            &endpoint("https://h/e1"),
        );
        assert!(!request.headers.contains_key("robot-chain"));
        assert_eq!(request.headers[RELAY_CHAIN_HEADER], RELAY_CHAIN_AUTHENTICATED);
    }

    #[test]
    fn only_invalid_requests_are_permanent() {
        assert!(TransportError::Connect("refused".into()).is_transient());
        assert!(TransportError::Timeout("slow".into()).is_transient());
        assert!(TransportError::Io("reset".into()).is_transient());
        assert!(!TransportError::InvalidRequest("bad header".into()).is_transient());
    }

    #[test]
    fn success_means_2xx() {
        let ok = TransportResponse { status: 204, body_bytes: 0 };
        let redirect = TransportResponse { status: 302, body_bytes: 0 };
        let bad_gateway = TransportResponse { status: 502, body_bytes: 12 };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
        assert!(!bad_gateway.is_success());
    }
}
