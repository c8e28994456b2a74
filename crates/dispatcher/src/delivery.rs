//! Delivery to a single endpoint: attempts, retry decisions, and the outcome log.

use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use routing::Endpoint;

use crate::errors::DeliveryError;
use crate::retry::{RetryConfig, RetryPolicy};
use crate::transport::{OutboundRequest, Transport};

/// Final result of delivering one event to one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Where the event was sent.
    pub endpoint: Endpoint,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Wall time from the first attempt to the outcome, back-off included.
    pub elapsed: Duration,
    /// HTTP status on 2xx, otherwise why delivery did not succeed.
    pub outcome: Result<u16, DeliveryError>,
}

impl DeliveryReport {
    /// Returns `true` if the subscriber answered 2xx.
    pub fn is_delivered(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Emits the outcome at a level matching its severity.
    ///
    /// Expected to run inside the dispatch span, which carries the event's
    /// correlation fields.
    pub fn log(&self) {
        let elapsed_ms = self.elapsed.as_millis() as u64;
        match &self.outcome {
            Ok(status) => info!(
                destination = %self.endpoint.destination,
                endpoint = %self.endpoint.url,
                status,
                attempts = self.attempts,
                elapsed_ms,
                "Delivered event"
            ),
            Err(DeliveryError::Rejected { status }) => warn!(
                destination = %self.endpoint.destination,
                endpoint = %self.endpoint.url,
                status,
                attempts = self.attempts,
                elapsed_ms,
                "Delivered event, subscriber answered with a non-success status"
            ),
            Err(e) => error!(
                destination = %self.endpoint.destination,
                endpoint = %self.endpoint.url,
                attempts = self.attempts,
                elapsed_ms,
                error = %e,
                "Failed to deliver event"
            ),
        }
    }
}

/// Delivers `request` to `endpoint`, retrying transient transport failures.
///
/// Attempts are strictly sequential. Any HTTP status ends the loop.
pub async fn deliver(
    transport: &dyn Transport,
    endpoint: Endpoint,
    request: &OutboundRequest,
    retry: RetryConfig,
    policy: RetryPolicy,
) -> DeliveryReport {
    let started = Instant::now();
    let max_attempts = retry.max_attempts(policy);
    let mut attempts = 0;

    let outcome = loop {
        attempts += 1;
        match transport.post(request).await {
            Ok(response) if response.is_success() => break Ok(response.status),
            Ok(response) => {
                break Err(DeliveryError::Rejected {
                    status: response.status,
                })
            }
            Err(source) if !source.is_transient() => {
                break Err(DeliveryError::Permanent { source });
            }
            Err(source) if attempts >= max_attempts => {
                break Err(DeliveryError::TransportExhausted { attempts, source });
            }
            Err(source) => {
                let delay = retry.backoff(attempts);
                warn!(
                    endpoint = %endpoint.url,
                    attempt = attempts,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %source,
                    "Delivery attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    };

    DeliveryReport {
        endpoint,
        attempts,
        elapsed: started.elapsed(),
        outcome,
    }
}
