//! HTTP routes for the relay.
//!
//! # Endpoints
//!
//! - `POST /{handle_path}` - accepts a webhook and fans it out (200, or 400
//!   with a fixed message when the request is incomplete)
//! - `GET /` - returns 200 while the server is running

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use thiserror::Error;

use dispatcher::DispatchError;

use crate::extract::extract_event;
use crate::gate::{GateError, InboundGate};

/// Largest accepted webhook body. GitHub caps payloads at 25 MiB.
pub const MAX_PAYLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Body returned when the relay is draining.
pub const SHUTTING_DOWN_MESSAGE: &str = "503 Service Unavailable: Relay Is Shutting Down";

/// A gate refusal rendered as an HTTP response.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct WebhookError(#[from] GateError);

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self.0 {
            GateError::Invalid(e) => (StatusCode::BAD_REQUEST, e.message()).into_response(),
            GateError::Dispatch(DispatchError::ShuttingDown) => {
                (StatusCode::SERVICE_UNAVAILABLE, SHUTTING_DOWN_MESSAGE).into_response()
            }
        }
    }
}

/// Builds the router serving `POST /{handle_path}` and `GET /`.
///
/// `handle_path` is used without surrounding slashes and must not be empty.
pub fn build_router(gate: InboundGate, handle_path: &str) -> Router {
    let hook = format!("/{}", handle_path.trim_matches('/'));

    Router::new()
        .route("/", get(health_handler))
        .route(&hook, post(webhook_handler))
        .layer(DefaultBodyLimit::max(MAX_PAYLOAD_BYTES))
        .with_state(gate)
}

/// Accepts one webhook.
///
/// Returns 200 once deliveries are scheduled, or when nothing subscribes.
pub async fn webhook_handler(
    State(gate): State<InboundGate>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    gate.accept(extract_event(&headers, body))?;
    Ok(StatusCode::OK)
}

/// Liveness probe.
pub async fn health_handler() -> StatusCode {
    StatusCode::OK
}
