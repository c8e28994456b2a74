//! Webhook relay fan-out.
//!
//! Delivers one admitted [`routing::InboundEvent`] to every resolved
//! [`routing::Endpoint`] concurrently, tolerating per-endpoint failure, and
//! exposes a drain so no started delivery is silently dropped on exit.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, retry timing and task tracking live
//! here. Routing decisions are made by the `routing` crate before an event
//! reaches this crate.
//!
//! ## Delivery policy
//!
//! - One POST per endpoint carrying the payload, the forwarded headers, and
//!   [`RELAY_CHAIN_HEADER`]`: `[`RELAY_CHAIN_AUTHENTICATED`].
//! - Transport failures are retried per [`RetryConfig`] / [`RetryPolicy`];
//!   an HTTP status of any kind is final.
//! - Response bodies are always read to completion.
//! - Outcomes are logged, never returned to the webhook caller.

pub mod delivery;
pub mod dispatcher;
pub mod errors;
pub mod retry;
pub mod transport;

pub use delivery::{deliver, DeliveryReport};
pub use dispatcher::{Dispatcher, DispatcherConfig, DrainOutcome};
pub use errors::{DeliveryError, DispatchError};
pub use retry::{RetryConfig, RetryPolicy};
pub use transport::{
    HttpTransport, HttpTransportConfig, OutboundRequest, Transport, TransportError,
    TransportResponse, RELAY_CHAIN_AUTHENTICATED, RELAY_CHAIN_HEADER,
};
