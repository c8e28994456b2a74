//! Delivery and dispatch errors.
//!
//! [`DeliveryError`] is per endpoint and never propagates: it is logged with
//! the endpoint and the event's correlation fields and does not affect sibling
//! deliveries. [`DispatchError`] is returned to the caller of
//! [`crate::Dispatcher::dispatch`] when no delivery could be started at all.

use thiserror::Error;

use crate::transport::TransportError;

/// Why a delivery to one endpoint did not end with a 2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The subscriber answered with a non-2xx status. Not retried.
    #[error("subscriber answered with status {status}")]
    Rejected {
        /// HTTP status code.
        status: u16,
    },

    /// Every allowed attempt failed at the transport level.
    #[error("gave up after {attempts} attempt(s): {source}")]
    TransportExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// The last transport failure.
        #[source]
        source: TransportError,
    },

    /// The request could not be sent at all; retrying cannot help.
    #[error("request rejected by the transport: {source}")]
    Permanent {
        /// The transport failure.
        #[source]
        source: TransportError,
    },
}

/// Errors from [`crate::Dispatcher::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Shutdown has started; no new deliveries are accepted.
    #[error("dispatcher is shutting down")]
    ShuttingDown,
}
