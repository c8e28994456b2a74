//! The inbound gate: admit, resolve, dispatch.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use dispatcher::{DispatchError, Dispatcher};
use routing::{InboundValidationError, RawEvent, RoutingTable};

/// What the gate did with an admitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// No destination subscribes to this event; nothing was sent.
    NoSubscribers,
    /// Deliveries were started in the background.
    Dispatched {
        /// Number of deliveries started.
        endpoints: usize,
    },
}

/// Why the gate refused an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    /// The request failed one of the presence checks.
    #[error(transparent)]
    Invalid(#[from] InboundValidationError),

    /// The dispatcher no longer accepts work.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Validates inbound events and hands routed ones to the dispatcher.
///
/// Cheap to clone; the routing table is shared read-only.
#[derive(Debug, Clone)]
pub struct InboundGate {
    routing: Arc<RoutingTable>,
    dispatcher: Dispatcher,
}

impl InboundGate {
    /// Creates a gate over a validated routing table.
    pub fn new(routing: Arc<RoutingTable>, dispatcher: Dispatcher) -> Self {
        Self {
            routing,
            dispatcher,
        }
    }

    /// Returns the dispatcher events are handed to.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Admits `raw`, resolves its endpoints and starts delivery.
    ///
    /// Returns as soon as deliveries are scheduled; it never waits for a
    /// subscriber.
    pub fn accept(&self, raw: RawEvent) -> Result<GateOutcome, GateError> {
        let event = raw.admit().inspect_err(|e| {
            warn!(reason = %e, "Rejected inbound webhook");
        })?;

        let endpoints = self.routing.resolve(
            event.org().as_str(),
            event.repo().as_str(),
            event.event_type().as_str(),
        );

        if endpoints.is_empty() {
            debug!(
                dispatch_id = %event.dispatch_id(),
                event_type = %event.event_type(),
                org = %event.org(),
                repo = %event.repo(),
                "No subscribers for webhook"
            );
            return Ok(GateOutcome::NoSubscribers);
        }

        let count = endpoints.len();
        info!(
            dispatch_id = %event.dispatch_id(),
            event_type = %event.event_type(),
            org = %event.org(),
            repo = %event.repo(),
            endpoints = count,
            "Dispatching webhook"
        );
        self.dispatcher.dispatch(event, endpoints)?;

        Ok(GateOutcome::Dispatched { endpoints: count })
    }
}
