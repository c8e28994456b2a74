//! Routing domain for the webhook relay.
//!
//! This crate owns every routing concept: the configuration document, its
//! validation into an immutable [`RoutingTable`], endpoint resolution, and the
//! inbound event model with its admission checks. The `dispatcher` and
//! `listener` crates consume these types; they never add routing rules.
//!
//! ## Architectural Layer
//!
//! **Business logic.** This crate has no I/O dependencies. Resolution and
//! validation are pure functions and never suspend.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`DestinationName`, `EventType`, `DispatchId`, ...) |
//! | [`config`] | Serde shape of the config file and its validation |
//! | [`table`] | Validated [`RoutingTable`] and [`RoutingTable::resolve`] |
//! | [`event`] | [`RawEvent`] → [`InboundEvent`] admission |
//! | [`types`] | Shared value types (`Endpoint`, `Timestamp`) |
//! | [`errors`] | Configuration and inbound validation errors |

pub mod config;
pub mod errors;
pub mod event;
pub mod identifiers;
pub mod table;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{AccessConfig, PluginConfig, RelayConfig};
pub use errors::{ConfigValidationError, InboundValidationError, InvalidDestination};
pub use event::{InboundEvent, RawEvent};
pub use identifiers::{DestinationName, DispatchId, EventType, OrgName, RepoName};
pub use table::{Destination, RoutingTable};
pub use types::{Endpoint, Timestamp};
