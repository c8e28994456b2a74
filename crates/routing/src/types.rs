//! Shared value types for the routing domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::DestinationName;

// ---------------------------------------------------------------------------
// Resolved endpoints
// ---------------------------------------------------------------------------

/// One delivery target produced by [`crate::RoutingTable::resolve`].
///
/// Carries the destination name alongside its URL so delivery logs can name
/// the subscriber, not just the address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// The destination this endpoint belongs to.
    pub destination: DestinationName,
    /// Absolute `http`/`https` URL the event is POSTed to.
    pub url: Url,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.destination, self.url)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
