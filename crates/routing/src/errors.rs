//! Error types for the routing domain.
//!
//! [`ConfigValidationError`] is fatal at load time: the relay never becomes
//! ready with a table that failed validation.
//!
//! [`InboundValidationError`] is per request and recoverable. Each variant
//! carries a fixed message that is returned verbatim to the webhook caller.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Why a single destination entry was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidDestination {
    /// The entry at `index` (0-based, declaration order) has an empty name.
    #[error("plugin #{index} is missing a name")]
    MissingName {
        /// Position of the entry in `access.plugins`.
        index: usize,
    },

    /// The named destination has an empty endpoint.
    #[error("plugin {name} is missing an endpoint")]
    MissingEndpoint {
        /// Destination name.
        name: String,
    },

    /// The endpoint does not parse as an absolute URL.
    #[error("plugin {name}: {endpoint} is not a valid url ({reason})")]
    MalformedEndpoint {
        /// Destination name.
        name: String,
        /// The endpoint as written in the configuration.
        endpoint: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The endpoint parses but uses a scheme the relay cannot POST to.
    #[error("plugin {name}: {endpoint} must use http or https")]
    UnsupportedScheme {
        /// Destination name.
        name: String,
        /// The endpoint as written in the configuration.
        endpoint: String,
    },

    /// The event filter lists a blank event type.
    #[error("plugin {name} lists an empty event type")]
    EmptyEventType {
        /// Destination name.
        name: String,
    },

    /// Two entries share the same name.
    #[error("plugin {name} is declared more than once")]
    DuplicateName {
        /// The repeated destination name.
        name: String,
    },
}

/// Errors produced while validating a routing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    /// A destination entry is malformed.
    #[error("invalid plugin: {0}")]
    InvalidDestination(#[from] InvalidDestination),

    /// One or more `repo_plugins` entries reference names absent from
    /// `plugins`. `names` lists every offending name once, sorted.
    #[error("repo_plugins {names:?} missing plugins in the configuration")]
    UnknownDestination {
        /// Every unknown destination name.
        names: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Inbound errors
// ---------------------------------------------------------------------------

/// Fixed response text for a request without an event-type header.
pub const MISSING_EVENT_TYPE_MESSAGE: &str = "400 Bad Request: Missing Event Type Header";
/// Fixed response text for a request without a usable payload.
pub const MISSING_PAYLOAD_MESSAGE: &str =
    "400 Bad Request: Request Body Must Be A Non-Empty JSON Object";
/// Fixed response text for a payload that names no owner.
pub const MISSING_ORG_MESSAGE: &str = "400 Bad Request: Request Body Does Not Contain Owner";
/// Fixed response text for a payload that names no repository.
pub const MISSING_REPO_MESSAGE: &str = "400 Bad Request: Request Body Does Not Contain Repo";

/// Reasons an inbound webhook is refused before any routing happens.
///
/// Checked in declaration order; the first failing check wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InboundValidationError {
    /// No event-type header was supplied.
    #[error("{}", MISSING_EVENT_TYPE_MESSAGE)]
    MissingEventType,

    /// The body is empty or is not a JSON object.
    #[error("{}", MISSING_PAYLOAD_MESSAGE)]
    MissingPayload,

    /// The payload does not identify the owning organisation.
    #[error("{}", MISSING_ORG_MESSAGE)]
    MissingOrg,

    /// The payload does not identify the repository.
    #[error("{}", MISSING_REPO_MESSAGE)]
    MissingRepo,
}

impl InboundValidationError {
    /// Returns the fixed message sent back to the webhook caller.
    pub fn message(self) -> &'static str {
        match self {
            Self::MissingEventType => MISSING_EVENT_TYPE_MESSAGE,
            Self::MissingPayload => MISSING_PAYLOAD_MESSAGE,
            Self::MissingOrg => MISSING_ORG_MESSAGE,
            Self::MissingRepo => MISSING_REPO_MESSAGE,
        }
    }
}
