//! Newtype domain identifiers.
//!
//! Every routing concept that has an identity is a distinct newtype wrapping a
//! primitive. This prevents accidentally passing a repository name where an
//! organisation is expected even though both are strings under the hood.
//!
//! String-backed identifiers are guaranteed non-empty: the only constructor
//! returns `None` for an empty value.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display, Borrow<str>.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value).ok_or_else(|| format!("{} must not be empty", stringify!($name)))
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers — String-backed (configuration / webhook fields)
// ---------------------------------------------------------------------------

string_id! {
    /// Names a destination (subscriber) declared under `access.plugins`.
    ///
    /// Destination names are unique within a routing table and are the values
    /// listed under each `access.repo_plugins` scope.
    DestinationName
}

string_id! {
    /// The event type announced by the code-hosting platform
    /// (e.g. `"Issue Hook"`, `"Push Hook"`).
    EventType
}

string_id! {
    /// The organisation (namespace / owner) that owns the repository.
    OrgName
}

string_id! {
    /// The repository name within its organisation.
    RepoName
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies one admitted inbound event and every delivery fanned out from it.
///
/// Generated by the relay; it never comes from the caller. Attached to every
/// delivery log line so all outcomes of one webhook can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchId(Uuid);

impl DispatchId {
    /// Generates a new random dispatch identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for DispatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_ids_are_rejected() {
        assert!(DestinationName::new("").is_none());
        assert!(EventType::new(String::new()).is_none());
        assert!(OrgName::new("").is_none());
        assert!(RepoName::new("").is_none());
    }

    #[test]
    fn string_id_round_trips_through_serde() {
        let name: DestinationName = serde_json::from_str("\"hook-bot\"").unwrap();
        assert_eq!(name.as_str(), "hook-bot");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"hook-bot\"");

        let err = serde_json::from_str::<DestinationName>("\"\"").unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn dispatch_ids_are_unique() {
        assert_ne!(DispatchId::new_random(), DispatchId::new_random());
    }
}
