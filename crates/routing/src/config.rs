//! Serde shape of the relay configuration file and its validation.
//!
//! The structures here mirror the file 1:1 and carry no guarantees. The only
//! way to obtain a [`RoutingTable`] is [`RelayConfig::validate`] (or
//! [`AccessConfig::validate`]), which checks the whole document and either
//! returns a complete table or an error; nothing is partially applied.
//!
//! ```yaml
//! access:
//!   repo_plugins:
//!     "org1": ["s1"]
//!     "org1/repo1": ["s2"]
//!   plugins:
//!     - name: s1
//!       endpoint: https://hooks.example.com/e1
//!       events: ["Issue Hook"]
//!     - name: s2
//!       endpoint: https://hooks.example.com/e2
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::errors::{ConfigValidationError, InvalidDestination};
use crate::table::{Destination, RoutingTable};
use crate::{DestinationName, EventType};

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Routing section.
    #[serde(default)]
    pub access: AccessConfig,
}

impl RelayConfig {
    /// Validates the document and builds the immutable routing table.
    pub fn validate(self) -> Result<RoutingTable, ConfigValidationError> {
        self.access.validate()
    }
}

/// The routing section: scopes and the destinations they subscribe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Scope key (`"org"` or `"org/repo"`) to ordered destination names.
    ///
    /// Duplicates are allowed and are delivered to once per occurrence.
    #[serde(default)]
    pub repo_plugins: BTreeMap<String, Vec<String>>,

    /// Every destination that may be referenced from `repo_plugins`.
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

/// One destination entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Unique destination name.
    #[serde(default)]
    pub name: String,

    /// Absolute URL the events are POSTed to.
    #[serde(default)]
    pub endpoint: String,

    /// Event types forwarded to this destination. Empty means all of them;
    /// a blank entry is rejected.
    #[serde(default)]
    pub events: Vec<String>,
}

impl AccessConfig {
    /// Validates destinations and references, returning the routing table.
    ///
    /// Destinations are checked in declaration order and the first malformed
    /// one is reported. Unknown references are collected across every scope
    /// and reported together.
    pub fn validate(self) -> Result<RoutingTable, ConfigValidationError> {
        let mut destinations = Vec::with_capacity(self.plugins.len());
        let mut known: HashSet<DestinationName> = HashSet::with_capacity(self.plugins.len());

        for (index, plugin) in self.plugins.into_iter().enumerate() {
            let destination = plugin.into_destination(index)?;
            if !known.insert(destination.name.clone()) {
                return Err(InvalidDestination::DuplicateName {
                    name: destination.name.to_string(),
                }
                .into());
            }
            destinations.push(destination);
        }

        let unknown: BTreeSet<&str> = self
            .repo_plugins
            .values()
            .flatten()
            .map(String::as_str)
            .filter(|name| !known.contains(*name))
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigValidationError::UnknownDestination {
                names: unknown.into_iter().map(str::to_owned).collect(),
            });
        }

        let subscriptions = self
            .repo_plugins
            .into_iter()
            .map(|(scope, names)| {
                // Every name was checked against `known` above, so none is empty.
                let names = names.into_iter().filter_map(DestinationName::new).collect();
                (scope, names)
            })
            .collect();

        let table = RoutingTable::new(subscriptions, destinations);
        debug!(
            scopes = table.scope_count(),
            destinations = table.destinations().len(),
            "Routing table validated"
        );
        Ok(table)
    }
}

impl PluginConfig {
    fn into_destination(self, index: usize) -> Result<Destination, InvalidDestination> {
        let name = DestinationName::new(self.name).ok_or(InvalidDestination::MissingName { index })?;

        if self.endpoint.is_empty() {
            return Err(InvalidDestination::MissingEndpoint {
                name: name.to_string(),
            });
        }

        let url = Url::parse(&self.endpoint).map_err(|e| InvalidDestination::MalformedEndpoint {
            name: name.to_string(),
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(InvalidDestination::UnsupportedScheme {
                name: name.to_string(),
                endpoint: self.endpoint,
            });
        }

        let events: HashSet<EventType> = self
            .events
            .into_iter()
            .map(|event| EventType::new(event).filter(|e| !e.as_str().trim().is_empty()))
            .collect::<Option<_>>()
            .ok_or_else(|| InvalidDestination::EmptyEventType {
                name: name.to_string(),
            })?;

        Ok(Destination {
            name,
            url,
            events,
        })
    }
}
