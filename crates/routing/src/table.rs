//! The validated routing table and the endpoint resolver.
//!
//! A [`RoutingTable`] is immutable once built. It is meant to be shared as
//! `Arc<RoutingTable>` by every concurrent request; resolution never locks,
//! never suspends and never performs I/O.

use std::collections::{HashMap, HashSet};

use url::Url;

use crate::{DestinationName, Endpoint, EventType};

/// A validated destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Unique name.
    pub name: DestinationName,
    /// Absolute `http`/`https` URL.
    pub url: Url,
    /// Accepted event types; empty accepts every type.
    pub events: HashSet<EventType>,
}

impl Destination {
    /// Returns `true` if this destination wants events of `event_type`.
    pub fn accepts(&self, event_type: &str) -> bool {
        self.events.is_empty() || self.events.contains(event_type)
    }
}

/// Immutable routing table built by [`crate::RelayConfig::validate`].
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    subscriptions: HashMap<String, Vec<DestinationName>>,
    destinations: Vec<Destination>,
    by_name: HashMap<DestinationName, usize>,
}

impl RoutingTable {
    /// Assembles a table from already-validated parts.
    ///
    /// Callers guarantee destination names are unique and every subscribed
    /// name exists; unknown names are ignored at resolution time.
    pub(crate) fn new(
        subscriptions: HashMap<String, Vec<DestinationName>>,
        destinations: Vec<Destination>,
    ) -> Self {
        let by_name = destinations
            .iter()
            .enumerate()
            .map(|(index, destination)| (destination.name.clone(), index))
            .collect();
        Self {
            subscriptions,
            destinations,
            by_name,
        }
    }

    /// All destinations in declaration order.
    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// Number of subscription scopes.
    pub fn scope_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Destination names subscribed under `scope`, in fan-out order.
    pub fn subscribers(&self, scope: &str) -> &[DestinationName] {
        self.subscriptions
            .get(scope)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Resolves the ordered list of endpoints for an event.
    ///
    /// Organisation-level subscribers come first, then repository-level ones.
    /// A destination subscribed in both scopes (or twice in one) appears once
    /// per subscription. Unknown scopes yield an empty list.
    pub fn resolve(&self, org: &str, repo: &str, event_type: &str) -> Vec<Endpoint> {
        let repo_scope = format!("{org}/{repo}");
        let candidates = self
            .subscribers(org)
            .iter()
            .chain(self.subscribers(&repo_scope));

        if self.destinations.is_empty() {
            return Vec::new();
        }

        candidates
            .filter_map(|name| self.by_name.get(name).map(|&i| &self.destinations[i]))
            .filter(|destination| destination.accepts(event_type))
            .map(|destination| Endpoint {
                destination: destination.name.clone(),
                url: destination.url.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::{AccessConfig, PluginConfig, RelayConfig};

    use super::*;

    fn plugin(name: &str, endpoint: &str, events: &[&str]) -> PluginConfig {
        PluginConfig {
            name: name.into(),
            endpoint: endpoint.into(),
            events: events.iter().map(|e| e.to_string()).collect(),
        }
    }

    fn table(scopes: &[(&str, &[&str])], plugins: Vec<PluginConfig>) -> RoutingTable {
        RelayConfig {
            access: AccessConfig {
                repo_plugins: scopes
                    .iter()
                    .map(|(scope, names)| {
                        (scope.to_string(), names.iter().map(|n| n.to_string()).collect())
                    })
                    .collect(),
                plugins,
            },
        }
        .validate()
        .unwrap()
    }

    fn urls(endpoints: &[Endpoint]) -> Vec<&str> {
        endpoints.iter().map(|e| e.url.as_str()).collect()
    }

    fn scenario() -> RoutingTable {
        table(
            &[("org1", &["s1"]), ("org1/repo1", &["s2"])],
            vec![
                plugin("s1", "https://h/e1", &["IssueHook"]),
                plugin("s2", "https://h/e2", &[]),
            ],
        )
    }

    #[test]
    fn org_subscribers_precede_repo_subscribers() {
        let endpoints = scenario().resolve("org1", "repo1", "IssueHook");
        assert_eq!(urls(&endpoints), ["https://h/e1", "https://h/e2"]);
        assert_eq!(endpoints[0].destination.as_str(), "s1");
    }

    #[test]
    fn event_filter_excludes_unsubscribed_types() {
        let endpoints = scenario().resolve("org1", "repo1", "PushHook");
        assert_eq!(urls(&endpoints), ["https://h/e2"]);
    }

    #[test]
    fn unknown_scopes_resolve_to_nothing() {
        let t = scenario();
        assert!(t.resolve("nobody", "nothing", "IssueHook").is_empty());
        assert!(t.resolve("org1", "other", "PushHook").is_empty());
    }

    #[test]
    fn empty_table_resolves_to_nothing() {
        assert!(RoutingTable::default().resolve("1", "2", "3").is_empty());
    }

    #[test]
    fn empty_event_set_accepts_everything() {
        let t = table(&[("org1", &["all"])], vec![plugin("all", "https://h/all", &[])]);
        for event in ["Issue Hook", "Push Hook", "Note Hook", "anything"] {
            assert_eq!(urls(&t.resolve("org1", "r", event)), ["https://h/all"]);
        }
    }

    #[test]
    fn double_subscription_delivers_twice() {
        let t = table(
            &[("org1", &["s1", "s1"]), ("org1/repo1", &["s1"])],
            vec![plugin("s1", "https://h/e1", &[])],
        );
        assert_eq!(
            urls(&t.resolve("org1", "repo1", "Push Hook")),
            ["https://h/e1", "https://h/e1", "https://h/e1"]
        );
    }

    #[test]
    fn repo_scope_requires_matching_org() {
        let t = table(&[("org1/repo1", &["s1"])], vec![plugin("s1", "https://h/e1", &[])]);
        assert!(t.resolve("org2", "repo1", "Push Hook").is_empty());
        assert_eq!(urls(&t.resolve("org1", "repo1", "Push Hook")), ["https://h/e1"]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let t = table(
            &[("org1", &["b", "a", "c"]), ("org1/repo1", &["c", "a"])],
            vec![
                plugin("a", "https://h/a", &[]),
                plugin("b", "https://h/b", &[]),
                plugin("c", "https://h/c", &["Note Hook"]),
            ],
        );
        let first = t.resolve("org1", "repo1", "Note Hook");
        for _ in 0..16 {
            assert_eq!(t.resolve("org1", "repo1", "Note Hook"), first);
        }
        assert_eq!(
            urls(&first),
            ["https://h/b", "https://h/a", "https://h/c", "https://h/c", "https://h/a"]
        );
    }
}
