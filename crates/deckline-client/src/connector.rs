use std::collections::HashMap;

use dashmap::DashMap;

use deckline_core::{EntityId, PluginId, ShortId};

/// Longest canonical identity the wire allows on a connector update. Longer
/// identities can only be addressed through a host-issued short id.
pub const CANONICAL_ID_MAX_LEN: usize = 200;

/// Build the canonical identity string for a connector: plugin id, connector
/// id, value and the auxiliary data pairs sorted by key, joined with fixed
/// separators. Sorting makes the result independent of call-site pair order,
/// so equal logical identities are byte-identical.
pub fn construct_identity(
    plugin_id: &PluginId,
    connector_id: &EntityId,
    value: u8,
    data: &[(String, String)],
) -> String {
    let mut pairs: Vec<&(String, String)> = data.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut canonical = format!("{plugin_id}|{connector_id}|{value}");
    for (key, val) in pairs {
        canonical.push('|');
        canonical.push_str(key);
        canonical.push('=');
        canonical.push_str(val);
    }
    canonical
}

/// Split a canonical identity back into its element set. Elements without a
/// `=` (plugin id, connector id, value) map to `None`.
pub fn deconstruct_identity(canonical: &str) -> HashMap<String, Option<String>> {
    canonical
        .split('|')
        .map(|elem| match elem.split_once('=') {
            Some((key, val)) => (key.to_string(), Some(val.to_string())),
            None => (elem.to_string(), None),
        })
        .collect()
}

/// Canonical identity -> host-issued short id. Populated only from
/// short-id notifications; entries live for the whole session and the host
/// may remap an identity at any time by sending a new notification.
#[derive(Default)]
pub struct ShortIdMap {
    mapping: DashMap<String, ShortId>,
}

impl ShortIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, canonical: impl Into<String>, short_id: ShortId) {
        self.mapping.insert(canonical.into(), short_id);
    }

    /// Resolve a canonical identity to its short id. The host may have
    /// recorded the mapping against a differently-ordered serialization of
    /// the same data set, so entries are compared deconstructed, not as raw
    /// strings.
    pub fn resolve(&self, canonical: &str) -> Option<ShortId> {
        let target = deconstruct_identity(canonical);
        self.mapping
            .iter()
            .find(|entry| deconstruct_identity(entry.key()) == target)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn identity_is_order_independent() {
        let plugin = PluginId::from_raw("com.example.demo");
        let connector = EntityId::from_raw("com.example.demo.connector.volume");

        let a = construct_identity(
            &plugin,
            &connector,
            37,
            &pairs(&[("channel", "left"), ("bus", "master")]),
        );
        let b = construct_identity(
            &plugin,
            &connector,
            37,
            &pairs(&[("bus", "master"), ("channel", "left")]),
        );
        assert_eq!(a, b);
        assert_eq!(
            a,
            "com.example.demo|com.example.demo.connector.volume|37|bus=master|channel=left"
        );
    }

    #[test]
    fn identity_without_data_has_three_fields() {
        let canonical = construct_identity(
            &PluginId::from_raw("p"),
            &EntityId::from_raw("c"),
            0,
            &[],
        );
        assert_eq!(canonical, "p|c|0");
    }

    #[test]
    fn deconstruct_splits_pairs_and_bare_fields() {
        let parts = deconstruct_identity("p|c|42|bus=master");
        assert_eq!(parts.get("p"), Some(&None));
        assert_eq!(parts.get("c"), Some(&None));
        assert_eq!(parts.get("42"), Some(&None));
        assert_eq!(parts.get("bus"), Some(&Some("master".to_string())));
    }

    #[test]
    fn resolve_matches_reordered_serializations() {
        let map = ShortIdMap::new();
        // The host recorded the identity with its own pair order.
        map.insert("p|c|42|b=2|a=1", ShortId::from_raw("s1"));

        let local = construct_identity(
            &PluginId::from_raw("p"),
            &EntityId::from_raw("c"),
            42,
            &pairs(&[("a", "1"), ("b", "2")]),
        );
        assert_ne!(local, "p|c|42|b=2|a=1");
        assert_eq!(map.resolve(&local), Some(ShortId::from_raw("s1")));
    }

    #[test]
    fn resolve_misses_different_identities() {
        let map = ShortIdMap::new();
        map.insert("p|c|42|a=1", ShortId::from_raw("s1"));
        assert_eq!(map.resolve("p|c|42|a=2"), None);
        assert_eq!(map.resolve("p|c|41|a=1"), None);
    }

    #[test]
    fn host_can_remap_an_identity() {
        let map = ShortIdMap::new();
        map.insert("p|c|42", ShortId::from_raw("s1"));
        map.insert("p|c|42", ShortId::from_raw("s2"));
        assert_eq!(map.resolve("p|c|42"), Some(ShortId::from_raw("s2")));
        assert_eq!(map.len(), 1);
    }
}
