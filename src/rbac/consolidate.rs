// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Namespace consolidation
//!
//! Namespaces whose authorized resource lists serialize to the same bytes are
//! grouped so the filter carries one clause per distinct resource set instead
//! of one per namespace. Grouping never changes which objects match.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::resource::Resource;

/// Namespaces sharing one authorized resource set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceGroup {
    pub resources: Vec<Resource>,
    pub namespaces: BTreeSet<String>,
}

/// Resource groups keyed by the canonical JSON of their resource list
///
/// Keys iterate in byte order, which fixes clause order in generated filters
/// and the `group_N` names used by lookup tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Consolidation {
    groups: BTreeMap<String, ResourceGroup>,
}

impl Consolidation {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn ordered_keys(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    pub fn get(&self, key: &str) -> Option<&ResourceGroup> {
        self.groups.get(key)
    }

    /// Groups in key order, each with its lookup-table row name
    pub fn named_groups(&self) -> impl Iterator<Item = (String, &ResourceGroup)> {
        self.groups
            .values()
            .enumerate()
            .map(|(i, group)| (group_name(i), group))
    }
}

/// Lookup-table row name of the `index`-th group
pub fn group_name(index: usize) -> String {
    format!("group_{}", index)
}

/// Group namespaces by identical resource lists
pub fn consolidate(
    namespaced: &BTreeMap<String, Vec<Resource>>,
) -> Result<Consolidation, serde_json::Error> {
    let mut groups: BTreeMap<String, ResourceGroup> = BTreeMap::new();

    for (namespace, resources) in namespaced {
        let key = serde_json::to_string(resources)?;
        groups
            .entry(key)
            .or_insert_with(|| ResourceGroup {
                resources: resources.clone(),
                namespaces: BTreeSet::new(),
            })
            .namespaces
            .insert(namespace.clone());
    }

    debug!(
        namespaces = namespaced.len(),
        groups = groups.len(),
        "RBAC consolidation reduced namespaces to groups"
    );

    Ok(Consolidation { groups })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns_map(entries: &[(&str, &[(&str, &str)])]) -> BTreeMap<String, Vec<Resource>> {
        entries
            .iter()
            .map(|(ns, res)| {
                (
                    ns.to_string(),
                    res.iter().map(|(g, k)| Resource::new(*g, *k)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_groups_identical_sets() {
        let map = ns_map(&[
            ("ns1", &[("g1", "k1")]),
            ("ns2", &[("g1", "k1")]),
            ("ns3", &[("g2", "k2")]),
        ]);
        let c = consolidate(&map).unwrap();
        assert_eq!(c.len(), 2);

        let keys = c.ordered_keys();
        let first = c.get(keys[0]).unwrap();
        let second = c.get(keys[1]).unwrap();
        assert_eq!(
            first.namespaces,
            BTreeSet::from(["ns1".to_string(), "ns2".to_string()])
        );
        assert_eq!(first.resources, vec![Resource::new("g1", "k1")]);
        assert_eq!(second.namespaces, BTreeSet::from(["ns3".to_string()]));
    }

    #[test]
    fn test_order_is_deterministic() {
        let map = ns_map(&[
            ("b", &[("zz", "pods")]),
            ("a", &[("aa", "pods")]),
            ("c", &[("zz", "pods")]),
        ]);
        let first = consolidate(&map).unwrap();
        let second = consolidate(&map.clone()).unwrap();
        assert_eq!(first.ordered_keys(), second.ordered_keys());

        let names: Vec<String> = first.named_groups().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["group_0", "group_1"]);
        let (_, g0) = first.named_groups().next().unwrap();
        assert_eq!(g0.resources, vec![Resource::new("aa", "pods")]);
    }

    #[test]
    fn test_resource_order_matters_for_key() {
        let map = ns_map(&[
            ("a", &[("", "pods"), ("apps", "deployments")]),
            ("b", &[("apps", "deployments"), ("", "pods")]),
        ]);
        // Lists are normalized by the cache before consolidation; raw order differs here
        assert_eq!(consolidate(&map).unwrap().len(), 2);
    }

    #[test]
    fn test_empty() {
        let c = consolidate(&BTreeMap::new()).unwrap();
        assert!(c.is_empty());
        assert!(c.ordered_keys().is_empty());
    }
}
