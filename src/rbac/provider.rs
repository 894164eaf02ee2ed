// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Collaborator seams consumed by the permission cache
//!
//! The Kubernetes-backed implementations live in `crate::kubernetes`; tests use
//! the in-memory fakes from `rbac::testing`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::ImpersonationCredential;
use super::resource::{Resource, WILDCARD};
use crate::error::Result;

/// Verb a rule must grant for its resources to be searchable
pub const LIST_VERB: &str = "list";

/// A hub namespace with its labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl NamespaceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// One resource rule from a namespace rules review
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceRule {
    pub verbs: Vec<String>,
    pub api_groups: Vec<String>,
    pub resources: Vec<String>,
    /// Object names the rule is restricted to; empty means every object
    pub resource_names: Vec<String>,
}

impl ResourceRule {
    /// Whether the rule allows listing (`list` or `*`) every object of its
    /// resources
    ///
    /// A list grant restricted to named objects does not let the identity
    /// list the type, so it never makes the type searchable.
    pub fn allows_list(&self) -> bool {
        self.resource_names.is_empty() && self.verbs.iter().any(|v| v == LIST_VERB || v == WILDCARD)
    }

    /// Cross product of API groups and resources; empty for rules restricted
    /// to named objects
    pub fn expand(&self) -> impl Iterator<Item = Resource> + '_ {
        let resources: &[String] = if self.resource_names.is_empty() {
            self.resources.as_slice()
        } else {
            &[]
        };
        resources.iter().flat_map(move |kind| {
            self.api_groups
                .iter()
                .map(move |group| Resource::new(group.clone(), kind.clone()))
        })
    }
}

/// Answers authorization questions as one specific identity
///
/// Implementations are bound to the identity they were created for through
/// [`Impersonator::impersonate`].
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    /// Can the identity `list` resources of this (group, kind) at cluster scope?
    async fn can_list(&self, apigroup: &str, kind: &str) -> Result<bool>;

    /// Resource rules the identity holds in a namespace
    async fn list_rules(&self, namespace: &str) -> Result<Vec<ResourceRule>>;
}

/// Builds identity-bound authorization clients
pub trait Impersonator: Send + Sync {
    fn impersonate(
        &self,
        credential: &ImpersonationCredential,
    ) -> Result<Arc<dyn AuthorizationProvider>>;
}

/// Identity-independent view of the hub
#[async_trait]
pub trait TopologyProvider: Send + Sync {
    /// All namespaces on the hub
    async fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>>;

    /// Every cluster-scoped resource type served by the hub, unfiltered
    async fn list_cluster_scoped_catalog(&self) -> Result<Vec<Resource>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(verbs: &[&str], groups: &[&str], resources: &[&str]) -> ResourceRule {
        ResourceRule {
            verbs: verbs.iter().map(|s| s.to_string()).collect(),
            api_groups: groups.iter().map(|s| s.to_string()).collect(),
            resources: resources.iter().map(|s| s.to_string()).collect(),
            resource_names: Vec::new(),
        }
    }

    #[test]
    fn test_allows_list() {
        assert!(rule(&["get", "list"], &[""], &["pods"]).allows_list());
        assert!(rule(&["*"], &[""], &["pods"]).allows_list());
        assert!(!rule(&["get", "watch"], &[""], &["pods"]).allows_list());
        assert!(!rule(&[], &[""], &["pods"]).allows_list());
    }

    #[test]
    fn test_expand_cross_product() {
        let r = rule(&["list"], &["", "apps"], &["pods", "deployments"]);
        let expanded: Vec<Resource> = r.expand().collect();
        assert_eq!(
            expanded,
            vec![
                Resource::new("", "pods"),
                Resource::new("apps", "pods"),
                Resource::new("", "deployments"),
                Resource::new("apps", "deployments"),
            ]
        );
    }

    #[test]
    fn test_named_object_rules_grant_nothing() {
        let mut r = rule(&["get", "list"], &[""], &["secrets"]);
        r.resource_names = vec!["registry-pull".to_string()];
        assert!(!r.allows_list());
        assert_eq!(r.expand().count(), 0);
    }

    #[test]
    fn test_expand_empty_groups() {
        let r = rule(&["list"], &[], &["pods"]);
        assert_eq!(r.expand().count(), 0);
    }
}
