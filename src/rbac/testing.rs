// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory providers with call counters for unit tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::ImpersonationCredential;
use super::provider::{
    AuthorizationProvider, Impersonator, NamespaceInfo, ResourceRule, TopologyProvider,
};
use super::resource::Resource;
use crate::error::{Error, Result};

pub const MANAGED_LABEL: &str = "cluster.open-cluster-management.io/managedCluster";

pub struct FakeTopology {
    pub namespaces: Mutex<Vec<NamespaceInfo>>,
    pub catalog: Vec<Resource>,
    pub namespace_calls: AtomicUsize,
    pub catalog_calls: AtomicUsize,
    pub fail_namespaces: AtomicBool,
    pub fail_catalog: AtomicBool,
}

impl FakeTopology {
    /// Every namespace given here carries the managed-cluster label
    pub fn new(managed: &[&str], catalog: &[(&str, &str)]) -> Self {
        Self {
            namespaces: Mutex::new(
                managed
                    .iter()
                    .map(|n| NamespaceInfo::new(*n).with_label(MANAGED_LABEL, *n))
                    .collect(),
            ),
            catalog: catalog.iter().map(|(g, k)| Resource::new(*g, *k)).collect(),
            namespace_calls: AtomicUsize::new(0),
            catalog_calls: AtomicUsize::new(0),
            fail_namespaces: AtomicBool::new(false),
            fail_catalog: AtomicBool::new(false),
        }
    }

    pub fn add_namespace(&self, ns: NamespaceInfo) {
        self.namespaces.lock().unwrap().push(ns);
    }
}

#[async_trait]
impl TopologyProvider for FakeTopology {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>> {
        self.namespace_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_namespaces.load(Ordering::SeqCst) {
            return Err(Error::topology("namespace listing unavailable"));
        }
        Ok(self.namespaces.lock().unwrap().clone())
    }

    async fn list_cluster_scoped_catalog(&self) -> Result<Vec<Resource>> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_catalog.load(Ordering::SeqCst) {
            return Err(Error::topology("discovery unavailable"));
        }
        Ok(self.catalog.clone())
    }
}

#[derive(Default)]
pub struct FakeAuthz {
    pub listable: HashSet<Resource>,
    pub rules: HashMap<String, Vec<ResourceRule>>,
    pub failing_namespaces: HashSet<String>,
    pub fail_can_list: AtomicBool,
    pub can_list_calls: AtomicUsize,
    pub list_rules_calls: AtomicUsize,
    /// When set, rules reviews wait for a notification before answering
    pub gate: Option<Arc<Notify>>,
}

impl FakeAuthz {
    pub fn allow_cluster(mut self, group: &str, kind: &str) -> Self {
        self.listable.insert(Resource::new(group, kind));
        self
    }

    pub fn allow_namespaced(mut self, ns: &str, verbs: &[&str], groups: &[&str], kinds: &[&str]) -> Self {
        self.rules.entry(ns.to_string()).or_default().push(ResourceRule {
            verbs: verbs.iter().map(|s| s.to_string()).collect(),
            api_groups: groups.iter().map(|s| s.to_string()).collect(),
            resources: kinds.iter().map(|s| s.to_string()).collect(),
            resource_names: Vec::new(),
        });
        self
    }

    /// Adds a rule limited to the named objects
    pub fn allow_named(mut self, ns: &str, verbs: &[&str], groups: &[&str], kinds: &[&str], names: &[&str]) -> Self {
        self.rules.entry(ns.to_string()).or_default().push(ResourceRule {
            verbs: verbs.iter().map(|s| s.to_string()).collect(),
            api_groups: groups.iter().map(|s| s.to_string()).collect(),
            resources: kinds.iter().map(|s| s.to_string()).collect(),
            resource_names: names.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn fail_namespace(mut self, ns: &str) -> Self {
        self.failing_namespaces.insert(ns.to_string());
        self
    }

    pub fn block_rules_on(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl AuthorizationProvider for FakeAuthz {
    async fn can_list(&self, apigroup: &str, kind: &str) -> Result<bool> {
        self.can_list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_can_list.load(Ordering::SeqCst) {
            return Err(Error::authorization("access review rejected"));
        }
        Ok(self.listable.contains(&Resource::new(apigroup, kind)))
    }

    async fn list_rules(&self, namespace: &str) -> Result<Vec<ResourceRule>> {
        self.list_rules_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.failing_namespaces.contains(namespace) {
            return Err(Error::authorization(format!(
                "rules review failed for {}",
                namespace
            )));
        }
        Ok(self.rules.get(namespace).cloned().unwrap_or_default())
    }
}

pub struct FakeImpersonator {
    pub authz: Arc<FakeAuthz>,
    /// Username -> authorization answering for that user instead of `authz`
    pub per_user: HashMap<String, Arc<FakeAuthz>>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl FakeImpersonator {
    pub fn new(authz: Arc<FakeAuthz>) -> Self {
        Self {
            authz,
            per_user: HashMap::new(),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn with_user(mut self, username: &str, authz: Arc<FakeAuthz>) -> Self {
        self.per_user.insert(username.to_string(), authz);
        self
    }
}

impl Impersonator for FakeImpersonator {
    fn impersonate(
        &self,
        credential: &ImpersonationCredential,
    ) -> Result<Arc<dyn AuthorizationProvider>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::impersonation(format!(
                "cannot impersonate {}",
                credential.username
            )));
        }
        let authz: Arc<dyn AuthorizationProvider> = self
            .per_user
            .get(&credential.username)
            .unwrap_or(&self.authz)
            .clone();
        Ok(authz)
    }
}
