// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Per-identity permission cache
//!
//! Each identity gets a [`UserPermissions`] entry with three sub-caches, each
//! with its own lock, error slot and freshness clock:
//! - managed clusters: hub namespaces that represent managed clusters
//! - cluster-scoped resources the identity may list
//! - namespace-scoped resources the identity may list, per namespace
//!
//! Locking rules:
//! - The identity map lock is held only to find or insert an entry, never
//!   while another lock is taken or any I/O is awaited
//! - A task holds at most one sub-cache lock of an entry at a time, so no
//!   ordering cycle between sub-caches can form
//! - Shared topology locks are leaves: they may be taken while a sub-cache
//!   lock is held, never the other way around
//!
//! Every provider failure narrows access: a failing check or rules review
//! contributes nothing to the snapshot.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::consolidate::{Consolidation, consolidate};
use super::provider::{AuthorizationProvider, Impersonator, ResourceRule};
use super::resource::Resource;
use super::shared::SharedTopologyCache;
use super::{Identity, ImpersonationCredential};
use crate::config::{DEFAULT_MANAGED_CLUSTER_LABEL_MARKER, DEFAULT_RULES_REVIEW_CONCURRENCY};
use crate::error::{Error, Result};

/// Cached value with its refresh time and last refresh error
#[derive(Debug, Default)]
pub(crate) struct SubCache<T> {
    pub(crate) data: T,
    pub(crate) updated_at: Option<Instant>,
    pub(crate) error: Option<String>,
}

impl<T> SubCache<T> {
    pub(crate) fn is_fresh(&self, ttl: Duration) -> bool {
        // a deadline past the clock's range never expires
        self.updated_at.is_some_and(|updated_at| {
            updated_at
                .checked_add(ttl)
                .is_none_or(|deadline| Instant::now() < deadline)
        })
    }

    pub(crate) fn store(&mut self, data: T) {
        self.data = data;
        self.updated_at = Some(Instant::now());
        self.error = None;
    }

    /// Record a failed refresh; data and refresh time are left untouched
    pub(crate) fn fail(&mut self, err: &Error) {
        self.error = Some(err.to_string());
    }

    #[cfg(test)]
    pub(crate) fn expire(&mut self) {
        self.updated_at = None;
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NamespacedAccess {
    resources: BTreeMap<String, Vec<Resource>>,
    consolidated: Option<Consolidation>,
}

/// Cached permissions of one identity
pub struct UserPermissions {
    identity: Identity,
    authz: OnceCell<Arc<dyn AuthorizationProvider>>,
    pub(crate) managed_clusters: Mutex<SubCache<BTreeMap<String, String>>>,
    pub(crate) cluster_scoped: Mutex<SubCache<Vec<Resource>>>,
    pub(crate) namespaced: Mutex<SubCache<NamespacedAccess>>,
}

impl UserPermissions {
    fn new(identity: Identity) -> Self {
        Self {
            identity,
            authz: OnceCell::new(),
            managed_clusters: Mutex::new(SubCache::default()),
            cluster_scoped: Mutex::new(SubCache::default()),
            namespaced: Mutex::new(SubCache::default()),
        }
    }

    /// Identity-bound authorization client, created on first use
    ///
    /// The credential of the first successful call is kept for the lifetime
    /// of the entry.
    async fn authz(
        &self,
        impersonator: &dyn Impersonator,
        credential: &ImpersonationCredential,
    ) -> Result<Arc<dyn AuthorizationProvider>> {
        let client = self
            .authz
            .get_or_try_init(|| async {
                debug!(uid = %self.identity.uid, "Creating impersonation client");
                impersonator.impersonate(credential)
            })
            .await?;
        Ok(Arc::clone(client))
    }

    async fn is_fresh(&self, ttl: Duration) -> bool {
        let cluster_fresh = self.cluster_scoped.lock().await.is_fresh(ttl);
        cluster_fresh && self.namespaced.lock().await.is_fresh(ttl)
    }

    async fn snapshot(&self) -> PermissionSnapshot {
        let mut errors = RefreshErrors::default();

        let managed_clusters = {
            let entry = self.managed_clusters.lock().await;
            errors.managed_clusters = entry.error.clone();
            entry.data.clone()
        };
        let cluster_scoped = {
            let entry = self.cluster_scoped.lock().await;
            errors.cluster_scoped = entry.error.clone();
            entry.data.clone()
        };
        let namespaced = {
            let entry = self.namespaced.lock().await;
            errors.namespaced = entry.error.clone();
            entry.data.clone()
        };

        PermissionSnapshot {
            identity: self.identity.clone(),
            managed_clusters,
            cluster_scoped,
            namespaced: namespaced.resources,
            consolidated: namespaced.consolidated,
            errors,
        }
    }
}

/// Last refresh error of each sub-cache, if the last attempt failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_clusters: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_scoped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespaced: Option<String>,
}

/// Immutable copy of an identity's cached permissions
#[derive(Debug, Clone, Serialize)]
pub struct PermissionSnapshot {
    pub identity: Identity,
    /// Managed-cluster namespace name -> label key that marked it
    pub managed_clusters: BTreeMap<String, String>,
    pub cluster_scoped: Vec<Resource>,
    pub namespaced: BTreeMap<String, Vec<Resource>>,
    /// `None` when the namespace map could not be consolidated
    pub consolidated: Option<Consolidation>,
    pub errors: RefreshErrors,
}

impl PermissionSnapshot {
    /// Empty snapshot: no access anywhere
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            managed_clusters: BTreeMap::new(),
            cluster_scoped: Vec::new(),
            namespaced: BTreeMap::new(),
            consolidated: Some(Consolidation::default()),
            errors: RefreshErrors::default(),
        }
    }

    pub fn with_cluster_scoped(mut self, resources: Vec<Resource>) -> Self {
        self.cluster_scoped = resources;
        self
    }

    /// Set namespace access and recompute consolidation
    pub fn with_namespaced(mut self, namespaced: BTreeMap<String, Vec<Resource>>) -> Self {
        self.consolidated = consolidate(&namespaced).ok();
        self.namespaced = namespaced;
        self
    }

    pub fn with_managed_clusters<I, S>(mut self, clusters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.managed_clusters = clusters
            .into_iter()
            .map(|c| (c.into(), String::new()))
            .collect();
        self
    }

    /// Every managed-cluster namespace on the hub, regardless of access
    pub fn managed_cluster_names(&self) -> Vec<String> {
        self.managed_clusters.keys().cloned().collect()
    }

    /// Managed clusters the identity may see: those whose hub namespace
    /// grants it at least one listable resource
    pub fn authorized_managed_clusters(&self) -> Vec<String> {
        self.namespaced
            .iter()
            .filter(|(ns, resources)| !resources.is_empty() && self.managed_clusters.contains_key(*ns))
            .map(|(ns, _)| ns.clone())
            .collect()
    }

    pub fn has_hub_access(&self) -> bool {
        !self.cluster_scoped.is_empty() || !self.namespaced.is_empty()
    }
}

/// Whole milliseconds of a TTL, saturating at `u64::MAX`
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// Permission snapshots for every identity seen by this process
///
/// Entries are never evicted.
pub struct PermissionCache {
    users: Mutex<HashMap<String, Arc<UserPermissions>>>,
    shared: Arc<SharedTopologyCache>,
    impersonator: Arc<dyn Impersonator>,
    ttl_ms: AtomicU64,
    managed_label_marker: String,
    rules_concurrency: usize,
}

impl PermissionCache {
    pub fn new(
        shared: Arc<SharedTopologyCache>,
        impersonator: Arc<dyn Impersonator>,
        ttl: Duration,
    ) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            shared,
            impersonator,
            ttl_ms: AtomicU64::new(ttl_millis(ttl)),
            managed_label_marker: DEFAULT_MANAGED_CLUSTER_LABEL_MARKER.to_string(),
            rules_concurrency: DEFAULT_RULES_REVIEW_CONCURRENCY,
        }
    }

    /// Label key substring marking a namespace as a managed cluster
    pub fn with_managed_label_marker(mut self, marker: impl Into<String>) -> Self {
        self.managed_label_marker = marker.into();
        self
    }

    /// Maximum concurrent authorization reviews per refresh
    pub fn with_rules_concurrency(mut self, concurrency: usize) -> Self {
        self.rules_concurrency = concurrency.max(1);
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms.load(Ordering::Relaxed))
    }

    /// Change the freshness window; applies from the next freshness check
    pub fn set_ttl(&self, ttl: Duration) {
        self.ttl_ms.store(ttl_millis(ttl), Ordering::Relaxed);
    }

    /// Number of identities with a cache entry
    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.lock().await.is_empty()
    }

    async fn entry(&self, identity: &Identity) -> Arc<UserPermissions> {
        let mut users = self.users.lock().await;
        Arc::clone(
            users
                .entry(identity.uid.clone())
                .or_insert_with(|| Arc::new(UserPermissions::new(identity.clone()))),
        )
    }

    /// Current permissions of an identity, refreshing whatever is stale
    ///
    /// Namespace-scoped and cluster-scoped data refresh concurrently. A
    /// failure is recorded on its sub-cache and returned; data refreshed
    /// successfully in the same cycle is kept for later requests.
    pub async fn obtain(
        &self,
        identity: &Identity,
        credential: &ImpersonationCredential,
    ) -> Result<PermissionSnapshot> {
        let user = self.entry(identity).await;
        let ttl = self.ttl();

        if user.is_fresh(ttl).await {
            debug!(uid = %identity.uid, "Using user permissions from cache");
            return Ok(user.snapshot().await);
        }

        let authz = user
            .authz(self.impersonator.as_ref(), credential)
            .await
            .inspect_err(|e| {
                warn!(uid = %identity.uid, error = %e, "Error creating impersonation client");
            })?;

        let (namespaced, cluster_scoped) = tokio::join!(
            self.refresh_namespaced(&user, authz.as_ref(), ttl),
            self.refresh_cluster_scoped(&user, authz.as_ref(), ttl),
        );

        match (namespaced, cluster_scoped) {
            (Ok(()), Ok(())) => Ok(user.snapshot().await),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(ns_err), Err(cs_err)) => {
                warn!(
                    uid = %identity.uid,
                    error = %cs_err,
                    "Cluster-scoped refresh also failed"
                );
                Err(ns_err)
            }
        }
    }

    /// Managed-cluster namespaces visible on the hub
    ///
    /// Listing failures keep the previous map and are never returned.
    async fn refresh_managed_clusters(
        &self,
        user: &UserPermissions,
        ttl: Duration,
    ) -> BTreeMap<String, String> {
        let mut entry = user.managed_clusters.lock().await;
        if entry.is_fresh(ttl) {
            debug!(uid = %user.identity.uid, "Using managed clusters from cache");
            return entry.data.clone();
        }

        match self.shared.provider().list_namespaces().await {
            Ok(namespaces) => {
                let clusters: BTreeMap<String, String> = namespaces
                    .into_iter()
                    .filter_map(|ns| {
                        let marker = ns
                            .labels
                            .keys()
                            .find(|key| key.contains(self.managed_label_marker.as_str()))
                            .cloned()?;
                        Some((ns.name, marker))
                    })
                    .collect();
                debug!(
                    uid = %user.identity.uid,
                    clusters = clusters.len(),
                    "Refreshed managed clusters"
                );
                entry.store(clusters);
            }
            Err(e) => {
                warn!(
                    uid = %user.identity.uid,
                    error = %e,
                    "Error listing namespaces for managed clusters"
                );
                entry.fail(&e);
            }
        }

        entry.data.clone()
    }

    /// Cluster-scoped resource types the identity may list
    async fn refresh_cluster_scoped(
        &self,
        user: &UserPermissions,
        authz: &dyn AuthorizationProvider,
        ttl: Duration,
    ) -> Result<()> {
        let mut entry = user.cluster_scoped.lock().await;
        if entry.is_fresh(ttl) {
            return Ok(());
        }

        let catalog = match self.shared.cluster_scoped_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                entry.fail(&e);
                return Err(e);
            }
        };
        let checked = catalog.len();

        let uid = user.identity.uid.as_str();
        let allowed: Vec<Option<Resource>> = stream::iter(catalog)
            .map(|resource| async move {
                match authz.can_list(&resource.apigroup, &resource.kind).await {
                    Ok(true) => Some(resource),
                    Ok(false) => None,
                    Err(e) => {
                        warn!(
                            uid = %uid,
                            resource = %resource,
                            error = %e,
                            "Access review failed, treating as not authorized"
                        );
                        None
                    }
                }
            })
            .buffered(self.rules_concurrency)
            .collect()
            .await;
        let allowed: Vec<Resource> = allowed.into_iter().flatten().collect();

        info!(
            uid = %uid,
            checked = checked,
            allowed = allowed.len(),
            "Refreshed cluster-scoped permissions"
        );
        entry.store(allowed);
        Ok(())
    }

    /// Namespace-scoped resources the identity may list in each managed-cluster namespace
    async fn refresh_namespaced(
        &self,
        user: &UserPermissions,
        authz: &dyn AuthorizationProvider,
        ttl: Duration,
    ) -> Result<()> {
        if user.namespaced.lock().await.is_fresh(ttl) {
            return Ok(());
        }

        let managed = self.refresh_managed_clusters(user, ttl).await;

        let mut entry = user.namespaced.lock().await;
        if entry.is_fresh(ttl) {
            return Ok(());
        }

        let all_namespaces = match self.shared.namespace_names().await {
            Ok(names) => names,
            Err(e) => {
                entry.fail(&e);
                return Err(e);
            }
        };
        let candidates: Vec<String> = all_namespaces
            .into_iter()
            .filter(|ns| managed.contains_key(ns))
            .collect();
        let candidate_count = candidates.len();

        let uid = user.identity.uid.as_str();
        let reviews: Vec<(String, Result<Vec<ResourceRule>>)> = stream::iter(candidates)
            .map(|ns| async move {
                let rules = authz.list_rules(&ns).await;
                (ns, rules)
            })
            .buffer_unordered(self.rules_concurrency)
            .collect()
            .await;

        let mut resources: BTreeMap<String, Vec<Resource>> = BTreeMap::new();
        for (ns, rules) in reviews {
            match rules {
                Ok(rules) => {
                    let mut listable: Vec<Resource> = rules
                        .iter()
                        .filter(|rule| rule.allows_list())
                        .flat_map(|rule| rule.expand())
                        .collect();
                    listable.sort();
                    listable.dedup();
                    if !listable.is_empty() {
                        resources.insert(ns, listable);
                    }
                }
                Err(e) => {
                    warn!(
                        uid = %uid,
                        namespace = %ns,
                        error = %e,
                        "Rules review failed, namespace excluded"
                    );
                }
            }
        }

        let consolidated = match consolidate(&resources) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(uid = %uid, error = %e, "Could not consolidate namespaces");
                None
            }
        };

        info!(
            uid = %uid,
            candidates = candidate_count,
            namespaces = resources.len(),
            groups = consolidated.as_ref().map(Consolidation::len).unwrap_or_default(),
            "Refreshed namespace-scoped permissions"
        );
        entry.store(NamespacedAccess {
            resources,
            consolidated,
        });
        Ok(())
    }
}
