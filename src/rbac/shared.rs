// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Process-wide hub topology cache
//!
//! Holds data that does not depend on who is asking: every namespace on the
//! hub and the catalog of cluster-scoped resource types. Refreshed on its own
//! TTL, independently of any identity's permission snapshot.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::cache::SubCache;
use super::provider::{NamespaceInfo, TopologyProvider};
use super::resource::Resource;
use crate::error::Result;

pub struct SharedTopologyCache {
    provider: Arc<dyn TopologyProvider>,
    ttl: Duration,
    namespaces: Mutex<SubCache<Vec<NamespaceInfo>>>,
    catalog: Mutex<SubCache<Vec<Resource>>>,
}

impl SharedTopologyCache {
    pub fn new(provider: Arc<dyn TopologyProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            namespaces: Mutex::new(SubCache::default()),
            catalog: Mutex::new(SubCache::default()),
        }
    }

    /// The underlying provider, for callers that need an uncached listing
    pub fn provider(&self) -> &Arc<dyn TopologyProvider> {
        &self.provider
    }

    /// All hub namespaces
    pub async fn namespaces(&self) -> Result<Vec<NamespaceInfo>> {
        get_or_refresh(&self.namespaces, self.ttl, "namespaces", || {
            self.provider.list_namespaces()
        })
        .await
    }

    pub async fn namespace_names(&self) -> Result<Vec<String>> {
        Ok(self
            .namespaces()
            .await?
            .into_iter()
            .map(|ns| ns.name)
            .collect())
    }

    /// Cluster-scoped resource types on the hub, not yet filtered by permission
    pub async fn cluster_scoped_catalog(&self) -> Result<Vec<Resource>> {
        get_or_refresh(&self.catalog, self.ttl, "cluster-scoped catalog", || {
            self.provider.list_cluster_scoped_catalog()
        })
        .await
    }
}

/// Return the cached value, refreshing it first when stale
///
/// A failed refresh keeps serving the last successful listing if there is
/// one; topology data grants nothing by itself.
async fn get_or_refresh<T, F, Fut>(
    slot: &Mutex<SubCache<T>>,
    ttl: Duration,
    what: &str,
    fetch: F,
) -> Result<T>
where
    T: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut entry = slot.lock().await;
    if entry.is_fresh(ttl) {
        debug!(what = %what, "Using shared topology from cache");
        return Ok(entry.data.clone());
    }

    match fetch().await {
        Ok(data) => {
            entry.store(data);
            Ok(entry.data.clone())
        }
        Err(e) => {
            entry.fail(&e);
            if entry.updated_at.is_some() {
                warn!(what = %what, error = %e, "Topology refresh failed, serving last listing");
                Ok(entry.data.clone())
            } else {
                warn!(what = %what, error = %e, "Topology refresh failed");
                Err(e)
            }
        }
    }
}
