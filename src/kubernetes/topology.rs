// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Hub topology: namespaces and the cluster-scoped resource catalog
//!
//! Listed with the hub's own credentials, never impersonated.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::ListParams;
use kube::discovery::{ApiCapabilities, ApiResource, Discovery, Scope, verbs};
use kube::{Api, Client};
use tracing::{debug, info};

use super::client::with_retry;
use crate::error::{Error, Result};
use crate::rbac::{NamespaceInfo, Resource, TopologyProvider};

pub struct KubeTopologyProvider {
    client: Client,
}

impl KubeTopologyProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TopologyProvider for KubeTopologyProvider {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let params = ListParams::default();

        let (api, params) = (&api, &params);
        let list = with_retry("list namespaces", move || api.list(params))
            .await
            .map_err(|e| Error::topology(format!("listing namespaces: {}", e)))?;

        let namespaces: Vec<NamespaceInfo> = list.items.into_iter().filter_map(to_namespace).collect();
        debug!(count = namespaces.len(), "Listed hub namespaces");
        Ok(namespaces)
    }

    async fn list_cluster_scoped_catalog(&self) -> Result<Vec<Resource>> {
        let discovery = Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(|e| Error::topology(format!("resource discovery: {}", e)))?;

        let mut catalog: Vec<Resource> = discovery
            .groups()
            .flat_map(|group| group.recommended_resources())
            .filter_map(|(ar, caps)| catalog_entry(&ar, &caps))
            .collect();
        catalog.sort();
        catalog.dedup();

        info!(count = catalog.len(), "Discovered cluster-scoped resources");
        Ok(catalog)
    }
}

fn to_namespace(ns: Namespace) -> Option<NamespaceInfo> {
    let name = ns.metadata.name?;
    Some(NamespaceInfo {
        name,
        labels: ns.metadata.labels.unwrap_or_default(),
    })
}

/// Listable cluster-scoped resources; namespaced kinds and subresources are skipped
fn catalog_entry(ar: &ApiResource, caps: &ApiCapabilities) -> Option<Resource> {
    if caps.scope != Scope::Cluster || ar.plural.contains('/') {
        return None;
    }
    if !caps.supports_operation(verbs::LIST) {
        return None;
    }
    Some(Resource::new(ar.group.clone(), ar.plural.clone()))
}
