// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Per-identity RBAC permission caching

pub mod cache;
pub mod consolidate;
pub mod provider;
pub mod resource;
pub mod shared;

#[cfg(test)]
pub(crate) mod testing;

use serde::{Deserialize, Serialize};

pub use cache::{PermissionCache, PermissionSnapshot};
pub use consolidate::{Consolidation, consolidate};
pub use provider::{
    AuthorizationProvider, Impersonator, NamespaceInfo, ResourceRule, TopologyProvider,
};
pub use resource::{CORE_API_GROUP, Resource, WILDCARD};
pub use shared::SharedTopologyCache;

/// An authenticated subject, keyed by UID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub name: String,
}

impl Identity {
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
        }
    }
}

/// Who the authorization client acts as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpersonationCredential {
    pub username: String,
    pub uid: String,
    pub groups: Vec<String>,
}

impl ImpersonationCredential {
    /// Impersonate the identity itself, with no extra groups
    pub fn for_identity(identity: &Identity) -> Self {
        Self {
            username: identity.name.clone(),
            uid: identity.uid.clone(),
            groups: Vec::new(),
        }
    }

    pub fn with_groups(mut self, groups: impl IntoIterator<Item = String>) -> Self {
        self.groups.extend(groups);
        self
    }
}
