// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Authorized resource types
//!
//! A [`Resource`] is an (API group, plural kind) pair taken from RBAC rules or
//! access reviews. Two sentinel values carry meaning:
//! - [`WILDCARD`] (`*`) in either field matches any value of that field
//! - [`CORE_API_GROUP`] (`""`) as the API group denotes the core (unnamed) group

use serde::{Deserialize, Serialize};

/// Matches any value of the field it appears in
pub const WILDCARD: &str = "*";

/// API group of core resources (pods, services, namespaces, ...)
pub const CORE_API_GROUP: &str = "";

/// A resource type the identity is allowed to list
///
/// Field order is part of the canonical serialization used for namespace
/// consolidation; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub apigroup: String,
    pub kind: String,
}

impl Resource {
    pub fn new(apigroup: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            apigroup: apigroup.into(),
            kind: kind.into(),
        }
    }

    /// Every resource of every group
    pub fn all() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }

    pub fn is_any_group(&self) -> bool {
        self.apigroup == WILDCARD
    }

    pub fn is_core_group(&self) -> bool {
        self.apigroup == CORE_API_GROUP
    }

    pub fn is_any_kind(&self) -> bool {
        self.kind == WILDCARD
    }

    /// Both fields wildcarded: grants everything
    pub fn is_all(&self) -> bool {
        self.is_any_group() && self.is_any_kind()
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_core_group() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.apigroup)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        assert!(Resource::all().is_all());
        assert!(!Resource::new("*", "pods").is_all());
        assert!(Resource::new("*", "pods").is_any_group());
        assert!(Resource::new("apps", "*").is_any_kind());
    }

    #[test]
    fn test_core_group() {
        assert!(Resource::new("", "pods").is_core_group());
        assert!(!Resource::new("apps", "deployments").is_core_group());
    }

    #[test]
    fn test_display() {
        assert_eq!(Resource::new("", "pods").to_string(), "pods");
        assert_eq!(
            Resource::new("apps", "deployments").to_string(),
            "deployments.apps"
        );
    }

    #[test]
    fn test_canonical_json_field_order() {
        let json = serde_json::to_string(&Resource::new("apps", "deployments")).unwrap();
        assert_eq!(json, r#"{"apigroup":"apps","kind":"deployments"}"#);
    }
}
