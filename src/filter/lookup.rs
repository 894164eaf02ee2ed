// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Per-identity lookup table
//!
//! Multi-namespace groups and the managed-cluster list are too long to inline
//! in a filter, so the filter references rows of a temporary table instead.
//! The executor materializes the table (see `render::lookup_table_sql`) before
//! running the filtered query.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::rbac::PermissionSnapshot;

/// Row holding the names of the managed clusters the identity may see
pub const CLUSTER_ROW: &str = "cluster";

/// Name of an identity's lookup table: `lookup_` + uid with `-` replaced by `_`
pub fn lookup_table_name(uid: &str) -> String {
    format!("lookup_{}", uid.replace('-', "_"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupTable {
    pub name: String,
    /// Row type -> list of values
    pub rows: BTreeMap<String, Vec<String>>,
}

impl LookupTable {
    /// Rows referenced by filters synthesized from the same snapshot
    ///
    /// One `group_N` row per consolidated group with more than one namespace,
    /// plus the `cluster` row holding only the managed clusters the identity
    /// is authorized to see.
    pub fn build(snapshot: &PermissionSnapshot) -> Self {
        let mut rows = BTreeMap::new();

        if let Some(consolidated) = snapshot.consolidated.as_ref() {
            for (row, group) in consolidated.named_groups() {
                if group.namespaces.len() > 1 {
                    rows.insert(row, group.namespaces.iter().cloned().collect());
                }
            }
        }
        rows.insert(CLUSTER_ROW.to_string(), snapshot.authorized_managed_clusters());

        Self {
            name: lookup_table_name(&snapshot.identity.uid),
            rows,
        }
    }

    pub fn row(&self, row: &str) -> Option<&[String]> {
        self.rows.get(row).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::{Identity, Resource};

    #[test]
    fn test_table_name() {
        assert_eq!(
            lookup_table_name("1f6c2e5a-1b2c-4d3e-9f00-aa11bb22cc33"),
            "lookup_1f6c2e5a_1b2c_4d3e_9f00_aa11bb22cc33"
        );
        assert_eq!(lookup_table_name("plain"), "lookup_plain");
    }

    #[test]
    fn test_build_rows() {
        let namespaced = BTreeMap::from([
            ("ns1".to_string(), vec![Resource::new("g1", "k1")]),
            ("ns2".to_string(), vec![Resource::new("g1", "k1")]),
            ("ns3".to_string(), vec![Resource::new("g2", "k2")]),
        ]);
        let snapshot = PermissionSnapshot::new(Identity::new("u-1", "alice"))
            .with_namespaced(namespaced)
            .with_managed_clusters(["ns1", "ns2", "ns3", "ns4"]);

        let table = LookupTable::build(&snapshot);
        assert_eq!(table.name, "lookup_u_1");
        assert_eq!(table.row("group_0"), Some(&["ns1".to_string(), "ns2".to_string()][..]));
        // single-namespace groups are matched by equality, not by lookup
        assert_eq!(table.row("group_1"), None);
        // ns4 is a managed cluster without any grant
        assert_eq!(
            table.row(CLUSTER_ROW),
            Some(&["ns1".to_string(), "ns2".to_string(), "ns3".to_string()][..])
        );
    }

    #[test]
    fn test_build_without_access_keeps_cluster_row() {
        let table = LookupTable::build(&PermissionSnapshot::new(Identity::new("u", "n")));
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.row(CLUSTER_ROW), Some(&[][..]));
    }

    #[test]
    fn test_cluster_row_empty_without_grants() {
        let snapshot = PermissionSnapshot::new(Identity::new("u", "n"))
            .with_managed_clusters(["ns-a", "ns-b", "ns-c"]);
        let table = LookupTable::build(&snapshot);
        assert_eq!(table.row(CLUSTER_ROW), Some(&[][..]));
    }
}
