// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Search filter synthesis
//!
//! Turns an identity's cached permissions into a boolean filter over indexed
//! objects. The filter never matches more than the identity may list.

pub mod eval;
pub mod expr;
pub mod lookup;
pub mod render;
pub mod synth;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::rbac::{Identity, ImpersonationCredential, PermissionCache};

pub use eval::{SearchRecord, eval};
pub use expr::{BoolExpr, Field, Predicate};
pub use lookup::{LookupTable, lookup_table_name};
pub use synth::{
    match_cluster_scoped, match_hub_cluster_scope, match_managed_cluster_scope,
    match_namespace_scoped, match_resource_types,
};

/// Filters for one identity, plus the lookup table they reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RbacFilter {
    /// Objects collected from the hub
    pub hub_scope: BoolExpr,
    /// Objects collected from managed clusters
    pub managed_cluster_scope: BoolExpr,
    pub lookup_table: LookupTable,
}

impl RbacFilter {
    /// Either scope matches
    pub fn combined(&self) -> BoolExpr {
        BoolExpr::or(vec![
            self.hub_scope.clone(),
            self.managed_cluster_scope.clone(),
        ])
    }

    /// Statements that materialize the lookup table followed by the filter
    pub fn to_sql(&self) -> (Vec<String>, String) {
        (
            render::lookup_table_sql(&self.lookup_table),
            render::to_sql(&self.combined()),
        )
    }

    /// Whether a fetched record passes the filter
    pub fn matches(&self, record: &SearchRecord) -> bool {
        eval(&self.combined(), record, &self.lookup_table)
    }
}

/// Filter for an identity, refreshing cached permissions as needed
///
/// Errors when permissions could not be refreshed; no partial filter is
/// ever returned.
pub async fn obtain_filter(
    cache: &PermissionCache,
    identity: &Identity,
    credential: &ImpersonationCredential,
    all_managed_cluster_access: bool,
) -> Result<RbacFilter> {
    let snapshot = cache.obtain(identity, credential).await?;

    let filter = RbacFilter {
        hub_scope: match_hub_cluster_scope(&snapshot),
        managed_cluster_scope: match_managed_cluster_scope(all_managed_cluster_access, identity),
        lookup_table: LookupTable::build(&snapshot),
    };
    debug!(
        uid = %identity.uid,
        hub_always_false = filter.hub_scope.is_always_false(),
        lookup_rows = filter.lookup_table.rows.len(),
        "Synthesized RBAC filter"
    );
    Ok(filter)
}
