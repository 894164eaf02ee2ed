// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Filter synthesis from a permission snapshot
//!
//! Pure functions: no I/O, no locking. The hub scope matches objects collected
//! from the hub that the identity may list; the managed-cluster scope matches
//! objects collected from clusters the identity may see.

use tracing::debug;

use super::expr::{
    APIGROUP_KEY, BoolExpr, CLUSTER_COLUMN, Field, HUB_MARKER_KEY, KIND_KEY, NAMESPACE_KEY,
};
use super::lookup::{CLUSTER_ROW, lookup_table_name};
use crate::rbac::resource::{Resource, WILDCARD};
use crate::rbac::{Identity, PermissionSnapshot};

/// `(apigroup AND kind) OR (apigroup AND kind) OR ...`
///
/// Any entry granting every group and kind makes the whole match always true.
pub fn match_resource_types(resources: &[Resource]) -> BoolExpr {
    let mut clauses = Vec::with_capacity(resources.len());

    for resource in resources {
        if resource.is_all() {
            return BoolExpr::always_true();
        }

        let mut conditions = Vec::with_capacity(2);
        if resource.is_core_group() {
            conditions.push(BoolExpr::not(BoolExpr::has_key(APIGROUP_KEY)));
        } else if !resource.is_any_group() {
            conditions.push(BoolExpr::equals(
                Field::data(APIGROUP_KEY),
                resource.apigroup.as_str(),
            ));
        }
        if !resource.is_any_kind() {
            conditions.push(BoolExpr::equals(Field::data(KIND_KEY), resource.kind.as_str()));
        }
        clauses.push(BoolExpr::and(conditions));
    }

    BoolExpr::or(clauses)
}

/// Cluster-scoped objects are the ones without a namespace key
pub fn match_cluster_scoped(resources: &[Resource]) -> BoolExpr {
    match resources {
        [] => BoolExpr::always_false(),
        [only] if only.is_all() => BoolExpr::always_true(),
        _ => BoolExpr::and(vec![
            BoolExpr::not(BoolExpr::has_key(NAMESPACE_KEY)),
            match_resource_types(resources),
        ]),
    }
}

/// `(namespace IN group AND resource types) OR ...` for each namespace group
///
/// Uses the consolidated groups when the snapshot has them, one clause per
/// namespace otherwise. The choice is made once for the whole snapshot.
pub fn match_namespace_scoped(snapshot: &PermissionSnapshot) -> BoolExpr {
    let uid = snapshot.identity.uid.as_str();

    if snapshot.namespaced.is_empty() {
        debug!(uid = %uid, "No access to namespace-scoped resources");
        return BoolExpr::always_false();
    }
    if snapshot.namespaced.len() == 1 && snapshot.namespaced.contains_key(WILDCARD) {
        debug!(uid = %uid, "Access to all namespaces, skipping namespace filters");
        return BoolExpr::always_true();
    }

    let Some(consolidated) = snapshot.consolidated.as_ref() else {
        debug!(uid = %uid, "Using non-consolidated namespace list");
        return BoolExpr::or(
            snapshot
                .namespaced
                .iter()
                .map(|(namespace, resources)| {
                    BoolExpr::and(vec![
                        BoolExpr::equals(Field::data(NAMESPACE_KEY), namespace.as_str()),
                        match_resource_types(resources),
                    ])
                })
                .collect(),
        );
    };

    debug!(
        uid = %uid,
        namespaces = snapshot.namespaced.len(),
        groups = consolidated.len(),
        "Using consolidated namespace list"
    );
    let table = lookup_table_name(uid);
    BoolExpr::or(
        consolidated
            .named_groups()
            .map(|(row, group)| {
                let membership = match group.namespaces.iter().next() {
                    Some(namespace) if group.namespaces.len() == 1 => {
                        BoolExpr::equals(Field::data(NAMESPACE_KEY), namespace.as_str())
                    }
                    _ => BoolExpr::in_lookup(Field::data(NAMESPACE_KEY), table.as_str(), row),
                };
                BoolExpr::and(vec![membership, match_resource_types(&group.resources)])
            })
            .collect(),
    )
}

/// Objects on the hub the identity may list
pub fn match_hub_cluster_scope(snapshot: &PermissionSnapshot) -> BoolExpr {
    if !snapshot.has_hub_access() {
        return BoolExpr::always_false();
    }

    BoolExpr::and(vec![
        BoolExpr::has_key(HUB_MARKER_KEY),
        BoolExpr::or(vec![
            match_cluster_scoped(&snapshot.cluster_scoped),
            match_namespace_scoped(snapshot),
        ]),
    ])
}

/// Objects on managed clusters the identity may see
pub fn match_managed_cluster_scope(all_access: bool, identity: &Identity) -> BoolExpr {
    if all_access {
        debug!(uid = %identity.uid, "Access to all managed clusters");
        return BoolExpr::not(BoolExpr::has_key(HUB_MARKER_KEY));
    }

    BoolExpr::in_lookup(
        Field::column(CLUSTER_COLUMN),
        lookup_table_name(&identity.uid),
        CLUSTER_ROW,
    )
}
