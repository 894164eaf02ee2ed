// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Boolean filter expression tree
//!
//! Independent of any query syntax; see `render` for the SQL form.
//! An empty `And` is always true and an empty `Or` is always false.

use serde::Serialize;

/// Key of the resource's API group inside the indexed `data` document
pub const APIGROUP_KEY: &str = "apigroup";

/// Key of the resource's plural kind inside the indexed `data` document
pub const KIND_KEY: &str = "kind_plural";

/// Key of the resource's namespace; absent on cluster-scoped objects
pub const NAMESPACE_KEY: &str = "namespace";

/// Present only on objects collected from the hub itself
pub const HUB_MARKER_KEY: &str = "_hubClusterResource";

/// Column holding the name of the cluster an object was collected from
pub const CLUSTER_COLUMN: &str = "cluster";

/// Where a predicate reads its value from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum Field {
    /// A key of the JSON `data` document
    Data(String),
    /// A top-level column
    Column(String),
}

impl Field {
    pub fn data(key: impl Into<String>) -> Self {
        Field::Data(key.into())
    }

    pub fn column(name: impl Into<String>) -> Self {
        Field::Column(name.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// The `data` document has the key
    HasKey(String),
    /// The field equals a literal
    Equals { field: Field, value: String },
    /// The field's value is one of the entries of a lookup-table row
    InLookup {
        field: Field,
        table: String,
        row: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolExpr {
    And(Vec<BoolExpr>),
    Or(Vec<BoolExpr>),
    Not(Box<BoolExpr>),
    Pred(Predicate),
}

impl BoolExpr {
    pub fn always_true() -> Self {
        BoolExpr::And(Vec::new())
    }

    pub fn always_false() -> Self {
        BoolExpr::Or(Vec::new())
    }

    pub fn is_always_true(&self) -> bool {
        matches!(self, BoolExpr::And(children) if children.is_empty())
    }

    pub fn is_always_false(&self) -> bool {
        matches!(self, BoolExpr::Or(children) if children.is_empty())
    }

    pub fn and(children: Vec<BoolExpr>) -> Self {
        BoolExpr::And(children)
    }

    pub fn or(children: Vec<BoolExpr>) -> Self {
        BoolExpr::Or(children)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: BoolExpr) -> Self {
        BoolExpr::Not(Box::new(child))
    }

    pub fn has_key(key: impl Into<String>) -> Self {
        BoolExpr::Pred(Predicate::HasKey(key.into()))
    }

    pub fn equals(field: Field, value: impl Into<String>) -> Self {
        BoolExpr::Pred(Predicate::Equals {
            field,
            value: value.into(),
        })
    }

    pub fn in_lookup(field: Field, table: impl Into<String>, row: impl Into<String>) -> Self {
        BoolExpr::Pred(Predicate::InLookup {
            field,
            table: table.into(),
            row: row.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_expressions() {
        assert!(BoolExpr::always_true().is_always_true());
        assert!(!BoolExpr::always_true().is_always_false());
        assert!(BoolExpr::always_false().is_always_false());
        assert!(!BoolExpr::has_key("x").is_always_true());
        assert!(!BoolExpr::and(vec![BoolExpr::has_key("x")]).is_always_true());
    }

    #[test]
    fn test_json_shape() {
        let expr = BoolExpr::and(vec![
            BoolExpr::not(BoolExpr::has_key(NAMESPACE_KEY)),
            BoolExpr::equals(Field::data(KIND_KEY), "nodes"),
        ]);
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "and": [
                    {"not": {"pred": {"has_key": "namespace"}}},
                    {"pred": {"equals": {
                        "field": {"type": "data", "name": "kind_plural"},
                        "value": "nodes"
                    }}}
                ]
            })
        );
    }
}
