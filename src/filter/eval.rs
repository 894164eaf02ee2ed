// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory filter evaluation
//!
//! Mirrors the semantics of the SQL rendering so filters can post-filter
//! already fetched records. Data-key equality follows JSONB `?`: a string
//! value matches when equal, an array matches when it contains the string.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::expr::{BoolExpr, CLUSTER_COLUMN, Field, Predicate};
use super::lookup::LookupTable;

/// One indexed object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub cluster: String,
    pub data: Map<String, Value>,
}

impl SearchRecord {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            data: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    fn column(&self, name: &str) -> Option<&str> {
        (name == CLUSTER_COLUMN).then_some(self.cluster.as_str())
    }
}

/// Evaluate `expr` against a record
///
/// Lookup predicates referencing another table, or a row the table does not
/// have, match nothing.
pub fn eval(expr: &BoolExpr, record: &SearchRecord, lookup: &LookupTable) -> bool {
    match expr {
        BoolExpr::And(children) => children.iter().all(|c| eval(c, record, lookup)),
        BoolExpr::Or(children) => children.iter().any(|c| eval(c, record, lookup)),
        BoolExpr::Not(child) => !eval(child, record, lookup),
        BoolExpr::Pred(pred) => eval_predicate(pred, record, lookup),
    }
}

fn eval_predicate(pred: &Predicate, record: &SearchRecord, lookup: &LookupTable) -> bool {
    match pred {
        Predicate::HasKey(key) => record.data.contains_key(key),
        Predicate::Equals { field, value } => field_matches(field, record, |v| v == value),
        Predicate::InLookup { field, table, row } => {
            if *table != lookup.name {
                return false;
            }
            let Some(entries) = lookup.row(row) else {
                return false;
            };
            field_matches(field, record, |v| entries.iter().any(|e| e == v))
        }
    }
}

fn field_matches(field: &Field, record: &SearchRecord, matches: impl Fn(&str) -> bool) -> bool {
    match field {
        Field::Column(name) => record.column(name).is_some_and(matches),
        Field::Data(key) => match record.data.get(key) {
            Some(Value::String(s)) => matches(s),
            Some(Value::Array(items)) => items
                .iter()
                .any(|item| item.as_str().is_some_and(&matches)),
            _ => false,
        },
    }
}
