// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! PostgreSQL rendering
//!
//! Targets the search index layout: one row per object with a `cluster` text
//! column and a JSONB `data` column. Data-key equality uses the JSONB `?`
//! operator, which matches a string value exactly.

use super::expr::{BoolExpr, Field, Predicate};
use super::lookup::LookupTable;

const DATA_COLUMN: &str = "data";

/// Escape a string literal: `it's` -> `'it''s'`
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Escape an identifier: `type` -> `"type"`
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render an expression as a SQL boolean expression
pub fn to_sql(expr: &BoolExpr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

fn write_expr(out: &mut String, expr: &BoolExpr) {
    match expr {
        BoolExpr::And(children) => write_junction(out, children, " AND ", "TRUE"),
        BoolExpr::Or(children) => write_junction(out, children, " OR ", "FALSE"),
        BoolExpr::Not(child) => {
            out.push_str("NOT ");
            write_grouped(out, child);
        }
        BoolExpr::Pred(pred) => write_predicate(out, pred),
    }
}

fn write_junction(out: &mut String, children: &[BoolExpr], op: &str, empty: &str) {
    match children {
        [] => out.push_str(empty),
        [only] => write_expr(out, only),
        _ => {
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    out.push_str(op);
                }
                write_grouped(out, child);
            }
        }
    }
}

/// Parenthesize anything that is not a bare literal
fn write_grouped(out: &mut String, expr: &BoolExpr) {
    if expr.is_always_true() || expr.is_always_false() {
        write_expr(out, expr);
        return;
    }
    out.push('(');
    write_expr(out, expr);
    out.push(')');
}

fn write_field(out: &mut String, field: &Field) {
    match field {
        Field::Data(key) => {
            out.push_str(&quote_ident(DATA_COLUMN));
            out.push_str("->");
            out.push_str(&quote_literal(key));
        }
        Field::Column(name) => out.push_str(&quote_ident(name)),
    }
}

fn write_predicate(out: &mut String, pred: &Predicate) {
    match pred {
        Predicate::HasKey(key) => {
            out.push_str(&quote_ident(DATA_COLUMN));
            out.push_str(" ? ");
            out.push_str(&quote_literal(key));
        }
        Predicate::Equals { field, value } => {
            write_field(out, field);
            out.push_str(match field {
                Field::Data(_) => " ? ",
                Field::Column(_) => " = ",
            });
            out.push_str(&quote_literal(value));
        }
        Predicate::InLookup { field, table, row } => {
            write_field(out, field);
            match field {
                Field::Data(_) => {
                    out.push_str(&format!(
                        " ?| (SELECT \"resList\" FROM {} WHERE \"type\" = {})",
                        quote_ident(table),
                        quote_literal(row)
                    ));
                }
                Field::Column(_) => {
                    out.push_str(&format!(
                        " = ANY(SELECT unnest(\"resList\") FROM {} WHERE \"type\" = {})",
                        quote_ident(table),
                        quote_literal(row)
                    ));
                }
            }
        }
    }
}

/// Statements that create and fill an identity's lookup table
///
/// The table is temporary and dropped with the session; `IF NOT EXISTS` plus
/// the leading `DELETE` make the pair safe to run more than once per session.
pub fn lookup_table_sql(table: &LookupTable) -> Vec<String> {
    let name = quote_ident(&table.name);
    let mut statements = vec![
        format!("CREATE TEMP TABLE IF NOT EXISTS {name} (\"type\" TEXT PRIMARY KEY, \"resList\" TEXT[])"),
        format!("DELETE FROM {name}"),
    ];

    if !table.rows.is_empty() {
        let values: Vec<String> = table
            .rows
            .iter()
            .map(|(row, entries)| {
                let items: Vec<String> = entries.iter().map(|e| quote_literal(e)).collect();
                format!("({}, ARRAY[{}]::TEXT[])", quote_literal(row), items.join(", "))
            })
            .collect();
        statements.push(format!(
            "INSERT INTO {name} (\"type\", \"resList\") VALUES {}",
            values.join(", ")
        ));
    }

    statements
}
