//! Row filtering for study tables
//!
//! Supports value filters from CLI triples (category, field, value) and
//! case-identity filters from externally loaded case lists. Values given
//! for the same column merge into a single membership test (OR across
//! values, AND across distinct columns); applying them one by one would
//! over-restrict when two values are meant as alternatives.

use crate::table::{ColumnKey, Result, Table, Value};
use std::collections::HashSet;

/// Whether a case-list filter retains or removes the listed cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseFilterMode {
    Keep,
    Rm,
}

/// Merge flat CLI triples (category, field, value) into one value set per
/// column, first-seen column order.
pub fn merge_filter_triples(flat: &[String]) -> Vec<(ColumnKey, Vec<Value>)> {
    let mut merged: Vec<(ColumnKey, Vec<Value>)> = Vec::new();
    for triple in flat.chunks_exact(3) {
        let key = ColumnKey::new(&triple[0], &triple[1]);
        let value = Value::parse(&triple[2]);
        match merged.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => merged.push((key, vec![value])),
        }
    }
    merged
}

/// Retain (`keep`) or exclude rows whose `column` value is in `values`.
/// With `drop_column`, the filtered column is removed afterwards; only
/// meaningful together with `keep`. Never reorders or duplicates rows.
pub fn filter_value(
    table: &Table,
    column: &ColumnKey,
    values: &[Value],
    keep: bool,
    drop_column: bool,
) -> Result<Table> {
    let idx = table.column_index(column)?;
    let allowed: HashSet<&Value> = values.iter().collect();

    let positions: Vec<usize> = (0..table.n_rows())
        .filter(|&p| allowed.contains(table.value(p, idx)) == keep)
        .collect();

    let mut filtered = table.select_rows(&positions);
    if keep && drop_column {
        filtered.drop_column(column)?;
    }
    Ok(filtered)
}

/// Retain or remove all rows whose case name appears in `cases`.
pub fn filter_cases(table: &Table, cases: &[String], mode: CaseFilterMode) -> Result<Table> {
    let idx = table.column_index(&ColumnKey::database("CASE"))?;
    let listed: HashSet<&str> = cases.iter().map(String::as_str).collect();
    let keep = mode == CaseFilterMode::Keep;

    let positions: Vec<usize> = (0..table.n_rows())
        .filter(|&p| listed.contains(table.value(p, idx).to_string().as_str()) == keep)
        .collect();
    Ok(table.select_rows(&positions))
}
