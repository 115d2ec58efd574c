//! Stable grouping and batching of study tables
//!
//! Rows are partitioned by the value tuple at the key columns, in
//! first-seen order of the tuple, so that groups appear in the order their
//! first member occurs in the input. Groups are then chunked into batches
//! of at most `max_items` groups; batching only bounds how many series one
//! figure or report table may contain.

use crate::table::{ColumnKey, Result, Table, Value};
use std::collections::HashMap;

/// Batch size bound: at most N groups per batch, or unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxItems {
    Unlimited,
    Limit(usize),
}

/// Partition `table` rows by the key tuple, first-seen order. Zero key
/// columns yield a single group holding the whole table.
pub fn group_rows(table: &Table, key_columns: &[ColumnKey]) -> Result<Vec<Vec<usize>>> {
    let indices = key_columns
        .iter()
        .map(|k| table.column_index(k))
        .collect::<Result<Vec<_>>>()?;

    if indices.is_empty() {
        if table.is_empty() {
            return Ok(Vec::new());
        }
        return Ok(vec![(0..table.n_rows()).collect()]);
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut seen: HashMap<Vec<Value>, usize> = HashMap::new();
    for p in 0..table.n_rows() {
        let key = table.key_tuple(p, &indices);
        match seen.get(&key) {
            Some(&slot) => groups[slot].push(p),
            None => {
                seen.insert(key, groups.len());
                groups.push(vec![p]);
            }
        }
    }
    Ok(groups)
}

/// Group `table` by `key_columns` and batch the groups. The returned
/// sequence is finite, lazy and single-pass; re-grouping requires a fresh
/// call. Its exact length is known up front for batch numbering.
pub fn group<'a>(
    table: &'a Table,
    key_columns: &[ColumnKey],
    max_items: MaxItems,
) -> Result<GroupBatches<'a>> {
    let groups = group_rows(table, key_columns)?;

    let chunk = match max_items {
        MaxItems::Unlimited => groups.len().max(1),
        MaxItems::Limit(n) => n.max(1),
    };
    let batches: Vec<Vec<usize>> = groups
        .chunks(chunk)
        .map(|batch| batch.iter().flatten().copied().collect())
        .collect();

    Ok(GroupBatches {
        table,
        batches: batches.into_iter(),
    })
}

/// Single-pass sequence of batched sub-tables produced by [`group`]
#[derive(Debug)]
pub struct GroupBatches<'a> {
    table: &'a Table,
    batches: std::vec::IntoIter<Vec<usize>>,
}

impl Iterator for GroupBatches<'_> {
    type Item = Table;

    fn next(&mut self) -> Option<Self::Item> {
        self.batches
            .next()
            .map(|positions| self.table.select_rows(&positions))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.batches.size_hint()
    }
}

impl ExactSizeIterator for GroupBatches<'_> {}
