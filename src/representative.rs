//! Representative-row selection
//!
//! Collapses each case's time series into the single row with the largest
//! absolute error, the worst transient error over the run. Ties go to the
//! latest time. This scalar drives both ranking and convergence-order
//! estimation.

use crate::table::{ColumnKey, Result, Table};
use tracing::warn;

/// Positions of the representative rows among `positions`, one per case
/// identity, first-seen case order. Cases whose error column holds no
/// numeric value are skipped with a warning.
pub fn representative_positions(
    table: &Table,
    positions: &[usize],
    error_column: &ColumnKey,
    time_column: &ColumnKey,
) -> Result<Vec<usize>> {
    let error_idx = table.column_index(error_column)?;
    let time_idx = table.column_index(time_column)?;

    let mut selected = Vec::new();
    for (identity, case_positions) in table.case_identities_of(positions)? {
        let mut best: Option<(usize, f64, f64)> = None;
        for &p in &case_positions {
            let Some(error) = table.value(p, error_idx).as_number() else {
                continue;
            };
            let magnitude = error.abs();
            let time = table
                .value(p, time_idx)
                .as_number()
                .unwrap_or(f64::NEG_INFINITY);
            let better = match best {
                None => true,
                Some((_, best_mag, best_time)) => {
                    magnitude > best_mag || (magnitude == best_mag && time > best_time)
                }
            };
            if better {
                best = Some((p, magnitude, time));
            }
        }
        match best {
            Some((p, _, _)) => selected.push(p),
            None => warn!(
                case = %identity.case_name(),
                column = %error_column,
                "case has no numeric error values, skipped from representative selection"
            ),
        }
    }
    Ok(selected)
}

/// One row per case identity: the row with maximal |error| over the case's
/// time series, ties broken by latest time.
pub fn representative_error_rows(table: &Table, error_column: &ColumnKey) -> Result<Table> {
    let all: Vec<usize> = (0..table.n_rows()).collect();
    let positions = representative_positions(table, &all, error_column, &ColumnKey::case("TIME"))?;
    Ok(table.select_rows(&positions))
}
