//! Empirical order-of-accuracy estimation across refinement levels
//!
//! For each error property and each combination of study parameters other
//! than the refinement parameter, the representative errors of the
//! refinement levels are compared pairwise on a log-log scale:
//!
//!   O_LOCAL at level i: log(e[i-1]/e[i]) / log(h[i-1]/h[i])
//!   O       at level i: log(e[0]/e[i])   / log(h[0]/h[i])
//!
//! with index 0 the coarsest level. Both are undefined at the coarsest
//! level and wherever the compared errors are equal, zero or of opposite
//! sign (log of a non-positive ratio); undefined cells stay absent.

use crate::grouping::group_rows;
use crate::representative::representative_positions;
use crate::table::{ColumnKey, Result, Table, Value, CAT_CASE};
use regex::Regex;
use std::cmp::Ordering;

/// Study parameters minus the refinement parameter.
pub fn residual_parameters(
    study_parameters: &[ColumnKey],
    refinement_parameter: &ColumnKey,
) -> Vec<ColumnKey> {
    study_parameters
        .iter()
        .filter(|p| *p != refinement_parameter)
        .cloned()
        .collect()
}

/// Column carrying the global order of accuracy for `property`.
pub fn order_column(property: &ColumnKey) -> ColumnKey {
    ColumnKey::case(&format!("O({})", property.field))
}

/// Column carrying the level-to-level order of accuracy for `property`.
pub fn local_order_column(property: &ColumnKey) -> ColumnKey {
    ColumnKey::case(&format!("O_LOCAL({})", property.field))
}

/// Whether order-of-accuracy columns are already present. Callers check
/// this before invoking [`add_convergence_rates`] so a loaded table that
/// already carries rates is not re-estimated.
pub fn has_convergence_columns(table: &Table) -> bool {
    match Regex::new(r"^O[(_]") {
        Ok(re) => table
            .columns
            .iter()
            .any(|c| c.category == CAT_CASE && re.is_match(&c.field)),
        Err(_) => false,
    }
}

/// Order of accuracy between a coarse and a fine level, None where the
/// log ratio is undefined.
fn order_between(e_coarse: f64, e_fine: f64, h_coarse: f64, h_fine: f64) -> Option<f64> {
    if e_fine == 0.0 || h_fine == 0.0 {
        return None;
    }
    let error_ratio = e_coarse / e_fine;
    let h_ratio = h_coarse / h_fine;
    if error_ratio <= 0.0 || h_ratio <= 0.0 || error_ratio == 1.0 || h_ratio == 1.0 {
        return None;
    }
    let order = error_ratio.ln() / h_ratio.ln();
    order.is_finite().then_some(order)
}

/// Estimate convergence rates for every property column and write them
/// into `O(<prop>)` / `O_LOCAL(<prop>)` cells on the representative rows.
/// Other rows of a case stay unset for these columns. Column insertion is
/// keyed, so re-invocation cannot append a second copy.
pub fn add_convergence_rates(
    table: &Table,
    study_parameters: &[ColumnKey],
    refinement_parameter: &ColumnKey,
    property_columns: &[ColumnKey],
    h_column: &ColumnKey,
    time_column: &ColumnKey,
) -> Result<Table> {
    table.column_index(refinement_parameter)?;
    let h_idx = table.column_index(h_column)?;

    let residual = residual_parameters(study_parameters, refinement_parameter);
    let combinations = group_rows(table, &residual)?;

    let mut out = table.clone();
    for property in property_columns {
        let error_idx = table.column_index(property)?;
        let o_idx = out.ensure_column(&order_column(property));
        let ol_idx = out.ensure_column(&local_order_column(property));

        for combination in &combinations {
            let reps = representative_positions(table, combination, property, time_column)?;
            let mut levels: Vec<(usize, f64, f64)> = reps
                .iter()
                .filter_map(|&p| {
                    let h = table.value(p, h_idx).as_number()?;
                    let e = table.value(p, error_idx).as_number()?;
                    Some((p, h, e))
                })
                .collect();
            // coarsest first, stable under equal spacings
            levels.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
            if levels.len() < 2 {
                continue;
            }

            let (_, h0, e0) = levels[0];
            for i in 1..levels.len() {
                let (p, h_i, e_i) = levels[i];
                let (_, h_prev, e_prev) = levels[i - 1];
                if let Some(order) = order_between(e_prev, e_i, h_prev, h_i) {
                    out.rows[p].values[ol_idx] = Value::Number(order);
                }
                if let Some(order) = order_between(e0, e_i, h0, h_i) {
                    out.rows[p].values[o_idx] = Value::Number(order);
                }
            }
        }
    }
    Ok(out)
}
