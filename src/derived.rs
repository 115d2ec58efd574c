//! Derived error metrics accumulated over each case's time series
//!
//! Appends a total-variation column: the cumulative sum of absolute
//! successive differences of an existing error column, ordered by time
//! within each case. Cases never leak into each other's running sum.

use crate::table::{ColumnKey, Result, StudyError, Table, Value};
use tracing::warn;

/// Append the total variation of `source` as `target`, row-aligned with
/// the source rows; the first row of each case gets 0. With
/// `normalize_by_dt`, each increment is divided by the time step instead
/// of accumulated raw.
///
/// Duplicate timestamps or missing cells within one case are a
/// data-integrity anomaly: that case's `target` cells stay unset and a
/// warning names the case; other cases are unaffected.
pub fn append_total_variation(
    table: &Table,
    source: &ColumnKey,
    target: &ColumnKey,
    time: &ColumnKey,
    normalize_by_dt: bool,
) -> Result<Table> {
    let source_idx = table.column_index(source)?;
    let time_idx = table.column_index(time)?;
    let identities = table.case_identities()?;

    let mut out = table.clone();
    let target_idx = out.ensure_column(target);

    for (identity, positions) in identities {
        let mut series: Vec<(usize, f64, f64)> = Vec::with_capacity(positions.len());
        let mut complete = true;
        for &p in &positions {
            match (
                table.value(p, time_idx).as_number(),
                table.value(p, source_idx).as_number(),
            ) {
                (Some(t), Some(e)) => series.push((p, t, e)),
                _ => {
                    complete = false;
                    break;
                }
            }
        }
        if !complete {
            warn!(
                case = %identity.case_name(),
                column = %source,
                "case has missing time or error cells, total variation left unset"
            );
            continue;
        }

        series.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        if let Some(window) = series.windows(2).find(|w| w[0].1 == w[1].1) {
            let error = StudyError::NonMonotonicTime {
                case: identity.case_name(),
                time: window[0].1,
            };
            warn!(%error, "total variation left unset");
            continue;
        }

        let mut tv = 0.0;
        out.rows[series[0].0].values[target_idx] = Value::Number(0.0);
        for w in series.windows(2) {
            let (_, t_prev, e_prev) = w[0];
            let (p, t, e) = w[1];
            let increment = (e - e_prev).abs();
            tv += if normalize_by_dt {
                increment / (t - t_prev)
            } else {
                increment
            };
            out.rows[p].values[target_idx] = Value::Number(tv);
        }
    }
    Ok(out)
}
