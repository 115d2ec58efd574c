//! Ranking of cases and canonical-run selection per refinement level
//!
//! Repeated runs at the same parameter combination are valid data; they
//! are disambiguated here by picking the run with the smallest
//! representative error, never silently merged.

use crate::grouping::group_rows;
use crate::representative::representative_positions;
use crate::table::{CaseIdentity, ColumnKey, Result, Table, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// The n rows with smallest `sort_column` value, stable ascending, ties
/// kept in original row order. Rows without a numeric value never rank.
pub fn n_smallest(table: &Table, sort_column: &ColumnKey, n: usize) -> Result<Table> {
    let idx = table.column_index(sort_column)?;
    let mut ranked: Vec<(usize, f64)> = (0..table.n_rows())
        .filter_map(|p| table.value(p, idx).as_number().map(|v| (p, v)))
        .collect();
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    ranked.truncate(n);
    let positions: Vec<usize> = ranked.into_iter().map(|(p, _)| p).collect();
    Ok(table.select_rows(&positions))
}

/// Canonical rows of one refinement level
#[derive(Debug, Clone)]
pub struct RefinementLevel {
    /// Refinement-parameter value of this level
    pub level: Value,
    /// Representative error of the canonical run
    pub error: f64,
    /// All rows of the canonical run at this level
    pub rows: Table,
}

/// Per refinement level, the run with the smallest representative error.
///
/// A run is one case identity at one full study-parameter combination;
/// levels come back ordered by ascending refinement value (coarsest first
/// for count-like refinement parameters). `n_best` keeps the n levels
/// with globally smallest canonical error while preserving that order.
pub fn smallest_per_refinement(
    table: &Table,
    refinement_parameter: &ColumnKey,
    study_parameters: &[ColumnKey],
    error_column: &ColumnKey,
    n_best: Option<usize>,
) -> Result<Vec<RefinementLevel>> {
    let ref_idx = table.column_index(refinement_parameter)?;
    let error_idx = table.column_index(error_column)?;
    let param_indices = study_parameters
        .iter()
        .map(|k| table.column_index(k))
        .collect::<Result<Vec<_>>>()?;
    let time = ColumnKey::case("TIME");

    let mut level_groups = group_rows(table, std::slice::from_ref(refinement_parameter))?;
    level_groups.sort_by(|a, b| {
        table.rows[a[0]].values[ref_idx].sort_cmp(&table.rows[b[0]].values[ref_idx])
    });

    let mut levels = Vec::new();
    for positions in level_groups {
        // runs within the level: full parameter combination + case identity
        let mut runs: Vec<Vec<usize>> = Vec::new();
        let mut seen: HashMap<(Vec<Value>, CaseIdentity), usize> = HashMap::new();
        for (identity, case_positions) in table.case_identities_of(&positions)? {
            for &p in &case_positions {
                let key = (table.key_tuple(p, &param_indices), identity.clone());
                match seen.get(&key) {
                    Some(&slot) => runs[slot].push(p),
                    None => {
                        seen.insert(key, runs.len());
                        runs.push(vec![p]);
                    }
                }
            }
        }

        let mut best: Option<(f64, &Vec<usize>)> = None;
        for run in &runs {
            let reps = representative_positions(table, run, error_column, &time)?;
            let Some(&rep) = reps.first() else { continue };
            let Some(error) = table.value(rep, error_idx).as_number() else {
                continue;
            };
            let magnitude = error.abs();
            if best.map_or(true, |(smallest, _)| magnitude < smallest) {
                best = Some((magnitude, run));
            }
        }
        if let Some((error, run)) = best {
            levels.push(RefinementLevel {
                level: table.rows[positions[0]].values[ref_idx].clone(),
                error,
                rows: table.select_rows(run),
            });
        }
    }

    if let Some(n) = n_best {
        if levels.len() > n {
            let mut order: Vec<usize> = (0..levels.len()).collect();
            order.sort_by(|&a, &b| {
                levels[a]
                    .error
                    .partial_cmp(&levels[b].error)
                    .unwrap_or(Ordering::Equal)
            });
            let keep: HashSet<usize> = order.into_iter().take(n).collect();
            levels = levels
                .into_iter()
                .enumerate()
                .filter(|(i, _)| keep.contains(i))
                .map(|(_, level)| level)
                .collect();
        }
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_io::parse_study_csv;

    #[test]
    fn test_n_smallest_stable_under_ties() {
        let table = parse_study_csv(
            "\
database,case,case
CASE,TIME,E_TV
a,0.0,5
b,0.0,1
c,0.0,1
d,0.0,3
",
        )
        .unwrap();
        let two = n_smallest(&table, &ColumnKey::case("E_TV"), 2).unwrap();
        let ids: Vec<usize> = two.rows.iter().map(|r| r.id).collect();
        // both value-1 rows, in their original relative order
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_n_smallest_truncates_and_sorts_ascending() {
        let table = parse_study_csv(
            "\
database,case,case
CASE,TIME,E_TV
a,0.0,5
b,0.0,1
c,0.0,1
d,0.0,3
",
        )
        .unwrap();
        let three = n_smallest(&table, &ColumnKey::case("E_TV"), 3).unwrap();
        let ids: Vec<usize> = three.rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_n_smallest_skips_missing_cells() {
        let table = parse_study_csv(
            "\
database,case,case
CASE,TIME,E_TV
a,0.0,
b,0.0,2
",
        )
        .unwrap();
        let two = n_smallest(&table, &ColumnKey::case("E_TV"), 2).unwrap();
        assert_eq!(two.n_rows(), 1);
        assert_eq!(two.rows[0].id, 1);
    }

    #[test]
    fn test_n_smallest_on_empty_table() {
        let table = parse_study_csv("database,case,case\nCASE,TIME,E_TV\n").unwrap();
        let none = n_smallest(&table, &ColumnKey::case("E_TV"), 5).unwrap();
        assert!(none.is_empty());
    }

    const REPEATED_RUNS: &str = "\
database,database,studyparameters,case,case
CASE,M_TIME,resolution,TIME,E_TV
run1,1,32,0.0,0.05
run1,1,32,1.0,0.05
run2,2,32,0.0,0.02
run2,2,32,1.0,0.01
fine1,1,64,0.0,0.004
";

    #[test]
    fn test_canonical_run_has_smallest_representative_error() {
        let table = parse_study_csv(REPEATED_RUNS).unwrap();
        let levels = smallest_per_refinement(
            &table,
            &ColumnKey::study_parameter("resolution"),
            &table.study_parameter_columns(),
            &ColumnKey::case("E_TV"),
            None,
        )
        .unwrap();
        assert_eq!(levels.len(), 2);
        // run2 peaks at 0.02, run1 at 0.05: run2 is canonical
        assert_eq!(levels[0].error, 0.02);
        let cases: Vec<String> = levels[0]
            .rows
            .rows
            .iter()
            .map(|r| r.values[0].to_string())
            .collect();
        assert_eq!(cases, vec!["run2", "run2"]);
    }

    #[test]
    fn test_discarded_run_never_appears() {
        let table = parse_study_csv(REPEATED_RUNS).unwrap();
        let levels = smallest_per_refinement(
            &table,
            &ColumnKey::study_parameter("resolution"),
            &table.study_parameter_columns(),
            &ColumnKey::case("E_TV"),
            None,
        )
        .unwrap();
        let all = Table::concat(levels.into_iter().map(|l| l.rows)).unwrap();
        assert!(all
            .rows
            .iter()
            .all(|r| r.values[0].to_string() != "run1"));
    }

    #[test]
    fn test_levels_ordered_coarsest_first() {
        let table = parse_study_csv(REPEATED_RUNS).unwrap();
        let levels = smallest_per_refinement(
            &table,
            &ColumnKey::study_parameter("resolution"),
            &table.study_parameter_columns(),
            &ColumnKey::case("E_TV"),
            None,
        )
        .unwrap();
        assert_eq!(levels[0].level, Value::Number(32.0));
        assert_eq!(levels[1].level, Value::Number(64.0));
    }

    #[test]
    fn test_n_best_truncation_preserves_refinement_order() {
        let table = parse_study_csv(
            "\
database,database,studyparameters,case,case
CASE,M_TIME,resolution,TIME,E_TV
c32,1,32,0.0,0.5
c64,1,64,0.0,0.01
c128,1,128,0.0,0.002
",
        )
        .unwrap();
        let levels = smallest_per_refinement(
            &table,
            &ColumnKey::study_parameter("resolution"),
            &table.study_parameter_columns(),
            &ColumnKey::case("E_TV"),
            Some(2),
        )
        .unwrap();
        // the coarse 0.5 level drops out, order stays 64 then 128
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].level, Value::Number(64.0));
        assert_eq!(levels[1].level, Value::Number(128.0));
    }

    #[test]
    fn test_single_run_levels_are_their_own_canonical() {
        let table = parse_study_csv(
            "\
database,database,studyparameters,case,case
CASE,M_TIME,resolution,TIME,E_TV
c32,1,32,0.0,0.1
c64,1,64,0.0,0.01
",
        )
        .unwrap();
        let levels = smallest_per_refinement(
            &table,
            &ColumnKey::study_parameter("resolution"),
            &table.study_parameter_columns(),
            &ColumnKey::case("E_TV"),
            None,
        )
        .unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].rows.n_rows(), 1);
    }
}
