//! Property-based tests for the analysis pipeline
//!
//! Invariants fuzzed here:
//! 1. Grouping/batching never loses, duplicates or reorders a group's rows
//! 2. Total variation is monotone non-decreasing within a case (raw mode)
//! 3. n_smallest is sorted ascending and stable under ties
//! 4. Value filters never reorder surviving rows

use gridstudy::derived::append_total_variation;
use gridstudy::filter::filter_value;
use gridstudy::grouping::{group, MaxItems};
use gridstudy::ranking::n_smallest;
use gridstudy::table::{ColumnKey, Table, Value};
use proptest::prelude::*;

fn bucket_table(buckets: &[u8]) -> Table {
    let mut table = Table::new(vec![
        ColumnKey::study_parameter("bucket"),
        ColumnKey::case("E"),
    ])
    .unwrap();
    for (i, &b) in buckets.iter().enumerate() {
        table.push_row(i, vec![Value::Number(f64::from(b)), Value::Number(i as f64)]);
    }
    table
}

fn series_table(errors: &[f64]) -> Table {
    let mut table = Table::new(vec![
        ColumnKey::database("CASE"),
        ColumnKey::case("TIME"),
        ColumnKey::case("E"),
    ])
    .unwrap();
    for (i, &e) in errors.iter().enumerate() {
        table.push_row(
            i,
            vec![
                Value::Text("caseA".into()),
                Value::Number(i as f64),
                Value::Number(e),
            ],
        );
    }
    table
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_group_batches_lose_nothing(
        buckets in prop::collection::vec(0u8..4, 1..60),
        max in 1usize..5,
    ) {
        let table = bucket_table(&buckets);
        let batches: Vec<Table> = group(
            &table,
            &[ColumnKey::study_parameter("bucket")],
            MaxItems::Limit(max),
        )
        .unwrap()
        .collect();

        let mut seen: Vec<usize> = batches
            .iter()
            .flat_map(|b| b.rows.iter().map(|r| r.id))
            .collect();
        prop_assert_eq!(seen.len(), buckets.len());
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..buckets.len()).collect::<Vec<_>>());

        // within each bucket, the original relative order survives
        for value in 0u8..4 {
            let original: Vec<usize> = buckets
                .iter()
                .enumerate()
                .filter(|(_, &b)| b == value)
                .map(|(i, _)| i)
                .collect();
            let grouped: Vec<usize> = batches
                .iter()
                .flat_map(|b| b.rows.iter())
                .filter(|r| r.values[0] == Value::Number(f64::from(value)))
                .map(|r| r.id)
                .collect();
            prop_assert_eq!(original, grouped);
        }
    }

    #[test]
    fn prop_total_variation_monotone(
        errors in prop::collection::vec(-1e3f64..1e3, 2..40),
    ) {
        let table = series_table(&errors);
        let out = append_total_variation(
            &table,
            &ColumnKey::case("E"),
            &ColumnKey::case("E_TV"),
            &ColumnKey::case("TIME"),
            false,
        )
        .unwrap();
        let idx = out.column_index(&ColumnKey::case("E_TV")).unwrap();
        let tv: Vec<f64> = out
            .rows
            .iter()
            .map(|r| r.values[idx].as_number().unwrap())
            .collect();
        prop_assert_eq!(tv[0], 0.0);
        prop_assert!(tv.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn prop_n_smallest_sorted_and_stable(
        values in prop::collection::vec(0i32..10, 0..50),
        n in 0usize..60,
    ) {
        let mut table = Table::new(vec![ColumnKey::case("E")]).unwrap();
        for (i, &v) in values.iter().enumerate() {
            table.push_row(i, vec![Value::Number(f64::from(v))]);
        }
        let ranked = n_smallest(&table, &ColumnKey::case("E"), n).unwrap();
        prop_assert_eq!(ranked.n_rows(), n.min(values.len()));

        let picked: Vec<(f64, usize)> = ranked
            .rows
            .iter()
            .map(|r| (r.values[0].as_number().unwrap(), r.id))
            .collect();
        // ascending values, ties in original row order
        let ascending_with_stable_ties = picked.windows(2).all(|w| {
            w[0].0 < w[1].0 || (w[0].0 == w[1].0 && w[0].1 < w[1].1)
        });
        prop_assert!(ascending_with_stable_ties);
    }

    #[test]
    fn prop_filter_preserves_survivor_order(
        buckets in prop::collection::vec(0u8..4, 0..60),
        kept in prop::collection::vec(0u8..4, 1..4),
    ) {
        let table = bucket_table(&buckets);
        let values: Vec<Value> = kept.iter().map(|&k| Value::Number(f64::from(k))).collect();
        let filtered = filter_value(
            &table,
            &ColumnKey::study_parameter("bucket"),
            &values,
            true,
            false,
        )
        .unwrap();
        let ids: Vec<usize> = filtered.rows.iter().map(|r| r.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        prop_assert_eq!(ids, sorted);
    }
}
