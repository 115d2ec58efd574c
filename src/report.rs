//! CSV report writers for the excluded rendering layer
//!
//! Each writer emits the derived/ranked tables one purpose at a time,
//! using the stable naming convention study + tag + purpose + batch. The
//! hand-off is one-way: nothing here inspects rendering results. Empty
//! selections are skipped, never errors.

use crate::config::ReportConfig;
use crate::convergence::{local_order_column, order_column, residual_parameters};
use crate::csv_io::write_table_csv;
use crate::grouping::{group, MaxItems};
use crate::properties::{Prop, Purpose};
use crate::ranking::{n_smallest, smallest_per_refinement};
use crate::representative::representative_error_rows;
use crate::table::{ColumnKey, Table};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Key columns identifying one run's time series.
fn case_key_columns(table: &Table) -> Vec<ColumnKey> {
    let mut keys = vec![ColumnKey::database("CASE")];
    if table.has_column(&ColumnKey::database("M_TIME")) {
        keys.push(ColumnKey::database("M_TIME"));
    }
    keys
}

/// Time-series tables, one batch of cases per file; with a refinement
/// parameter present, each refinement level is reported separately.
pub fn write_timeplot_tables(
    table: &Table,
    props: &[Prop],
    refinement: Option<&ColumnKey>,
    savedir: &Path,
    config: &ReportConfig,
) -> Result<()> {
    if table.is_empty() {
        debug!("empty table, timeplot tables skipped");
        return Ok(());
    }
    let case_keys = case_key_columns(table);

    for prop in props {
        match refinement {
            Some(refinement) => {
                let levels = group(table, std::slice::from_ref(refinement), MaxItems::Limit(1))?;
                for level_table in levels {
                    let level = level_table.get(0, refinement)?.to_string();
                    let suffix = format!("{}-{}", refinement.field, level);
                    let batches = group(&level_table, &case_keys, config.max_items())?;
                    let total = batches.len();
                    for (index, batch) in batches.enumerate() {
                        let name = prop.file_name(
                            Purpose::Timeplot,
                            Some(&suffix),
                            Some((index + 1, total)),
                        );
                        write_table_csv(&batch, &savedir.join(name))?;
                    }
                }
            }
            None => {
                let batches = group(table, &case_keys, config.max_items())?;
                let total = batches.len();
                for (index, batch) in batches.enumerate() {
                    let name = prop.file_name(Purpose::Timeplot, None, Some((index + 1, total)));
                    write_table_csv(&batch, &savedir.join(name))?;
                }
            }
        }
    }
    Ok(())
}

/// Representative rows ranked by ascending error, full schema.
pub fn write_rank_tables(table: &Table, props: &[Prop], savedir: &Path) -> Result<()> {
    for prop in props {
        let error_rows = representative_error_rows(table, &prop.column)?;
        if error_rows.is_empty() {
            debug!(property = %prop.column, "no representative rows, rank table skipped");
            continue;
        }
        let ranked = n_smallest(&error_rows, &prop.column, error_rows.n_rows())?;
        write_table_csv(&ranked, &savedir.join(prop.file_name(Purpose::RankTable, None, None)))?;
    }
    Ok(())
}

/// Representative rows narrowed to provenance, study parameters, time,
/// the property and its order-of-accuracy columns where present.
pub fn write_case_tables(
    table: &Table,
    props: &[Prop],
    refinement: Option<&ColumnKey>,
    savedir: &Path,
) -> Result<()> {
    for prop in props {
        let error_rows = representative_error_rows(table, &prop.column)?;
        if error_rows.is_empty() {
            debug!(property = %prop.column, "no representative rows, case table skipped");
            continue;
        }
        let mut columns = table.database_columns();
        columns.extend(table.study_parameter_columns());
        columns.push(ColumnKey::case("TIME"));
        columns.push(prop.column.clone());
        if refinement.is_some() {
            for key in [order_column(&prop.column), local_order_column(&prop.column)] {
                if error_rows.has_column(&key) {
                    columns.push(key);
                }
            }
        }
        let narrow = error_rows.select_columns(&columns)?;
        write_table_csv(&narrow, &savedir.join(prop.file_name(Purpose::Table, None, None)))?;
    }
    Ok(())
}

/// Tables grouped by the residual study parameters, one batch of
/// combinations per file.
pub fn write_convergence_tables(
    table: &Table,
    props: &[Prop],
    refinement: Option<&ColumnKey>,
    savedir: &Path,
    config: &ReportConfig,
) -> Result<()> {
    let Some(refinement) = refinement else {
        debug!("no refinement parameter, convergence tables skipped");
        return Ok(());
    };
    if table.is_empty() {
        return Ok(());
    }
    let residual = residual_parameters(&table.study_parameter_columns(), refinement);
    let source = if config.sorted {
        table.sorted_by(&residual)?
    } else {
        table.clone()
    };

    for prop in props {
        let batches = group(&source, &residual, config.max_items())?;
        let total = batches.len();
        for (index, batch) in batches.enumerate() {
            let name = prop.file_name(Purpose::Convergenceplot, None, Some((index + 1, total)));
            write_table_csv(&batch, &savedir.join(name))?;
        }
    }
    Ok(())
}

/// Canonical best run per refinement level, concatenated coarsest first.
pub fn write_best_convergence_tables(
    table: &Table,
    props: &[Prop],
    refinement: Option<&ColumnKey>,
    savedir: &Path,
    config: &ReportConfig,
) -> Result<()> {
    let Some(refinement) = refinement else {
        debug!("no refinement parameter, best-convergence tables skipped");
        return Ok(());
    };
    let study_parameters = table.study_parameter_columns();

    for prop in props {
        let levels = smallest_per_refinement(
            table,
            refinement,
            &study_parameters,
            &prop.column,
            config.n_best(),
        )?;
        if levels.is_empty() {
            debug!(property = %prop.column, "no refinement levels, best-convergence table skipped");
            continue;
        }
        let best = Table::concat(levels.into_iter().map(|level| level.rows))?;
        let name = prop.file_name(Purpose::BestConvergenceplot, None, None);
        write_table_csv(&best, &savedir.join(name))?;
    }
    Ok(())
}

/// Record the exact invocation next to the written tables.
pub fn write_provenance(savedir: &Path, argv: &[String]) -> Result<()> {
    let text = format!(
        "# Following command was used for reporting:\n{}\n",
        argv.join(" ")
    );
    fs::write(savedir.join("command_plot.txt"), text)
        .with_context(|| format!("Failed to write provenance file in {}", savedir.display()))
}

/// Hand the validated rendering configuration to the downstream layer.
pub fn write_render_config(savedir: &Path, config: &ReportConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("Failed to serialize render config")?;
    fs::write(savedir.join("render_config.json"), json)
        .with_context(|| format!("Failed to write render config in {}", savedir.display()))
}
