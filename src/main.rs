use anyhow::{Context, Result};
use clap::Parser;
use gridstudy::cli::{Cli, ReportKind};
use gridstudy::config::{MeshType, ReportConfig};
use gridstudy::table::{ColumnKey, Table};
use gridstudy::{convergence, csv_io, derived, filter, properties, report};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Template and study identifiers derived from the CSV basename
fn study_names(path: &Path) -> (String, String) {
    let basename = path.file_name().and_then(|n| n.to_str()).unwrap_or("study");
    let template = basename.split('_').nth(1).unwrap_or("").to_string();
    let study = basename
        .rsplit_once('_')
        .map_or(basename, |(stem, _)| stem)
        .to_string();
    (template, study)
}

/// Apply the CLI value and case-list filters in order.
fn apply_filters(mut table: Table, cli: &Cli) -> Result<Table> {
    for (column, values) in filter::merge_filter_triples(&cli.rm) {
        table = filter::filter_value(&table, &column, &values, false, false)?;
    }
    for (column, values) in filter::merge_filter_triples(&cli.keep) {
        table = filter::filter_value(&table, &column, &values, true, false)?;
    }
    for (column, values) in filter::merge_filter_triples(&cli.keep_drop) {
        table = filter::filter_value(&table, &column, &values, true, true)?;
    }
    if let Some(path) = &cli.rm_file {
        let cases = csv_io::read_case_list(path)?;
        table = filter::filter_cases(&table, &cases, filter::CaseFilterMode::Rm)?;
    }
    if let Some(path) = &cli.keep_file {
        let cases = csv_io::read_case_list(path)?;
        table = filter::filter_cases(&table, &cases, filter::CaseFilterMode::Keep)?;
    }
    Ok(table)
}

/// Refinement parameter: CLI override, validated, or field-name detection.
fn resolve_refinement(table: &Table, override_field: Option<&str>) -> Result<Option<ColumnKey>> {
    match override_field {
        Some(field) => {
            let key = ColumnKey::study_parameter(field);
            table.column_index(&key)?;
            Ok(Some(key))
        }
        None => Ok(table.refinement_column()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let (template, study) = study_names(&cli.study_csv);
    let mut table = csv_io::load_study_csv(&cli.study_csv)?;
    table = apply_filters(table, &cli)?;

    let savedir = match &cli.savedir {
        Some(dir) => dir.clone(),
        None => cli
            .study_csv
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
    };
    fs::create_dir_all(&savedir)
        .with_context(|| format!("Failed to create save directory {}", savedir.display()))?;

    let config = ReportConfig::new(
        cli.legend,
        cli.method,
        &cli.cmap,
        cli.sorted,
        cli.delta_x,
        cli.all,
    )?;
    let argv: Vec<String> = std::env::args().collect();
    report::write_provenance(&savedir, &argv)?;
    report::write_render_config(&savedir, &config)?;

    // derived total-variation column for the volume conservation error
    let tv_source = ColumnKey::case("E_VOL_ALPHA_REL");
    if table.has_column(&tv_source) {
        table = derived::append_total_variation(
            &table,
            &tv_source,
            &ColumnKey::case("E_VOL_ALPHA_REL_TV"),
            &ColumnKey::case("TIME"),
            false,
        )?;
    }

    let refinement = resolve_refinement(&table, cli.refinement.as_deref())?;
    let reports = cli.report.clone().unwrap_or_else(ReportKind::all);

    let wants_rates = reports
        .iter()
        .any(|kind| matches!(kind, ReportKind::Table | ReportKind::RankTable));
    if wants_rates && !convergence::has_convergence_columns(&table) {
        if let Some(refinement) = &refinement {
            tracing::info!("estimating convergence rates");
            let error_columns: Vec<ColumnKey> = table
                .columns
                .iter()
                .filter(|c| properties::is_error_column(c))
                .cloned()
                .collect();
            table = convergence::add_convergence_rates(
                &table,
                &table.study_parameter_columns(),
                refinement,
                &error_columns,
                &config.delta_x.column(),
                &ColumnKey::case("TIME"),
            )?;
        }
    }

    let mesh = cli.mesh.map(MeshType::label);
    let props = properties::present_properties(
        properties::error_properties(&template, &study, mesh),
        &table,
    );

    for kind in &reports {
        match kind {
            ReportKind::Time => {
                let time_props = properties::present_properties(
                    properties::time_properties(&template, &study, mesh),
                    &table,
                );
                report::write_timeplot_tables(
                    &table,
                    &time_props,
                    refinement.as_ref(),
                    &savedir,
                    &config,
                )?;
                report::write_timeplot_tables(
                    &table,
                    &props,
                    refinement.as_ref(),
                    &savedir,
                    &config,
                )?;
            }
            ReportKind::Conv => report::write_convergence_tables(
                &table,
                &props,
                refinement.as_ref(),
                &savedir,
                &config,
            )?,
            ReportKind::Bestconv => report::write_best_convergence_tables(
                &table,
                &props,
                refinement.as_ref(),
                &savedir,
                &config,
            )?,
            ReportKind::Table => {
                report::write_case_tables(&table, &props, refinement.as_ref(), &savedir)?;
            }
            ReportKind::RankTable => report::write_rank_tables(&table, &props, &savedir)?,
        }
    }
    Ok(())
}
