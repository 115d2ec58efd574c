//! CLI argument parsing for gridstudy

use crate::config::{DeltaXPolicy, LegendPosition, MeshType, PlotMethod};
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Report kinds the pipeline can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Time-series tables, one batch of cases per file
    Time,
    /// Tables grouped by the residual study parameters
    Conv,
    /// Best run per refinement level
    Bestconv,
    /// Representative rows with order-of-accuracy columns
    Table,
    /// Representative rows ranked by error
    RankTable,
}

impl ReportKind {
    /// Every report kind, the default selection.
    pub fn all() -> Vec<ReportKind> {
        vec![
            ReportKind::Time,
            ReportKind::Conv,
            ReportKind::Bestconv,
            ReportKind::Table,
            ReportKind::RankTable,
        ]
    }
}

#[derive(Parser, Debug)]
#[command(name = "gridstudy")]
#[command(version)]
#[command(
    about = "Post-process mesh-refinement study databases into report tables",
    long_about = None
)]
pub struct Cli {
    /// The study database CSV to post-process
    pub study_csv: PathBuf,

    /// Adds mesh type information into report titles
    #[arg(long, value_enum)]
    pub mesh: Option<MeshType>,

    /// Reports to produce. Default: all of them
    #[arg(long = "report", value_enum, num_args = 1..)]
    pub report: Option<Vec<ReportKind>>,

    /// Axis scaling hint for time plots
    #[arg(long, value_enum)]
    pub method: Option<PlotMethod>,

    /// Legend position different from default
    #[arg(long, value_enum)]
    pub legend: Option<LegendPosition>,

    /// Colormap for lines in convergence plots
    #[arg(long, default_value = "tab10")]
    pub cmap: String,

    /// Sort the convergence groups by study parameters before writing
    #[arg(short = 's', long)]
    pub sorted: bool,

    /// Characteristic grid spacing h for convergence rates
    #[arg(long = "delta-x", value_enum, default_value = "mean")]
    pub delta_x: DeltaXPolicy,

    /// Removes all cases listed in file. Accepts JSON or list
    #[arg(long = "rm-file", conflicts_with = "keep_file")]
    pub rm_file: Option<PathBuf>,

    /// Keep all cases listed in file. Accepts JSON or list
    #[arg(long = "keep-file")]
    pub keep_file: Option<PathBuf>,

    /// Removes all rows matching the value
    #[arg(
        short = 'r',
        long = "rm",
        num_args = 3,
        value_names = ["CATEGORY", "FIELD", "VALUE"],
        action = ArgAction::Append
    )]
    pub rm: Vec<String>,

    /// Removes all rows not matching the value
    #[arg(
        short = 'k',
        long = "keep",
        num_args = 3,
        value_names = ["CATEGORY", "FIELD", "VALUE"],
        action = ArgAction::Append
    )]
    pub keep: Vec<String>,

    /// Like --keep, and drops the filtered column afterwards
    #[arg(
        short = 'K',
        long = "keep-drop",
        num_args = 3,
        value_names = ["CATEGORY", "FIELD", "VALUE"],
        action = ArgAction::Append
    )]
    pub keep_drop: Vec<String>,

    /// Directory where report tables are saved. Default: dirname(study CSV)
    #[arg(short = 'd', long)]
    pub savedir: Option<PathBuf>,

    /// Put all series in one report table instead of batches of ten
    #[arg(short = 'a', long)]
    pub all: bool,

    /// Study parameter field acting as the refinement parameter
    #[arg(long, value_name = "FIELD")]
    pub refinement: Option<String>,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}
