//! Report configuration assembled from the CLI
//!
//! One explicit structure instead of a loose option bag: every rendering
//! hint the downstream layer consumes is enumerated and validated here,
//! then handed off as a JSON sidecar next to the written tables.

use crate::grouping::MaxItems;
use crate::table::ColumnKey;
use anyhow::{bail, Result};
use clap::ValueEnum;
use serde::Serialize;

/// Default bound on series per report table unless --all is given
const DEFAULT_MAX_ITEMS: usize = 10;

/// Legend placement for rendered figures
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegendPosition {
    Below,
    Right,
}

/// Axis scaling for time plots
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlotMethod {
    Plot,
    Semilogy,
    Loglog,
}

/// Which characteristic grid spacing column drives convergence rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeltaXPolicy {
    Min,
    Max,
    Mean,
}

impl DeltaXPolicy {
    pub fn column(self) -> ColumnKey {
        match self {
            DeltaXPolicy::Min => ColumnKey::case("DELTA_X"),
            DeltaXPolicy::Max => ColumnKey::case("MAX_DELTA_X"),
            DeltaXPolicy::Mean => ColumnKey::case("MEAN_DELTA_X"),
        }
    }
}

/// Mesh type annotation for figure titles
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeshType {
    Hex,
    HexPerturbed,
    Poly,
}

impl MeshType {
    pub fn label(self) -> &'static str {
        match self {
            MeshType::Hex => "hex",
            MeshType::HexPerturbed => "hex-perturbed",
            MeshType::Poly => "poly",
        }
    }
}

/// Validated rendering configuration handed to the reporting layer
#[derive(Debug, Clone, Serialize)]
pub struct ReportConfig {
    pub legend: Option<LegendPosition>,
    pub method: Option<PlotMethod>,
    pub cmap: String,
    pub sorted: bool,
    pub delta_x: DeltaXPolicy,
    pub all_items: bool,
}

impl ReportConfig {
    pub fn new(
        legend: Option<LegendPosition>,
        method: Option<PlotMethod>,
        cmap: &str,
        sorted: bool,
        delta_x: DeltaXPolicy,
        all_items: bool,
    ) -> Result<Self> {
        let cmap = cmap.trim();
        if cmap.is_empty() {
            bail!("colormap name must not be empty");
        }
        Ok(Self {
            legend,
            method,
            cmap: cmap.to_string(),
            sorted,
            delta_x,
            all_items,
        })
    }

    /// Series bound per report table
    pub fn max_items(&self) -> MaxItems {
        if self.all_items {
            MaxItems::Unlimited
        } else {
            MaxItems::Limit(DEFAULT_MAX_ITEMS)
        }
    }

    /// Refinement-level bound for best-convergence reports
    pub fn n_best(&self) -> Option<usize> {
        if self.all_items {
            None
        } else {
            Some(DEFAULT_MAX_ITEMS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(all_items: bool) -> ReportConfig {
        ReportConfig::new(
            Some(LegendPosition::Right),
            None,
            "tab10",
            false,
            DeltaXPolicy::Mean,
            all_items,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_cmap_rejected() {
        let result = ReportConfig::new(None, None, "  ", false, DeltaXPolicy::Mean, false);
        assert!(result.is_err());
    }

    #[test]
    fn test_delta_x_column_mapping() {
        assert_eq!(DeltaXPolicy::Min.column(), ColumnKey::case("DELTA_X"));
        assert_eq!(DeltaXPolicy::Max.column(), ColumnKey::case("MAX_DELTA_X"));
        assert_eq!(DeltaXPolicy::Mean.column(), ColumnKey::case("MEAN_DELTA_X"));
    }

    #[test]
    fn test_all_flag_lifts_bounds() {
        assert_eq!(config(false).max_items(), MaxItems::Limit(10));
        assert_eq!(config(false).n_best(), Some(10));
        assert_eq!(config(true).max_items(), MaxItems::Unlimited);
        assert_eq!(config(true).n_best(), None);
    }

    #[test]
    fn test_mesh_labels() {
        assert_eq!(MeshType::HexPerturbed.label(), "hex-perturbed");
    }

    #[test]
    fn test_config_serializes_for_handoff() {
        let json = serde_json::to_string(&config(false)).unwrap();
        assert!(json.contains("\"legend\":\"right\""));
        assert!(json.contains("\"cmap\":\"tab10\""));
        assert!(json.contains("\"delta_x\":\"mean\""));
    }
}
