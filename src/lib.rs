// Library exports for casedash

pub mod aggregate;
pub mod data;
pub mod export;
pub mod filter;
pub mod graph;
pub mod ir;
pub mod parser;
pub mod runtime;
pub mod select;

pub use aggregate::{percentage_of_total, pivot, sum_by, top_n, Aggregation, Percentages, PivotTable};
pub use data::{ColumnMap, DataError, Dataset, Dimension, KeyValue, LoadOptions, Record, ResidentStatus};
pub use filter::{apply, FilterSelection};
pub use ir::{Dashboard, Outcome, View};
pub use runtime::Session;
pub use select::{select_views, ViewState};

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            format: OutputFormat::Png,
        }
    }
}

/// How many entries the ranked charts keep.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorOptions {
    #[serde(default = "default_top_countries")]
    pub top_countries: usize,
    #[serde(default = "default_treemap_countries")]
    pub treemap_countries: usize,
    #[serde(default = "default_trend_countries")]
    pub trend_countries: usize,
    #[serde(default = "default_decision_top")]
    pub decision_top: usize,
    #[serde(default = "default_heatmap_countries")]
    pub heatmap_countries: usize,
    /// Regional groups kept per treemap parent
    #[serde(default = "default_region_top")]
    pub region_top: usize,
    #[serde(default = "default_region_bars")]
    pub region_bars: usize,
}

fn default_top_countries() -> usize { 10 }
fn default_treemap_countries() -> usize { 5 }
fn default_trend_countries() -> usize { 5 }
fn default_decision_top() -> usize { 5 }
fn default_heatmap_countries() -> usize { 15 }
fn default_region_top() -> usize { 5 }
fn default_region_bars() -> usize { 10 }

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            top_countries: default_top_countries(),
            treemap_countries: default_treemap_countries(),
            trend_countries: default_trend_countries(),
            decision_top: default_decision_top(),
            heatmap_countries: default_heatmap_countries(),
            region_top: default_region_top(),
            region_bars: default_region_bars(),
        }
    }
}

/// Everything configurable from a JSON config file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardOptions {
    #[serde(default)]
    pub columns: ColumnMap,
    #[serde(default)]
    pub load: LoadOptions,
    #[serde(default)]
    pub selector: SelectorOptions,
    #[serde(default)]
    pub render: RenderOptions,
}

impl DashboardOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid dashboard config")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json_str(&text)
    }
}
