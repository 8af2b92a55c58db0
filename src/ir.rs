use crate::select::{ActiveDimensions, ViewKind, ViewState};
use serde::Serialize;
use std::fmt;

// =============================================================================
// Output boundary: what to render, with ready-to-plot data
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Treemap,
    Scatter,
    Heatmap,
    Table,
    SingleMetric,
}

/// A labelled value (one bar, one line point, one pie slice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Datum {
    pub label: String,
    pub value: u64,
}

impl Datum {
    pub fn new(label: impl Into<String>, value: u64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// One line of a multi-line chart, or one heatmap row; `values` align with
/// the shared x labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub label: String,
    pub value: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    /// Legend group (a country or case type, or "Overall").
    pub group: String,
    /// Category on the y axis.
    pub label: String,
    pub percent: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ChartData {
    Categories { data: Vec<Datum> },
    MultiSeries { x: Vec<String>, series: Vec<Series> },
    Hierarchy { roots: Vec<TreeNode> },
    Points { points: Vec<ScatterPoint> },
    Grid { x: Vec<String>, rows: Vec<Series> },
    Table { columns: Vec<String>, rows: Vec<Vec<String>> },
    Metric { label: String, value: u64, message: String },
}

/// One chart to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    pub chart: ChartKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_label: Option<String>,
    pub data: ChartData,
}

impl View {
    pub fn new(chart: ChartKind, title: impl Into<String>, data: ChartData) -> Self {
        Self {
            chart,
            title: title.into(),
            x_label: None,
            y_label: None,
            data,
        }
    }

    pub fn with_axes(mut self, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        self.x_label = Some(x_label.into());
        self.y_label = Some(y_label.into());
        self
    }
}

// =============================================================================
// Cross-cuts computed for every non-empty outcome
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResidentSplit {
    pub permanent: u64,
    pub temporary: u64,
}

impl ResidentSplit {
    pub fn to_view(&self) -> View {
        View::new(
            ChartKind::Bar,
            "Count by Resident Status",
            ChartData::Categories {
                data: vec![
                    Datum::new("Permanent", self.permanent),
                    Datum::new("Temporary", self.temporary),
                ],
            },
        )
        .with_axes("Resident Status", "Count")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyMetrics {
    pub total: u64,
    pub records: usize,
    pub countries: usize,
    pub years: usize,
    pub year_range: Option<(i32, i32)>,
    pub avg_per_country: Option<f64>,
    pub non_zero_records: usize,
    pub zero_records: usize,
}

impl KeyMetrics {
    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Total Count", self.total.to_string()),
            ("Records", self.records.to_string()),
            ("Countries", self.countries.to_string()),
            ("Years Covered", self.years.to_string()),
            (
                "Year Range",
                self.year_range
                    .map(|(lo, hi)| format!("{}-{}", lo, hi))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            (
                "Avg Count/Country",
                self.avg_per_country
                    .map(|avg| format!("{:.1}", avg))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            ("Non-Zero Records", self.non_zero_records.to_string()),
            ("Zero Records", self.zero_records.to_string()),
        ]
    }

    pub fn to_view(&self) -> View {
        View::new(
            ChartKind::Table,
            "Summary Statistics",
            ChartData::Table {
                columns: vec!["Metric".to_string(), "Value".to_string()],
                rows: self
                    .rows()
                    .into_iter()
                    .map(|(name, value)| vec![name.to_string(), value])
                    .collect(),
            },
        )
    }
}

impl fmt::Display for KeyMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.rows() {
            writeln!(f, "{:<18} {}", format!("{}:", name), value)?;
        }
        Ok(())
    }
}

// =============================================================================
// One recomputation pass
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub state: ViewState,
    pub active: ActiveDimensions,
    pub filters: String,
    pub metrics: KeyMetrics,
    pub views: Vec<View>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resident_split: Option<ResidentSplit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatmap: Option<View>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regions: Option<View>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decisions: Option<View>,
}

impl Dashboard {
    /// Every view to render: the selected bundle, then the cross-cuts and the
    /// summary table. The resident split is not repeated when the bundle
    /// already compares resident status.
    pub fn all_views(&self) -> Vec<View> {
        let mut views = self.views.clone();
        if let Some(split) = &self.resident_split {
            if !self.state.bundle().contains(&ViewKind::ResidentComparison) {
                views.push(split.to_view());
            }
        }
        views.extend(
            [&self.heatmap, &self.regions, &self.decisions]
                .into_iter()
                .flatten()
                .cloned(),
        );
        views.push(self.metrics.to_view());
        views
    }
}

pub const NO_DATA_MESSAGE: &str = "No data matches the selected filters.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    NoData { message: String },
    Ready(Dashboard),
}

impl Outcome {
    pub fn no_data() -> Self {
        Outcome::NoData {
            message: NO_DATA_MESSAGE.to_string(),
        }
    }

    pub fn dashboard(&self) -> Option<&Dashboard> {
        match self {
            Outcome::Ready(dashboard) => Some(dashboard),
            Outcome::NoData { .. } => None,
        }
    }
}
