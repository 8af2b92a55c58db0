// View selector: active filter combination -> chart bundle

use crate::aggregate::{key_label, percentage_of_total, pivot, sum_by, top_n, Aggregation, GroupKey, Percentages};
use crate::data::{DataError, Dataset, Dimension, KeyValue, ResidentStatus};
use crate::filter::FilterSelection;
use crate::ir::{
    ChartData, ChartKind, Dashboard, Datum, KeyMetrics, Outcome, ResidentSplit, ScatterPoint, Series,
    TreeNode, View,
};
use crate::SelectorOptions;
use log::debug;
use serde::Serialize;
use std::collections::BTreeSet;

/// Which primary dimensions carry a restriction.
///
/// Resident and decision filters narrow the data but never change the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ActiveDimensions {
    pub country: bool,
    pub year: bool,
    pub category: bool,
}

impl ActiveDimensions {
    pub fn of(selection: &FilterSelection) -> Self {
        Self {
            country: selection.is_active(Dimension::Country),
            year: selection.is_active(Dimension::Year),
            category: selection.is_active(Dimension::Category),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    Overview,
    Exact,
    YearCountry,
    YearCategory,
    CountryCategory,
    YearOnly,
    CountryOnly,
    CategoryOnly,
}

/// A chart the selector knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    CategoryTotals,
    TopCountries,
    YearTrend,
    CategoryByYear,
    CountryTrendByYear,
    ResidentComparison,
    ExactTotal,
    TopCountriesTreemap,
    CountryCategoryTreemap,
}

impl ViewState {
    pub const ALL: [ViewState; 8] = [
        ViewState::Overview,
        ViewState::Exact,
        ViewState::YearCountry,
        ViewState::YearCategory,
        ViewState::CountryCategory,
        ViewState::YearOnly,
        ViewState::CountryOnly,
        ViewState::CategoryOnly,
    ];

    pub fn from_active(active: ActiveDimensions) -> Self {
        match (active.year, active.country, active.category) {
            (false, false, false) => ViewState::Overview,
            (true, true, true) => ViewState::Exact,
            (true, true, false) => ViewState::YearCountry,
            (true, false, true) => ViewState::YearCategory,
            (false, true, true) => ViewState::CountryCategory,
            (true, false, false) => ViewState::YearOnly,
            (false, true, false) => ViewState::CountryOnly,
            (false, false, true) => ViewState::CategoryOnly,
        }
    }

    /// The charts shown in this state, in display order.
    pub fn bundle(self) -> &'static [ViewKind] {
        use ViewKind::*;
        match self {
            ViewState::Overview => &[
                CategoryTotals,
                TopCountries,
                YearTrend,
                CategoryByYear,
                ResidentComparison,
            ],
            ViewState::Exact => &[ExactTotal],
            ViewState::YearCountry => &[CategoryTotals],
            ViewState::YearCategory => &[TopCountries],
            ViewState::CountryCategory => &[YearTrend],
            ViewState::YearOnly => &[TopCountriesTreemap],
            ViewState::CountryOnly => &[YearTrend, CategoryByYear, CountryCategoryTreemap],
            ViewState::CategoryOnly => &[YearTrend, TopCountries, CountryTrendByYear],
        }
    }
}

struct ViewContext<'a> {
    source: &'a Dataset,
    filtered: &'a Dataset,
    selection: &'a FilterSelection,
    options: &'a SelectorOptions,
}

impl ViewKind {
    /// Build this chart over the filtered data. `None` when the chart does
    /// not apply to the dataset (resident comparison without resident data).
    fn build(self, ctx: &ViewContext<'_>) -> Result<Option<View>, DataError> {
        let data = ctx.filtered;
        let view = match self {
            ViewKind::CategoryTotals => {
                let agg = sum_by(data, &[Dimension::Category])?;
                bar("Count by Category", &top_n(&agg, agg.len())).with_axes("Category", "Count")
            }
            ViewKind::TopCountries => {
                let n = ctx.options.top_countries;
                let agg = sum_by(data, &[Dimension::Country])?;
                bar(format!("Top {} Countries by Count", n), &top_n(&agg, n)).with_axes("Country", "Count")
            }
            ViewKind::YearTrend => {
                let agg = sum_by(data, &[Dimension::Year])?;
                View::new(
                    ChartKind::Line,
                    "Total Count by Year",
                    ChartData::Categories {
                        data: to_datums(&agg.sorted_by_key()),
                    },
                )
                .with_axes("Year", "Count")
            }
            ViewKind::CategoryByYear => {
                let table = pivot(data, Dimension::Category, Dimension::Year)?;
                multi_line("Count by Category over Years", &table, table.rows())
            }
            ViewKind::CountryTrendByYear => {
                let n = ctx.options.trend_countries;
                let agg = sum_by(data, &[Dimension::Country])?;
                let leaders = leading_keys(&agg, n);
                let table = pivot(data, Dimension::Country, Dimension::Year)?;
                multi_line(format!("Trend by Country (Top {})", n), &table, &leaders)
            }
            ViewKind::ResidentComparison => match resident_split(data)? {
                Some(split) => split.to_view(),
                None => return Ok(None),
            },
            ViewKind::ExactTotal => View::new(
                ChartKind::SingleMetric,
                "Total Count",
                ChartData::Metric {
                    label: "Total Count".to_string(),
                    value: data.total(),
                    message: match data.len() {
                        1 => "Found 1 matching record".to_string(),
                        n => format!("Found {} matching records", n),
                    },
                },
            ),
            ViewKind::TopCountriesTreemap => {
                let n = ctx.options.treemap_countries;
                let agg = sum_by(data, &[Dimension::Country])?;
                let roots = leading_keys(&agg, n);
                let nest = Nesting::all(Dimension::Country, Dimension::Category);
                treemap(format!("Top {} Countries by Count, by Category", n), data, nest, &roots)?
            }
            ViewKind::CountryCategoryTreemap => {
                let agg = sum_by(data, &[Dimension::Country])?;
                let roots = leading_keys(&agg, agg.len());
                let nest = Nesting::all(Dimension::Country, Dimension::Category);
                treemap("Categories within Selected Countries", data, nest, &roots)?
            }
        };
        Ok(Some(view))
    }
}

/// First key value of the `n` largest groups.
fn leading_keys(agg: &Aggregation, n: usize) -> Vec<KeyValue> {
    top_n(agg, n).into_iter().map(|(key, _)| key[0].clone()).collect()
}

fn to_datums(groups: &[(GroupKey, u64)]) -> Vec<Datum> {
    groups
        .iter()
        .map(|(key, count)| Datum::new(key_label(key), *count))
        .collect()
}

fn bar(title: impl Into<String>, groups: &[(GroupKey, u64)]) -> View {
    View::new(
        ChartKind::Bar,
        title,
        ChartData::Categories {
            data: to_datums(groups),
        },
    )
}

/// One line per requested pivot row, over the pivot's year columns.
fn multi_line(title: impl Into<String>, table: &crate::aggregate::PivotTable, rows: &[KeyValue]) -> View {
    View::new(
        ChartKind::Line,
        title,
        ChartData::MultiSeries {
            x: table.columns().iter().map(ToString::to_string).collect(),
            series: rows
                .iter()
                .map(|row| Series {
                    name: row.to_string(),
                    values: table.row_values(row),
                })
                .collect(),
        },
    )
    .with_axes("Year", "Count")
}

/// Parent and child dimensions of a two-level treemap, and which children
/// each parent keeps.
struct Nesting<'a> {
    parent: Dimension,
    child: Dimension,
    /// Only these children, when set
    only: Option<&'a [KeyValue]>,
    per_parent: usize,
}

impl<'a> Nesting<'a> {
    fn all(parent: Dimension, child: Dimension) -> Self {
        Self {
            parent,
            child,
            only: None,
            per_parent: usize::MAX,
        }
    }
}

/// `roots` as parents, each with its children largest first. A parent sums
/// its kept children; parents left with none are dropped. Blank children
/// are never kept.
fn treemap(title: impl Into<String>, data: &Dataset, nest: Nesting<'_>, roots: &[KeyValue]) -> Result<View, DataError> {
    let breakdown = sum_by(data, &[nest.parent, nest.child])?;
    let ranked = top_n(&breakdown, breakdown.len());

    let nodes = roots
        .iter()
        .filter_map(|parent| {
            let children: Vec<TreeNode> = ranked
                .iter()
                .filter(|(key, _)| &key[0] == parent && key[1] != KeyValue::Missing)
                .filter(|(key, _)| nest.only.map_or(true, |only| only.contains(&key[1])))
                .take(nest.per_parent)
                .map(|(key, count)| TreeNode {
                    label: key[1].to_string(),
                    value: *count,
                    children: Vec::new(),
                })
                .collect();
            (!children.is_empty()).then(|| TreeNode {
                label: parent.to_string(),
                value: children.iter().map(|child| child.value).sum(),
                children,
            })
        })
        .collect();

    Ok(View::new(ChartKind::Treemap, title, ChartData::Hierarchy { roots: nodes }))
}

/// Country x year grid of the leading countries. `None` for a single cell.
pub fn heatmap_view(data: &Dataset, countries: usize) -> Result<Option<View>, DataError> {
    let table = pivot(data, Dimension::Country, Dimension::Year)?;
    if table.rows().len() < 2 && table.columns().len() < 2 {
        return Ok(None);
    }
    let leaders = leading_keys(&sum_by(data, &[Dimension::Country])?, countries);

    Ok(Some(
        View::new(
            ChartKind::Heatmap,
            "Cases Heatmap: Countries vs Years",
            ChartData::Grid {
                x: table.columns().iter().map(ToString::to_string).collect(),
                rows: leaders
                    .iter()
                    .map(|country| Series {
                        name: country.to_string(),
                        values: table.row_values(country),
                    })
                    .collect(),
            },
        )
        .with_axes("Year", "Country"),
    ))
}

/// How the selection splits the litigation cross-cuts: by country when
/// several countries and at most one case type are selected, by case type in
/// the mirror case, not at all otherwise.
fn cross_cut_group(selection: &FilterSelection) -> Option<Dimension> {
    let countries = selection.selected_count(Dimension::Country);
    let case_types = selection.selected_count(Dimension::Category);
    if countries > 1 && case_types <= 1 {
        Some(Dimension::Country)
    } else if case_types > 1 && countries <= 1 {
        Some(Dimension::Category)
    } else {
        None
    }
}

/// Litigation counts by primary office regional group.
fn region_view(ctx: &ViewContext<'_>) -> Result<Option<View>, DataError> {
    if !ctx.source.has_region() {
        return Ok(None);
    }
    let data = ctx.filtered;
    let regions = sum_by(data, &[Dimension::Region])?;
    let ranked: Vec<(GroupKey, u64)> = top_n(&regions, regions.len())
        .into_iter()
        .filter(|(key, _)| key[0] != KeyValue::Missing)
        .collect();
    let n = ctx.options.region_top;

    let view = match cross_cut_group(ctx.selection) {
        Some(Dimension::Country) => {
            let top_regions: Vec<KeyValue> = ranked.iter().take(n).map(|(key, _)| key[0].clone()).collect();
            let roots = leading_keys(&sum_by(data, &[Dimension::Country])?, usize::MAX);
            let nest = Nesting {
                only: Some(top_regions.as_slice()),
                ..Nesting::all(Dimension::Country, Dimension::Region)
            };
            treemap(format!("Litigation by Country and Top {} Regional Groups", n), data, nest, &roots)?
        }
        Some(_) => {
            let roots = leading_keys(&sum_by(data, &[Dimension::Category])?, usize::MAX);
            let nest = Nesting {
                per_parent: n,
                ..Nesting::all(Dimension::Category, Dimension::Region)
            };
            treemap(format!("Top {} Regional Groups within Each Case Type", n), data, nest, &roots)?
        }
        None => {
            let top: Vec<(GroupKey, u64)> = ranked.into_iter().take(ctx.options.region_bars).collect();
            bar("Litigation Count by Regional Group", &top).with_axes("Regional Group", "Count")
        }
    };
    Ok(Some(view))
}

/// Permanent vs temporary split of the total, when the data has resident status.
pub fn resident_split(data: &Dataset) -> Result<Option<ResidentSplit>, DataError> {
    if !data.has_resident() {
        return Ok(None);
    }
    let agg = sum_by(data, &[Dimension::Resident])?;
    let count = |status: ResidentStatus| agg.get(&[KeyValue::from(status)]).unwrap_or(0);
    Ok(Some(ResidentSplit {
        permanent: count(ResidentStatus::Permanent),
        temporary: count(ResidentStatus::Temporary),
    }))
}

pub fn key_metrics(data: &Dataset) -> Result<KeyMetrics, DataError> {
    let countries = sum_by(data, &[Dimension::Country])?.len();
    let years: BTreeSet<i32> = data.iter().map(|r| r.year).collect();
    let total = data.total();
    let zero_records = data.iter().filter(|r| r.count == 0).count();

    Ok(KeyMetrics {
        total,
        records: data.len(),
        countries,
        years: years.len(),
        year_range: years.first().zip(years.last()).map(|(lo, hi)| (*lo, *hi)),
        avg_per_country: (countries > 0).then(|| total as f64 / countries as f64),
        non_zero_records: data.len() - zero_records,
        zero_records,
    })
}

/// Leave-decision mix for litigation data.
///
/// When the selection splits by country or by case type, each group's share
/// per decision is plotted against the share over the whole source.
/// Otherwise a pie of the leading decisions.
fn decision_view(ctx: &ViewContext<'_>) -> Result<Option<View>, DataError> {
    if !ctx.source.has_decision() {
        return Ok(None);
    }
    let n = ctx.options.decision_top;
    let decisions = sum_by(ctx.filtered, &[Dimension::Decision])?;
    let leading = top_n(&decisions, n);

    let group = match cross_cut_group(ctx.selection) {
        Some(group) => group,
        None => {
            let total: u64 = leading.iter().map(|(_, count)| count).sum();
            return Ok(Some(View::new(
                ChartKind::Pie,
                format!("Leave Decision Distribution (Total = {})", total),
                ChartData::Categories {
                    data: to_datums(&leading),
                },
            )));
        }
    };

    let kept: Vec<&KeyValue> = leading.iter().map(|(key, _)| &key[0]).collect();
    let group_totals = sum_by(ctx.filtered, &[group])?;
    let by_group = sum_by(ctx.filtered, &[group, Dimension::Decision])?;

    let mut points: Vec<ScatterPoint> = by_group
        .iter()
        .filter(|(key, _)| kept.contains(&&key[1]))
        .filter_map(|(key, count)| {
            let total = group_totals.get(&key[..1]).unwrap_or(0);
            (total > 0).then(|| ScatterPoint {
                group: key[0].to_string(),
                label: key[1].to_string(),
                percent: count as f64 / total as f64 * 100.0,
                count,
            })
        })
        .collect();

    let overall_counts = sum_by(ctx.source, &[Dimension::Decision])?;
    if let Percentages::Defined(shares) = percentage_of_total(&overall_counts) {
        for (key, percent) in shares {
            if kept.contains(&&key[0]) {
                points.push(ScatterPoint {
                    group: "Overall".to_string(),
                    label: key[0].to_string(),
                    percent,
                    count: overall_counts.get(&key).unwrap_or(0),
                });
            }
        }
    }

    let title = match group {
        Dimension::Country => "Decision Type Distribution by Country (% of Total)",
        _ => "Decision Type Distribution by Case Type (% of Total)",
    };
    Ok(Some(
        View::new(ChartKind::Scatter, title, ChartData::Points { points }).with_axes("Percentage (%)", "Leave Decision"),
    ))
}

/// Pick and compute the views for `filtered`, the result of applying
/// `selection` to `source`.
pub fn select_views(
    source: &Dataset,
    filtered: &Dataset,
    selection: &FilterSelection,
    options: &SelectorOptions,
) -> Result<Outcome, DataError> {
    if filtered.is_empty() {
        debug!("No records match ({})", selection.describe());
        return Ok(Outcome::no_data());
    }

    let active = ActiveDimensions::of(selection);
    let state = ViewState::from_active(active);
    debug!("Selected view state {:?} for {:?}", state, active);

    let ctx = ViewContext {
        source,
        filtered,
        selection,
        options,
    };

    let mut views = Vec::new();
    for kind in state.bundle() {
        if let Some(view) = kind.build(&ctx)? {
            views.push(view);
        }
    }

    Ok(Outcome::Ready(Dashboard {
        state,
        active,
        filters: selection.describe(),
        metrics: key_metrics(filtered)?,
        views,
        resident_split: resident_split(filtered)?,
        heatmap: heatmap_view(filtered, options.heatmap_countries)?,
        regions: region_view(&ctx)?,
        decisions: decision_view(&ctx)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Record;
    use crate::filter::apply;
    use pretty_assertions::assert_eq;

    fn make_data() -> Dataset {
        Dataset::new(vec![
            Record::new("India", 2019, "A", 5).with_resident(ResidentStatus::Permanent),
            Record::new("India", 2020, "B", 3).with_resident(ResidentStatus::Temporary),
            Record::new("Iran", 2019, "B", 4).with_resident(ResidentStatus::Temporary),
            Record::new("Peru", 2021, "A", 6).with_resident(ResidentStatus::Permanent),
            Record::new("Chile", 2020, "C", 1).with_resident(ResidentStatus::Permanent),
            Record::new("Peru", 2019, "C", 2).with_resident(ResidentStatus::Temporary),
        ])
    }

    fn run(data: &Dataset, selection: &FilterSelection) -> Outcome {
        let filtered = apply(data, selection);
        select_views(data, &filtered, selection, &SelectorOptions::default()).unwrap()
    }

    fn ready(outcome: Outcome) -> Dashboard {
        match outcome {
            Outcome::Ready(dashboard) => dashboard,
            Outcome::NoData { message } => panic!("Expected dashboard, got no data: {}", message),
        }
    }

    fn chart_kinds(dashboard: &Dashboard) -> Vec<ChartKind> {
        dashboard.views.iter().map(|v| v.chart).collect()
    }

    #[test]
    fn test_state_table_is_total() {
        let mut seen = std::collections::HashSet::new();
        for bits in 0..8u8 {
            let active = ActiveDimensions {
                country: bits & 1 != 0,
                year: bits & 2 != 0,
                category: bits & 4 != 0,
            };
            seen.insert(ViewState::from_active(active));
        }
        assert_eq!(seen.len(), ViewState::ALL.len());
    }

    #[test]
    fn test_resident_filter_does_not_change_state() {
        let selection = FilterSelection::new().with(Dimension::Resident, [ResidentStatus::Permanent]);
        assert_eq!(
            ViewState::from_active(ActiveDimensions::of(&selection)),
            ViewState::Overview
        );
    }

    #[test]
    fn test_overview_bundle() {
        let dashboard = ready(run(&make_data(), &FilterSelection::new()));
        assert_eq!(dashboard.state, ViewState::Overview);
        assert_eq!(
            chart_kinds(&dashboard),
            vec![ChartKind::Bar, ChartKind::Bar, ChartKind::Line, ChartKind::Line, ChartKind::Bar]
        );
        assert_eq!(dashboard.views[1].title, "Top 10 Countries by Count");
        assert_eq!(
            dashboard.resident_split,
            Some(ResidentSplit {
                permanent: 12,
                temporary: 9
            })
        );
        assert_eq!(dashboard.metrics.total, 21);
        assert_eq!(dashboard.metrics.year_range, Some((2019, 2021)));
        assert!(dashboard.decisions.is_none());
    }

    #[test]
    fn test_overview_year_trend_is_ascending() {
        let dashboard = ready(run(&make_data(), &FilterSelection::new()));
        assert_eq!(
            dashboard.views[2].data,
            ChartData::Categories {
                data: vec![Datum::new("2019", 11), Datum::new("2020", 4), Datum::new("2021", 6)],
            }
        );
    }

    #[test]
    fn test_country_only_bundle() {
        let selection = FilterSelection::new().with(Dimension::Country, ["India"]);
        let dashboard = ready(run(&make_data(), &selection));
        assert_eq!(dashboard.state, ViewState::CountryOnly);
        assert_eq!(
            chart_kinds(&dashboard),
            vec![ChartKind::Line, ChartKind::Line, ChartKind::Treemap]
        );
        assert_eq!(
            dashboard.views[2].data,
            ChartData::Hierarchy {
                roots: vec![TreeNode {
                    label: "India".to_string(),
                    value: 8,
                    children: vec![
                        TreeNode { label: "A".to_string(), value: 5, children: vec![] },
                        TreeNode { label: "B".to_string(), value: 3, children: vec![] },
                    ],
                }],
            }
        );
    }

    #[test]
    fn test_multi_line_fills_missing_years() {
        let selection = FilterSelection::new().with(Dimension::Country, ["India"]);
        let dashboard = ready(run(&make_data(), &selection));
        assert_eq!(
            dashboard.views[1].data,
            ChartData::MultiSeries {
                x: vec!["2019".to_string(), "2020".to_string()],
                series: vec![
                    Series { name: "A".to_string(), values: vec![5, 0] },
                    Series { name: "B".to_string(), values: vec![0, 3] },
                ],
            }
        );
    }

    #[test]
    fn test_exact_bundle() {
        let selection = FilterSelection::new()
            .with(Dimension::Country, ["India"])
            .with(Dimension::Year, [2019])
            .with(Dimension::Category, ["A"]);
        let dashboard = ready(run(&make_data(), &selection));
        assert_eq!(dashboard.state, ViewState::Exact);
        assert_eq!(
            dashboard.views,
            vec![View::new(
                ChartKind::SingleMetric,
                "Total Count",
                ChartData::Metric {
                    label: "Total Count".to_string(),
                    value: 5,
                    message: "Found 1 matching record".to_string(),
                },
            )]
        );
    }

    #[test]
    fn test_year_country_bundle() {
        let selection = FilterSelection::new()
            .with(Dimension::Country, ["India", "Peru"])
            .with(Dimension::Year, [2019]);
        let dashboard = ready(run(&make_data(), &selection));
        assert_eq!(dashboard.state, ViewState::YearCountry);
        assert_eq!(
            dashboard.views[0].data,
            ChartData::Categories {
                data: vec![Datum::new("A", 5), Datum::new("C", 2)],
            }
        );
    }

    #[test]
    fn test_year_category_bundle() {
        let selection = FilterSelection::new()
            .with(Dimension::Year, [2019, 2020])
            .with(Dimension::Category, ["B"]);
        let dashboard = ready(run(&make_data(), &selection));
        assert_eq!(dashboard.state, ViewState::YearCategory);
        assert_eq!(
            dashboard.views[0].data,
            ChartData::Categories {
                data: vec![Datum::new("Iran", 4), Datum::new("India", 3)],
            }
        );
    }

    #[test]
    fn test_country_category_bundle() {
        let selection = FilterSelection::new()
            .with(Dimension::Country, ["Peru"])
            .with(Dimension::Category, ["A", "C"]);
        let dashboard = ready(run(&make_data(), &selection));
        assert_eq!(dashboard.state, ViewState::CountryCategory);
        assert_eq!(chart_kinds(&dashboard), vec![ChartKind::Line]);
    }

    #[test]
    fn test_year_only_treemap_top_countries() {
        let options = SelectorOptions {
            treemap_countries: 2,
            ..SelectorOptions::default()
        };
        let data = make_data();
        let selection = FilterSelection::new().with(Dimension::Year, [2019]);
        let filtered = apply(&data, &selection);
        let dashboard = ready(select_views(&data, &filtered, &selection, &options).unwrap());
        assert_eq!(dashboard.state, ViewState::YearOnly);
        match &dashboard.views[0].data {
            ChartData::Hierarchy { roots } => {
                let labels: Vec<&str> = roots.iter().map(|n| n.label.as_str()).collect();
                assert_eq!(labels, vec!["India", "Iran"]);
            }
            other => panic!("Expected hierarchy, got {:?}", other),
        }
    }

    #[test]
    fn test_category_only_bundle() {
        let selection = FilterSelection::new().with(Dimension::Category, ["A", "B"]);
        let dashboard = ready(run(&make_data(), &selection));
        assert_eq!(dashboard.state, ViewState::CategoryOnly);
        assert_eq!(
            chart_kinds(&dashboard),
            vec![ChartKind::Line, ChartKind::Bar, ChartKind::Line]
        );
        match &dashboard.views[2].data {
            ChartData::MultiSeries { series, .. } => {
                let names: Vec<&str> = series.iter().map(|s| s.name.as_str()).collect();
                assert_eq!(names, vec!["India", "Peru", "Iran"]);
            }
            other => panic!("Expected multi-series, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_country_is_no_data() {
        let selection = FilterSelection::new().with(Dimension::Country, ["Atlantis"]);
        assert_eq!(run(&make_data(), &selection), Outcome::no_data());
    }

    #[test]
    fn test_no_resident_column_skips_comparison() {
        let data = Dataset::new(vec![Record::new("India", 2019, "A", 5)]);
        let dashboard = ready(run(&data, &FilterSelection::new()));
        assert_eq!(dashboard.views.len(), 4);
        assert!(dashboard.resident_split.is_none());
    }

    fn litigation() -> Dataset {
        Dataset::new(vec![
            Record::new("India", 2019, "Mandamus", 6).with_decision("Dismissed"),
            Record::new("India", 2019, "Mandamus", 2).with_decision("Allowed"),
            Record::new("Iran", 2020, "RAD Decisions", 3).with_decision("Dismissed"),
            Record::new("Iran", 2020, "RAD Decisions", 1).with_decision("Discontinued"),
            Record::new("Nigeria", 2020, "Mandamus", 8).with_decision("Discontinued"),
        ])
    }

    #[test]
    fn test_decision_pie() {
        let dashboard = ready(run(&litigation(), &FilterSelection::new()));
        let decisions = dashboard.decisions.expect("decision view");
        assert_eq!(decisions.chart, ChartKind::Pie);
        assert_eq!(decisions.title, "Leave Decision Distribution (Total = 20)");
    }

    #[test]
    fn test_decision_scatter_for_multiple_countries() {
        let selection = FilterSelection::new().with(Dimension::Country, ["India", "Iran"]);
        let dashboard = ready(run(&litigation(), &selection));
        let decisions = dashboard.decisions.expect("decision view");
        assert_eq!(decisions.chart, ChartKind::Scatter);
        let points = match decisions.data {
            ChartData::Points { points } => points,
            other => panic!("Expected points, got {:?}", other),
        };
        let india_dismissed = points
            .iter()
            .find(|p| p.group == "India" && p.label == "Dismissed")
            .expect("India/Dismissed point");
        assert!((india_dismissed.percent - 75.0).abs() < 1e-9);
        let overall_discontinued = points
            .iter()
            .find(|p| p.group == "Overall" && p.label == "Discontinued")
            .expect("overall point");
        assert!((overall_discontinued.percent - 45.0).abs() < 1e-9);
        assert_eq!(overall_discontinued.count, 9);
    }

    #[test]
    fn test_exact_message_counts_records() {
        let selection = FilterSelection::new()
            .with(Dimension::Country, ["India", "Iran"])
            .with(Dimension::Year, [2019])
            .with(Dimension::Category, ["A", "B"]);
        let dashboard = ready(run(&make_data(), &selection));
        match &dashboard.views[0].data {
            ChartData::Metric { value, message, .. } => {
                assert_eq!(*value, 9);
                assert_eq!(message, "Found 2 matching records");
            }
            other => panic!("Expected metric, got {:?}", other),
        }
        assert!(dashboard.heatmap.is_some());
    }

    #[test]
    fn test_heatmap_rows_are_leading_countries() {
        let view = heatmap_view(&make_data(), 2).unwrap().expect("heatmap");
        assert_eq!(view.chart, ChartKind::Heatmap);
        assert_eq!(
            view.data,
            ChartData::Grid {
                x: vec!["2019".to_string(), "2020".to_string(), "2021".to_string()],
                rows: vec![
                    Series { name: "India".to_string(), values: vec![5, 3, 0] },
                    Series { name: "Peru".to_string(), values: vec![2, 0, 6] },
                ],
            }
        );
    }

    #[test]
    fn test_heatmap_skipped_for_single_cell() {
        let data = Dataset::new(vec![Record::new("India", 2019, "A", 5), Record::new("India", 2019, "B", 1)]);
        assert_eq!(heatmap_view(&data, 15).unwrap(), None);
        assert!(ready(run(&data, &FilterSelection::new())).heatmap.is_none());
    }

    fn regional() -> Dataset {
        Dataset::new(vec![
            Record::new("India", 2019, "Mandamus", 6).with_decision("Dismissed").with_region("Ontario"),
            Record::new("India", 2019, "RAD Decisions", 2).with_decision("Allowed").with_region("Ontario"),
            Record::new("India", 2020, "Mandamus", 4).with_decision("Discontinued").with_region("Quebec"),
            Record::new("Iran", 2020, "RAD Decisions", 3).with_decision("Dismissed").with_region("Prairies"),
            Record::new("Nigeria", 2021, "RPD Decisions", 8).with_decision("Allowed").with_region("Quebec"),
            Record::new("Nigeria", 2021, "RPD Decisions", 1).with_decision("Allowed"),
        ])
    }

    fn run_with(data: &Dataset, selection: &FilterSelection, options: &SelectorOptions) -> Dashboard {
        let filtered = apply(data, selection);
        ready(select_views(data, &filtered, selection, options).unwrap())
    }

    fn leaf(label: &str, value: u64) -> TreeNode {
        TreeNode {
            label: label.to_string(),
            value,
            children: vec![],
        }
    }

    #[test]
    fn test_region_bars_without_split() {
        let dashboard = ready(run(&regional(), &FilterSelection::new()));
        let regions = dashboard.regions.expect("regional view");
        assert_eq!(regions.chart, ChartKind::Bar);
        assert_eq!(regions.title, "Litigation Count by Regional Group");
        assert_eq!(
            regions.data,
            ChartData::Categories {
                data: vec![Datum::new("Quebec", 12), Datum::new("Ontario", 8), Datum::new("Prairies", 3)],
            }
        );
    }

    #[test]
    fn test_region_treemap_by_country() {
        let options = SelectorOptions {
            region_top: 2,
            ..SelectorOptions::default()
        };
        let selection = FilterSelection::new().with(Dimension::Country, ["India", "Iran"]);
        let regions = run_with(&regional(), &selection, &options).regions.expect("regional view");
        assert_eq!(regions.chart, ChartKind::Treemap);
        assert_eq!(regions.title, "Litigation by Country and Top 2 Regional Groups");
        // Iran's only region is outside the top two
        assert_eq!(
            regions.data,
            ChartData::Hierarchy {
                roots: vec![TreeNode {
                    label: "India".to_string(),
                    value: 12,
                    children: vec![leaf("Ontario", 8), leaf("Quebec", 4)],
                }],
            }
        );
    }

    #[test]
    fn test_region_treemap_by_case_type() {
        let options = SelectorOptions {
            region_top: 1,
            ..SelectorOptions::default()
        };
        let selection = FilterSelection::new().with(Dimension::Category, ["Mandamus", "RAD Decisions"]);
        let regions = run_with(&regional(), &selection, &options).regions.expect("regional view");
        assert_eq!(regions.title, "Top 1 Regional Groups within Each Case Type");
        assert_eq!(
            regions.data,
            ChartData::Hierarchy {
                roots: vec![
                    TreeNode {
                        label: "Mandamus".to_string(),
                        value: 6,
                        children: vec![leaf("Ontario", 6)],
                    },
                    TreeNode {
                        label: "RAD Decisions".to_string(),
                        value: 3,
                        children: vec![leaf("Prairies", 3)],
                    },
                ],
            }
        );
    }

    #[test]
    fn test_no_region_column_skips_regional_view() {
        let dashboard = ready(run(&litigation(), &FilterSelection::new()));
        assert!(dashboard.regions.is_none());
    }

    #[test]
    fn test_decision_scatter_by_case_type() {
        let selection = FilterSelection::new().with(Dimension::Category, ["Mandamus", "RAD Decisions"]);
        let decisions = ready(run(&regional(), &selection)).decisions.expect("decision view");
        assert_eq!(decisions.chart, ChartKind::Scatter);
        assert_eq!(decisions.title, "Decision Type Distribution by Case Type (% of Total)");
        let points = match decisions.data {
            ChartData::Points { points } => points,
            other => panic!("Expected points, got {:?}", other),
        };
        let mandamus_dismissed = points
            .iter()
            .find(|p| p.group == "Mandamus" && p.label == "Dismissed")
            .expect("Mandamus/Dismissed point");
        assert!((mandamus_dismissed.percent - 60.0).abs() < 1e-9);
        assert!(points.iter().any(|p| p.group == "Overall"));
        assert!(!points.iter().any(|p| p.group == "India"));
    }

    #[test]
    fn test_country_scatter_allows_one_case_type() {
        let selection = FilterSelection::new()
            .with(Dimension::Country, ["India", "Iran"])
            .with(Dimension::Category, ["Mandamus"]);
        let decisions = ready(run(&regional(), &selection)).decisions.expect("decision view");
        assert_eq!(decisions.title, "Decision Type Distribution by Country (% of Total)");
    }

    #[test]
    fn test_pie_when_both_split() {
        let selection = FilterSelection::new()
            .with(Dimension::Country, ["India", "Iran"])
            .with(Dimension::Category, ["Mandamus", "RAD Decisions"]);
        let dashboard = ready(run(&regional(), &selection));
        assert_eq!(dashboard.decisions.map(|v| v.chart), Some(ChartKind::Pie));
        assert_eq!(dashboard.regions.map(|v| v.chart), Some(ChartKind::Bar));
    }
}
