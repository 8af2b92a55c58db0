// Runtime orchestration: load, filter, select, render

use crate::data::{ColumnMap, Dataset, Dimension, KeyValue, LoadOptions};
use crate::export;
use crate::filter::{self, FilterSelection};
use crate::graph;
use crate::ir::{Dashboard, Outcome};
use crate::parser::parse_selection;
use crate::select::select_views;
use crate::{RenderOptions, SelectorOptions};
use anyhow::{bail, Context, Result};
use log::info;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Load a CSV or JSON file, chosen by extension
pub fn load_dataset(path: &Path, columns: &ColumnMap, load: &LoadOptions) -> Result<Dataset> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let dataset = match extension.as_str() {
        "csv" => Dataset::from_csv_path(path, columns, load),
        "json" => Dataset::from_json_path(path, columns, load),
        "xlsx" | "xls" => bail!(
            "Excel input is not supported; export {} to CSV first",
            path.display()
        ),
        other => bail!("Unsupported input format '{}' for {}", other, path.display()),
    }
    .with_context(|| format!("Failed to load {}", path.display()))?;

    info!("Loaded {} records from {}", dataset.len(), path.display());
    Ok(dataset)
}

/// One recomputation pass: filter the source, then pick and build the views
pub fn build_dashboard(source: &Dataset, selection: &FilterSelection, options: &SelectorOptions) -> Result<Outcome> {
    let filtered = filter::apply(source, selection);
    select_views(source, &filtered, selection, options).context("Failed to build dashboard views")
}

/// Per-viewer state: a shared read-only source and this viewer's filters.
#[derive(Debug, Clone)]
pub struct Session {
    source: Arc<Dataset>,
    selection: FilterSelection,
    options: SelectorOptions,
}

impl Session {
    pub fn new(source: Arc<Dataset>, options: SelectorOptions) -> Self {
        Self {
            source,
            selection: FilterSelection::new(),
            options,
        }
    }

    pub fn source(&self) -> &Dataset {
        &self.source
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    /// Replace the accepted values of one dimension. An empty list clears it.
    pub fn set_filter<I, V>(&mut self, dimension: Dimension, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<KeyValue>,
    {
        self.selection.set(dimension, values);
    }

    /// Merge a textual filter expression into the current selection
    pub fn apply_expression(&mut self, expression: &str) -> Result<()> {
        let parsed = parse_selection(expression)?;
        self.selection.merge(parsed);
        Ok(())
    }

    pub fn clear_filters(&mut self) {
        self.selection.clear();
    }

    pub fn filtered(&self) -> Dataset {
        filter::apply(&self.source, &self.selection)
    }

    pub fn dashboard(&self) -> Result<Outcome> {
        build_dashboard(&self.source, &self.selection, &self.options)
    }

    /// Write the currently filtered records as CSV
    pub fn export_csv<W: Write>(&self, columns: &ColumnMap, writer: W) -> Result<()> {
        export::write_csv(&self.filtered(), columns, writer).context("Failed to export CSV")
    }
}

fn slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Render every view of a dashboard. Returns `(file name, bytes)` pairs named
/// `NN-title.ext` in display order.
pub fn render_dashboard(dashboard: &Dashboard, options: &RenderOptions) -> Result<Vec<(String, Vec<u8>)>> {
    let mut rendered = Vec::new();
    for (idx, view) in dashboard.all_views().iter().enumerate() {
        let name = format!("{:02}-{}.{}", idx + 1, slug(&view.title), options.format.extension());
        let bytes = graph::render_view(view, options).with_context(|| format!("Failed to render '{}'", view.title))?;
        rendered.push((name, bytes));
    }
    Ok(rendered)
}
