use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Failures while loading or aggregating a dataset.
///
/// These are precondition failures: an empty filter result is never one of them.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("column '{column}' not found")]
    MissingColumn { column: String },
    #[error("row {row}: invalid {column} value '{value}'")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
    #[error("input contains no data rows")]
    Empty,
    #[error("input data must be a JSON array of objects")]
    JsonShape,
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to read JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A categorical column usable as a filter or grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Country,
    Year,
    Category,
    Resident,
    Decision,
    Region,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Country,
        Dimension::Year,
        Dimension::Category,
        Dimension::Resident,
        Dimension::Decision,
        Dimension::Region,
    ];

    /// Dimensions that drive view selection.
    pub const PRIMARY: [Dimension; 3] = [Dimension::Country, Dimension::Year, Dimension::Category];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::Country => "country",
            Dimension::Year => "year",
            Dimension::Category => "category",
            Dimension::Resident => "resident",
            Dimension::Decision => "decision",
            Dimension::Region => "region",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResidentStatus {
    Permanent,
    Temporary,
}

impl ResidentStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "permanent" | "permanent resident" | "pr" | "p" => Some(ResidentStatus::Permanent),
            "temporary" | "temporary resident" | "tr" | "t" => Some(ResidentStatus::Temporary),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResidentStatus::Permanent => "Permanent",
            ResidentStatus::Temporary => "Temporary",
        }
    }
}

impl fmt::Display for ResidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The value of one dimension for one record.
///
/// `Missing` stands for an optional column (resident, decision, region) left blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum KeyValue {
    Missing,
    Year(i32),
    Text(String),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Missing => f.write_str("(none)"),
            KeyValue::Year(y) => write!(f, "{}", y),
            KeyValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Text(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::Text(value)
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        KeyValue::Year(value)
    }
}

impl From<ResidentStatus> for KeyValue {
    fn from(value: ResidentStatus) -> Self {
        KeyValue::Text(value.label().to_string())
    }
}

/// One row of the source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub country: String,
    pub year: i32,
    pub category: String,
    pub resident: Option<ResidentStatus>,
    pub decision: Option<String>,
    pub region: Option<String>,
    pub count: u64,
}

impl Record {
    pub fn new(country: impl Into<String>, year: i32, category: impl Into<String>, count: u64) -> Self {
        Self {
            country: country.into(),
            year,
            category: category.into(),
            resident: None,
            decision: None,
            region: None,
            count,
        }
    }

    pub fn with_resident(mut self, resident: ResidentStatus) -> Self {
        self.resident = Some(resident);
        self
    }

    pub fn with_decision(mut self, decision: impl Into<String>) -> Self {
        self.decision = Some(decision.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn value(&self, dimension: Dimension) -> KeyValue {
        match dimension {
            Dimension::Country => KeyValue::Text(self.country.clone()),
            Dimension::Year => KeyValue::Year(self.year),
            Dimension::Category => KeyValue::Text(self.category.clone()),
            Dimension::Resident => self.resident.map(KeyValue::from).unwrap_or(KeyValue::Missing),
            Dimension::Decision => self
                .decision
                .clone()
                .map(KeyValue::Text)
                .unwrap_or(KeyValue::Missing),
            Dimension::Region => self
                .region
                .clone()
                .map(KeyValue::Text)
                .unwrap_or(KeyValue::Missing),
        }
    }
}

/// An immutable, ordered sequence of records.
///
/// Also remembers whether the source carried the optional resident, decision
/// and region columns, so grouping by an absent column can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dataset {
    records: Vec<Record>,
    has_resident: bool,
    has_decision: bool,
    has_region: bool,
}

impl Dataset {
    /// Build a dataset, inferring the optional columns from the records.
    pub fn new(records: Vec<Record>) -> Self {
        let has_resident = records.iter().any(|r| r.resident.is_some());
        let has_decision = records.iter().any(|r| r.decision.is_some());
        let has_region = records.iter().any(|r| r.region.is_some());
        Self::with_columns(records, has_resident, has_decision).with_region_column(has_region)
    }

    pub fn with_columns(records: Vec<Record>, has_resident: bool, has_decision: bool) -> Self {
        Self {
            records,
            has_resident,
            has_decision,
            has_region: false,
        }
    }

    pub fn with_region_column(mut self, has_region: bool) -> Self {
        self.has_region = has_region;
        self
    }

    /// A dataset over `records` that keeps this dataset's column layout.
    pub(crate) fn derive(&self, records: Vec<Record>) -> Self {
        Self::with_columns(records, self.has_resident, self.has_decision).with_region_column(self.has_region)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_resident(&self) -> bool {
        self.has_resident
    }

    pub fn has_decision(&self) -> bool {
        self.has_decision
    }

    pub fn has_region(&self) -> bool {
        self.has_region
    }

    pub fn has_column(&self, dimension: Dimension) -> bool {
        match dimension {
            Dimension::Resident => self.has_resident,
            Dimension::Decision => self.has_decision,
            Dimension::Region => self.has_region,
            _ => true,
        }
    }

    pub fn total(&self) -> u64 {
        self.records.iter().map(|r| r.count).sum()
    }

    pub fn from_csv_reader<R: Read>(
        reader: R,
        columns: &ColumnMap,
        options: &LoadOptions,
    ) -> Result<Self, DataError> {
        RawTable::from_csv(reader)?.into_dataset(columns, options)
    }

    pub fn from_csv_path(
        path: impl AsRef<Path>,
        columns: &ColumnMap,
        options: &LoadOptions,
    ) -> Result<Self, DataError> {
        let file = File::open(path.as_ref())?;
        Self::from_csv_reader(file, columns, options)
    }

    /// Load from a JSON array of objects, one object per row.
    pub fn from_json(value: &Value, columns: &ColumnMap, options: &LoadOptions) -> Result<Self, DataError> {
        RawTable::from_json(value)?.into_dataset(columns, options)
    }

    pub fn from_json_path(
        path: impl AsRef<Path>,
        columns: &ColumnMap,
        options: &LoadOptions,
    ) -> Result<Self, DataError> {
        let file = File::open(path.as_ref())?;
        let value: Value = serde_json::from_reader(file)?;
        Self::from_json(&value, columns, options)
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Source column names for each record field.
///
/// Deserializes either from a preset name (`"a34"`, `"litigation"`) or from
/// an explicit object.
///
/// A configured resident or decision column must be present in the input.
/// The region column is looked up leniently: extracts without it load with
/// no regional breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ColumnMapRepr")]
pub struct ColumnMap {
    pub country: String,
    pub year: String,
    pub category: String,
    pub count: String,
    pub resident: Option<String>,
    pub decision: Option<String>,
    pub region: Option<String>,
}

impl ColumnMap {
    /// Layout of the cleaned A34 inadmissibility refusal extract.
    pub fn a34() -> Self {
        Self {
            country: "country".to_string(),
            year: "year".to_string(),
            category: "cor_status".to_string(),
            count: "count".to_string(),
            resident: Some("resident".to_string()),
            decision: None,
            region: None,
        }
    }

    /// Layout of the litigation case extract.
    pub fn litigation() -> Self {
        Self {
            country: "Country of Citizenship".to_string(),
            year: "LIT Leave Decision Date - Year".to_string(),
            category: "LIT Case Type Group Desc".to_string(),
            count: "LIT Litigation Count".to_string(),
            resident: None,
            decision: Some("LIT Leave Decision Desc".to_string()),
            region: Some("LIT Primary Office Regional Group Desc".to_string()),
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "a34" => Some(Self::a34()),
            "litigation" => Some(Self::litigation()),
            _ => None,
        }
    }
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self::a34()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnMapRepr {
    Preset(String),
    Explicit(ExplicitColumns),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ExplicitColumns {
    country: String,
    year: String,
    category: String,
    count: String,
    #[serde(default)]
    resident: Option<String>,
    #[serde(default)]
    decision: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

impl TryFrom<ColumnMapRepr> for ColumnMap {
    type Error = String;

    fn try_from(repr: ColumnMapRepr) -> Result<Self, Self::Error> {
        match repr {
            ColumnMapRepr::Preset(name) => {
                ColumnMap::preset(&name).ok_or_else(|| format!("unknown column preset '{}'", name))
            }
            ColumnMapRepr::Explicit(c) => Ok(ColumnMap {
                country: c.country,
                year: c.year,
                category: c.category,
                count: c.count,
                resident: c.resident,
                decision: c.decision,
                region: c.region,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadOptions {
    /// Skip rows with unparseable values instead of failing the load.
    #[serde(default)]
    pub skip_invalid_rows: bool,
    #[serde(default = "default_normalize_decisions")]
    pub normalize_decisions: bool,
}

fn default_normalize_decisions() -> bool {
    true
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            skip_invalid_rows: false,
            normalize_decisions: true,
        }
    }
}

const EXCLUDED_DECISIONS: [&str; 3] = ["Not Started at Leave", "No Leave Required", "Leave Exception"];
const COLLAPSED_DECISIONS: [&str; 3] = ["Discontinued", "Dismissed", "Allowed"];

/// Collapse decision variants to their base label.
///
/// Returns `None` for decisions that never reached leave and are excluded.
pub fn normalize_decision(label: &str) -> Option<String> {
    let label = label.trim();
    if EXCLUDED_DECISIONS.contains(&label) {
        return None;
    }
    let collapsed = COLLAPSED_DECISIONS
        .iter()
        .find(|prefix| label.starts_with(*prefix))
        .copied()
        .unwrap_or(label);
    Some(collapsed.to_string())
}

/// Untyped header + rows, the common shape of CSV and JSON input.
#[derive(Debug, Clone)]
struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    fn from_csv<R: Read>(reader: R) -> Result<Self, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(String::from).collect());
        }
        Ok(Self { headers, rows })
    }

    fn from_json(value: &Value) -> Result<Self, DataError> {
        let array = value.as_array().ok_or(DataError::JsonShape)?;
        if array.is_empty() {
            return Err(DataError::Empty);
        }
        let objects = array
            .iter()
            .map(|item| item.as_object().ok_or(DataError::JsonShape))
            .collect::<Result<Vec<_>, _>>()?;

        // Serializers often drop null fields, so any row may introduce a key
        let mut headers: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for obj in &objects {
            for key in obj.keys() {
                if seen.insert(key.as_str()) {
                    headers.push(key.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(objects.len());
        for (idx, obj) in objects.iter().enumerate() {
            let mut row = Vec::with_capacity(headers.len());
            for header in &headers {
                let cell = match obj.get(header) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::Bool(b)) => b.to_string(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => {
                        return Err(DataError::InvalidValue {
                            row: idx + 1,
                            column: header.clone(),
                            value: other.to_string(),
                        })
                    }
                };
                row.push(cell);
            }
            rows.push(row);
        }
        Ok(Self { headers, rows })
    }

    fn into_dataset(self, columns: &ColumnMap, options: &LoadOptions) -> Result<Dataset, DataError> {
        let idx = ColumnIndices::resolve(&self.headers, columns)?;
        if self.rows.iter().all(|row| is_blank(row)) {
            return Err(DataError::Empty);
        }

        let mut records = Vec::with_capacity(self.rows.len());
        let mut skipped = 0usize;
        let mut excluded = 0usize;

        for (i, row) in self.rows.iter().enumerate() {
            if is_blank(row) {
                continue;
            }
            let mut record = match idx.parse_row(row, i + 1, columns) {
                Ok(record) => record,
                Err(err) if options.skip_invalid_rows => {
                    warn!("Skipping row: {}", err);
                    skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            if options.normalize_decisions {
                if let Some(decision) = record.decision.take() {
                    match normalize_decision(&decision) {
                        Some(label) => record.decision = Some(label),
                        None => {
                            excluded += 1;
                            continue;
                        }
                    }
                }
            }
            records.push(record);
        }

        info!(
            "Loaded {} records ({} skipped, {} excluded by decision)",
            records.len(),
            skipped,
            excluded
        );

        Ok(Dataset::with_columns(records, idx.resident.is_some(), idx.decision.is_some())
            .with_region_column(idx.region.is_some()))
    }
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

struct ColumnIndices {
    country: usize,
    year: usize,
    category: usize,
    count: usize,
    resident: Option<usize>,
    decision: Option<usize>,
    region: Option<usize>,
}

impl ColumnIndices {
    fn resolve(headers: &[String], columns: &ColumnMap) -> Result<Self, DataError> {
        Ok(Self {
            country: find_col_index(headers, &columns.country)?,
            year: find_col_index(headers, &columns.year)?,
            category: find_col_index(headers, &columns.category)?,
            count: find_col_index(headers, &columns.count)?,
            resident: columns
                .resident
                .as_deref()
                .map(|name| find_col_index(headers, name))
                .transpose()?,
            decision: columns
                .decision
                .as_deref()
                .map(|name| find_col_index(headers, name))
                .transpose()?,
            region: columns.region.as_deref().and_then(|name| {
                let found = find_col_index(headers, name).ok();
                if found.is_none() {
                    debug!("Region column '{}' not present, skipping regional breakdown", name);
                }
                found
            }),
        })
    }

    fn parse_row(&self, row: &[String], row_no: usize, columns: &ColumnMap) -> Result<Record, DataError> {
        let cell = |idx: usize| row.get(idx).map(|s| s.trim()).unwrap_or("");
        let invalid = |column: &str, value: &str| DataError::InvalidValue {
            row: row_no,
            column: column.to_string(),
            value: value.to_string(),
        };

        let year_raw = cell(self.year);
        let year = parse_year(year_raw).ok_or_else(|| invalid(&columns.year, year_raw))?;

        let count_raw = cell(self.count);
        let count = parse_count(count_raw).ok_or_else(|| invalid(&columns.count, count_raw))?;

        let resident = match self.resident {
            Some(idx) if !cell(idx).is_empty() => {
                let raw = cell(idx);
                let column = columns.resident.as_deref().unwrap_or("resident");
                Some(ResidentStatus::parse(raw).ok_or_else(|| invalid(column, raw))?)
            }
            _ => None,
        };

        let decision = self
            .decision
            .map(cell)
            .filter(|s| !s.is_empty())
            .map(String::from);
        let region = self.region.map(cell).filter(|s| !s.is_empty()).map(String::from);

        Ok(Record {
            country: cell(self.country).to_string(),
            year,
            category: cell(self.category).to_string(),
            resident,
            decision,
            region,
            count,
        })
    }
}

fn find_col_index(headers: &[String], name: &str) -> Result<usize, DataError> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| DataError::MissingColumn {
            column: name.to_string(),
        })
}

/// Years may arrive as `2019` or, from spreadsheet exports, `2019.0`.
pub(crate) fn parse_year(raw: &str) -> Option<i32> {
    if let Ok(year) = raw.parse::<i32>() {
        return Some(year);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.fract() == 0.0 && value >= i32::MIN as f64 && value <= i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}

/// Blank counts read as zero.
fn parse_count(raw: &str) -> Option<u64> {
    if raw.is_empty() {
        return Some(0);
    }
    if let Ok(count) = raw.parse::<u64>() {
        return Some(count);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.fract() == 0.0 && value >= 0.0 && value <= u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}
