// Filter engine: set-membership predicates per dimension

use crate::data::{parse_year, Dataset, Dimension, KeyValue, Record, ResidentStatus};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Accepted values per dimension.
///
/// A dimension without an entry (or with an empty set) is unrestricted.
/// Clearing a dimension makes it unrestricted again; it is never excluded.
///
/// Years may also be accepted through inclusive ranges, stored as bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    accepted: BTreeMap<Dimension, BTreeSet<KeyValue>>,
    year_ranges: BTreeSet<(i32, i32)>,
}

/// Bring a value into the form records carry for `dimension`: years as
/// numbers, resident aliases as their label. Anything else is kept as given
/// and simply matches nothing.
fn coerce(dimension: Dimension, value: KeyValue) -> KeyValue {
    match (dimension, value) {
        (Dimension::Year, KeyValue::Text(text)) => match parse_year(text.trim()) {
            Some(year) => KeyValue::Year(year),
            None => KeyValue::Text(text),
        },
        (Dimension::Resident, KeyValue::Text(text)) => match ResidentStatus::parse(&text) {
            Some(status) => KeyValue::from(status),
            None => KeyValue::Text(text),
        },
        (_, value) => value,
    }
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`FilterSelection::set`].
    pub fn with<I, V>(mut self, dimension: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<KeyValue>,
    {
        self.set(dimension, values);
        self
    }

    /// Replace the accepted values for `dimension`.
    pub fn set<I, V>(&mut self, dimension: Dimension, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<KeyValue>,
    {
        self.clear_dimension(dimension);
        self.extend(dimension, values);
    }

    /// Builder form of [`FilterSelection::add_year_range`].
    pub fn with_year_range(mut self, lo: i32, hi: i32) -> Self {
        self.add_year_range(lo, hi);
        self
    }

    /// Also accept every year in `lo..=hi`. A reversed range accepts nothing
    /// and leaves the selection unchanged.
    pub fn add_year_range(&mut self, lo: i32, hi: i32) {
        if lo == hi {
            self.extend(Dimension::Year, [lo]);
        } else if lo < hi {
            self.year_ranges.insert((lo, hi));
        }
    }

    pub fn year_ranges(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.year_ranges.iter().copied()
    }

    /// Add accepted values for `dimension`, keeping the existing ones.
    pub fn extend<I, V>(&mut self, dimension: Dimension, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<KeyValue>,
    {
        let values: BTreeSet<KeyValue> = values
            .into_iter()
            .map(|value| coerce(dimension, value.into()))
            .collect();
        if values.is_empty() {
            return;
        }
        self.accepted.entry(dimension).or_default().extend(values);
    }

    /// Union another selection into this one.
    pub fn merge(&mut self, other: FilterSelection) {
        for (dimension, values) in other.accepted {
            self.extend(dimension, values);
        }
        self.year_ranges.extend(other.year_ranges);
    }

    pub fn clear_dimension(&mut self, dimension: Dimension) {
        self.accepted.remove(&dimension);
        if dimension == Dimension::Year {
            self.year_ranges.clear();
        }
    }

    pub fn clear(&mut self) {
        self.accepted.clear();
        self.year_ranges.clear();
    }

    /// The accepted values, or `None` when none were listed. Year ranges
    /// are not included; see [`FilterSelection::year_ranges`].
    pub fn accepted(&self, dimension: Dimension) -> Option<&BTreeSet<KeyValue>> {
        self.accepted.get(&dimension).filter(|set| !set.is_empty())
    }

    /// Number of listed values for `dimension` (0 when unrestricted).
    pub fn selected_count(&self, dimension: Dimension) -> usize {
        self.accepted(dimension).map_or(0, BTreeSet::len)
    }

    pub fn is_active(&self, dimension: Dimension) -> bool {
        self.accepted(dimension).is_some() || (dimension == Dimension::Year && !self.year_ranges.is_empty())
    }

    pub fn active_dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        Dimension::ALL.into_iter().filter(move |dimension| self.is_active(*dimension))
    }

    pub fn is_unrestricted(&self) -> bool {
        self.active_dimensions().next().is_none()
    }

    fn accepts(&self, dimension: Dimension, record: &Record) -> bool {
        let listed = self
            .accepted(dimension)
            .map_or(false, |set| set.contains(&record.value(dimension)));
        listed
            || (dimension == Dimension::Year
                && self.year_ranges.iter().any(|&(lo, hi)| lo <= record.year && record.year <= hi))
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.active_dimensions().all(|dimension| self.accepts(dimension, record))
    }

    /// Short human-readable notice, e.g. `country: 2 selected | year: 2018..2020`.
    pub fn describe(&self) -> String {
        if self.is_unrestricted() {
            return "No filters selected - showing all data".to_string();
        }
        self.active_dimensions()
            .map(|dimension| {
                let mut parts = Vec::new();
                if let Some(set) = self.accepted(dimension) {
                    parts.push(format!("{} selected", set.len()));
                }
                if dimension == Dimension::Year {
                    parts.extend(self.year_ranges.iter().map(|(lo, hi)| format!("{}..{}", lo, hi)));
                }
                format!("{}: {}", dimension, parts.join(", "))
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Keep the records accepted by every active dimension of `selection`.
///
/// Values within a dimension are OR-ed, dimensions are AND-ed. Unknown values
/// simply match nothing.
pub fn apply(dataset: &Dataset, selection: &FilterSelection) -> Dataset {
    if selection.is_unrestricted() {
        return dataset.clone();
    }

    let records = dataset
        .iter()
        .filter(|record| selection.matches(record))
        .cloned()
        .collect::<Vec<_>>();

    debug!(
        "Filter kept {} of {} records ({})",
        records.len(),
        dataset.len(),
        selection.describe()
    );

    dataset.derive(records)
}
