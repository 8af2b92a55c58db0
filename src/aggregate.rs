// Aggregation library: group-and-sum helpers behind every chart

use crate::data::{DataError, Dataset, Dimension, KeyValue};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// One value per grouping column, in column order.
pub type GroupKey = Vec<KeyValue>;

/// Summed counts per group key.
///
/// Groups are kept in first-seen order, which is what `top_n` falls back on
/// to break ties.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Aggregation {
    columns: Vec<Dimension>,
    groups: Vec<(GroupKey, u64)>,
    index: HashMap<GroupKey, usize>,
}

impl Aggregation {
    pub fn columns(&self) -> &[Dimension] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Grand total across all groups.
    pub fn total(&self) -> u64 {
        self.groups.iter().map(|(_, count)| count).sum()
    }

    pub fn get(&self, key: &[KeyValue]) -> Option<u64> {
        self.index.get(key).map(|&idx| self.groups[idx].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, u64)> {
        self.groups.iter().map(|(key, count)| (key, *count))
    }

    /// Groups in ascending key order (years ascending, labels alphabetical).
    pub fn sorted_by_key(&self) -> Vec<(GroupKey, u64)> {
        let mut sorted = self.groups.clone();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        sorted
    }

    fn add(&mut self, key: GroupKey, count: u64) {
        match self.index.get(&key) {
            Some(&idx) => self.groups[idx].1 += count,
            None => {
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push((key, count));
            }
        }
    }
}

/// Group by the cross-product of `columns` and sum `count`.
///
/// Grouping by no columns yields a single empty-key group holding the grand
/// total (or nothing for an empty dataset).
pub fn sum_by(dataset: &Dataset, columns: &[Dimension]) -> Result<Aggregation, DataError> {
    if let Some(missing) = columns.iter().find(|c| !dataset.has_column(**c)) {
        return Err(DataError::MissingColumn {
            column: missing.name().to_string(),
        });
    }

    let mut aggregation = Aggregation {
        columns: columns.to_vec(),
        ..Aggregation::default()
    };
    for record in dataset {
        let key: GroupKey = columns.iter().map(|c| record.value(*c)).collect();
        aggregation.add(key, record.count);
    }
    Ok(aggregation)
}

/// The `n` largest groups by count, descending.
///
/// The sort is stable, so equal counts keep first-seen order.
pub fn top_n(aggregation: &Aggregation, n: usize) -> Vec<(GroupKey, u64)> {
    let mut ranked = aggregation.groups.clone();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(n);
    ranked
}

/// Share of each group in its aggregation's grand total.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "shares", rename_all = "snake_case")]
pub enum Percentages {
    /// The grand total was zero.
    Undefined,
    Defined(Vec<(GroupKey, f64)>),
}

impl Percentages {
    pub fn is_defined(&self) -> bool {
        matches!(self, Percentages::Defined(_))
    }

    pub fn get(&self, key: &[KeyValue]) -> Option<f64> {
        match self {
            Percentages::Undefined => None,
            Percentages::Defined(shares) => shares
                .iter()
                .find(|(k, _)| k.as_slice() == key)
                .map(|(_, pct)| *pct),
        }
    }
}

pub fn percentage_of_total(aggregation: &Aggregation) -> Percentages {
    let total = aggregation.total();
    if total == 0 {
        return Percentages::Undefined;
    }
    Percentages::Defined(
        aggregation
            .iter()
            .map(|(key, count)| (key.clone(), count as f64 / total as f64 * 100.0))
            .collect(),
    )
}

/// Sparse two-way table of summed counts. Absent cells read as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotTable {
    row_key: Dimension,
    col_key: Dimension,
    rows: Vec<KeyValue>,
    columns: Vec<KeyValue>,
    cells: HashMap<KeyValue, HashMap<KeyValue, u64>>,
}

impl PivotTable {
    pub fn row_key(&self) -> Dimension {
        self.row_key
    }

    pub fn col_key(&self) -> Dimension {
        self.col_key
    }

    /// Row labels, ascending.
    pub fn rows(&self) -> &[KeyValue] {
        &self.rows
    }

    /// Column labels, ascending.
    pub fn columns(&self) -> &[KeyValue] {
        &self.columns
    }

    pub fn get(&self, row: &KeyValue, col: &KeyValue) -> u64 {
        self.cells
            .get(row)
            .and_then(|cols| cols.get(col))
            .copied()
            .unwrap_or(0)
    }

    /// Dense values of one row, aligned with [`PivotTable::columns`].
    pub fn row_values(&self, row: &KeyValue) -> Vec<u64> {
        self.columns.iter().map(|col| self.get(row, col)).collect()
    }

    pub fn row_total(&self, row: &KeyValue) -> u64 {
        self.cells
            .get(row)
            .map(|cols| cols.values().sum())
            .unwrap_or(0)
    }
}

pub fn pivot(dataset: &Dataset, row_key: Dimension, col_key: Dimension) -> Result<PivotTable, DataError> {
    let aggregation = sum_by(dataset, &[row_key, col_key])?;

    let mut rows = BTreeSet::new();
    let mut columns = BTreeSet::new();
    let mut cells: HashMap<KeyValue, HashMap<KeyValue, u64>> = HashMap::new();
    for (key, count) in aggregation.iter() {
        let (row, col) = (key[0].clone(), key[1].clone());
        rows.insert(row.clone());
        columns.insert(col.clone());
        *cells.entry(row).or_default().entry(col).or_default() += count;
    }

    Ok(PivotTable {
        row_key,
        col_key,
        rows: rows.into_iter().collect(),
        columns: columns.into_iter().collect(),
        cells,
    })
}

/// Display label for a group key, e.g. `India / 2019`.
pub fn key_label(key: &[KeyValue]) -> String {
    if key.is_empty() {
        return "Total".to_string();
    }
    key.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" / ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Record, ResidentStatus};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn make_data() -> Dataset {
        Dataset::new(vec![
            Record::new("India", 2019, "A", 5),
            Record::new("India", 2020, "B", 3),
            Record::new("Iran", 2019, "B", 3),
            Record::new("Peru", 2020, "A", 7),
            Record::new("India", 2019, "B", 2),
        ])
    }

    fn text(s: &str) -> KeyValue {
        KeyValue::from(s)
    }

    #[test]
    fn test_sum_by_single_column() {
        let agg = sum_by(&make_data(), &[Dimension::Country]).unwrap();
        assert_eq!(agg.len(), 3);
        assert_eq!(agg.get(&[text("India")]), Some(10));
        assert_eq!(agg.get(&[text("Peru")]), Some(7));
        assert_eq!(agg.get(&[text("Chile")]), None);
        assert_eq!(agg.total(), 20);
    }

    #[test]
    fn test_sum_by_two_columns() {
        let agg = sum_by(&make_data(), &[Dimension::Country, Dimension::Year]).unwrap();
        assert_eq!(agg.get(&[text("India"), KeyValue::Year(2019)]), Some(7));
        assert_eq!(agg.columns(), &[Dimension::Country, Dimension::Year]);
    }

    #[test]
    fn test_sum_by_no_columns() {
        let agg = sum_by(&make_data(), &[]).unwrap();
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.get(&[]), Some(20));

        let empty = sum_by(&Dataset::default(), &[]).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_sum_by_absent_column_is_error() {
        let err = sum_by(&make_data(), &[Dimension::Resident]).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { .. }));
    }

    #[test]
    fn test_sum_by_optional_column_with_blanks() {
        let data = Dataset::with_columns(
            vec![
                Record::new("India", 2019, "A", 5).with_resident(ResidentStatus::Permanent),
                Record::new("India", 2019, "A", 2),
            ],
            true,
            false,
        );
        let agg = sum_by(&data, &[Dimension::Resident]).unwrap();
        assert_eq!(agg.get(&[KeyValue::Missing]), Some(2));
        assert_eq!(agg.get(&[KeyValue::from(ResidentStatus::Permanent)]), Some(5));
    }

    #[test]
    fn test_top_n_breaks_ties_by_first_seen() {
        let agg = sum_by(&make_data(), &[Dimension::Category, Dimension::Country]).unwrap();
        // A/India 5, B/India 5, B/Iran 3, A/Peru 7
        let top = top_n(&agg, 3);
        assert_eq!(
            top,
            vec![
                (vec![text("A"), text("Peru")], 7),
                (vec![text("A"), text("India")], 5),
                (vec![text("B"), text("India")], 5),
            ]
        );
        assert_eq!(top_n(&agg, 3), top);
        assert_eq!(top_n(&agg, 100).len(), agg.len());
        assert!(top_n(&agg, 0).is_empty());
    }

    #[test]
    fn test_sorted_by_key() {
        let agg = sum_by(&make_data(), &[Dimension::Year]).unwrap();
        let years: Vec<u64> = agg.sorted_by_key().into_iter().map(|(_, c)| c).collect();
        assert_eq!(years, vec![10, 10]);
        assert_eq!(agg.sorted_by_key()[0].0, vec![KeyValue::Year(2019)]);
    }

    #[test]
    fn test_percentage_of_total() {
        let agg = sum_by(&make_data(), &[Dimension::Category]).unwrap();
        let pct = percentage_of_total(&agg);
        assert!(pct.is_defined());
        assert!((pct.get(&[text("A")]).unwrap() - 60.0).abs() < 1e-9);
        assert!((pct.get(&[text("B")]).unwrap() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentage_of_empty_is_undefined() {
        let agg = sum_by(&Dataset::default(), &[Dimension::Country]).unwrap();
        assert_eq!(percentage_of_total(&agg), Percentages::Undefined);

        let zeros = Dataset::new(vec![Record::new("India", 2019, "A", 0)]);
        let agg = sum_by(&zeros, &[Dimension::Country]).unwrap();
        assert_eq!(percentage_of_total(&agg), Percentages::Undefined);
    }

    #[test]
    fn test_pivot_fills_missing_with_zero() {
        let table = pivot(&make_data(), Dimension::Country, Dimension::Year).unwrap();
        assert_eq!(table.rows(), &[text("India"), text("Iran"), text("Peru")]);
        assert_eq!(table.columns(), &[KeyValue::Year(2019), KeyValue::Year(2020)]);
        assert_eq!(table.get(&text("Iran"), &KeyValue::Year(2020)), 0);
        assert_eq!(table.row_values(&text("India")), vec![7, 3]);
        assert_eq!(table.row_values(&text("Peru")), vec![0, 7]);
        assert_eq!(table.row_total(&text("India")), 10);
        assert_eq!(table.get(&text("Chile"), &KeyValue::Year(2019)), 0);
    }

    #[test]
    fn test_key_label() {
        assert_eq!(key_label(&[text("India"), KeyValue::Year(2019)]), "India / 2019");
        assert_eq!(key_label(&[]), "Total");
    }

    fn arb_dataset() -> impl Strategy<Value = Dataset> {
        prop::collection::vec(
            (
                prop::sample::select(vec!["India", "Iran", "Nigeria", "Peru"]),
                2015..2022i32,
                prop::sample::select(vec!["A", "B", "C"]),
                0..100u64,
            )
                .prop_map(|(country, year, category, count)| Record::new(country, year, category, count)),
            0..60,
        )
        .prop_map(Dataset::new)
    }

    proptest! {
        #[test]
        fn prop_grand_total_invariant_under_regrouping(data in arb_dataset()) {
            let total = sum_by(&data, &[]).unwrap().total();
            prop_assert_eq!(total, data.total());
            for columns in [
                vec![Dimension::Country],
                vec![Dimension::Year],
                vec![Dimension::Category, Dimension::Country],
                vec![Dimension::Country, Dimension::Year, Dimension::Category],
            ] {
                prop_assert_eq!(sum_by(&data, &columns).unwrap().total(), total);
            }
        }

        #[test]
        fn prop_top_n_sorted_and_bounded(data in arb_dataset(), n in 0..8usize) {
            let agg = sum_by(&data, &[Dimension::Country, Dimension::Category]).unwrap();
            let top = top_n(&agg, n);
            prop_assert!(top.len() <= n);
            prop_assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));
            prop_assert_eq!(top_n(&agg, n), top);
        }

        #[test]
        fn prop_percentages_sum_to_hundred(data in arb_dataset()) {
            let agg = sum_by(&data, &[Dimension::Country]).unwrap();
            match percentage_of_total(&agg) {
                Percentages::Defined(shares) => {
                    let sum: f64 = shares.iter().map(|(_, p)| p).sum();
                    prop_assert!((sum - 100.0).abs() < 1e-6);
                }
                Percentages::Undefined => prop_assert_eq!(agg.total(), 0),
            }
        }
    }
}
