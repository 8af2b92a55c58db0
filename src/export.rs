// CSV export of a (filtered) dataset

use crate::data::{ColumnMap, DataError, Dataset};
use std::io::Write;

/// Write `dataset` as CSV with headers taken from `columns`, so the output
/// loads back with the same column map.
///
/// Column order: country, year, category, then resident, decision and region
/// when the dataset carries them, then count.
pub fn write_csv<W: Write>(dataset: &Dataset, columns: &ColumnMap, writer: W) -> Result<(), DataError> {
    let mut out = csv::Writer::from_writer(writer);

    let resident = dataset
        .has_resident()
        .then(|| columns.resident.as_deref().unwrap_or("resident"));
    let decision = dataset
        .has_decision()
        .then(|| columns.decision.as_deref().unwrap_or("decision"));
    let region = dataset
        .has_region()
        .then(|| columns.region.as_deref().unwrap_or("region"));

    let mut header = vec![columns.country.as_str(), columns.year.as_str(), columns.category.as_str()];
    header.extend(resident);
    header.extend(decision);
    header.extend(region);
    header.push(columns.count.as_str());
    out.write_record(&header)?;

    for record in dataset {
        let mut row = vec![record.country.clone(), record.year.to_string(), record.category.clone()];
        if resident.is_some() {
            row.push(record.resident.map(|r| r.label().to_string()).unwrap_or_default());
        }
        if decision.is_some() {
            row.push(record.decision.clone().unwrap_or_default());
        }
        if region.is_some() {
            row.push(record.region.clone().unwrap_or_default());
        }
        row.push(record.count.to_string());
        out.write_record(&row)?;
    }

    out.flush()?;
    Ok(())
}

pub fn to_csv_string(dataset: &Dataset, columns: &ColumnMap) -> Result<String, DataError> {
    let mut buffer = Vec::new();
    write_csv(dataset, columns, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
