use std::io::Write;
use std::path::Path;

use log::debug;

use super::model::{CellValue, Dataset};
use super::schema::{ColumnKind, Schema};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Load a CSV file with a header row into a [`Dataset`].
///
/// Cells are typed by the column's kind in `schema`; columns the schema does
/// not know are read as text. A numeric cell that fails to parse is kept as
/// `Text` rather than rejected, so malformed values flow through to the
/// query engine, which ignores them when averaging.
pub fn load_csv(path: &Path, schema: &Schema) -> Result<Dataset> {
    if !path.exists() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let kinds: Vec<ColumnKind> = columns.iter().map(|c| schema.kind_of(c)).collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| parse_cell(record.get(i).unwrap_or(""), *kind))
            .collect();
        rows.push(row);
    }

    debug!("loaded {} rows x {} columns from {}", rows.len(), columns.len(), path.display());
    Ok(Dataset::new(columns, rows))
}

fn parse_cell(s: &str, kind: ColumnKind) -> CellValue {
    if s.trim().is_empty() {
        return CellValue::Null;
    }
    match kind {
        ColumnKind::Text => CellValue::Text(s.to_string()),
        ColumnKind::Integer => {
            let t = s.trim();
            if let Ok(i) = t.parse::<i64>() {
                CellValue::Integer(i)
            } else if let Ok(f) = t.parse::<f64>() {
                CellValue::Float(f)
            } else {
                CellValue::Text(s.to_string())
            }
        }
        ColumnKind::Float => match s.trim().parse::<f64>() {
            Ok(f) => CellValue::Float(f),
            Err(_) => CellValue::Text(s.to_string()),
        },
    }
}

// ---------------------------------------------------------------------------
// CSV writer
// ---------------------------------------------------------------------------

/// Write a dataset as CSV with a header row. Null cells become empty fields.
pub fn write_csv<W: Write>(dataset: &Dataset, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&dataset.columns)?;
    for row in &dataset.rows {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| Error::io("<csv output>", e))?;
    Ok(())
}
