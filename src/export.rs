use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use log::{info, warn};
use parquet::arrow::ArrowWriter;

use crate::data::model::{AnnotatedTable, Blanked};

// ---------------------------------------------------------------------------
// Columnar view of an AnnotatedTable
// ---------------------------------------------------------------------------

enum Column {
    Utf8(Vec<String>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
}

impl Column {
    fn data_type(&self) -> DataType {
        match self {
            Column::Utf8(_) => DataType::Utf8,
            Column::Int64(_) => DataType::Int64,
            Column::Float64(_) => DataType::Float64,
        }
    }

    fn cell(&self, row: usize) -> String {
        match self {
            Column::Utf8(v) => v[row].clone(),
            Column::Int64(v) => v[row].to_string(),
            Column::Float64(v) => v[row].to_string(),
        }
    }

    fn into_array(self) -> ArrayRef {
        match self {
            Column::Utf8(v) => Arc::new(StringArray::from(v)),
            Column::Int64(v) => Arc::new(Int64Array::from(v)),
            Column::Float64(v) => Arc::new(Float64Array::from(v)),
        }
    }
}

const FIXED_COLUMNS: [&str; 13] = [
    "Well",
    "Row",
    "Column",
    "Repeat",
    "Time",
    "Seconds",
    "Excitation",
    "Emission",
    "Wavelength",
    "Value",
    "Label",
    "Background",
    "BackgroundSubtracted",
];

/// Named columns in output order. `Time` is fractional seconds.
fn columns(table: &AnnotatedTable) -> Vec<(String, Column)> {
    let rows = &table.rows;
    let utf8 = |f: &dyn Fn(usize) -> String| Column::Utf8((0..rows.len()).map(f).collect());

    let mut cols = vec![
        ("Well".to_string(), utf8(&|i| rows[i].well().to_string())),
        ("Row".to_string(), utf8(&|i| rows[i].well().row().to_string())),
        (
            "Column".to_string(),
            Column::Int64(rows.iter().map(|r| i64::from(r.well().column())).collect()),
        ),
        (
            "Repeat".to_string(),
            Column::Int64(rows.iter().map(|r| i64::from(r.reading.repeat)).collect()),
        ),
        (
            "Time".to_string(),
            Column::Float64(rows.iter().map(|r| r.reading.time.as_secs_f64()).collect()),
        ),
        (
            "Seconds".to_string(),
            Column::Int64(
                rows.iter()
                    .map(|r| i64::try_from(r.reading.seconds).unwrap_or(i64::MAX))
                    .collect(),
            ),
        ),
        ("Excitation".to_string(), utf8(&|i| rows[i].reading.excitation.clone())),
        ("Emission".to_string(), utf8(&|i| rows[i].reading.emission.clone())),
        ("Wavelength".to_string(), utf8(&|i| rows[i].reading.wavelength.clone())),
        (
            "Value".to_string(),
            Column::Float64(rows.iter().map(|r| r.reading.value).collect()),
        ),
        ("Label".to_string(), utf8(&|i| rows[i].label.to_string())),
    ];

    for name in table.metadata_columns() {
        if FIXED_COLUMNS.contains(&name.as_str()) {
            warn!("Plate map column '{name}' clashes with a reading column, not exported");
            continue;
        }
        let col = utf8(&|i| {
            rows[i]
                .metadata
                .get(&name)
                .map(|v| v.to_string())
                .unwrap_or_default()
        });
        cols.push((name, col));
    }

    if table.is_blanked() {
        let blanked = |f: fn(&Blanked) -> f64| {
            Column::Float64(
                rows.iter()
                    .map(|r| r.blanked.as_ref().map(f).unwrap_or(f64::NAN))
                    .collect(),
            )
        };
        cols.push(("Background".to_string(), blanked(|b| b.background)));
        cols.push(("BackgroundSubtracted".to_string(), blanked(|b| b.subtracted)));
    }
    cols
}

// ---------------------------------------------------------------------------
// Arrow / Parquet / CSV
// ---------------------------------------------------------------------------

/// Convert the table into a single Arrow record batch.
pub fn to_record_batch(table: &AnnotatedTable) -> Result<RecordBatch> {
    let cols = columns(table);
    let schema = Arc::new(Schema::new(
        cols.iter()
            .map(|(name, col)| Field::new(name, col.data_type(), false))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = cols.into_iter().map(|(_, col)| col.into_array()).collect();
    RecordBatch::try_new(schema, arrays).context("building record batch")
}

pub fn write_parquet(table: &AnnotatedTable, path: &Path) -> Result<()> {
    let batch = to_record_batch(table)?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

pub fn write_csv(table: &AnnotatedTable, path: &Path) -> Result<()> {
    let cols = columns(table);
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer
        .write_record(cols.iter().map(|(name, _)| name.as_str()))
        .context("writing CSV header")?;
    for row in 0..table.len() {
        writer
            .write_record(cols.iter().map(|(_, col)| col.cell(row)))
            .with_context(|| format!("writing CSV row {row}"))?;
    }
    writer.flush().context("flushing CSV")?;
    info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Pretty-printed first `n` rows.
pub fn head(table: &AnnotatedTable, n: usize) -> Result<String> {
    let batch = to_record_batch(table)?;
    let batch = batch.slice(0, n.min(batch.num_rows()));
    let rendered = pretty_format_batches(&[batch]).context("formatting table")?;
    Ok(rendered.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use crate::data::model::{AnnotatedReading, CellValue, Reading};

    fn table(blanked: bool) -> AnnotatedTable {
        let rows = (1..=3)
            .map(|repeat| AnnotatedReading {
                reading: Reading {
                    well: "C:6".parse().unwrap(),
                    repeat,
                    time: Duration::from_millis(u64::from(repeat) * 1500),
                    seconds: u64::from(repeat) * 3 / 2,
                    excitation: "485".to_string(),
                    emission: "535".to_string(),
                    wavelength: "485,535".to_string(),
                    value: 10.0 * f64::from(repeat),
                },
                label: CellValue::Integer(0),
                metadata: BTreeMap::from([("Inducer".to_string(), CellValue::Float(0.5))]),
                blanked: blanked.then_some(Blanked {
                    background: 1.0,
                    subtracted: 10.0 * f64::from(repeat) - 1.0,
                }),
            })
            .collect();
        AnnotatedTable {
            rows,
            blank: blanked.then(|| "B:16".parse().unwrap()),
        }
    }

    fn names(batch: &RecordBatch) -> Vec<String> {
        batch.schema().fields().iter().map(|f| f.name().clone()).collect()
    }

    #[test]
    fn batch_has_reading_and_metadata_columns() {
        let batch = to_record_batch(&table(false)).unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(
            names(&batch),
            vec![
                "Well", "Row", "Column", "Repeat", "Time", "Seconds", "Excitation", "Emission",
                "Wavelength", "Value", "Label", "Inducer"
            ]
        );
    }

    #[test]
    fn blanked_batch_adds_background_columns() {
        let batch = to_record_batch(&table(true)).unwrap();
        let names = names(&batch);
        assert_eq!(&names[names.len() - 2..], ["Background", "BackgroundSubtracted"]);

        let subtracted = batch
            .column(names.len() - 1)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(subtracted.values().to_vec(), vec![9.0, 19.0, 29.0]);
    }

    #[test]
    fn head_renders_requested_rows() {
        let text = head(&table(false), 2).unwrap();
        assert!(text.contains("C:6"));
        assert!(text.contains("485,535"));
        assert_eq!(text.matches("C:6").count(), 2);
    }
}
