use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Range, Reader};
use log::{debug, info};

use super::model::{CellValue, Platemap, PlatemapEntry, WellId};
use crate::error::PlateError;

/// Label written into blank spreadsheet cells.
pub const SPREADSHEET_BLANK: CellValue = CellValue::Integer(0);

/// Where a plate map comes from.
///
/// The two layouts treat unassigned wells differently, and that difference is
/// kept on purpose:
/// * grid text drops wells whose cell is empty;
/// * spreadsheets keep every listed well and fill blank cells with `0`
///   ([`SPREADSHEET_BLANK`]).
#[derive(Debug, Clone, PartialEq)]
pub enum PlatemapSource {
    /// Delimited grid: first column is the row letter, remaining headers are
    /// column numbers, cells are labels.
    Grid { text: String, delimiter: u8 },
    /// Grid read from a file.
    GridFile { path: PathBuf, delimiter: u8 },
    /// Spreadsheet with a `Well` column (`"<Row>:<Column>"`) and a label column.
    Spreadsheet { path: PathBuf, label_column: String },
}

impl PlatemapSource {
    /// Tab-separated grid text.
    pub fn grid_text(text: impl Into<String>) -> Self {
        PlatemapSource::Grid {
            text: text.into(),
            delimiter: b'\t',
        }
    }

    pub fn spreadsheet(path: impl Into<PathBuf>) -> Self {
        PlatemapSource::Spreadsheet {
            path: path.into(),
            label_column: "Label".to_string(),
        }
    }

    /// Pick the layout from the file extension.
    ///
    /// * `.xlsx` / `.xlsm` / `.xls` / `.ods` – spreadsheet
    /// * `.tsv` / `.txt` – tab-separated grid
    /// * `.csv` – comma-separated grid
    pub fn from_path(path: &Path, label_column: &str) -> Result<Self, PlateError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let path = path.to_path_buf();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(PlatemapSource::Spreadsheet {
                path,
                label_column: label_column.to_string(),
            }),
            "tsv" | "txt" => Ok(PlatemapSource::GridFile {
                path,
                delimiter: b'\t',
            }),
            "csv" => Ok(PlatemapSource::GridFile {
                path,
                delimiter: b',',
            }),
            other => Err(PlateError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn read(&self) -> Result<Platemap, PlateError> {
        let platemap = match self {
            PlatemapSource::Grid { text, delimiter } => {
                read_grid(text.as_bytes(), *delimiter)?
            }
            PlatemapSource::GridFile { path, delimiter } => {
                let file = std::fs::File::open(path).map_err(|source| PlateError::Io {
                    path: path.clone(),
                    source,
                })?;
                read_grid(file, *delimiter)?
            }
            PlatemapSource::Spreadsheet { path, label_column } => {
                read_spreadsheet(path, label_column)?
            }
        };
        info!("Loaded plate map with {} labelled wells", platemap.len());
        Ok(platemap)
    }
}

// ---------------------------------------------------------------------------
// Grid layout
// ---------------------------------------------------------------------------

/// Parse a grid plate map and unpivot it to one entry per labelled well.
///
/// ```text
/// Row  2   4
/// A    X   Y
/// B        Z      →  A:2 X, A:4 Y, B:4 Z   (B:2 dropped)
/// ```
///
/// Entries come out column by column, as an unpivot would order them.
pub fn read_grid<R: Read>(input: R, delimiter: u8) -> Result<Platemap, PlateError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    let columns: Vec<u32> = headers
        .iter()
        .skip(1)
        .map(|h| {
            h.trim()
                .parse::<u32>()
                .ok()
                .filter(|&c| c > 0)
                .ok_or_else(|| PlateError::InvalidColumnHeader(h.to_string()))
        })
        .collect::<Result<_, _>>()?;

    let records = reader.records().collect::<Result<Vec<_>, _>>()?;

    let mut entries = Vec::new();
    let mut dropped = 0usize;
    for (col_idx, &column) in columns.iter().enumerate() {
        for record in &records {
            let row_cell = record.get(0).unwrap_or("").trim();
            let label = CellValue::guess(record.get(col_idx + 1).unwrap_or(""));
            if label.is_null() {
                dropped += 1;
                continue;
            }
            let mut chars = row_cell.chars();
            let well = match (chars.next(), chars.next()) {
                (Some(row), None) => WellId::new(row, column)
                    .map_err(|_| PlateError::InvalidWell(format!("{row_cell}:{column}")))?,
                _ => return Err(PlateError::InvalidWell(format!("{row_cell}:{column}"))),
            };
            entries.push(PlatemapEntry {
                well,
                label,
                metadata: BTreeMap::new(),
            });
        }
    }
    debug!("Grid plate map: dropped {dropped} unassigned wells");

    Platemap::from_entries(entries)
}

// ---------------------------------------------------------------------------
// Spreadsheet layout
// ---------------------------------------------------------------------------

/// Read the first worksheet of a workbook as a plate map.
pub fn read_spreadsheet(path: &Path, label_column: &str) -> Result<Platemap, PlateError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| PlateError::NoWorksheet(path.to_path_buf()))?;
    debug!("Reading plate map sheet '{sheet}' from {}", path.display());
    let range = workbook.worksheet_range(&sheet)?;
    platemap_from_range(&range, label_column)
}

/// Build a plate map from a worksheet whose first row holds the column names.
///
/// Every blank cell is filled with [`SPREADSHEET_BLANK`]; wells are kept even
/// when their label is blank. Columns other than `Well`, the label column,
/// `Row` and `Column` are carried as metadata.
///
/// Rows with no content at all are skipped (and logged) rather than filled,
/// so trailing blank rows of a sheet do not turn into a `0` well that fails
/// to parse.
pub fn platemap_from_range(range: &Range<Data>, label_column: &str) -> Result<Platemap, PlateError> {
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(|c| c.to_string().trim().to_string()).collect())
        .unwrap_or_default();

    let well_idx = headers
        .iter()
        .position(|h| h == "Well")
        .ok_or_else(|| PlateError::MissingColumn("Well".to_string()))?;
    let label_idx = headers
        .iter()
        .position(|h| h == label_column)
        .ok_or_else(|| PlateError::MissingColumn(label_column.to_string()))?;

    let meta_cols: Vec<(usize, &String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, h)| {
            *i != well_idx && *i != label_idx && !h.is_empty() && *h != "Row" && *h != "Column"
        })
        .collect();

    let mut entries = Vec::new();
    // Sheet row 1 is the header.
    for (sheet_row, row) in (2..).zip(rows) {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            debug!("Skipping empty plate map row {sheet_row}");
            continue;
        }
        let cell = |idx: usize| filled(row.get(idx).map(cell_value).unwrap_or(CellValue::Null));

        let well: WellId = cell(well_idx).to_string().parse()?;
        let metadata = meta_cols
            .iter()
            .map(|(idx, name)| ((*name).clone(), cell(*idx)))
            .collect();

        entries.push(PlatemapEntry {
            well,
            label: cell(label_idx),
            metadata,
        });
    }

    Platemap::from_entries(entries)
}

fn filled(value: CellValue) -> CellValue {
    if value.is_null() {
        SPREADSHEET_BLANK
    } else {
        value
    }
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::String(s) if s.trim().is_empty() => CellValue::Null,
        Data::String(s) => CellValue::String(s.trim().to_string()),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        other => CellValue::Date(other.to_string()),
    }
}
