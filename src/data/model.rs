use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PlateError;

// ---------------------------------------------------------------------------
// CellValue – a single cell of a plate-map table
// ---------------------------------------------------------------------------

/// A dynamically-typed table cell, used for labels and plate-map metadata.
///
/// Equality, ordering and hashing all go through one comparable key, so floats
/// compare by `total_cmp` and `Float(NaN)` equals itself. Values of different
/// kinds order as `Null < Bool < Integer < Float < String < Date`.
#[derive(Debug, Clone)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Spreadsheet date/time cell, kept as its rendered text.
    Date(String),
    Null,
}

/// Comparable projection of a [`CellValue`].
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
enum CellKey<'a> {
    Null,
    Bool(bool),
    Integer(i64),
    Float(i64),
    String(&'a str),
    Date(&'a str),
}

/// Map an `f64` onto an `i64` whose order matches `f64::total_cmp`.
fn float_key(v: f64) -> i64 {
    let bits = v.to_bits() as i64;
    bits ^ ((((bits >> 63) as u64) >> 1) as i64)
}

impl CellValue {
    fn key(&self) -> CellKey<'_> {
        match self {
            CellValue::Null => CellKey::Null,
            CellValue::Bool(b) => CellKey::Bool(*b),
            CellValue::Integer(i) => CellKey::Integer(*i),
            CellValue::Float(f) => CellKey::Float(float_key(*f)),
            CellValue::String(s) => CellKey::String(s),
            CellValue::Date(d) => CellKey::Date(d),
        }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Date(d) => write!(f, "{d}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Guess the type of a text cell the way a delimited-text reader would.
    /// Empty (or whitespace-only) text is `Null`.
    pub fn guess(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::Float(f);
        }
        if s == "true" || s == "false" {
            return CellValue::Bool(s == "true");
        }
        CellValue::String(s.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// WellId – (Row, Column) address on the plate
// ---------------------------------------------------------------------------

/// A well address: one uppercase row letter and a 1-based column number.
/// Canonical text form is `"<Row>:<Column>"`, e.g. `B:16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WellId {
    row: char,
    column: u32,
}

impl WellId {
    pub fn new(row: char, column: u32) -> Result<Self, PlateError> {
        if !row.is_ascii_uppercase() || column == 0 {
            return Err(PlateError::InvalidWell(format!("{row}:{column}")));
        }
        Ok(Self { row, column })
    }

    pub fn row(&self) -> char {
        self.row
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Parse the instrument's compact form (`"A12"`, `"B03"`).
    pub fn from_instrument(raw: &str) -> Result<Self, PlateError> {
        let invalid = || PlateError::InvalidWell(raw.to_string());
        let mut chars = raw.trim().chars();
        let row = chars.next().ok_or_else(invalid)?;
        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let column = digits.parse::<u32>().map_err(|_| invalid())?;
        Self::new(row, column).map_err(|_| invalid())
    }
}

impl fmt::Display for WellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

impl FromStr for WellId {
    type Err = PlateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PlateError::InvalidWell(s.to_string());
        let (row, column) = s.trim().split_once(':').ok_or_else(invalid)?;
        let mut row_chars = row.chars();
        let row = match (row_chars.next(), row_chars.next()) {
            (Some(c), None) => c,
            _ => return Err(invalid()),
        };
        let column = column.parse::<u32>().map_err(|_| invalid())?;
        Self::new(row, column).map_err(|_| invalid())
    }
}

impl TryFrom<String> for WellId {
    type Error = PlateError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<WellId> for String {
    fn from(well: WellId) -> Self {
        well.to_string()
    }
}

// ---------------------------------------------------------------------------
// Plate map
// ---------------------------------------------------------------------------

/// One labelled well of the plate map.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatemapEntry {
    pub well: WellId,
    pub label: CellValue,
    /// Any further plate-map columns (spreadsheet layout only).
    pub metadata: BTreeMap<String, CellValue>,
}

/// Well → label assignment, in source order. Each well appears at most once.
#[derive(Debug, Clone, Default)]
pub struct Platemap {
    entries: Vec<PlatemapEntry>,
    index: BTreeMap<WellId, usize>,
}

impl Platemap {
    pub fn from_entries(entries: Vec<PlatemapEntry>) -> Result<Self, PlateError> {
        let mut index = BTreeMap::new();
        for (i, entry) in entries.iter().enumerate() {
            if index.insert(entry.well, i).is_some() {
                return Err(PlateError::DuplicateWell(entry.well));
            }
        }
        Ok(Self { entries, index })
    }

    pub fn entries(&self) -> &[PlatemapEntry] {
        &self.entries
    }

    pub fn get(&self, well: &WellId) -> Option<&PlatemapEntry> {
        self.index.get(well).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// One instrument reading: a single well at a single repeat.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub well: WellId,
    pub repeat: u32,
    /// Elapsed time since the first read, as exported.
    pub time: Duration,
    /// `time` truncated to whole seconds.
    pub seconds: u64,
    pub excitation: String,
    pub emission: String,
    /// `"<Excitation>,<Emission>"` for display.
    pub wavelength: String,
    pub value: f64,
}

/// Background value of the blank well and the resulting difference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blanked {
    pub background: f64,
    pub subtracted: f64,
}

/// A reading joined with its plate-map entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedReading {
    pub reading: Reading,
    pub label: CellValue,
    pub metadata: BTreeMap<String, CellValue>,
    /// Present only when blanking was requested.
    pub blanked: Option<Blanked>,
}

impl AnnotatedReading {
    pub fn well(&self) -> WellId {
        self.reading.well
    }

    pub fn background_subtracted(&self) -> Option<f64> {
        self.blanked.map(|b| b.subtracted)
    }
}

// ---------------------------------------------------------------------------
// AnnotatedTable – the pipeline's output
// ---------------------------------------------------------------------------

/// The annotated (and optionally background-subtracted) time-course table.
#[derive(Debug, Clone, Default)]
pub struct AnnotatedTable {
    pub rows: Vec<AnnotatedReading>,
    /// Blank well used for subtraction, if any.
    pub blank: Option<WellId>,
}

impl AnnotatedTable {
    pub fn new(rows: Vec<AnnotatedReading>) -> Self {
        Self { rows, blank: None }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_blanked(&self) -> bool {
        self.blank.is_some()
    }

    /// Sorted set of distinct labels.
    pub fn labels(&self) -> BTreeSet<CellValue> {
        self.rows.iter().map(|r| r.label.clone()).collect()
    }

    pub fn wells(&self) -> BTreeSet<WellId> {
        self.rows.iter().map(|r| r.well()).collect()
    }

    /// Ordered names of the metadata columns carried from the plate map.
    pub fn metadata_columns(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.rows.iter().flat_map(|r| r.metadata.keys()).collect();
        names.into_iter().cloned().collect()
    }

    /// Rows of a single well, in table order.
    pub fn well_rows(&self, well: WellId) -> impl Iterator<Item = &AnnotatedReading> {
        self.rows.iter().filter(move |r| r.well() == well)
    }
}
