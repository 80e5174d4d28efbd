use std::path::PathBuf;

use thiserror::Error;

use crate::data::model::WellId;

/// Errors raised while reading plate maps and instrument exports.
///
/// The pipeline is fail-fast: every variant aborts the run.
#[derive(Error, Debug)]
pub enum PlateError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Workbook {0} has no worksheets")]
    NoWorksheet(PathBuf),

    #[error("Unsupported plate map extension: .{0}")]
    UnsupportedFormat(String),

    #[error("Missing column '{0}'")]
    MissingColumn(String),

    #[error("Invalid well identifier '{0}'")]
    InvalidWell(String),

    #[error("Plate map column header '{0}' is not a column number")]
    InvalidColumnHeader(String),

    #[error("Invalid elapsed time '{0}', expected hhh:mm:ss.sss")]
    InvalidTime(String),

    #[error("Line {line}: '{value}' in column '{column}' is not a number")]
    InvalidNumber {
        /// 1-based line in the export file, header included.
        line: usize,
        column: String,
        value: String,
    },

    #[error("Well {0} appears more than once in the plate map")]
    DuplicateWell(WellId),

    #[error("Blank well {0} has no readings")]
    BlankWellMissing(WellId),

    #[error("Blank well {well} has more than one reading at repeat {repeat}")]
    DuplicateBackground { well: WellId, repeat: u32 },

    #[error("Plate map and readings share no wells")]
    EmptyJoin,
}

/// Coarse classification of a [`PlateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    Lookup,
    EmptyJoin,
}

impl PlateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlateError::Io { .. } => ErrorKind::Io,
            PlateError::Csv(e) if e.is_io_error() => ErrorKind::Io,
            PlateError::Csv(_)
            | PlateError::Spreadsheet(_)
            | PlateError::NoWorksheet(_)
            | PlateError::UnsupportedFormat(_)
            | PlateError::MissingColumn(_)
            | PlateError::InvalidWell(_)
            | PlateError::InvalidColumnHeader(_)
            | PlateError::InvalidTime(_)
            | PlateError::InvalidNumber { .. }
            | PlateError::DuplicateWell(_) => ErrorKind::Parse,
            PlateError::BlankWellMissing(_) | PlateError::DuplicateBackground { .. } => {
                ErrorKind::Lookup
            }
            PlateError::EmptyJoin => ErrorKind::EmptyJoin,
        }
    }
}
