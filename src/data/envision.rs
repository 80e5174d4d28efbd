use std::io::Read;
use std::path::Path;
use std::time::Duration;

use log::info;

use super::join::{annotate, subtract_background};
use super::model::{AnnotatedTable, Platemap, Reading, WellId};
use crate::error::PlateError;

// ---------------------------------------------------------------------------
// Column layout of an Envision export
// ---------------------------------------------------------------------------

/// Column names of an Envision CSV export for one detection channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvisionLayout {
    pub well: String,
    pub repeat: String,
    pub time: String,
    pub excitation: String,
    pub emission: String,
    pub result: String,
}

impl EnvisionLayout {
    /// Layout for result channel `n` (1-based).
    pub fn channel(n: u8) -> Self {
        Self {
            well: "Well ID".to_string(),
            repeat: "Repeat".to_string(),
            time: "Time [hhh:mm:ss.sss]".to_string(),
            excitation: "Exc WL[nm]".to_string(),
            emission: format!("Ems WL Channel {n}[nm]"),
            result: format!("Result Channel {n}"),
        }
    }
}

impl Default for EnvisionLayout {
    fn default() -> Self {
        Self::channel(1)
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Reads Envision time-course exports and annotates them with a plate map.
#[derive(Debug, Clone, Default)]
pub struct EnvisionReader {
    layout: EnvisionLayout,
}

impl EnvisionReader {
    pub fn new(layout: EnvisionLayout) -> Self {
        Self { layout }
    }

    /// Load an export, join it with `platemap` and, when `blank` is given,
    /// subtract that well's reading at each repeat.
    pub fn read(
        &self,
        path: &Path,
        platemap: &Platemap,
        blank: Option<WellId>,
    ) -> Result<AnnotatedTable, PlateError> {
        let readings = self.read_readings(path)?;
        let table = annotate(readings, platemap)?;
        match blank {
            Some(well) => subtract_background(table, well),
            None => Ok(table),
        }
    }

    pub fn read_readings(&self, path: &Path) -> Result<Vec<Reading>, PlateError> {
        let file = std::fs::File::open(path).map_err(|source| PlateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let readings = self.parse_readings(file)?;
        info!("Read {} readings from {}", readings.len(), path.display());
        Ok(readings)
    }

    /// Parse an export into one [`Reading`] per row. Columns not named by the
    /// layout are ignored.
    pub fn parse_readings<R: Read>(&self, input: R) -> Result<Vec<Reading>, PlateError> {
        let mut reader = csv::Reader::from_reader(input);
        let headers = reader.headers()?.clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| PlateError::MissingColumn(name.to_string()))
        };

        let well_idx = position(&self.layout.well)?;
        let repeat_idx = position(&self.layout.repeat)?;
        let time_idx = position(&self.layout.time)?;
        let ex_idx = position(&self.layout.excitation)?;
        let em_idx = position(&self.layout.emission)?;
        let result_idx = position(&self.layout.result)?;

        let mut readings = Vec::new();
        for (row_no, result) in reader.records().enumerate() {
            // Header is line 1.
            let line = row_no + 2;
            let record = result?;
            let field = |idx: usize| record.get(idx).unwrap_or("").trim();

            let well = WellId::from_instrument(field(well_idx))?;
            let repeat = field(repeat_idx)
                .parse::<u32>()
                .map_err(|_| PlateError::InvalidNumber {
                    line,
                    column: self.layout.repeat.clone(),
                    value: field(repeat_idx).to_string(),
                })?;
            let time = parse_elapsed(field(time_idx))?;
            let value = field(result_idx)
                .parse::<f64>()
                .map_err(|_| PlateError::InvalidNumber {
                    line,
                    column: self.layout.result.clone(),
                    value: field(result_idx).to_string(),
                })?;
            let excitation = field(ex_idx).to_string();
            let emission = field(em_idx).to_string();

            readings.push(Reading {
                well,
                repeat,
                time,
                seconds: whole_seconds(time),
                wavelength: format!("{excitation},{emission}"),
                excitation,
                emission,
                value,
            });
        }
        Ok(readings)
    }
}

/// Load an export with the channel-1 layout. See [`EnvisionReader::read`].
pub fn read_envision(
    path: &Path,
    platemap: &Platemap,
    blank: Option<WellId>,
) -> Result<AnnotatedTable, PlateError> {
    EnvisionReader::default().read(path, platemap, blank)
}

// ---------------------------------------------------------------------------
// Elapsed time
// ---------------------------------------------------------------------------

/// Parse `hhh:mm:ss.sss` into a duration. Hours may have any number of digits;
/// minutes and seconds must be below 60.
pub fn parse_elapsed(s: &str) -> Result<Duration, PlateError> {
    let invalid = || PlateError::InvalidTime(s.to_string());
    let digits = |t: &str| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit());

    let mut parts = s.trim().split(':');
    let (hours, minutes, seconds) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(sec), None) => (h, m, sec),
        _ => return Err(invalid()),
    };
    let (whole, fraction) = seconds.split_once('.').unwrap_or((seconds, ""));
    if !digits(hours) || !digits(minutes) || !digits(whole) {
        return Err(invalid());
    }
    if !fraction.is_empty() && !digits(fraction) {
        return Err(invalid());
    }

    let hours: u64 = hours.parse().map_err(|_| invalid())?;
    let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
    let whole: u64 = whole.parse().map_err(|_| invalid())?;
    if minutes >= 60 || whole >= 60 {
        return Err(invalid());
    }

    // Nanoseconds from the first nine fractional digits.
    let nanos = fraction
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(9)
        .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'));

    let total = hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + whole))
        .ok_or_else(invalid)?;
    Ok(Duration::new(total, nanos))
}

/// Whole seconds of an elapsed time. The fractional part is truncated, not
/// rounded; readings keep the full duration alongside.
pub fn whole_seconds(time: Duration) -> u64 {
    time.as_secs()
}
