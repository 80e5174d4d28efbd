use std::collections::BTreeMap;

use log::{debug, info};

use super::model::{AnnotatedReading, AnnotatedTable, Blanked, Platemap, Reading, WellId};
use crate::error::PlateError;

/// Inner join of readings and plate map on well identity.
///
/// Readings from wells the plate map does not list are dropped. Row order of
/// `readings` is preserved. An empty result is an error.
pub fn annotate(readings: Vec<Reading>, platemap: &Platemap) -> Result<AnnotatedTable, PlateError> {
    let total = readings.len();
    let rows: Vec<AnnotatedReading> = readings
        .into_iter()
        .filter_map(|reading| {
            let entry = platemap.get(&reading.well)?;
            Some(AnnotatedReading {
                label: entry.label.clone(),
                metadata: entry.metadata.clone(),
                reading,
                blanked: None,
            })
        })
        .collect();

    if rows.is_empty() {
        return Err(PlateError::EmptyJoin);
    }
    debug!("Dropped {} readings from wells outside the plate map", total - rows.len());
    info!("Annotated {} of {} readings", rows.len(), total);
    Ok(AnnotatedTable::new(rows))
}

/// Background per repeat: the blank well's value at each repeat.
pub fn background_by_repeat(
    table: &AnnotatedTable,
    blank: WellId,
) -> Result<BTreeMap<u32, f64>, PlateError> {
    let mut background = BTreeMap::new();
    for row in table.well_rows(blank) {
        let repeat = row.reading.repeat;
        if background.insert(repeat, row.reading.value).is_some() {
            return Err(PlateError::DuplicateBackground { well: blank, repeat });
        }
    }
    if background.is_empty() {
        return Err(PlateError::BlankWellMissing(blank));
    }
    Ok(background)
}

/// Subtract the blank well's reading at the same repeat from every row.
///
/// Readings are matched by repeat, not by time: wells read in the same cycle
/// carry slightly different timestamps. Rows whose repeat has no blank reading
/// are dropped. The blank well's own rows come out at zero.
pub fn subtract_background(table: AnnotatedTable, blank: WellId) -> Result<AnnotatedTable, PlateError> {
    let background = background_by_repeat(&table, blank)?;

    let total = table.rows.len();
    let rows: Vec<AnnotatedReading> = table
        .rows
        .into_iter()
        .filter_map(|mut row| {
            let bg = *background.get(&row.reading.repeat)?;
            row.blanked = Some(Blanked {
                background: bg,
                subtracted: row.reading.value - bg,
            });
            Some(row)
        })
        .collect();

    if rows.len() < total {
        debug!(
            "Dropped {} readings at repeats with no {blank} reading",
            total - rows.len()
        );
    }
    info!(
        "Subtracted background of {blank} over {} repeats",
        background.len()
    );
    Ok(AnnotatedTable {
        rows,
        blank: Some(blank),
    })
}
