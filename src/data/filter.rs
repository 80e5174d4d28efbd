use std::collections::{BTreeSet, HashMap};

use super::model::AnnotatedTable;

// ---------------------------------------------------------------------------
// Label ordering
// ---------------------------------------------------------------------------

/// Stable-sort rows so labels follow `order` (compared by their text form).
/// Labels missing from `order` go last, in the order they first appear.
pub fn order_by_labels(table: &mut AnnotatedTable, order: &[String]) {
    let mut rank: HashMap<String, usize> = order
        .iter()
        .enumerate()
        .map(|(i, label)| (label.clone(), i))
        .collect();

    let mut next = order.len();
    let keys: Vec<usize> = table
        .rows
        .iter()
        .map(|row| {
            *rank.entry(row.label.to_string()).or_insert_with(|| {
                next += 1;
                next
            })
        })
        .collect();

    let mut ranked: Vec<_> = keys.into_iter().zip(table.rows.drain(..)).collect();
    ranked.sort_by_key(|(key, _)| *key);
    table.rows = ranked.into_iter().map(|(_, row)| row).collect();
}

/// Labels in `order` that no row carries.
pub fn missing_labels<'a>(table: &AnnotatedTable, order: &'a [String]) -> Vec<&'a str> {
    let present: BTreeSet<String> = table.labels().iter().map(|l| l.to_string()).collect();
    order
        .iter()
        .filter(|label| !present.contains(label.as_str()))
        .map(|label| label.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use crate::data::model::{AnnotatedReading, CellValue, Reading, WellId};

    fn row(well: &str, label: CellValue) -> AnnotatedReading {
        AnnotatedReading {
            reading: Reading {
                well: well.parse::<WellId>().unwrap(),
                repeat: 1,
                time: Duration::ZERO,
                seconds: 0,
                excitation: "485".to_string(),
                emission: "535".to_string(),
                wavelength: "485,535".to_string(),
                value: 1.0,
            },
            label,
            metadata: BTreeMap::new(),
            blanked: None,
        }
    }

    fn table() -> AnnotatedTable {
        AnnotatedTable::new(vec![
            row("A:1", CellValue::from("B:4")),
            row("A:2", CellValue::from("other")),
            row("A:3", CellValue::from("B:2")),
            row("A:4", CellValue::Integer(0)),
            row("A:5", CellValue::from("B:4")),
        ])
    }

    fn wells(table: &AnnotatedTable) -> Vec<String> {
        table.rows.iter().map(|r| r.well().to_string()).collect()
    }

    #[test]
    fn orders_rows_by_label_order() {
        let mut t = table();
        order_by_labels(&mut t, &["B:2".to_string(), "B:4".to_string()]);
        assert_eq!(wells(&t), vec!["A:3", "A:1", "A:5", "A:2", "A:4"]);
    }

    #[test]
    fn reports_missing_labels() {
        let order = ["B:2".to_string(), "B:6".to_string(), "0".to_string()];
        assert_eq!(missing_labels(&table(), &order), vec!["B:6"]);
    }
}
