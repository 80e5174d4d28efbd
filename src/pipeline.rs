use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config::ExperimentConfig;
use crate::data::envision::EnvisionReader;
use crate::data::filter::{missing_labels, order_by_labels};
use crate::data::model::AnnotatedTable;
use crate::error::PlateError;
use crate::export;

/// Read the plate map and the Envision export named by `config`, join them,
/// blank when a blank well is configured, and order rows by `label_order`.
pub fn run(config: &ExperimentConfig) -> Result<AnnotatedTable, PlateError> {
    let platemap = config.platemap_source()?.read()?;
    let reader = EnvisionReader::new(config.envision_layout());
    let mut table = reader.read(&config.data_file, &platemap, config.blank_well)?;

    if let Some(norm) = config.normalization_well {
        if table.well_rows(norm).next().is_none() {
            warn!("Normalisation well {norm} has no annotated readings");
        }
    }

    if !config.label_order.is_empty() {
        let missing = missing_labels(&table, &config.label_order);
        if !missing.is_empty() {
            warn!("Expected labels without readings: {}", missing.join(", "));
        }
        order_by_labels(&mut table, &config.label_order);
    }

    info!(
        "Dataset {}: {} rows, {} wells, {} labels",
        config.date,
        table.len(),
        table.wells().len(),
        table.labels().len()
    );
    Ok(table)
}

/// Write `table` as CSV and Parquet into the configured output directory.
/// Returns the written paths; none when no output directory is set.
pub fn write_outputs(config: &ExperimentConfig, table: &AnnotatedTable) -> Result<Vec<PathBuf>> {
    let Some(dir) = &config.output_dir else {
        return Ok(Vec::new());
    };
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let stem = config.output_stem();
    let csv_path = dir.join(format!("{stem}.csv"));
    let parquet_path = dir.join(format!("{stem}.parquet"));
    export::write_csv(table, &csv_path)?;
    export::write_parquet(table, &parquet_path)?;
    Ok(vec![csv_path, parquet_path])
}
