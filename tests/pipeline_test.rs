// End-to-end runs over temporary plate maps and Envision exports.

use std::fs;
use std::path::Path;

use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use platereader::data::envision::read_envision;
use platereader::data::model::{CellValue, WellId};
use platereader::data::platemap::PlatemapSource;
use platereader::{pipeline, ErrorKind, ExperimentConfig, PlateError};
use tempfile::TempDir;

const PLATEMAP: &str = "Row\t2\t4\t16\nB\tpT7-deGFP\tpT7-empty\tblank\nC\t\tpT7-deGFP\t\n";

const EXPORT: &str = "\
Plate,Repeat,Barcode,Well ID,Type,Time [hhh:mm:ss.sss],Result Channel 1,Exc WL[nm],Ems WL Channel 1[nm]
1,1,,B02,S,000:00:00.000,15,485,535
1,1,,B04,S,000:00:00.400,11,485,535
1,1,,B16,S,000:00:00.800,10,485,535
1,1,,C04,S,000:00:01.200,16,485,535
1,1,,H01,S,000:00:01.600,500,485,535
1,2,,B02,S,000:10:00.000,22,485,535
1,2,,B04,S,000:10:00.400,21,485,535
1,2,,B16,S,000:10:00.800,20,485,535
1,2,,C04,S,000:10:01.200,40,485,535
1,2,,H01,S,000:10:01.600,500,485,535
1,3,,B02,S,000:20:00.000,33,485,535
1,3,,B04,S,000:20:00.400,30,485,535
1,3,,B16,S,000:20:00.800,30,485,535
1,3,,C04,S,000:20:01.200,90,485,535
1,3,,H01,S,000:20:01.600,500,485,535
";

fn well(s: &str) -> WellId {
    s.parse().unwrap()
}

fn write_inputs(dir: &Path) -> ExperimentConfig {
    let platemap = dir.join("platemap.tsv");
    let data = dir.join("export.csv");
    fs::write(&platemap, PLATEMAP).unwrap();
    fs::write(&data, EXPORT).unwrap();

    let config_path = dir.join("experiment.json");
    let json = serde_json::json!({
        "date": "20240916",
        "data_file": data,
        "platemap": platemap,
        "blank_well": "B:16",
        "normalization_well": "B:4",
        "label_order": ["blank", "pT7-empty", "pT7-deGFP"],
        "output_dir": dir.join("out"),
    });
    fs::write(&config_path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
    ExperimentConfig::load(&config_path).unwrap()
}

#[test]
fn test_pipeline_annotates_and_blanks() {
    let dir = TempDir::new().unwrap();
    let config = write_inputs(dir.path());

    let table = pipeline::run(&config).unwrap();

    // 4 mapped wells × 3 repeats; H:1 is not on the plate map.
    assert_eq!(table.len(), 12);
    assert!(table.well_rows(well("H:1")).next().is_none());
    assert_eq!(table.blank, Some(well("B:16")));

    let sample: Vec<f64> = table
        .well_rows(well("B:2"))
        .map(|r| r.background_subtracted().unwrap())
        .collect();
    assert_eq!(sample, vec![5.0, 2.0, 3.0]);

    for row in table.well_rows(well("B:16")) {
        assert_eq!(row.background_subtracted(), Some(0.0));
    }

    // Rows follow the configured label order.
    let labels: Vec<String> = table.rows.iter().map(|r| r.label.to_string()).collect();
    assert!(labels[..3].iter().all(|l| l == "blank"));
    assert!(labels[3..6].iter().all(|l| l == "pT7-empty"));
    assert!(labels[6..].iter().all(|l| l == "pT7-deGFP"));
}

#[test]
fn test_pipeline_without_blank_has_no_background() {
    let dir = TempDir::new().unwrap();
    let mut config = write_inputs(dir.path());
    config.blank_well = None;

    let table = pipeline::run(&config).unwrap();
    assert!(!table.is_blanked());
    assert!(table.rows.iter().all(|r| r.blanked.is_none()));
    assert_eq!(table.len(), 12);
}

#[test]
fn test_read_envision_keeps_seconds_and_wavelength() {
    let dir = TempDir::new().unwrap();
    let config = write_inputs(dir.path());
    let platemap = PlatemapSource::grid_text(PLATEMAP).read().unwrap();

    let table = read_envision(&config.data_file, &platemap, None).unwrap();
    let c4: Vec<_> = table.well_rows(well("C:4")).collect();
    assert_eq!(c4.len(), 3);
    assert_eq!(c4[1].reading.seconds, 601);
    assert_eq!(c4[1].reading.wavelength, "485,535");
    assert_eq!(c4[1].label, CellValue::from("pT7-deGFP"));
}

#[test]
fn test_write_outputs_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = write_inputs(dir.path());
    let table = pipeline::run(&config).unwrap();

    let written = pipeline::write_outputs(&config, &table).unwrap();
    assert_eq!(written.len(), 2);

    let mut reader = csv::Reader::from_path(&written[0]).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.get(0), Some("Well"));
    assert_eq!(headers.iter().last(), Some("BackgroundSubtracted"));
    assert_eq!(reader.records().count(), table.len());

    let file = fs::File::open(&written[1]).unwrap();
    let parquet = ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap();
    let rows: usize = parquet.map(|batch| batch.unwrap().num_rows()).sum();
    assert_eq!(rows, table.len());
}

#[test]
fn test_no_outputs_without_output_dir() {
    let dir = TempDir::new().unwrap();
    let mut config = write_inputs(dir.path());
    config.output_dir = None;
    let table = pipeline::run(&config).unwrap();
    assert!(pipeline::write_outputs(&config, &table).unwrap().is_empty());
}

#[test]
fn test_blank_outside_platemap_is_lookup_error() {
    let dir = TempDir::new().unwrap();
    let mut config = write_inputs(dir.path());
    config.blank_well = Some(well("H:1"));

    let err = pipeline::run(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lookup);
    assert!(matches!(err, PlateError::BlankWellMissing(w) if w == well("H:1")));
}

#[test]
fn test_disjoint_platemap_is_empty_join() {
    let dir = TempDir::new().unwrap();
    let mut config = write_inputs(dir.path());
    let platemap = dir.path().join("other.tsv");
    fs::write(&platemap, "Row\t24\nP\tx\n").unwrap();
    config.platemap = Some(platemap);

    let err = pipeline::run(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyJoin);
}

#[test]
fn test_missing_export_is_io_error() {
    let dir = TempDir::new().unwrap();
    let mut config = write_inputs(dir.path());
    config.data_file = dir.path().join("missing.csv");

    let err = pipeline::run(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_malformed_time_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let config = write_inputs(dir.path());
    fs::write(&config.data_file, EXPORT.replace("000:10:00.400", "10 min")).unwrap();

    let err = pipeline::run(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(matches!(err, PlateError::InvalidTime(t) if t == "10 min"));
}
