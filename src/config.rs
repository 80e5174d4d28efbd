//! Experiment configuration.
//! Static per-dataset settings (files, blank well, label order), read from a
//! JSON file. Missing fields fall back to [`ExperimentConfig::default`].

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::data::envision::EnvisionLayout;
use crate::data::model::WellId;
use crate::data::platemap::PlatemapSource;
use crate::error::PlateError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Dataset date tag, e.g. `20240916`.
    pub date: String,
    /// Envision export.
    pub data_file: PathBuf,
    /// Plate map file; defaults to `data/<date>-platemap.xlsx`.
    pub platemap: Option<PathBuf>,
    /// Label-bearing column of spreadsheet plate maps.
    pub label_column: String,
    /// Well subtracted as background. Empty string disables blanking.
    #[serde(deserialize_with = "optional_well")]
    pub blank_well: Option<WellId>,
    /// Reference well for normalisation. Carried for downstream analysis.
    #[serde(deserialize_with = "optional_well")]
    pub normalization_well: Option<WellId>,
    /// Expected labels, in display order.
    pub label_order: Vec<String>,
    /// Envision result channel (1-based).
    pub channel: u8,
    /// Where to write the annotated table. Nothing is written when unset.
    pub output_dir: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        let date = "20240916".to_string();
        Self {
            data_file: PathBuf::from(format!(
                "data/M_{date}-204829 b.next Envision FLUOR deGFP Timecourse.csv"
            )),
            date,
            platemap: None,
            label_column: "Label".to_string(),
            blank_well: "B:16".parse().ok(),
            normalization_well: "B:14".parse().ok(),
            label_order: (0..8).map(|i| format!("B:{}", 2 * i + 2)).collect(),
            channel: 1,
            output_dir: None,
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel == 0 {
            bail!("channel numbers start at 1");
        }
        if self.label_column.trim().is_empty() {
            bail!("label_column must not be empty");
        }
        Ok(())
    }

    pub fn platemap_path(&self) -> PathBuf {
        self.platemap
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("data/{}-platemap.xlsx", self.date)))
    }

    pub fn platemap_source(&self) -> Result<PlatemapSource, PlateError> {
        PlatemapSource::from_path(&self.platemap_path(), &self.label_column)
    }

    pub fn envision_layout(&self) -> EnvisionLayout {
        EnvisionLayout::channel(self.channel)
    }

    /// File name stem for exported tables.
    pub fn output_stem(&self) -> String {
        format!("{}-annotated", self.date)
    }
}

/// `null`, a missing field, or a blank string all mean "no well".
fn optional_well<'de, D>(deserializer: D) -> Result<Option<WellId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_reference_experiment() {
        let config = ExperimentConfig::default();
        assert_eq!(config.blank_well.unwrap().to_string(), "B:16");
        assert_eq!(config.normalization_well.unwrap().to_string(), "B:14");
        assert_eq!(config.label_order.first().map(String::as_str), Some("B:2"));
        assert_eq!(config.label_order.last().map(String::as_str), Some("B:16"));
        assert_eq!(config.platemap_path(), PathBuf::from("data/20240916-platemap.xlsx"));
    }

    #[test]
    fn empty_blank_well_disables_blanking() {
        let config: ExperimentConfig =
            serde_json::from_str(r#"{"date": "20250101", "blank_well": ""}"#).unwrap();
        assert_eq!(config.blank_well, None);
        assert_eq!(config.date, "20250101");
        assert_eq!(config.output_stem(), "20250101-annotated");
        // Unspecified fields keep their defaults.
        assert_eq!(config.normalization_well.unwrap().to_string(), "B:14");
    }

    #[test]
    fn malformed_well_is_rejected() {
        let result = serde_json::from_str::<ExperimentConfig>(r#"{"blank_well": "B16"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn zero_channel_fails_validation() {
        let config = ExperimentConfig {
            channel: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
