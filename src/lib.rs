//! Microplate fluorescence time-course loading.
//!
//! Plate maps assign labels to wells; Envision exports hold one reading per
//! well and repeat. [`pipeline::run`] joins the two on well identity and
//! optionally subtracts a blank well's signal, matched by repeat.

pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod pipeline;

pub use config::ExperimentConfig;
pub use error::{ErrorKind, PlateError};
