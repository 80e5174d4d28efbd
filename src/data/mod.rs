//! Data layer: core types, readers, join and label filtering.
//!
//! Architecture:
//! ```text
//!  platemap .tsv / .csv / .xlsx        Envision .csv
//!        │                                  │
//!        ▼                                  ▼
//!   ┌──────────┐                      ┌──────────┐
//!   │ platemap │  well → label        │ envision │  well, repeat, time, value
//!   └──────────┘                      └──────────┘
//!        │                                  │
//!        └──────────────┬───────────────────┘
//!                       ▼
//!                  ┌──────────┐
//!                  │   join   │  inner join on well, blank subtraction by repeat
//!                  └──────────┘
//!                       │
//!                       ▼
//!                ┌──────────────┐
//!                │AnnotatedTable│
//!                └──────────────┘
//!                       │
//!                       ▼
//!                  ┌──────────┐
//!                  │  filter   │  label order
//!                  └──────────┘
//! ```

pub mod envision;
pub mod filter;
pub mod join;
pub mod model;
pub mod platemap;
