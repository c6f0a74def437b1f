//! File I/O for scoring inputs and outputs.
//!
//! Dose grids, conversion curve dumps and kerma tables are stored as JSON.

pub mod dose;
pub mod kerma;

pub use dose::{GridWriter, JsonGridWriter, read_dose_report, write_curves, write_dose_report};
pub use kerma::{read_kerma_table, write_kerma_table};
