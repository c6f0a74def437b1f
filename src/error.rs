//! Error types raised by the dose scoring engine.
//!
//! Every variant is fatal for the run or worker that raised it. A failed
//! contribution is never replaced by a zero dose.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DoseError {
    #[error(
        "dose actor '{0}' does not have any output enabled; \
         select at least one (enable_dose = true for example)"
    )]
    NoScoringOutput(String),
    #[error("voxel volume must be strictly positive, got {0}")]
    InvalidVoxelVolume(f64),
    #[error("invalid voxel grid: {0}")]
    InvalidGrid(String),
    #[error("no conversion data for material '{0}'")]
    UnknownMaterial(String),
    #[error("material '{material}' has no {curve} curve")]
    MissingCurve {
        material: String,
        curve: &'static str,
    },
    #[error("invalid conversion table for material '{material}': {reason}")]
    InvalidTable { material: String, reason: String },
    #[error("kinetic energy must be finite and non-negative, got {0} MeV")]
    InvalidEnergy(f64),
    #[error("step length must be finite and non-negative, got {0} m")]
    InvalidStepLength(f64),
    #[error("voxel index {index} out of range (grid has {len} voxels)")]
    VoxelOutOfRange { index: usize, len: usize },
    #[error("position ({x}, {y}, {z}) lies outside the voxel grid")]
    PositionOutsideGrid { x: f64, y: f64, z: f64 },
    #[error("step received before the first event started")]
    NoActiveEvent,
}
