//! Voxelized dose scoring.
//!
//! Each scored step is converted to dose through a
//! [`ConversionFactorProvider`] and attributed to the voxel holding its
//! pre-step point. When squared dose or uncertainty is requested, all
//! contributions of one event to one voxel are merged into a single sample
//! before entering the statistics.

pub mod accumulator;
pub mod actor;
pub mod config;
pub mod conversion;
pub mod curves;
pub mod kerma;
pub mod snapshot;
pub mod tracker;

pub use accumulator::VoxelAccumulator;
pub use actor::DoseActor;
pub use config::DoseActorConfig;
pub use conversion::{ConversionFactorProvider, DoseQuery};
pub use curves::{ConversionCurve, ConversionCurveCollector};
pub use kerma::{KermaTable, MaterialKerma, TabulatedCurve};
pub use snapshot::{DoseReport, DoseSnapshot};
pub use tracker::{EventAttributionTracker, EventId};
