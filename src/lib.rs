pub mod error;
pub mod geom;
pub mod io;
pub mod sim;

// Prelude
pub use error::DoseError;
pub use geom::point::Point;
pub use sim::dose::{DoseActor, DoseActorConfig, KermaTable};
pub use sim::framework::{ParticleKind, Step, TrackStatus};
pub use sim::geometry::{VoxelGeometry, VoxelGrid};
