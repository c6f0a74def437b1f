//! Voxel geometry used to attribute steps to scoring cells.
//!
//! The transport engine owns the real geometry; scoring only needs to map a
//! pre-step position to a flattened voxel index and to know the (fixed)
//! volume of one voxel.

pub mod voxel_grid;

pub use voxel_grid::VoxelGrid;

use crate::Point;
use crate::error::DoseError;

/// Flattened index of one voxel: `ix + nx * (iy + ny * iz)`.
pub type VoxelIndex = usize;

pub trait VoxelGeometry {
    /// Number of voxels along x, y and z.
    fn resolution(&self) -> [usize; 3];

    /// Edge lengths of one voxel in meters.
    fn voxel_size(&self) -> [f64; 3];

    /// Maps a position to the voxel containing it.
    fn resolve_voxel_index(&self, position: Point) -> Result<VoxelIndex, DoseError>;

    fn num_voxels(&self) -> usize {
        self.resolution().iter().product()
    }

    /// Volume of a single voxel in m^3. Fixed for the whole run.
    fn voxel_volume(&self) -> f64 {
        self.voxel_size().iter().product()
    }
}
