use crate::Point;
use crate::error::DoseError;
use crate::geom::EPS;

use super::{VoxelGeometry, VoxelIndex};

/// Regular, axis-aligned box of voxels centered on `position`.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    resolution: [usize; 3],
    half_size: [f64; 3],
    position: Point,
    voxel_size: [f64; 3],
}

impl VoxelGrid {
    pub fn new(
        resolution: [usize; 3],
        half_size: [f64; 3],
        position: Point,
    ) -> Result<Self, DoseError> {
        if resolution.contains(&0) {
            return Err(DoseError::InvalidGrid(format!(
                "resolution must be at least 1 along every axis, got {resolution:?}"
            )));
        }
        if half_size.iter().any(|h| !h.is_finite() || *h <= 0.0) {
            return Err(DoseError::InvalidGrid(format!(
                "half size must be positive and finite, got {half_size:?}"
            )));
        }
        if !position.is_finite() {
            return Err(DoseError::InvalidGrid(format!(
                "grid position must be finite, got {position}"
            )));
        }

        let mut voxel_size = [0.0; 3];
        for axis in 0..3 {
            voxel_size[axis] = 2.0 * half_size[axis] / resolution[axis] as f64;
        }

        Ok(Self {
            resolution,
            half_size,
            position,
            voxel_size,
        })
    }

    pub fn half_size(&self) -> [f64; 3] {
        self.half_size
    }

    /// Center of the grid.
    pub fn position(&self) -> Point {
        self.position
    }

    /// Corner with the smallest coordinates.
    pub fn min_corner(&self) -> Point {
        self.position
            .offset(-self.half_size[0], -self.half_size[1], -self.half_size[2])
    }

    pub fn index_of(&self, i: usize, j: usize, k: usize) -> VoxelIndex {
        let [nx, ny, _] = self.resolution;
        i + nx * (j + ny * k)
    }

    /// Inverse of [`VoxelGrid::index_of`].
    pub fn ijk_of(&self, index: VoxelIndex) -> (usize, usize, usize) {
        let [nx, ny, _] = self.resolution;
        (index % nx, (index / nx) % ny, index / (nx * ny))
    }

    pub fn voxel_center(&self, index: VoxelIndex) -> Point {
        let (i, j, k) = self.ijk_of(index);
        let [dx, dy, dz] = self.voxel_size;
        self.min_corner().offset(
            (i as f64 + 0.5) * dx,
            (j as f64 + 0.5) * dy,
            (k as f64 + 0.5) * dz,
        )
    }

    // Cell along one axis. Points on the upper face belong to the last cell.
    fn axis_cell(&self, axis: usize, local: f64) -> Option<usize> {
        let extent = 2.0 * self.half_size[axis];
        if local < -EPS || local > extent + EPS {
            return None;
        }
        let cell = (local / self.voxel_size[axis]).floor();
        let last = self.resolution[axis] - 1;
        Some((cell.max(0.0) as usize).min(last))
    }
}

impl VoxelGeometry for VoxelGrid {
    fn resolution(&self) -> [usize; 3] {
        self.resolution
    }

    fn voxel_size(&self) -> [f64; 3] {
        self.voxel_size
    }

    fn resolve_voxel_index(&self, position: Point) -> Result<VoxelIndex, DoseError> {
        let outside = || DoseError::PositionOutsideGrid {
            x: position.x,
            y: position.y,
            z: position.z,
        };
        // NaN fails every range comparison in axis_cell
        if !position.is_finite() {
            return Err(outside());
        }
        let local = position.relative_to(self.min_corner());

        let i = self.axis_cell(0, local[0]).ok_or_else(outside)?;
        let j = self.axis_cell(1, local[1]).ok_or_else(outside)?;
        let k = self.axis_cell(2, local[2]).ok_or_else(outside)?;
        Ok(self.index_of(i, j, k))
    }
}
