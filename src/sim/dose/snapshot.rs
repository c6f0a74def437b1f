use serde::{Deserialize, Serialize};

use crate::sim::geometry::{VoxelGeometry, VoxelIndex};

/// Finalized per-voxel statistics of one run (or of several merged runs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseSnapshot {
    /// Number of simulated events the statistics are normalized by.
    pub num_events: u64,
    /// Dose summed over all finalized events, Gy.
    pub sum: Vec<f64>,
    /// Sum over events of the squared per-event dose, Gy^2.
    pub sum_squares: Option<Vec<f64>>,
    /// Number of events that deposited dose in each voxel.
    pub event_counts: Option<Vec<u64>>,
}

impl DoseSnapshot {
    pub fn len(&self) -> usize {
        self.sum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sum.is_empty()
    }

    /// Mean dose per event in each voxel. All zeros before any event.
    pub fn mean_dose(&self) -> Vec<f64> {
        if self.num_events == 0 {
            return vec![0.0; self.sum.len()];
        }
        let n = self.num_events as f64;
        self.sum.iter().map(|s| s / n).collect()
    }

    /// Standard error of the mean dose at `index`, Gy.
    ///
    /// With `N` events, `mean = sum / N` and
    /// `var(mean) = (sum_squares / N - mean^2) / (N - 1)`.
    /// Returns `None` (undefined) when squared sums are not tracked, when the
    /// run has fewer than 2 events, or when fewer than 2 events deposited dose
    /// in this voxel.
    pub fn uncertainty(&self, index: VoxelIndex) -> Option<f64> {
        let sum_squares = self.sum_squares.as_ref()?;
        let counts = self.event_counts.as_ref()?;
        if self.num_events < 2 || counts[index] < 2 {
            return None;
        }
        let n = self.num_events as f64;
        let mean = self.sum[index] / n;
        let variance = (sum_squares[index] / n - mean * mean) / (n - 1.0);
        // Rounding can push a zero variance slightly negative.
        Some(variance.max(0.0).sqrt())
    }

    /// Uncertainty relative to the mean dose, undefined where the mean is 0.
    pub fn relative_uncertainty(&self, index: VoxelIndex) -> Option<f64> {
        let sigma = self.uncertainty(index)?;
        let mean = self.sum[index] / self.num_events as f64;
        (mean > 0.0).then(|| sigma / mean)
    }

    pub fn uncertainty_grid(&self) -> Vec<Option<f64>> {
        (0..self.len()).map(|i| self.uncertainty(i)).collect()
    }

    /// Adds the statistics of an independent worker that scored the same grid.
    pub fn merge(&mut self, other: &DoseSnapshot) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.sum.len() == other.sum.len(),
            "cannot merge dose snapshots of {} and {} voxels",
            self.sum.len(),
            other.sum.len()
        );
        anyhow::ensure!(
            self.sum_squares.is_some() == other.sum_squares.is_some(),
            "cannot merge dose snapshots with and without squared dose"
        );

        self.num_events += other.num_events;
        for (a, b) in self.sum.iter_mut().zip(&other.sum) {
            *a += b;
        }
        if let (Some(a), Some(b)) = (self.sum_squares.as_mut(), other.sum_squares.as_ref()) {
            for (x, y) in a.iter_mut().zip(b) {
                *x += y;
            }
        }
        if let (Some(a), Some(b)) = (self.event_counts.as_mut(), other.event_counts.as_ref()) {
            for (x, y) in a.iter_mut().zip(b) {
                *x += y;
            }
        }
        Ok(())
    }
}

/// Persisted form of a dose grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseReport {
    pub actor: String,
    pub resolution: [usize; 3],
    /// Voxel edge lengths, m.
    pub voxel_size: [f64; 3],
    pub num_events: u64,
    /// Mean dose per event, Gy.
    pub dose: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_squared: Option<Vec<f64>>,
    /// Standard error of the mean; `null` where undefined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_uncertainty: Option<Vec<Option<f64>>>,
}

impl DoseReport {
    pub fn new<G: VoxelGeometry>(
        actor: &str,
        geometry: &G,
        snapshot: &DoseSnapshot,
        with_squared: bool,
        with_uncertainty: bool,
    ) -> Self {
        Self {
            actor: actor.to_string(),
            resolution: geometry.resolution(),
            voxel_size: geometry.voxel_size(),
            num_events: snapshot.num_events,
            dose: snapshot.mean_dose(),
            dose_squared: if with_squared {
                snapshot.sum_squares.clone()
            } else {
                None
            },
            dose_uncertainty: with_uncertainty.then(|| snapshot.uncertainty_grid()),
        }
    }
}
