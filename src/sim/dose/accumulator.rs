use crate::sim::geometry::VoxelIndex;

use super::snapshot::DoseSnapshot;

/// Per-event buffers, present only when squared dose or uncertainty is scored.
#[derive(Debug, Clone)]
struct EventBuffers {
    /// Unflushed contribution of the event currently open at each voxel.
    pending: Vec<f64>,
    /// Whether an event is currently open (Accumulating) at each voxel.
    open: Vec<bool>,
    /// Sum over finalized events of (per-event dose)^2.
    sum_squares: Vec<f64>,
    /// Number of finalized events per voxel.
    events: Vec<u64>,
}

impl EventBuffers {
    fn new(num_voxels: usize) -> Self {
        Self {
            pending: vec![0.0; num_voxels],
            open: vec![false; num_voxels],
            sum_squares: vec![0.0; num_voxels],
            events: vec![0; num_voxels],
        }
    }

    fn reset(&mut self) {
        self.pending.fill(0.0);
        self.open.fill(false);
        self.sum_squares.fill(0.0);
        self.events.fill(0);
    }
}

/// Per-voxel dose accumulation with optional per-event statistics.
///
/// Without per-event statistics only a running sum is kept and every
/// contribution goes through [`VoxelAccumulator::add_direct`]. With them,
/// contributions of one event to one voxel are pre-summed into a pending
/// buffer, and only the per-event total enters `sum` and `sum_squares`.
#[derive(Debug, Clone)]
pub struct VoxelAccumulator {
    sum: Vec<f64>,
    per_event: Option<EventBuffers>,
}

impl VoxelAccumulator {
    pub fn new(num_voxels: usize, per_event_statistics: bool) -> Self {
        Self {
            sum: vec![0.0; num_voxels],
            per_event: per_event_statistics.then(|| EventBuffers::new(num_voxels)),
        }
    }

    pub fn len(&self) -> usize {
        self.sum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sum.is_empty()
    }

    /// Adds `sample` straight to the running sum.
    pub fn add_direct(&mut self, index: VoxelIndex, sample: f64) {
        self.sum[index] += sample;
    }

    /// Adds `sample` to the pending buffer of the event open at `index`.
    ///
    /// Without per-event statistics this is the same as `add_direct`.
    pub fn add_pending(&mut self, index: VoxelIndex, sample: f64) {
        match self.per_event.as_mut() {
            Some(buf) => {
                buf.pending[index] += sample;
                buf.open[index] = true;
            }
            None => self.sum[index] += sample,
        }
    }

    /// Merges `sample` into the pending buffer and commits the per-event
    /// total to `sum` and `sum_squares`, leaving the voxel idle.
    pub fn add_and_finalize_event(&mut self, index: VoxelIndex, sample: f64) {
        match self.per_event.as_mut() {
            Some(buf) => {
                buf.pending[index] += sample;
                buf.open[index] = true;
                Self::commit(&mut self.sum, buf, index);
            }
            None => self.sum[index] += sample,
        }
    }

    /// Finalizes the event previously open at `index` (if any) and opens a
    /// new one whose pending total starts at `sample`.
    pub fn flush_and_begin_event(&mut self, index: VoxelIndex, sample: f64) {
        match self.per_event.as_mut() {
            Some(buf) => {
                if buf.open[index] {
                    Self::commit(&mut self.sum, buf, index);
                }
                buf.pending[index] = sample;
                buf.open[index] = true;
            }
            None => self.sum[index] += sample,
        }
    }

    /// Finalizes every open event. Called at end of run, before statistics
    /// are read.
    pub fn flush_all(&mut self) {
        if let Some(buf) = self.per_event.as_mut() {
            for index in 0..self.sum.len() {
                if buf.open[index] {
                    Self::commit(&mut self.sum, buf, index);
                }
            }
        }
    }

    fn commit(sum: &mut [f64], buf: &mut EventBuffers, index: VoxelIndex) {
        let total = buf.pending[index];
        sum[index] += total;
        buf.sum_squares[index] += total * total;
        buf.events[index] += 1;
        buf.pending[index] = 0.0;
        buf.open[index] = false;
    }

    /// Zeroes sums, squared sums and pending buffers of all voxels.
    pub fn reset(&mut self) {
        self.sum.fill(0.0);
        if let Some(buf) = self.per_event.as_mut() {
            buf.reset();
        }
    }

    pub fn has_pending(&self) -> bool {
        self.per_event
            .as_ref()
            .is_some_and(|buf| buf.open.iter().any(|&o| o))
    }

    pub fn sum(&self, index: VoxelIndex) -> f64 {
        self.sum[index]
    }

    pub fn sum_squares(&self, index: VoxelIndex) -> Option<f64> {
        self.per_event.as_ref().map(|buf| buf.sum_squares[index])
    }

    /// Pending dose of the event open at `index`, `None` when the voxel is idle.
    pub fn pending(&self, index: VoxelIndex) -> Option<f64> {
        let buf = self.per_event.as_ref()?;
        buf.open[index].then(|| buf.pending[index])
    }

    pub fn finalized_events(&self, index: VoxelIndex) -> Option<u64> {
        self.per_event.as_ref().map(|buf| buf.events[index])
    }

    /// Copies the finalized statistics. Pending contributions are not
    /// included; flush first to account for them.
    pub fn export_snapshot(&self, num_events: u64) -> DoseSnapshot {
        if self.has_pending() {
            log::warn!("exporting dose snapshot with unflushed pending contributions");
        }
        DoseSnapshot {
            num_events,
            sum: self.sum.clone(),
            sum_squares: self.per_event.as_ref().map(|buf| buf.sum_squares.clone()),
            event_counts: self.per_event.as_ref().map(|buf| buf.events.clone()),
        }
    }
}
