use crate::sim::geometry::VoxelIndex;

/// Event counter value. The first event of a run is 0.
pub type EventId = u64;

/// Remembers, per voxel, the last event that deposited dose there.
///
/// `None` marks a voxel never hit since the last reset, which differs from
/// every real event id.
#[derive(Debug, Clone)]
pub struct EventAttributionTracker {
    last_event: Vec<Option<EventId>>,
}

impl EventAttributionTracker {
    pub fn new(num_voxels: usize) -> Self {
        Self {
            last_event: vec![None; num_voxels],
        }
    }

    /// Returns true if `current` differs from the last event recorded at
    /// `index`, and records `current` as the voxel's last event.
    ///
    /// Event ids must be presented in non-decreasing order.
    pub fn is_new_event_for_voxel(&mut self, index: VoxelIndex, current: EventId) -> bool {
        let last = &mut self.last_event[index];
        debug_assert!(
            last.is_none_or(|l| l <= current),
            "event {current} delivered after event {last:?} at voxel {index}"
        );
        if *last == Some(current) {
            return false;
        }
        *last = Some(current);
        true
    }

    pub fn last_event(&self, index: VoxelIndex) -> Option<EventId> {
        self.last_event[index]
    }

    /// Marks every voxel as never hit.
    pub fn reset(&mut self) {
        self.last_event.fill(None);
    }

    pub fn len(&self) -> usize {
        self.last_event.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_event.is_empty()
    }
}
