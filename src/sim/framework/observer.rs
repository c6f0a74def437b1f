use anyhow::Result;

use super::{Step, TrackStatus};

/// Receives run boundaries.
pub trait RunObserver {
    fn begin_of_run(&mut self) -> Result<()>;

    /// Optional end-of-run hook, called after the last event.
    fn end_of_run(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Receives event boundaries.
pub trait EventObserver {
    fn begin_of_event(&mut self) -> Result<()>;
}

/// Receives every transported step.
pub trait StepObserver {
    fn on_step(&mut self, step: &Step) -> Result<TrackStatus>;
}

/// A scorer attached to the transport loop.
///
/// The transport engine only talks to the three observer traits.
pub trait Actor: RunObserver + EventObserver + StepObserver {
    /// Human-readable identifier for logging.
    fn name(&self) -> &str;
}
