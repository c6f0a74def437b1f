//! Interfaces between the transport loop and the scorers attached to it.
//!
//! The transport engine drives runs, events and steps through the observer
//! traits. Scorers such as the dose actor implement the ones they need.

pub mod observer;
pub mod pipeline;
pub mod step;

pub use observer::{Actor, EventObserver, RunObserver, StepObserver};
pub use pipeline::ObserverPipeline;
pub use step::{ParticleKind, Step, TrackStatus};
