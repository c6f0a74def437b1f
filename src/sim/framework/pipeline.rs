use anyhow::{Context, Result};

use super::{Actor, EventObserver, RunObserver, Step, StepObserver, TrackStatus};

/// Forwards transport callbacks to a sequence of actors.
///
/// Actors are borrowed, so the caller keeps ownership and can read their
/// results once the run is over.
pub struct ObserverPipeline<'a> {
    actors: Vec<&'a mut dyn Actor>,
}

impl<'a> ObserverPipeline<'a> {
    pub fn new() -> Self {
        Self { actors: vec![] }
    }

    pub fn with_actor<A: Actor>(mut self, actor: &'a mut A) -> Self {
        self.actors.push(actor);
        self
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Delivers all steps of one event, preceded by the event boundary.
    ///
    /// Returns one track status per step.
    pub fn process_event(&mut self, steps: &[Step]) -> Result<Vec<TrackStatus>> {
        self.begin_of_event()?;
        steps.iter().map(|step| self.on_step(step)).collect()
    }
}

impl Default for ObserverPipeline<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl RunObserver for ObserverPipeline<'_> {
    fn begin_of_run(&mut self) -> Result<()> {
        for actor in self.actors.iter_mut() {
            log::debug!("begin of run: {}", actor.name());
            actor
                .begin_of_run()
                .with_context(|| format!("begin of run failed in actor '{}'", actor.name()))?;
        }
        Ok(())
    }

    fn end_of_run(&mut self) -> Result<()> {
        for actor in self.actors.iter_mut() {
            log::debug!("end of run: {}", actor.name());
            actor
                .end_of_run()
                .with_context(|| format!("end of run failed in actor '{}'", actor.name()))?;
        }
        Ok(())
    }
}

impl EventObserver for ObserverPipeline<'_> {
    fn begin_of_event(&mut self) -> Result<()> {
        for actor in self.actors.iter_mut() {
            actor.begin_of_event()?;
        }
        Ok(())
    }
}

impl StepObserver for ObserverPipeline<'_> {
    fn on_step(&mut self, step: &Step) -> Result<TrackStatus> {
        let mut status = TrackStatus::Alive;
        for actor in self.actors.iter_mut() {
            let s = actor
                .on_step(step)
                .with_context(|| format!("step scoring failed in actor '{}'", actor.name()))?;
            status = status.combine(s);
        }
        Ok(status)
    }
}
