use anyhow::Result;

use crate::error::DoseError;
use crate::io::{GridWriter, write_curves};
use crate::sim::framework::{
    Actor, EventObserver, ParticleKind, RunObserver, Step, StepObserver, TrackStatus,
};
use crate::sim::geometry::{VoxelGeometry, VoxelGrid, VoxelIndex};

use super::accumulator::VoxelAccumulator;
use super::config::DoseActorConfig;
use super::conversion::{ConversionFactorProvider, DoseQuery};
use super::curves::ConversionCurveCollector;
use super::snapshot::{DoseReport, DoseSnapshot};
use super::tracker::{EventAttributionTracker, EventId};

/// Which conversion a scored step goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scoring {
    Neutron,
    NeutronCorrected,
    PhotonAlternateEstimator,
}

/// Neutron dose actor scoring steps with the track-length estimator.
///
/// One instance owns all of its accumulation state, including the event
/// counter, so parallel workers each run their own actor and merge the
/// snapshots afterwards.
pub struct DoseActor<P: ConversionFactorProvider, G: VoxelGeometry = VoxelGrid> {
    name: String,
    config: DoseActorConfig,
    provider: P,
    geometry: G,
    voxel_volume: f64,
    accumulator: VoxelAccumulator,
    tracker: Option<EventAttributionTracker>,
    curves: Option<ConversionCurveCollector>,
    current_event: Option<EventId>,
}

impl<P: ConversionFactorProvider> DoseActor<P, VoxelGrid> {
    /// Builds an actor scoring on the regular grid described by `config`.
    pub fn from_config(name: &str, config: DoseActorConfig, provider: P) -> Result<Self, DoseError> {
        config.validate(name)?;
        let grid = config.build_grid()?;
        Self::new(name, config, provider, grid)
    }
}

impl<P: ConversionFactorProvider, G: VoxelGeometry> DoseActor<P, G> {
    pub fn new(
        name: &str,
        config: DoseActorConfig,
        provider: P,
        geometry: G,
    ) -> Result<Self, DoseError> {
        if !config.enable_dose {
            return Err(DoseError::NoScoringOutput(name.to_string()));
        }
        let voxel_volume = geometry.voxel_volume();
        if !voxel_volume.is_finite() || voxel_volume <= 0.0 {
            return Err(DoseError::InvalidVoxelVolume(voxel_volume));
        }

        let num_voxels = geometry.num_voxels();
        let tracks_events = config.tracks_events();

        log::info!(
            "dose actor '{name}'\n\
             \tdose image        = {}\n\
             \tdose squared      = {}\n\
             \tdose uncertainty  = {}\n\
             \tdose correction   = {}\n\
             \tTLE correction    = {}\n\
             \tkill secondaries  = {}\n\
             \tdump kerma factor = {}\n\
             \tvoxels            = {num_voxels} ({voxel_volume:e} m^3 each)\n\
             \tdose file         = {}",
            config.enable_dose,
            config.enable_squared_dose,
            config.enable_uncertainty,
            config.enable_correction,
            config.enable_alternate_estimator_correction,
            config.enable_secondary_suppression,
            config.enable_conversion_curve_dump,
            config.dose_path().display(),
        );

        let mut actor = Self {
            name: name.to_string(),
            accumulator: VoxelAccumulator::new(num_voxels, tracks_events),
            tracker: tracks_events.then(|| EventAttributionTracker::new(num_voxels)),
            curves: config
                .enable_conversion_curve_dump
                .then(ConversionCurveCollector::new),
            config,
            provider,
            geometry,
            voxel_volume,
            current_event: None,
        };
        actor.reset_data();
        Ok(actor)
    }

    /// Clears accumulated dose, event attribution and collected curves.
    pub fn reset_data(&mut self) {
        self.accumulator.reset();
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.reset();
        }
        if let Some(curves) = self.curves.as_mut() {
            curves.clear();
        }
    }

    /// Starts a run: resets all data and the event counter.
    pub fn start_run(&mut self) {
        log::debug!("dose actor '{}': begin of run", self.name);
        self.reset_data();
        self.current_event = None;
    }

    /// Advances the event counter. The first event of a run gets id 0.
    pub fn start_event(&mut self) -> EventId {
        let event = self.current_event.map_or(0, |e| e + 1);
        self.current_event = Some(event);
        log::trace!("dose actor '{}': begin of event {event}", self.name);
        event
    }

    /// Finalizes every event still open in a voxel.
    pub fn finish_run(&mut self) {
        log::debug!(
            "dose actor '{}': end of run after {} events",
            self.name,
            self.number_of_events()
        );
        self.accumulator.flush_all();
    }

    /// Resolves the voxel of the pre-step position, then scores the step.
    pub fn process_step(&mut self, step: &Step) -> Result<TrackStatus, DoseError> {
        let index = self.geometry.resolve_voxel_index(step.pre_step_position)?;
        self.process_step_in_voxel(index, step)
    }

    /// Scores one step whose voxel is already known.
    pub fn process_step_in_voxel(
        &mut self,
        index: VoxelIndex,
        step: &Step,
    ) -> Result<TrackStatus, DoseError> {
        let Some(scoring) = self.classify(step.particle) else {
            if self.config.enable_secondary_suppression && step.particle != ParticleKind::Neutron {
                return Ok(TrackStatus::StopAndKill);
            }
            return Ok(TrackStatus::Alive);
        };

        let len = self.accumulator.len();
        if index >= len {
            return Err(DoseError::VoxelOutOfRange { index, len });
        }
        let event = self.current_event.ok_or(DoseError::NoActiveEvent)?;

        let query = DoseQuery::new(
            step.kinetic_energy,
            &step.material,
            step.step_length,
            self.voxel_volume,
        )?;
        let dose = match scoring {
            Scoring::Neutron => self.provider.dose(&query)?,
            Scoring::NeutronCorrected => self.provider.corrected_dose(&query)?,
            Scoring::PhotonAlternateEstimator => {
                self.provider.corrected_dose_alternate_estimator(&query)?
            }
        };

        // Last fallible call; a failed step leaves no trace in the grid.
        if let Some(curves) = self.curves.as_mut() {
            let provider = &self.provider;
            curves.record_if_new(&step.material, || provider.conversion_curve(&step.material))?;
        }

        match self.tracker.as_mut() {
            Some(tracker) => {
                if tracker.is_new_event_for_voxel(index, event) {
                    self.accumulator.flush_and_begin_event(index, dose);
                } else {
                    self.accumulator.add_pending(index, dose);
                }
            }
            None => self.accumulator.add_direct(index, dose),
        }

        Ok(TrackStatus::Alive)
    }

    fn classify(&self, particle: ParticleKind) -> Option<Scoring> {
        match particle {
            ParticleKind::Neutron if self.config.enable_correction => {
                Some(Scoring::NeutronCorrected)
            }
            ParticleKind::Neutron => Some(Scoring::Neutron),
            ParticleKind::Gamma if self.config.enable_alternate_estimator_correction => {
                Some(Scoring::PhotonAlternateEstimator)
            }
            ParticleKind::Gamma | ParticleKind::Other => None,
        }
    }

    /// Number of events started in this run.
    pub fn number_of_events(&self) -> u64 {
        self.current_event.map_or(0, |e| e + 1)
    }

    pub fn current_event(&self) -> Option<EventId> {
        self.current_event
    }

    /// Finalized statistics. Call [`DoseActor::finish_run`] first to include
    /// events still open in some voxels.
    pub fn snapshot(&self) -> DoseSnapshot {
        self.accumulator.export_snapshot(self.number_of_events())
    }

    pub fn report(&self) -> DoseReport {
        DoseReport::new(
            &self.name,
            &self.geometry,
            &self.snapshot(),
            self.config.enable_squared_dose,
            self.config.enable_uncertainty,
        )
    }

    /// Flushes open events and writes the dose grid and, if enabled, the
    /// conversion curve dump.
    pub fn save_data<W: GridWriter>(&mut self, writer: &W) -> Result<()> {
        self.accumulator.flush_all();
        let path = self.config.dose_path();
        writer.write(&path, &self.report())?;
        log::info!("dose actor '{}': wrote {}", self.name, path.display());

        if let Some(curves) = self.curves.as_ref() {
            let path = self.config.curve_dump_path();
            write_curves(&path, curves)?;
            log::info!(
                "dose actor '{}': wrote {} conversion curves to {}",
                self.name,
                curves.len(),
                path.display()
            );
        }

        // Saved events are closed; later hits start fresh events.
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.reset();
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &DoseActorConfig {
        &self.config
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn accumulator(&self) -> &VoxelAccumulator {
        &self.accumulator
    }

    pub fn curves(&self) -> Option<&ConversionCurveCollector> {
        self.curves.as_ref()
    }
}

impl<P: ConversionFactorProvider, G: VoxelGeometry> RunObserver for DoseActor<P, G> {
    fn begin_of_run(&mut self) -> Result<()> {
        self.start_run();
        Ok(())
    }

    fn end_of_run(&mut self) -> Result<()> {
        self.finish_run();
        Ok(())
    }
}

impl<P: ConversionFactorProvider, G: VoxelGeometry> EventObserver for DoseActor<P, G> {
    fn begin_of_event(&mut self) -> Result<()> {
        self.start_event();
        Ok(())
    }
}

impl<P: ConversionFactorProvider, G: VoxelGeometry> StepObserver for DoseActor<P, G> {
    fn on_step(&mut self, step: &Step) -> Result<TrackStatus> {
        Ok(self.process_step(step)?)
    }
}

impl<P: ConversionFactorProvider, G: VoxelGeometry> Actor for DoseActor<P, G> {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;
    use crate::sim::dose::curves::ConversionCurve;
    use std::cell::Cell;

    /// Dose equals the step length, whatever the material and energy;
    /// corrected variants scale it so tests can tell them apart.
    #[derive(Default)]
    struct LengthProvider {
        curve_requests: Cell<usize>,
    }

    impl ConversionFactorProvider for LengthProvider {
        fn dose(&self, q: &DoseQuery) -> Result<f64, DoseError> {
            if q.material == "Unknown" {
                return Err(DoseError::UnknownMaterial(q.material.to_string()));
            }
            Ok(q.step_length)
        }

        fn corrected_dose(&self, q: &DoseQuery) -> Result<f64, DoseError> {
            Ok(10.0 * q.step_length)
        }

        fn corrected_dose_alternate_estimator(&self, q: &DoseQuery) -> Result<f64, DoseError> {
            Ok(100.0 * q.step_length)
        }

        fn conversion_curve(&self, material: &str) -> Result<ConversionCurve, DoseError> {
            self.curve_requests.set(self.curve_requests.get() + 1);
            if material == "NoCurve" {
                return Err(DoseError::MissingCurve {
                    material: material.to_string(),
                    curve: "kerma",
                });
            }
            Ok(ConversionCurve {
                material: material.to_string(),
                energies: vec![1.0],
                factors: vec![1.0],
            })
        }
    }

    fn config() -> DoseActorConfig {
        let mut c = DoseActorConfig::new();
        c.enable_dose = true;
        c.resolution = [2, 2, 2];
        c
    }

    fn actor(config: DoseActorConfig) -> DoseActor<LengthProvider> {
        DoseActor::from_config("ntle", config, LengthProvider::default()).unwrap()
    }

    fn neutron(dose: f64) -> Step {
        Step::new(ParticleKind::Neutron, "Water", 1.0, dose, Point::origin())
    }

    fn gamma(dose: f64) -> Step {
        Step::new(ParticleKind::Gamma, "Water", 1.0, dose, Point::origin())
    }

    #[test]
    fn test_requires_dose_output() {
        let err = DoseActor::from_config("ntle", DoseActorConfig::new(), LengthProvider::default())
            .err()
            .unwrap();
        assert_eq!(err, DoseError::NoScoringOutput("ntle".to_string()));
    }

    #[test]
    fn test_running_sum_without_statistics() {
        let mut a = actor(config());
        a.start_run();
        a.start_event();
        a.process_step_in_voxel(1, &neutron(2.0)).unwrap();
        a.process_step_in_voxel(1, &neutron(3.0)).unwrap();
        assert!((a.accumulator().sum(1) - 5.0).abs() < 1e-10);
        assert_eq!(a.accumulator().sum_squares(1), None);
    }

    #[test]
    fn test_same_event_hits_are_one_sample() {
        let mut c = config();
        c.enable_squared_dose = true;
        let mut a = actor(c);
        a.start_run();
        a.start_event();
        a.process_step_in_voxel(7, &neutron(2.0)).unwrap();
        a.process_step_in_voxel(7, &neutron(3.0)).unwrap();
        a.finish_run();
        assert!((a.accumulator().sum(7) - 5.0).abs() < 1e-10);
        assert!((a.accumulator().sum_squares(7).unwrap() - 25.0).abs() < 1e-10);
    }

    #[test]
    fn test_new_event_flushes_voxel() {
        let mut c = config();
        c.enable_uncertainty = true;
        let mut a = actor(c);
        a.start_run();
        a.start_event();
        a.process_step_in_voxel(3, &neutron(5.0)).unwrap();
        a.start_event();
        a.process_step_in_voxel(3, &neutron(7.0)).unwrap();
        // first event closed by the second event's hit
        assert!((a.accumulator().sum(3) - 5.0).abs() < 1e-10);
        a.finish_run();
        assert!((a.accumulator().sum(3) - 12.0).abs() < 1e-10);
        assert!((a.accumulator().sum_squares(3).unwrap() - 74.0).abs() < 1e-10);
        assert_eq!(a.number_of_events(), 2);
    }

    #[test]
    fn test_event_counter() {
        let mut a = actor(config());
        assert_eq!(a.current_event(), None);
        assert_eq!(a.start_event(), 0);
        assert_eq!(a.start_event(), 1);
        assert_eq!(a.number_of_events(), 2);
        a.start_run();
        assert_eq!(a.number_of_events(), 0);
        assert_eq!(a.start_event(), 0);
    }

    #[test]
    fn test_step_before_first_event_is_rejected() {
        let mut a = actor(config());
        a.start_run();
        assert_eq!(
            a.process_step_in_voxel(0, &neutron(1.0)),
            Err(DoseError::NoActiveEvent)
        );
    }

    #[test]
    fn test_correction_modes_select_conversion() {
        let mut c = config();
        c.enable_correction = true;
        c.enable_alternate_estimator_correction = true;
        let mut a = actor(c);
        a.start_run();
        a.start_event();
        a.process_step_in_voxel(0, &neutron(1.0)).unwrap();
        a.process_step_in_voxel(1, &gamma(1.0)).unwrap();
        assert!((a.accumulator().sum(0) - 10.0).abs() < 1e-10);
        assert!((a.accumulator().sum(1) - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_secondary_suppression() {
        let mut c = config();
        c.enable_secondary_suppression = true;
        let mut a = actor(c);
        a.start_run();
        a.start_event();
        assert_eq!(
            a.process_step_in_voxel(0, &gamma(1.0)).unwrap(),
            TrackStatus::StopAndKill
        );
        let electron = Step::new(ParticleKind::Other, "Water", 1.0, 1.0, Point::origin());
        assert_eq!(
            a.process_step_in_voxel(0, &electron).unwrap(),
            TrackStatus::StopAndKill
        );
        assert_eq!(
            a.process_step_in_voxel(0, &neutron(1.0)).unwrap(),
            TrackStatus::Alive
        );
        // only the neutron was scored
        assert!((a.accumulator().sum(0) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_unscored_particles_survive_without_suppression() {
        let mut a = actor(config());
        a.start_run();
        a.start_event();
        assert_eq!(
            a.process_step_in_voxel(0, &gamma(1.0)).unwrap(),
            TrackStatus::Alive
        );
        assert!(a.accumulator().sum(0).abs() < 1e-10);
    }

    #[test]
    fn test_alternate_estimator_scores_gammas_despite_suppression() {
        let mut c = config();
        c.enable_secondary_suppression = true;
        c.enable_alternate_estimator_correction = true;
        let mut a = actor(c);
        a.start_run();
        a.start_event();
        assert_eq!(
            a.process_step_in_voxel(2, &gamma(1.0)).unwrap(),
            TrackStatus::Alive
        );
        assert!((a.accumulator().sum(2) - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_unknown_material_is_fatal() {
        let mut a = actor(config());
        a.start_run();
        a.start_event();
        let step = Step::new(ParticleKind::Neutron, "Unknown", 1.0, 1.0, Point::origin());
        assert_eq!(
            a.process_step_in_voxel(0, &step),
            Err(DoseError::UnknownMaterial("Unknown".to_string()))
        );
    }

    #[test]
    fn test_invalid_step_inputs_are_fatal() {
        let mut a = actor(config());
        a.start_run();
        a.start_event();
        let step = Step::new(ParticleKind::Neutron, "Water", -1.0, 1.0, Point::origin());
        assert_eq!(
            a.process_step_in_voxel(0, &step),
            Err(DoseError::InvalidEnergy(-1.0))
        );
        assert_eq!(
            a.process_step_in_voxel(8, &neutron(1.0)),
            Err(DoseError::VoxelOutOfRange { index: 8, len: 8 })
        );
    }

    #[test]
    fn test_curves_captured_once_per_material() {
        let mut c = config();
        c.enable_conversion_curve_dump = true;
        let mut a = actor(c);
        a.start_run();
        a.start_event();
        for i in 0..100 {
            let material = ["Water", "Bone", "Air"][i % 3];
            let step = Step::new(ParticleKind::Neutron, material, 1.0, 0.1, Point::origin());
            a.process_step_in_voxel(i % 8, &step).unwrap();
        }
        assert_eq!(a.curves().unwrap().len(), 3);
        assert_eq!(a.provider.curve_requests.get(), 3);

        a.start_run();
        assert!(a.curves().unwrap().is_empty());
    }

    #[test]
    fn test_failed_curve_capture_leaves_grid_untouched() {
        let mut c = config();
        c.enable_conversion_curve_dump = true;
        c.enable_uncertainty = true;
        let mut a = actor(c);
        a.start_run();
        a.start_event();
        let step = Step::new(ParticleKind::Neutron, "NoCurve", 1.0, 4.0, Point::origin());
        assert!(matches!(
            a.process_step_in_voxel(0, &step),
            Err(DoseError::MissingCurve { .. })
        ));
        a.finish_run();
        assert_eq!(a.accumulator().sum(0), 0.0);
        assert_eq!(a.accumulator().finalized_events(0), Some(0));

        // the voxel is still unseen by the tracker
        a.process_step_in_voxel(0, &neutron(1.0)).unwrap();
        a.finish_run();
        assert!((a.accumulator().sum(0) - 1.0).abs() < 1e-10);
        assert_eq!(a.accumulator().finalized_events(0), Some(1));
    }

    #[test]
    fn test_infinite_step_inputs_are_fatal() {
        let mut c = config();
        c.enable_squared_dose = true;
        let mut a = actor(c);
        a.start_run();
        a.start_event();
        let long = Step::new(ParticleKind::Neutron, "Water", 1.0, f64::INFINITY, Point::origin());
        assert_eq!(
            a.process_step_in_voxel(0, &long),
            Err(DoseError::InvalidStepLength(f64::INFINITY))
        );
        let hot = Step::new(ParticleKind::Neutron, "Water", f64::INFINITY, 1.0, Point::origin());
        assert_eq!(
            a.process_step_in_voxel(0, &hot),
            Err(DoseError::InvalidEnergy(f64::INFINITY))
        );
        a.finish_run();
        assert_eq!(a.accumulator().sum(0), 0.0);
        assert_eq!(a.accumulator().sum_squares(0), Some(0.0));
    }

    #[test]
    fn test_process_step_resolves_voxel() {
        let mut a = actor(config());
        a.start_run();
        a.start_event();
        let step = Step::new(
            ParticleKind::Neutron,
            "Water",
            1.0,
            2.0,
            Point::new(0.25, 0.25, 0.25),
        );
        a.process_step(&step).unwrap();
        let grid = a.geometry();
        assert!((a.accumulator().sum(grid.index_of(1, 1, 1)) - 2.0).abs() < 1e-10);

        let outside = Step::new(ParticleKind::Neutron, "Water", 1.0, 2.0, Point::new(9., 0., 0.));
        assert!(matches!(
            a.process_step(&outside),
            Err(DoseError::PositionOutsideGrid { .. })
        ));
        let lost = Step::new(ParticleKind::Neutron, "Water", 1.0, 2.0, Point::new(f64::NAN, 0., 0.));
        assert!(matches!(
            a.process_step(&lost),
            Err(DoseError::PositionOutsideGrid { .. })
        ));
        assert!((a.accumulator().sum(0)).abs() < 1e-10);
    }

    #[test]
    fn test_start_run_resets_everything() {
        let mut c = config();
        c.enable_uncertainty = true;
        let mut a = actor(c);
        a.start_run();
        a.start_event();
        a.process_step_in_voxel(0, &neutron(1.0)).unwrap();
        a.start_run();
        a.finish_run();
        let snap = a.snapshot();
        assert!(snap.sum.iter().all(|&s| s == 0.0));
        assert!(snap.uncertainty_grid().iter().all(|u| u.is_none()));
    }
}
