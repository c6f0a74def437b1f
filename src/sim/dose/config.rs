use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::Point;
use crate::error::DoseError;
use crate::sim::geometry::VoxelGrid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoseActorConfig {
    // Outputs
    pub enable_dose: bool,
    pub enable_squared_dose: bool,
    pub enable_uncertainty: bool,

    // Scoring
    /// Score neutrons with the corrected kerma factor.
    pub enable_correction: bool,
    /// Also score gammas, with the track-length estimator photon formula.
    pub enable_alternate_estimator_correction: bool,
    /// Kill every particle that is not scored.
    pub enable_secondary_suppression: bool,
    /// Capture the conversion curve of each material encountered.
    pub enable_conversion_curve_dump: bool,

    // Grid
    pub resolution: [usize; 3],
    /// Half extents of the scored box, m.
    pub half_size: [f64; 3],
    /// Center of the scored box, m.
    pub position: [f64; 3],

    /// Base output file name. Outputs are derived from it, e.g.
    /// `out/ntle.json` gives `out/ntle-Dose.json`.
    pub save_path: PathBuf,
}

impl DoseActorConfig {
    pub fn new() -> Self {
        Self {
            enable_dose: false,
            enable_squared_dose: false,
            enable_uncertainty: false,
            enable_correction: false,
            enable_alternate_estimator_correction: false,
            enable_secondary_suppression: false,
            enable_conversion_curve_dump: false,
            resolution: [1, 1, 1],
            half_size: [0.5, 0.5, 0.5],
            position: [0.0, 0.0, 0.0],
            save_path: PathBuf::from("output/dose.json"),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse dose actor configuration")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse dose actor configuration: {}", path.display()))
    }

    /// True if per-event statistics (and thus event deduplication) are needed.
    pub fn tracks_events(&self) -> bool {
        self.enable_squared_dose || self.enable_uncertainty
    }

    /// Checks the startup preconditions of an actor named `actor`.
    pub fn validate(&self, actor: &str) -> Result<(), DoseError> {
        if !self.enable_dose {
            return Err(DoseError::NoScoringOutput(actor.to_string()));
        }
        self.build_grid().map(|_| ())
    }

    pub fn build_grid(&self) -> Result<VoxelGrid, DoseError> {
        VoxelGrid::new(self.resolution, self.half_size, Point::from(self.position))
    }

    /// Output file of the dose grid: `<stem>-Dose.<ext>`.
    pub fn dose_path(&self) -> PathBuf {
        derived_path(&self.save_path, "-Dose", "json")
    }

    /// Output file of the conversion curve dump: `<stem>-KermaFactorDump.json`.
    pub fn curve_dump_path(&self) -> PathBuf {
        let mut path = self.save_path.clone();
        path.set_extension("");
        append_to_file_name(path, "-KermaFactorDump.json")
    }
}

impl Default for DoseActorConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn derived_path(base: &Path, suffix: &str, default_ext: &str) -> PathBuf {
    let ext = base
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or(default_ext)
        .to_string();
    let mut path = base.to_path_buf();
    path.set_extension("");
    append_to_file_name(path, &format!("{suffix}.{ext}"))
}

fn append_to_file_name(path: PathBuf, tail: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}{tail}"))
}
