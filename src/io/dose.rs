//! Dose grid and conversion curve output.

use crate::sim::dose::{ConversionCurve, ConversionCurveCollector, DoseReport};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Persists a dose grid at the end of a run.
pub trait GridWriter {
    fn write(&self, path: &Path, report: &DoseReport) -> Result<()>;
}

/// Writes dose grids with [`write_dose_report`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonGridWriter;

impl GridWriter for JsonGridWriter {
    fn write(&self, path: &Path, report: &DoseReport) -> Result<()> {
        write_dose_report(path, report)
    }
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Writes a dose report to a JSON file, creating parent directories.
pub fn write_dose_report(path: &Path, report: &DoseReport) -> Result<()> {
    create_parent_dir(path)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, report)
        .with_context(|| format!("Failed to serialize dose report to: {}", path.display()))?;

    Ok(())
}

/// Reads a dose report written by [`write_dose_report`].
pub fn read_dose_report(path: &Path) -> Result<DoseReport> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let report: DoseReport = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to deserialize dose report from: {}", path.display()))?;

    anyhow::ensure!(
        report.dose.len() == report.resolution.iter().product::<usize>(),
        "dose report {} has {} values for resolution {:?}",
        path.display(),
        report.dose.len(),
        report.resolution
    );
    Ok(report)
}

/// Writes the collected conversion curves, in first-encounter order.
pub fn write_curves(path: &Path, curves: &ConversionCurveCollector) -> Result<()> {
    create_parent_dir(path)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    let curves: Vec<&ConversionCurve> = curves.curves().collect();
    serde_json::to_writer_pretty(writer, &curves)
        .with_context(|| format!("Failed to serialize conversion curves to: {}", path.display()))?;

    Ok(())
}
