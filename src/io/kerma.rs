//! Kerma table I/O.

use crate::sim::dose::KermaTable;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Reads and validates a kerma table from a JSON file.
///
/// Expected layout:
///
/// ```text
/// { "materials": { "Water": { "kerma": { "energies": [...], "values": [...] },
///                             "corrected_kerma": {...},   // optional
///                             "photon_mu_en": {...} } } } // optional
/// ```
pub fn read_kerma_table(path: &Path) -> Result<KermaTable> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let table: KermaTable = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to deserialize kerma table from: {}", path.display()))?;
    table
        .validate()
        .with_context(|| format!("Invalid kerma table: {}", path.display()))?;

    Ok(table)
}

pub fn write_kerma_table(path: &Path, table: &KermaTable) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, table)
        .with_context(|| format!("Failed to serialize kerma table to: {}", path.display()))?;

    Ok(())
}
