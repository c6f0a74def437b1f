mod synthetic;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;

use synthetic::SyntheticSource;
use voxdose::io::{GridWriter, JsonGridWriter, read_kerma_table, write_curves};
use voxdose::sim::dose::{ConversionCurveCollector, DoseReport, DoseSnapshot};
use voxdose::sim::framework::{EventObserver, ObserverPipeline, RunObserver, StepObserver};
use voxdose::{DoseActor, DoseActorConfig, KermaTable, TrackStatus};

/// voxdose - voxelized neutron dose scoring on synthetic steps
#[derive(Parser, Debug)]
#[command(name = "voxdose", version, about)]
struct Cli {
    /// Dose actor configuration (JSON)
    #[arg(long, value_name = "FILE")]
    config: PathBuf,

    /// Kerma factor table (JSON)
    #[arg(long, value_name = "FILE")]
    kerma: PathBuf,

    /// Number of events to simulate
    #[arg(long, default_value_t = 1000)]
    events: u64,

    /// Number of independent workers, each with its own actor
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Maximum number of steps of a primary track
    #[arg(long, default_value_t = 20)]
    steps_per_track: usize,

    /// Random seed (random if omitted)
    #[arg(long)]
    seed: Option<u64>,
}

struct WorkerOutput {
    snapshot: DoseSnapshot,
    curves: Option<ConversionCurveCollector>,
    steps: usize,
    killed: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    anyhow::ensure!(cli.workers > 0, "at least one worker is required");

    let config = DoseActorConfig::from_json_file(&cli.config)?;
    let table = read_kerma_table(&cli.kerma)?;
    anyhow::ensure!(
        !table.is_empty(),
        "kerma table {} has no materials",
        cli.kerma.display()
    );
    let grid = config.build_grid()?;
    let seed = cli.seed.unwrap_or_else(rand::random);
    log::info!(
        "{} events on {} workers, seed {seed}",
        cli.events,
        cli.workers
    );

    let outputs = (0..cli.workers)
        .into_par_iter()
        .map(|w| {
            let events = events_for_worker(cli.events, cli.workers, w);
            let rng = StdRng::seed_from_u64(seed.wrapping_add(w as u64));
            run_worker(&config, &table, events, cli.steps_per_track, rng)
                .with_context(|| format!("worker {w} failed"))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut outputs = outputs.into_iter();
    let Some(first) = outputs.next() else {
        anyhow::bail!("no worker output");
    };
    let mut snapshot = first.snapshot;
    let mut curves = first.curves;
    let (mut steps, mut killed) = (first.steps, first.killed);
    for out in outputs {
        snapshot.merge(&out.snapshot)?;
        if let (Some(all), Some(c)) = (curves.as_mut(), out.curves.as_ref()) {
            all.absorb(c);
        }
        steps += out.steps;
        killed += out.killed;
    }

    let report = DoseReport::new(
        "voxdose",
        &grid,
        &snapshot,
        config.enable_squared_dose,
        config.enable_uncertainty,
    );
    let dose_path = config.dose_path();
    JsonGridWriter.write(&dose_path, &report)?;
    log::info!("wrote {}", dose_path.display());

    if let Some(curves) = curves.as_ref() {
        let path = config.curve_dump_path();
        write_curves(&path, curves)?;
        log::info!("wrote {} conversion curves to {}", curves.len(), path.display());
    }

    let total: f64 = snapshot.sum.iter().sum();
    let peak = report.dose.iter().cloned().fold(0.0_f64, f64::max);
    println!("events:            {}", snapshot.num_events);
    println!("steps:             {steps} ({killed} tracks killed)");
    println!("total dose:        {total:.4e} Gy");
    println!("peak mean dose:    {peak:.4e} Gy/event");
    if let Some(uncertainty) = report.dose_uncertainty.as_ref() {
        let defined = uncertainty.iter().filter(|u| u.is_some()).count();
        println!("defined sigma:     {defined}/{} voxels", uncertainty.len());
    }
    println!("output:            {}", dose_path.display());

    Ok(())
}

/// Splits `total` events as evenly as possible; earlier workers take the rest.
fn events_for_worker(total: u64, workers: usize, worker: usize) -> u64 {
    let workers = workers as u64;
    let worker = worker as u64;
    total / workers + u64::from(worker < total % workers)
}

fn run_worker(
    config: &DoseActorConfig,
    table: &KermaTable,
    events: u64,
    steps_per_track: usize,
    rng: StdRng,
) -> Result<WorkerOutput> {
    let mut actor = DoseActor::from_config("voxdose", config.clone(), table.clone())?;
    let materials = table
        .material_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut source = SyntheticSource::new(actor.geometry().clone(), materials, steps_per_track, rng);

    let (mut steps, mut killed) = (0, 0);
    {
        let mut pipeline = ObserverPipeline::new().with_actor(&mut actor);
        pipeline.begin_of_run()?;
        for _ in 0..events {
            pipeline.begin_of_event()?;
            for track in source.next_event() {
                for step in &track {
                    steps += 1;
                    if pipeline.on_step(step)? == TrackStatus::StopAndKill {
                        killed += 1;
                        break;
                    }
                }
            }
        }
        pipeline.end_of_run()?;
    }

    Ok(WorkerOutput {
        snapshot: actor.snapshot(),
        curves: actor.curves().cloned(),
        steps,
        killed,
    })
}
