//! Run orchestration: validate, resolve the field map, fan out, aggregate.

use std::path::PathBuf;
use std::time::Instant;

use ms_core::traits::{DetectorBuilder, TransportEngine};
use ms_core::{Error, MuonBatch, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregateResult, aggregate};
use crate::detector::resolve_field_map;
use crate::options::RunConfig;
use crate::partition::{effective_workers, partition};
use crate::presets::validate_params;
use crate::worker::{WorkerContext, WorkerOutput, run_worker};

/// Aggregate plus run bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Aggregated records and statistics.
    pub result: AggregateResult,
    /// Workers actually started.
    pub n_workers: usize,
    /// Transport engine name.
    pub engine: String,
    /// Field-map cache used by every worker, if any.
    pub field_map: Option<PathBuf>,
    /// Wall time spent resolving the field map (s).
    pub field_map_s: f64,
    /// Wall time of the worker fan-out (s).
    pub simulation_s: f64,
}

/// Simulate every muon of `batch` and aggregate the results.
///
/// Preconditions (parameter vector, options, empty batch) are checked before
/// any worker starts. The field map is resolved once here; workers only read
/// it. Any worker error aborts the run without a partial aggregate.
pub fn simulate_batch<E, B>(
    engine: &E,
    builder: &B,
    batch: &MuonBatch,
    config: &RunConfig,
) -> Result<RunSummary>
where
    E: TransportEngine,
    B: DetectorBuilder,
{
    validate_params(&config.params)?;
    config.options.validate()?;
    if batch.is_empty() {
        return Err(Error::Validation("muon batch is empty".into()));
    }

    let n_workers = effective_workers(config.requested_workers(), batch.len());
    let request = config.options.build_request(&config.params, n_workers);

    let t0 = Instant::now();
    let field_map = resolve_field_map(builder, &request)?;
    let field_map_s = t0.elapsed().as_secs_f64();

    let chunks = partition(batch.records(), n_workers)?;
    let ctx = WorkerContext { request: &request, options: &config.options, layout: batch.layout() };
    tracing::info!(
        engine = engine.name(),
        n_muons = batch.len(),
        n_workers,
        back_track = config.options.back_track,
        full_collection = config.options.collects_full_tracks(),
        "dispatching workers"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_workers)
        .build()
        .map_err(|e| Error::Computation(format!("failed to create thread pool: {e}")))?;

    let t1 = Instant::now();
    let outputs: Vec<WorkerOutput> = pool.install(|| {
        chunks
            .par_iter()
            .enumerate()
            .map(|(index, chunk)| run_worker(engine, builder, ctx, index, chunk))
            .collect::<Result<Vec<_>>>()
    })?;
    let simulation_s = t1.elapsed().as_secs_f64();

    let result = aggregate(
        outputs,
        batch,
        config.options.collects_full_tracks(),
        config.output_cap,
    )?;

    match &result.survival {
        Some(s) => tracing::info!(
            n_hits = s.n_hits,
            survival_rate = s.survival_rate,
            total_mass = result.total_mass,
            simulation_s,
            "simulation finished"
        ),
        None => tracing::info!(
            n_records = result.n_records,
            total_mass = result.total_mass,
            simulation_s,
            "simulation finished"
        ),
    }

    Ok(RunSummary {
        result,
        n_workers,
        engine: engine.name().to_string(),
        field_map,
        field_map_s,
        simulation_s,
    })
}
