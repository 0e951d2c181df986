//! Simulation worker: one engine session, one contiguous chunk of muons.

use std::time::Instant;

use ms_core::traits::{DetectorBuilder, TransportEngine, TransportRequest, TransportSession};
use ms_core::{BuildRequest, ColumnLayout, Error, HitRecord, MuonRecord, Result, SeedVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detector::build_worker_config;
use crate::hits::{DetectionPolicy, HitExtractor};
use crate::options::SimulationOptions;

/// Upper bound (exclusive) of each engine seed component drawn when no global seed is set.
pub const ENGINE_SEED_RANGE: u32 = 256;
/// Upper bound (exclusive) of per-muon transport seeds drawn when no global seed is set.
pub const EVENT_SEED_RANGE: u32 = 100;

/// Engine seed vector: the global seed in every slot, else fresh draws.
pub fn engine_seed<R: Rng>(global: Option<u32>, rng: &mut R) -> SeedVector {
    match global {
        Some(s) => SeedVector::splat(s),
        None => SeedVector(std::array::from_fn(|_| rng.random_range(0..ENGINE_SEED_RANGE))),
    }
}

/// Per-muon transport seed: the global seed, else a fresh draw.
pub fn event_seed<R: Rng>(global: Option<u32>, rng: &mut R) -> u64 {
    u64::from(global.unwrap_or_else(|| rng.random_range(0..EVENT_SEED_RANGE)))
}

/// Transport request for one muon, with the injection-distance override applied.
pub fn transport_request(
    muon: &MuonRecord,
    options: &SimulationOptions,
    seed: u64,
) -> TransportRequest {
    let mut position = muon.position;
    if let Some(d) = options.input_dist {
        position[2] = -d;
    }
    TransportRequest {
        momentum: muon.momentum,
        position,
        charge: muon.charge,
        smear_radius_cm: options.smear_radius_cm,
        seed,
    }
}

/// Output of one worker task.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerOutput {
    /// Partition slot.
    pub index: usize,
    /// Extracted records, in input order.
    pub records: Vec<HitRecord>,
    /// Apparatus mass reported by this worker's engine.
    pub total_mass: f64,
    /// Muons handed to this worker.
    pub n_input: usize,
    /// Seed vector the engine was initialized with.
    pub seed: SeedVector,
}

/// Everything a worker reads; shared by reference across the pool.
#[derive(Debug, Clone, Copy)]
pub struct WorkerContext<'a> {
    /// Builder request, identical for every worker.
    pub request: &'a BuildRequest,
    /// Per-muon options.
    pub options: &'a SimulationOptions,
    /// Column layout of the whole batch.
    pub layout: ColumnLayout,
}

/// Run one worker over `chunk`.
///
/// Engine initialization and transport errors abort the worker. Muons without
/// a valid hit go through the drop/placeholder policy.
pub fn run_worker<E, B>(
    engine: &E,
    builder: &B,
    ctx: WorkerContext<'_>,
    index: usize,
    chunk: &[MuonRecord],
) -> Result<WorkerOutput>
where
    E: TransportEngine + ?Sized,
    B: DetectorBuilder + ?Sized,
{
    let options = ctx.options;
    let config = build_worker_config(builder, ctx.request, options.back_track)?;
    let policy = DetectionPolicy::resolve(&config, options.back_track)?;
    let extractor = HitExtractor::new(policy, ctx.layout, options.return_nan);

    let mut rng = match options.seed {
        Some(s) => {
            StdRng::seed_from_u64(u64::from(s).wrapping_mul(2654435761).wrapping_add(index as u64))
        }
        None => StdRng::from_os_rng(),
    };
    let seed = engine_seed(options.seed, &mut rng);

    let t0 = Instant::now();
    let mut session = engine
        .initialize(&config, seed)
        .map_err(|e| Error::Engine(format!("worker {index}: engine initialization failed: {e}")))?;
    let total_mass = session.total_mass();
    session.kill_secondary_tracks(true);
    tracing::info!(
        worker = index,
        n_muons = chunk.len(),
        total_mass,
        init_s = t0.elapsed().as_secs_f64(),
        "engine initialized"
    );

    let mut records = Vec::with_capacity(chunk.len());
    for (i, muon) in chunk.iter().enumerate() {
        let request = transport_request(muon, options, event_seed(options.seed, &mut rng));
        let event = session
            .simulate(&request)
            .map_err(|e| Error::Engine(format!("worker {index}, muon {i}: {e}")))?;
        if let Some(record) = extractor.extract(&event, muon, seed) {
            records.push(record);
        }
    }

    tracing::debug!(worker = index, n_records = records.len(), "worker finished");
    Ok(WorkerOutput { index, records, total_mass, n_input: chunk.len(), seed })
}
