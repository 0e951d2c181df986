//! # ms-sim
//!
//! Parallel muon transport orchestration for muonshield.
//!
//! A run partitions a [`MuonBatch`](ms_core::MuonBatch) into contiguous chunks,
//! starts one worker per chunk on a fixed-size rayon pool, and merges the
//! per-worker records back in input order:
//!
//! ```text
//! partition -> run_worker (xK) -> HitExtractor -> aggregate
//! ```
//!
//! The field-map cache is resolved once in the parent before fan-out. Each
//! worker builds its own detector configuration and owns its engine session.
//!
//! [`ReferenceBuilder`] and [`BallisticEngine`] are dependency-free stand-ins
//! for a real geometry builder and transport engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Aggregation and survival statistics.
pub mod aggregate;
/// Reference geometry builder.
pub mod builder;
/// Field-map resolution and per-worker configuration.
pub mod detector;
/// Ballistic reference engine.
pub mod engine;
/// Field-map cache.
pub mod field_map;
/// Detection policies and hit extraction.
pub mod hits;
/// Run options.
pub mod options;
/// Workload partitioning.
pub mod partition;
/// File I/O.
pub mod persist;
/// Named parameter vectors.
pub mod presets;
/// Run orchestration.
pub mod run;
/// Multi-file sweep.
pub mod sweep;
/// Simulation worker.
pub mod worker;

pub use aggregate::{AggregateResult, SurvivalStats, aggregate};
pub use builder::ReferenceBuilder;
pub use detector::{build_worker_config, resolve_field_map};
pub use engine::{BallisticEngine, BallisticSession};
pub use hits::{DetectionPolicy, HitExtractor, backtrack_hit, forward_hit};
pub use options::{RunConfig, SimulationOptions};
pub use partition::{effective_workers, partition};
pub use run::{RunSummary, simulate_batch};
pub use sweep::{FileSurvival, SweepSummary, sweep_directory};
pub use worker::{WorkerContext, WorkerOutput, run_worker};
