//! # ms-core
//!
//! Core types for muonshield.
//!
//! This crate provides:
//! - the muon population model (`MuonRecord`, `MuonBatch`) with charge normalization
//! - track and hit records produced by the transport engine
//! - the detector configuration consumed by the engine
//! - the collaborator traits (`DetectorBuilder`, `TransportEngine`, `TransportSession`)
//!
//! ## Architecture
//!
//! The simulation pipeline in `ms-sim` depends on the traits defined here,
//! never on a concrete engine. A real transport engine and geometry builder
//! plug in by implementing them.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Detector configuration produced by a geometry builder.
pub mod detector;
/// Error type and `Result` alias.
pub mod error;
/// Collaborator traits: geometry builder and transport engine.
pub mod traits;
/// Muon, track and hit records.
pub mod types;

pub use detector::{
    BuildRequest, DetectorConfig, FieldSource, MagnetSegment, MagnetVariant, SensitiveFilm,
    SensitivePlane, StoreMode,
};
pub use error::{Error, Result};
pub use types::{
    ColumnLayout, CompactHit, HitRecord, MUON_PDG, MuonBatch, MuonRecord, SeedVector, TrackData,
    TrackPoint, TrackRecord, normalize_charge,
};

/// muonshield version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
