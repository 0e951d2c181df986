//! Collaborator traits for muonshield
//!
//! The simulation pipeline drives an external geometry builder and an external
//! transport engine. Both are reached through the traits below so that the
//! orchestration logic does not depend on a concrete engine.

use std::path::Path;

use crate::{BuildRequest, DetectorConfig, Result, SeedVector, TrackData};

/// Kinematic state of one primary muon handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportRequest {
    /// `(px, py, pz)`
    pub momentum: [f64; 3],
    /// `(x, y, z)` starting point before smearing
    pub position: [f64; 3],
    /// Charge sign, `±1`
    pub charge: i8,
    /// Transverse beam-smearing radius, in centimetres.
    pub smear_radius_cm: f64,
    /// Per-event transport seed.
    pub seed: u64,
}

/// Output of one transport event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportEvent {
    /// Every stored trajectory point of the event.
    pub track: TrackData,
    /// Points recorded on the sensitive surface.
    pub sensitive: TrackData,
}

impl TransportEvent {
    /// Full stored track.
    pub fn collect(&self) -> &TrackData {
        &self.track
    }

    /// Sensitive-surface subset.
    pub fn collect_from_sensitive(&self) -> &TrackData {
        &self.sensitive
    }
}

/// Engine state bound to one worker task.
///
/// A session is initialized once per worker and owned exclusively by it.
/// Each `simulate` call is a self-contained request/response.
pub trait TransportSession {
    /// Apparatus mass as computed by the engine at initialization.
    fn total_mass(&self) -> f64;

    /// Drop secondary-particle tracks from event output.
    fn kill_secondary_tracks(&mut self, kill: bool);

    /// Transport one muon. An error here is fatal to the worker.
    fn simulate(&mut self, request: &TransportRequest) -> Result<TransportEvent>;
}

/// Factory for transport sessions.
pub trait TransportEngine: Send + Sync {
    /// Session type produced by this engine.
    type Session: TransportSession;

    /// Engine name (e.g. "ballistic")
    fn name(&self) -> &str;

    /// Initialize a session for `config`.
    fn initialize(&self, config: &DetectorConfig, seed: SeedVector) -> Result<Self::Session>;
}

/// Geometry and field builder.
pub trait DetectorBuilder: Send + Sync {
    /// Build a detector configuration. Must not write any shared file.
    fn build(&self, request: &BuildRequest) -> Result<DetectorConfig>;

    /// Compute the field map for `request` and write it to `path`.
    fn precompute_field_map(&self, request: &BuildRequest, path: &Path) -> Result<()>;

    /// `true` if `path` holds a field map usable for `request`.
    fn field_map_is_current(&self, request: &BuildRequest, path: &Path) -> Result<bool>;
}
