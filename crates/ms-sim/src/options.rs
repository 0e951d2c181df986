//! Run configuration.

use std::path::PathBuf;

use ms_core::{BuildRequest, Error, MagnetVariant, Result, SensitiveFilm};
use serde::{Deserialize, Serialize};

use crate::presets;

/// Default transverse beam-smearing radius (cm).
pub const DEFAULT_SMEAR_RADIUS_CM: f64 = 5.0;

/// Default cap on records kept in the aggregate for display.
pub const DEFAULT_OUTPUT_CAP: usize = 1000;

/// Per-muon simulation options shared by every worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    /// If set, every muon starts at `z = -input_dist` instead of its recorded z.
    pub input_dist: Option<f64>,
    /// Sensitive film; `None` collects full tracks.
    pub sensitive_film: Option<SensitiveFilm>,
    /// Judge hits from the trajectory endpoint instead of the film crossing.
    pub back_track: bool,
    /// Emit an all-zero row for muons without a valid hit instead of dropping them.
    pub return_nan: bool,
    /// Global seed. When unset, seeds are drawn per worker and per muon.
    pub seed: Option<u32>,
    /// Transverse beam-smearing radius (cm).
    pub smear_radius_cm: f64,
    /// Magnet technology.
    pub magnet: MagnetVariant,
    /// Include the experimental cavern.
    pub add_cavern: bool,
    /// Use a precomputed field map.
    pub use_field_maps: bool,
    /// Field-map cache file.
    pub field_map_path: Option<PathBuf>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            input_dist: None,
            sensitive_film: Some(SensitiveFilm::default()),
            back_track: false,
            return_nan: false,
            seed: None,
            smear_radius_cm: DEFAULT_SMEAR_RADIUS_CM,
            magnet: MagnetVariant::Superconducting,
            add_cavern: true,
            use_field_maps: false,
            field_map_path: None,
        }
    }
}

impl SimulationOptions {
    /// Reject option combinations no worker could honour.
    pub fn validate(&self) -> Result<()> {
        if !(self.smear_radius_cm.is_finite() && self.smear_radius_cm >= 0.0) {
            return Err(Error::Validation(format!(
                "smear radius must be finite and non-negative, got {}",
                self.smear_radius_cm
            )));
        }
        if let Some(d) = self.input_dist
            && !d.is_finite()
        {
            return Err(Error::Validation(format!("injection distance must be finite, got {d}")));
        }
        if let Some(f) = &self.sensitive_film {
            let ok = [f.dx, f.dy, f.dz].iter().all(|v| v.is_finite() && *v > 0.0)
                && f.position.is_finite();
            if !ok {
                return Err(Error::Validation(format!("invalid sensitive film {f:?}")));
            }
        }
        if self.use_field_maps && self.field_map_path.is_none() {
            return Err(Error::Validation("field maps requested without a cache path".into()));
        }
        Ok(())
    }

    /// Builder request for `params`.
    pub fn build_request(&self, params: &[f64], field_cores: usize) -> BuildRequest {
        BuildRequest {
            params: params.to_vec(),
            magnet: self.magnet,
            force_no_field: false,
            use_field_maps: self.use_field_maps,
            field_map_path: self.field_map_path.clone(),
            sensitive_film: self.sensitive_film,
            add_cavern: self.add_cavern,
            field_cores,
        }
    }

    /// `true` when full tracks are collected without validation.
    pub fn collects_full_tracks(&self) -> bool {
        self.sensitive_film.is_none()
    }
}

/// One simulation run: apparatus, options and fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Apparatus parameter vector.
    pub params: Vec<f64>,
    /// Requested worker count; clamped to the number of muons. 0 = all cores.
    pub workers: usize,
    /// Per-muon options.
    pub options: SimulationOptions,
    /// Keep at most this many records in the returned aggregate.
    pub output_cap: Option<usize>,
}

impl RunConfig {
    /// Worker count before clamping, with 0 read as the rayon default.
    pub fn requested_workers(&self) -> usize {
        if self.workers == 0 { rayon::current_num_threads() } else { self.workers }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            params: presets::BASELINE.to_vec(),
            workers: rayon::current_num_threads(),
            options: SimulationOptions::default(),
            output_cap: Some(DEFAULT_OUTPUT_CAP),
        }
    }
}
