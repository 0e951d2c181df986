//! Detector configuration handed from the geometry builder to the transport engine.
//!
//! Lengths are in metres, fields in tesla, masses in kilograms.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Magnet technology of the shield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnetVariant {
    /// Hybrid configuration with a superconducting magnet.
    Superconducting,
    /// Warm (normal-conducting) magnets only.
    NormalConducting,
}

/// Sensitive film as requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitiveFilm {
    /// Half-width along x.
    pub dx: f64,
    /// Half-width along y.
    pub dy: f64,
    /// Thickness.
    pub dz: f64,
    /// Axial position of the film.
    pub position: f64,
}

impl Default for SensitiveFilm {
    fn default() -> Self {
        Self { dx: 4.0, dy: 6.0, dz: 0.01, position: 82.0 }
    }
}

impl SensitiveFilm {
    /// Film with default transverse size at the given axial position.
    pub fn at(position: f64) -> Self {
        Self { position, ..Self::default() }
    }
}

/// Sensitive plane geometry as placed in the built detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivePlane {
    /// Axial position of the plane centre.
    pub z_center: f64,
    /// Half-width along x.
    pub dx: f64,
    /// Half-width along y.
    pub dy: f64,
    /// Thickness.
    pub dz: f64,
}

impl SensitivePlane {
    /// `true` if `(x, y)` lies within the transverse half-widths (edges inclusive).
    #[inline]
    pub fn contains_transverse(&self, x: f64, y: f64) -> bool {
        x.abs() <= self.dx && y.abs() <= self.dy
    }
}

impl From<SensitiveFilm> for SensitivePlane {
    fn from(f: SensitiveFilm) -> Self {
        Self { z_center: f.position, dx: f.dx, dy: f.dy, dz: f.dz }
    }
}

/// Where the engine takes its magnetic field from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSource {
    /// No field at all.
    Disabled,
    /// Idealized per-segment uniform fields.
    Idealized,
    /// Precomputed field map read from a shared cache file.
    Map {
        /// Cache file path.
        path: PathBuf,
        /// Fingerprint of the apparatus the map was computed for.
        fingerprint: String,
    },
}

/// One magnet segment along the beam axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnetSegment {
    /// Upstream face.
    pub z_start: f64,
    /// Downstream face.
    pub z_end: f64,
    /// Outer half-width along x (mean of entrance and exit).
    pub half_x: f64,
    /// Outer half-width along y (mean of entrance and exit).
    pub half_y: f64,
    /// Nominal field magnitude in the iron core.
    pub field_tesla: f64,
    /// Iron mass of the segment.
    pub mass_kg: f64,
}

/// Which tracks the engine keeps in its output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMode {
    /// Keep the full primary trajectory.
    pub store_primary: bool,
    /// Keep every particle's trajectory.
    pub store_all: bool,
}

impl StoreMode {
    /// Primary trajectories are needed when there is no film to report hits,
    /// or when back-tracking inspects the full track.
    pub fn for_collection(film: Option<&SensitiveFilm>, back_track: bool) -> Self {
        Self { store_primary: film.is_none() || back_track, store_all: false }
    }
}

/// Everything a geometry builder needs to produce a `DetectorConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Flat apparatus parameter vector.
    pub params: Vec<f64>,
    /// Magnet technology.
    pub magnet: MagnetVariant,
    /// Build the geometry without any magnetic field.
    pub force_no_field: bool,
    /// Use a simulated field map instead of idealized fields.
    pub use_field_maps: bool,
    /// Field-map cache location.
    pub field_map_path: Option<PathBuf>,
    /// Sensitive film, `None` to collect everything.
    pub sensitive_film: Option<SensitiveFilm>,
    /// Include the experimental cavern.
    pub add_cavern: bool,
    /// Threads available to the field-map computation.
    pub field_cores: usize,
}

/// Apparatus description consumed by the transport engine. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Parameter vector the detector was built from.
    pub params: Vec<f64>,
    /// Magnet technology.
    pub magnet: MagnetVariant,
    /// Magnet segments, ordered along z.
    pub segments: Vec<MagnetSegment>,
    /// Sensitive plane, if any.
    pub sensitive: Option<SensitivePlane>,
    /// Field source.
    pub field: FieldSource,
    /// Cavern included.
    pub add_cavern: bool,
    /// Total apparatus mass.
    pub total_mass: f64,
    /// Track storage policy.
    pub store: StoreMode,
}

impl DetectorConfig {
    /// Same configuration with a different storage policy.
    pub fn with_store_mode(self, store: StoreMode) -> Self {
        Self { store, ..self }
    }

    /// Downstream face of the last magnet, or 0 without magnets.
    pub fn apparatus_end(&self) -> f64 {
        self.segments.iter().map(|s| s.z_end).fold(0.0, f64::max)
    }
}
