//! Field-map cache shared read-only by every worker.
//!
//! The map is computed once by the parent process and written to a gzip JSON
//! file stamped with a SHA-256 fingerprint of the apparatus. Workers only read it.

use std::path::Path;

use ms_core::{BuildRequest, Error, MagnetSegment, MagnetVariant, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::persist;

/// Axial samples per magnet segment.
pub const SAMPLES_PER_SEGMENT: usize = 16;

/// One field sample on the beam axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSample {
    /// Axial position.
    pub z: f64,
    /// Field components (T).
    pub b: [f64; 3],
}

/// Cached field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMap {
    /// Fingerprint of the apparatus the map belongs to.
    pub fingerprint: String,
    /// Magnet technology.
    pub magnet: MagnetVariant,
    /// Samples ordered along z.
    pub samples: Vec<FieldSample>,
}

/// SHA-256 over everything that changes the field: parameters, magnet variant, field switch.
pub fn fingerprint(request: &BuildRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"FIELDv1\0");
    for p in &request.params {
        hasher.update(p.to_le_bytes());
    }
    hasher.update(match request.magnet {
        MagnetVariant::Superconducting => b"sc",
        MagnetVariant::NormalConducting => b"nc",
    });
    hasher.update([u8::from(request.force_no_field)]);
    format!("{:x}", hasher.finalize())
}

fn sample_segment(seg: &MagnetSegment) -> Vec<FieldSample> {
    let dz = (seg.z_end - seg.z_start) / SAMPLES_PER_SEGMENT as f64;
    (0..SAMPLES_PER_SEGMENT)
        .map(|i| FieldSample {
            z: seg.z_start + (i as f64 + 0.5) * dz,
            b: [0.0, seg.field_tesla, 0.0],
        })
        .collect()
}

/// Sample the idealized segment fields on `threads` threads (0 = global pool).
pub fn compute(
    request: &BuildRequest,
    segments: &[MagnetSegment],
    threads: usize,
) -> Result<FieldMap> {
    let run =
        || -> Vec<FieldSample> { segments.par_iter().flat_map_iter(sample_segment).collect() };

    let samples = if threads > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| Error::Computation(format!("failed to create thread pool: {e}")))?;
        pool.install(run)
    } else {
        run()
    };

    Ok(FieldMap { fingerprint: fingerprint(request), magnet: request.magnet, samples })
}

/// Write the map to its cache file.
pub fn write(path: &Path, map: &FieldMap) -> Result<()> {
    persist::write_json(path, map)
}

/// Read a cached map.
pub fn read(path: &Path) -> Result<FieldMap> {
    persist::read_json(path)
}

/// Read a cached map and check that it belongs to `request`.
pub fn read_matching(path: &Path, request: &BuildRequest) -> Result<FieldMap> {
    let map = read(path)?;
    let expected = fingerprint(request);
    if map.fingerprint != expected {
        return Err(Error::Validation(format!(
            "field map {} was computed for a different apparatus ({} != {})",
            path.display(),
            &map.fingerprint[..map.fingerprint.len().min(12)],
            &expected[..12]
        )));
    }
    Ok(map)
}
