//! Reference geometry builder.
//!
//! Turns the 63-value parameter vector into magnet segments placed back to
//! back from `z = 0`, estimates the iron mass, and places the sensitive
//! plane. Fields are idealized (uniform per segment); the field map is a
//! sampling of those fields. A production builder with finite-element fields
//! implements the same `DetectorBuilder` trait.

use std::path::Path;

use ms_core::traits::DetectorBuilder;
use ms_core::{
    BuildRequest, DetectorConfig, Error, FieldSource, MagnetSegment, MagnetVariant, Result,
    SensitivePlane, StoreMode,
};

use crate::field_map;
use crate::presets::{N_MAGNETS, PARAMS_PER_MAGNET, validate_params};

/// Iron density (kg/m^3).
pub const IRON_DENSITY: f64 = 7874.0;
/// Nominal field of a warm magnet (T).
pub const WARM_FIELD_T: f64 = 1.7;
/// Nominal field of the superconducting magnet (T).
pub const SC_FIELD_T: f64 = 5.1;
/// Index of the magnet replaced by the superconducting one in the hybrid layout.
pub const SC_MAGNET_INDEX: usize = 1;

const CM: f64 = 0.01;

/// Builder for the parametric shield.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceBuilder;

impl ReferenceBuilder {
    /// Create a builder.
    pub fn new() -> Self {
        Self
    }

    /// Magnet segments described by a validated parameter vector.
    pub fn segments(params: &[f64], magnet: MagnetVariant, no_field: bool) -> Vec<MagnetSegment> {
        let mut z = 0.0;
        (0..N_MAGNETS)
            .map(|i| {
                let half_length = params[i] * CM;
                let shape = &params[N_MAGNETS + i * PARAMS_PER_MAGNET..][..PARAMS_PER_MAGNET];
                let [dx_in, dx_out, dy_in, dy_out, gap_in, gap_out] =
                    [0, 1, 2, 3, 4, 5].map(|k| shape[k].abs() * CM);
                // shape[7] (coil current) only matters to a field solver.
                let yoke = shape[6].abs();

                let face =
                    |dx: f64, dy: f64, gap: f64| 4.0 * dx * dy * (1.0 + yoke) + 2.0 * gap * dy;
                let area = 0.5 * (face(dx_in, dy_in, gap_in) + face(dx_out, dy_out, gap_out));
                let length = 2.0 * half_length;

                let field_tesla = if no_field {
                    0.0
                } else if magnet == MagnetVariant::Superconducting && i == SC_MAGNET_INDEX {
                    SC_FIELD_T
                } else {
                    WARM_FIELD_T
                };

                let seg = MagnetSegment {
                    z_start: z,
                    z_end: z + length,
                    half_x: 0.5 * ((dx_in + gap_in) + (dx_out + gap_out)) * (1.0 + yoke),
                    half_y: 0.5 * (dy_in + dy_out),
                    field_tesla,
                    mass_kg: IRON_DENSITY * area * length,
                };
                z += length;
                seg
            })
            .collect()
    }
}

impl DetectorBuilder for ReferenceBuilder {
    fn build(&self, request: &BuildRequest) -> Result<DetectorConfig> {
        validate_params(&request.params)?;
        let segments = Self::segments(&request.params, request.magnet, request.force_no_field);

        let field = if request.force_no_field {
            FieldSource::Disabled
        } else if request.use_field_maps {
            let path = request.field_map_path.as_ref().ok_or_else(|| {
                Error::Validation("field maps requested without a cache path".into())
            })?;
            if !path.exists() {
                return Err(Error::Validation(format!(
                    "field map {} is missing; it must be computed before workers start",
                    path.display()
                )));
            }
            let map = field_map::read_matching(path, request)?;
            FieldSource::Map { path: path.clone(), fingerprint: map.fingerprint }
        } else {
            FieldSource::Idealized
        };

        let total_mass = segments.iter().map(|s| s.mass_kg).sum();

        Ok(DetectorConfig {
            params: request.params.clone(),
            magnet: request.magnet,
            segments,
            sensitive: request.sensitive_film.map(SensitivePlane::from),
            field,
            add_cavern: request.add_cavern,
            total_mass,
            store: StoreMode::default(),
        })
    }

    fn precompute_field_map(&self, request: &BuildRequest, path: &Path) -> Result<()> {
        validate_params(&request.params)?;
        let segments = Self::segments(&request.params, request.magnet, request.force_no_field);
        let map = field_map::compute(request, &segments, request.field_cores)?;
        field_map::write(path, &map)
    }

    fn field_map_is_current(&self, request: &BuildRequest, path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        match field_map::read(path) {
            Ok(map) => Ok(map.fingerprint == field_map::fingerprint(request)),
            Err(Error::Json(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::BASELINE;
    use ms_core::SensitiveFilm;

    fn request() -> BuildRequest {
        BuildRequest {
            params: BASELINE.to_vec(),
            magnet: MagnetVariant::Superconducting,
            force_no_field: false,
            use_field_maps: false,
            field_map_path: None,
            sensitive_film: Some(SensitiveFilm::at(82.0)),
            add_cavern: true,
            field_cores: 1,
        }
    }

    #[test]
    fn test_segments_contiguous() {
        let segs = ReferenceBuilder::segments(&BASELINE, MagnetVariant::Superconducting, false);
        assert_eq!(segs.len(), N_MAGNETS);
        assert_eq!(segs[0].z_start, 0.0);
        assert!((segs[0].z_end - 4.62).abs() < 1e-12);
        for w in segs.windows(2) {
            assert_eq!(w[0].z_end, w[1].z_start);
        }
        assert_eq!(segs[SC_MAGNET_INDEX].field_tesla, SC_FIELD_T);
        assert_eq!(segs[0].field_tesla, WARM_FIELD_T);
        assert!(segs.iter().all(|s| s.mass_kg > 0.0));
    }

    #[test]
    fn test_warm_variant_has_no_sc_field() {
        let segs = ReferenceBuilder::segments(&BASELINE, MagnetVariant::NormalConducting, false);
        assert!(segs.iter().all(|s| s.field_tesla == WARM_FIELD_T));
        let off = ReferenceBuilder::segments(&BASELINE, MagnetVariant::NormalConducting, true);
        assert!(off.iter().all(|s| s.field_tesla == 0.0));
    }

    #[test]
    fn test_build_is_deterministic() {
        let b = ReferenceBuilder::new();
        let c1 = b.build(&request()).unwrap();
        let c2 = b.build(&request()).unwrap();
        assert_eq!(c1, c2);
        assert_eq!(c1.total_mass.to_bits(), c2.total_mass.to_bits());
        assert_eq!(c1.sensitive.unwrap().z_center, 82.0);
        assert_eq!(c1.field, FieldSource::Idealized);
    }

    #[test]
    fn test_build_rejects_wrong_length() {
        let mut r = request();
        r.params.pop();
        assert!(matches!(ReferenceBuilder.build(&r), Err(Error::Validation(_))));
    }

    #[test]
    fn test_build_requires_precomputed_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fields.json.gz");
        let mut r = request();
        r.use_field_maps = true;
        r.field_map_path = Some(path.clone());

        let b = ReferenceBuilder;
        assert!(b.build(&r).is_err());
        assert!(!b.field_map_is_current(&r, &path).unwrap());

        b.precompute_field_map(&r, &path).unwrap();
        assert!(b.field_map_is_current(&r, &path).unwrap());
        let config = b.build(&r).unwrap();
        assert!(matches!(config.field, FieldSource::Map { .. }));

        let mut warm = r.clone();
        warm.magnet = MagnetVariant::NormalConducting;
        assert!(!b.field_map_is_current(&warm, &path).unwrap());
    }
}
