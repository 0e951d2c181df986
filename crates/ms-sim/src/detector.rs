//! Detector configuration resolution.
//!
//! Field-map resolution happens once in the parent, before fan-out. Each
//! worker then builds its own `DetectorConfig` from the same request.

use std::path::PathBuf;
use std::time::Instant;

use ms_core::traits::DetectorBuilder;
use ms_core::{BuildRequest, DetectorConfig, Error, Result, StoreMode};

/// Make sure the field-map cache for `request` exists, computing it if needed.
///
/// Returns the cache path when field maps are in use. Must be called from the
/// parent only; workers never write the cache.
pub fn resolve_field_map<B: DetectorBuilder + ?Sized>(
    builder: &B,
    request: &BuildRequest,
) -> Result<Option<PathBuf>> {
    if !request.use_field_maps {
        return Ok(None);
    }
    let path = request
        .field_map_path
        .clone()
        .ok_or_else(|| Error::Validation("field maps requested without a cache path".into()))?;

    if builder.field_map_is_current(request, &path)? {
        tracing::info!(path = %path.display(), "reusing field map cache");
        return Ok(Some(path));
    }
    if path.exists() {
        tracing::warn!(path = %path.display(), "field map cache is stale, recomputing");
    }

    let t0 = Instant::now();
    builder.precompute_field_map(request, &path)?;
    tracing::info!(
        path = %path.display(),
        cores = request.field_cores,
        elapsed_s = t0.elapsed().as_secs_f64(),
        "field map computed"
    );
    Ok(Some(path))
}

/// Build a worker's private configuration with the storage policy for its collection mode.
pub fn build_worker_config<B: DetectorBuilder + ?Sized>(
    builder: &B,
    request: &BuildRequest,
    back_track: bool,
) -> Result<DetectorConfig> {
    let store = StoreMode::for_collection(request.sensitive_film.as_ref(), back_track);
    Ok(builder.build(request)?.with_store_mode(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ReferenceBuilder;
    use crate::presets::BASELINE;
    use ms_core::{MagnetVariant, SensitiveFilm};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(path: Option<PathBuf>) -> BuildRequest {
        BuildRequest {
            params: BASELINE.to_vec(),
            magnet: MagnetVariant::Superconducting,
            force_no_field: false,
            use_field_maps: path.is_some(),
            field_map_path: path,
            sensitive_film: Some(SensitiveFilm::default()),
            add_cavern: true,
            field_cores: 2,
        }
    }

    struct CountingBuilder {
        inner: ReferenceBuilder,
        computed: AtomicUsize,
    }

    impl DetectorBuilder for CountingBuilder {
        fn build(&self, request: &BuildRequest) -> Result<DetectorConfig> {
            self.inner.build(request)
        }

        fn precompute_field_map(&self, request: &BuildRequest, path: &Path) -> Result<()> {
            self.computed.fetch_add(1, Ordering::SeqCst);
            self.inner.precompute_field_map(request, path)
        }

        fn field_map_is_current(&self, request: &BuildRequest, path: &Path) -> Result<bool> {
            self.inner.field_map_is_current(request, path)
        }
    }

    #[test]
    fn test_no_field_maps_is_noop() {
        let b = CountingBuilder { inner: ReferenceBuilder, computed: AtomicUsize::new(0) };
        assert_eq!(resolve_field_map(&b, &request(None)).unwrap(), None);
        assert_eq!(b.computed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_computes_once_then_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fields.json.gz");
        let b = CountingBuilder { inner: ReferenceBuilder, computed: AtomicUsize::new(0) };
        let r = request(Some(path.clone()));

        assert_eq!(resolve_field_map(&b, &r).unwrap(), Some(path.clone()));
        assert_eq!(resolve_field_map(&b, &r).unwrap(), Some(path.clone()));
        assert_eq!(b.computed.load(Ordering::SeqCst), 1);

        let mut warm = r.clone();
        warm.magnet = MagnetVariant::NormalConducting;
        resolve_field_map(&b, &warm).unwrap();
        assert_eq!(b.computed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_worker_config_store_mode() {
        let r = request(None);
        let fwd = build_worker_config(&ReferenceBuilder, &r, false).unwrap();
        assert!(!fwd.store.store_primary);
        let back = build_worker_config(&ReferenceBuilder, &r, true).unwrap();
        assert!(back.store.store_primary);
        assert!(!back.store.store_all);

        let mut full = r.clone();
        full.sensitive_film = None;
        assert!(build_worker_config(&ReferenceBuilder, &full, false).unwrap().store.store_primary);
    }
}
