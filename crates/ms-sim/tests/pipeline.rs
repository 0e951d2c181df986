//! End-to-end tests of the simulation pipeline with a scripted engine.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_relative_eq;
use ms_core::traits::{TransportEngine, TransportEvent, TransportRequest, TransportSession};
use ms_core::{
    DetectorConfig, Error, HitRecord, MuonBatch, Result, SeedVector, SensitiveFilm, TrackData,
    TrackPoint,
};
use ms_sim::{BallisticEngine, ReferenceBuilder, RunConfig, simulate_batch};

/// Engine whose muons reach the plane iff `pz > 0`.
#[derive(Default)]
struct ScriptedEngine {
    /// Mass reported by the n-th initialized session (cycled); default 100.
    masses: Vec<f64>,
    /// Fail the n-th initialization.
    fail_init: Option<usize>,
    /// Fail the event whose momentum x equals this value.
    fail_event_px: Option<f64>,
    inits: AtomicUsize,
    seeds: Mutex<Vec<SeedVector>>,
    requests: Mutex<Vec<TransportRequest>>,
}

struct ScriptedSession<'a> {
    engine: &'a ScriptedEngine,
    plane_z: f64,
    mass: f64,
    kill: bool,
}

impl TransportSession for ScriptedSession<'_> {
    fn total_mass(&self) -> f64 {
        self.mass
    }

    fn kill_secondary_tracks(&mut self, kill: bool) {
        self.kill = kill;
    }

    fn simulate(&mut self, request: &TransportRequest) -> Result<TransportEvent> {
        assert!(self.kill, "secondaries must be disabled before transport");
        if self.engine.fail_event_px == Some(request.momentum[0]) {
            return Err(Error::Engine("geometry overlap".into()));
        }
        self.engine.requests.lock().unwrap().push(*request);
        let pdg_id = -13 * i32::from(request.charge);
        let start =
            TrackPoint { momentum: request.momentum, position: request.position, pdg_id };
        let mut track = TrackData::from_points([start]);
        let mut sensitive = TrackData::default();
        if request.momentum[2] > 0.0 {
            let end = TrackPoint { position: [0.0, 0.0, self.plane_z], ..start };
            track.push(end);
            sensitive.push(end);
        }
        Ok(TransportEvent { track, sensitive })
    }
}

impl<'e> TransportEngine for &'e ScriptedEngine {
    type Session = ScriptedSession<'e>;

    fn name(&self) -> &str {
        "scripted"
    }

    fn initialize(&self, config: &DetectorConfig, seed: SeedVector) -> Result<ScriptedSession<'e>> {
        let n = self.inits.fetch_add(1, Ordering::SeqCst);
        if self.fail_init == Some(n) {
            return Err(Error::Engine("no licence".into()));
        }
        self.seeds.lock().unwrap().push(seed);
        let mass = if self.masses.is_empty() { 100.0 } else { self.masses[n % self.masses.len()] };
        let plane_z = config.sensitive.map_or(0.0, |p| p.z_center);
        Ok(ScriptedSession { engine: *self, plane_z, mass, kill: false })
    }
}

fn rows(pz: &[f64], weights: Option<&[f64]>) -> MuonBatch {
    let rows: Vec<Vec<f64>> = pz
        .iter()
        .enumerate()
        .map(|(i, &pz)| {
            let mut row = vec![i as f64, 0.0, pz, 0.0, 0.0, -20.0, 13.0];
            if let Some(w) = weights {
                row.push(w[i]);
            }
            row
        })
        .collect();
    MuonBatch::from_rows(&rows).unwrap()
}

fn config(workers: usize) -> RunConfig {
    let mut c = RunConfig { workers, output_cap: None, ..Default::default() };
    c.options.seed = Some(7);
    c
}

#[test]
fn test_four_muons_two_workers_all_hit() {
    let engine = ScriptedEngine::default();
    let batch = rows(&[10.0; 4], None);
    let s = simulate_batch(&&engine, &ReferenceBuilder, &batch, &config(2)).unwrap();

    assert_eq!(s.n_workers, 2);
    assert_eq!(s.result.records.len(), 4);
    let px: Vec<f64> = s.result.rows().iter().map(|r| r[0]).collect();
    assert_eq!(px, vec![0.0, 1.0, 2.0, 3.0]);
    assert_relative_eq!(s.result.survival.unwrap().survival_rate, 1.0);
    assert_eq!(s.result.total_mass, 100.0);
    assert_eq!(engine.inits.load(Ordering::SeqCst), 2);
    assert!(engine.seeds.lock().unwrap().iter().all(|&v| v == SeedVector::splat(7)));
}

#[test]
fn test_weighted_survival_two_of_six() {
    let engine = ScriptedEngine::default();
    let batch = rows(&[-1.0, 10.0, -1.0], Some(&[1.0, 2.0, 3.0][..]));
    let s = simulate_batch(&&engine, &ReferenceBuilder, &batch, &config(3)).unwrap();

    let stats = s.result.survival.unwrap();
    assert_relative_eq!(stats.survival_rate, 2.0 / 6.0);
    assert_eq!(s.result.records.len(), 1);
    assert_eq!(s.result.rows()[0].len(), 8);
    assert_eq!(s.result.rows()[0][7], 2.0);
}

#[test]
fn test_return_nan_pads_in_place() {
    let engine = ScriptedEngine::default();
    let batch = rows(&[10.0, -1.0, 10.0], None);
    let mut c = config(2);
    c.options.return_nan = true;
    let s = simulate_batch(&&engine, &ReferenceBuilder, &batch, &c).unwrap();

    let rows = s.result.rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1], vec![0.0; 7]);
    assert_eq!(rows[2][0], 2.0);
    assert_eq!(s.result.survival.unwrap().n_hits, 2);
}

#[test]
fn test_injection_distance_and_smear_reach_engine() {
    let engine = ScriptedEngine::default();
    let batch = rows(&[10.0; 3], None);
    let mut c = config(1);
    c.options.input_dist = Some(12.5);
    c.options.smear_radius_cm = 3.0;
    simulate_batch(&&engine, &ReferenceBuilder, &batch, &c).unwrap();

    let requests = engine.requests.lock().unwrap();
    assert_eq!(requests.len(), 3);
    for r in requests.iter() {
        assert_eq!(r.position[2], -12.5);
        assert_eq!(r.smear_radius_cm, 3.0);
        assert_eq!(r.seed, 7);
        assert_eq!(r.charge, -1);
    }
}

#[test]
fn test_mass_mismatch_fails_the_run() {
    let engine = ScriptedEngine { masses: vec![100.0, 101.0], ..Default::default() };
    let batch = rows(&[10.0; 4], None);
    let err = simulate_batch(&&engine, &ReferenceBuilder, &batch, &config(2)).unwrap_err();
    assert!(matches!(err, Error::Inconsistent(_)), "{err}");
}

#[test]
fn test_engine_init_failure_is_fatal() {
    let engine = ScriptedEngine { fail_init: Some(1), ..Default::default() };
    let batch = rows(&[10.0; 4], None);
    let err = simulate_batch(&&engine, &ReferenceBuilder, &batch, &config(2)).unwrap_err();
    assert!(matches!(err, Error::Engine(ref m) if m.contains("no licence")), "{err}");
}

#[test]
fn test_transport_error_is_fatal() {
    let engine = ScriptedEngine { fail_event_px: Some(2.0), ..Default::default() };
    let batch = rows(&[10.0; 4], None);
    let err = simulate_batch(&&engine, &ReferenceBuilder, &batch, &config(2)).unwrap_err();
    assert!(matches!(err, Error::Engine(ref m) if m.contains("geometry overlap")), "{err}");
}

#[test]
fn test_bad_params_abort_before_any_worker() {
    let engine = ScriptedEngine::default();
    let mut c = config(2);
    c.params.push(1.0);
    let err = simulate_batch(&&engine, &ReferenceBuilder, &rows(&[10.0; 2], None), &c).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(engine.inits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_full_collection_keeps_tracks() {
    let engine = ScriptedEngine::default();
    let mut c = config(2);
    c.options.sensitive_film = None;
    let s = simulate_batch(&&engine, &ReferenceBuilder, &rows(&[10.0, -1.0], None), &c).unwrap();
    assert!(s.result.survival.is_none());
    assert_eq!(s.result.records.len(), 2);
    assert!(s.result.records.iter().all(|r| matches!(r, HitRecord::Track(_))));
    assert!(s.result.rows().is_empty());
}

#[test]
fn test_ballistic_backtrack_with_field_map_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("fields.json.gz");

    let mut c = config(2);
    c.options.back_track = true;
    c.options.smear_radius_cm = 0.0;
    c.options.sensitive_film = Some(SensitiveFilm::at(40.0));
    c.options.use_field_maps = true;
    c.options.field_map_path = Some(cache.clone());

    // Second muon drifts 0.5 m per metre: far outside the 4 m half-width at the plane.
    let batch = MuonBatch::from_rows(&[
        [0.0, 0.0, 20.0, 0.0, 0.0, -10.0, -13.0, 1.5],
        [10.0, 0.0, 20.0, 0.0, 0.0, -10.0, 13.0, 0.5],
        [0.0, 0.5, 20.0, 0.0, 0.0, -10.0, 1.0, 1.0],
    ])
    .unwrap();

    let s = simulate_batch(&BallisticEngine, &ReferenceBuilder, &batch, &c).unwrap();
    assert_eq!(s.field_map.as_deref(), Some(cache.as_path()));
    assert!(cache.exists());

    let stats = s.result.survival.unwrap();
    assert_eq!(stats.n_hits, 2);
    assert_relative_eq!(stats.survival_rate, 2.5 / 3.0);
    match &s.result.records[0] {
        HitRecord::Backtrack { hit, record } => {
            assert_eq!(hit.position[2], 40.0);
            assert_eq!(hit.pdg_id, -13);
            assert_eq!(record.weight, Some(1.5));
            assert_eq!(record.seed, Some(SeedVector::splat(7)));
        }
        other => panic!("unexpected {other:?}"),
    }

    // Same apparatus again: the cache is reused, results identical.
    let again = simulate_batch(&BallisticEngine, &ReferenceBuilder, &batch, &c).unwrap();
    assert_eq!(again.result, s.result);
}
