//! Ballistic reference engine.
//!
//! Straight-line propagation with no interactions, used for dry runs and
//! tests of the orchestration. Every event records the smeared start point,
//! each magnet boundary crossed downstream of it, and the end point: the
//! sensitive plane when one is defined, else the exit of the last magnet.
//! The sensitive subset holds the plane crossing when it lies on the film.

use ms_core::traits::{TransportEngine, TransportEvent, TransportRequest, TransportSession};
use ms_core::{DetectorConfig, MUON_PDG, Result, SeedVector, TrackData, TrackPoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CM: f64 = 0.01;

/// Factory for ballistic sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct BallisticEngine;

impl TransportEngine for BallisticEngine {
    type Session = BallisticSession;

    fn name(&self) -> &str {
        "ballistic"
    }

    fn initialize(&self, config: &DetectorConfig, seed: SeedVector) -> Result<BallisticSession> {
        let mut boundaries: Vec<f64> =
            config.segments.iter().flat_map(|s| [s.z_start, s.z_end]).collect();
        boundaries.sort_by(f64::total_cmp);
        boundaries.dedup();

        Ok(BallisticSession {
            boundaries,
            plane: config.sensitive.map(|p| (p.z_center, p.dx, p.dy)),
            apparatus_end: config.apparatus_end(),
            total_mass: config.total_mass,
            base_seed: seed.fold(),
            kill_secondaries: false,
        })
    }
}

/// One worker's ballistic engine state.
#[derive(Debug, Clone)]
pub struct BallisticSession {
    boundaries: Vec<f64>,
    plane: Option<(f64, f64, f64)>,
    apparatus_end: f64,
    total_mass: f64,
    base_seed: u64,
    kill_secondaries: bool,
}

impl BallisticSession {
    /// Whether secondary tracks are currently dropped.
    pub fn kills_secondaries(&self) -> bool {
        self.kill_secondaries
    }

    /// Counter-based per-event RNG, same (session seed, event seed) -> same draws.
    fn event_rng(&self, seed: u64) -> StdRng {
        StdRng::seed_from_u64(self.base_seed.wrapping_mul(2654435761).wrapping_add(seed))
    }

    fn smear(&self, request: &TransportRequest) -> [f64; 3] {
        let [x, y, z] = request.position;
        let r_max = request.smear_radius_cm * CM;
        if r_max <= 0.0 {
            return [x, y, z];
        }
        let mut rng = self.event_rng(request.seed);
        let r = r_max * rng.random::<f64>().sqrt();
        let phi = std::f64::consts::TAU * rng.random::<f64>();
        [x + r * phi.cos(), y + r * phi.sin(), z]
    }
}

impl TransportSession for BallisticSession {
    fn total_mass(&self) -> f64 {
        self.total_mass
    }

    fn kill_secondary_tracks(&mut self, kill: bool) {
        self.kill_secondaries = kill;
    }

    fn simulate(&mut self, request: &TransportRequest) -> Result<TransportEvent> {
        let pdg_id = -MUON_PDG * i32::from(request.charge);
        let momentum = request.momentum;
        let start = self.smear(request);
        let point = |position: [f64; 3]| TrackPoint { momentum, position, pdg_id };

        let mut track = TrackData::default();
        track.push(point(start));

        let pz = momentum[2];
        if pz <= 0.0 {
            return Ok(TransportEvent { track, sensitive: TrackData::default() });
        }

        let at_z = |z: f64| {
            let t = (z - start[2]) / pz;
            [start[0] + momentum[0] * t, start[1] + momentum[1] * t, z]
        };

        let end_z = self.plane.map_or(self.apparatus_end, |(z, _, _)| z);
        for &zb in &self.boundaries {
            if zb > start[2] && zb < end_z {
                track.push(point(at_z(zb)));
            }
        }

        let mut sensitive = TrackData::default();
        if end_z > start[2] {
            let end = at_z(end_z);
            track.push(point(end));
            if let Some((_, dx, dy)) = self.plane
                && end[0].abs() <= dx
                && end[1].abs() <= dy
            {
                sensitive.push(point(end));
            }
        }

        Ok(TransportEvent { track, sensitive })
    }
}
