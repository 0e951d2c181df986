//! Hit validation and extraction.
//!
//! The detection policy is resolved once per worker from the detector
//! configuration and the options. Forward extraction keeps the *first* muon
//! point on the sensitive surface; back-tracking keeps the *last* muon point
//! of the full track once its endpoint is accepted by the plane.

use ms_core::traits::TransportEvent;
use ms_core::{
    ColumnLayout, CompactHit, DetectorConfig, Error, HitRecord, MUON_PDG, MuonRecord, Result,
    SeedVector, SensitivePlane, TrackData, TrackPoint, TrackRecord,
};

/// How a transported muon is turned into an output record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionPolicy {
    /// No sensitive film: keep every track verbatim.
    FullCollection,
    /// First muon point on the sensitive surface.
    Forward,
    /// Last muon point of the full track, gated by the plane acceptance.
    Backtrack(SensitivePlane),
}

impl DetectionPolicy {
    /// Policy for a worker's configuration.
    ///
    /// No sensitive plane means full collection, whatever `back_track` says.
    pub fn resolve(config: &DetectorConfig, back_track: bool) -> Result<Self> {
        match (config.sensitive, back_track) {
            (None, _) => Ok(DetectionPolicy::FullCollection),
            (Some(_), false) => Ok(DetectionPolicy::Forward),
            (Some(plane), true) => {
                if !config.store.store_primary {
                    return Err(Error::Validation(
                        "back-tracking needs the primary track to be stored".into(),
                    ));
                }
                Ok(DetectionPolicy::Backtrack(plane))
            }
        }
    }

    /// `true` for full collection, where no survival statistics apply.
    pub fn is_full_collection(&self) -> bool {
        matches!(self, DetectionPolicy::FullCollection)
    }
}

#[inline]
fn is_muon(pdg_id: i32) -> bool {
    pdg_id.abs() == MUON_PDG
}

/// First muon point of the sensitive-surface subset.
pub fn forward_hit(sensitive: &TrackData) -> Option<TrackPoint> {
    if !sensitive.is_consistent() {
        return None;
    }
    let i = sensitive.pdg_id.iter().position(|&p| is_muon(p))?;
    sensitive.point(i)
}

/// Last muon point of the full track, if the track ends on the plane.
///
/// The endpoint (last point of any species) must be at or beyond the plane
/// and inside its transverse half-widths.
pub fn backtrack_hit(track: &TrackData, plane: &SensitivePlane) -> Option<TrackPoint> {
    if !track.is_consistent() {
        return None;
    }
    let i = track.pdg_id.iter().rposition(|&p| is_muon(p))?;
    let end = track.last()?;
    let [x, y, z] = end.position;
    if z >= plane.z_center && plane.contains_transverse(x, y) { track.point(i) } else { None }
}

/// Per-worker extractor: policy, batch layout and the NaN-padding switch.
#[derive(Debug, Clone, Copy)]
pub struct HitExtractor {
    policy: DetectionPolicy,
    layout: ColumnLayout,
    return_nan: bool,
}

impl HitExtractor {
    /// Create an extractor.
    pub fn new(policy: DetectionPolicy, layout: ColumnLayout, return_nan: bool) -> Self {
        Self { policy, layout, return_nan }
    }

    /// Record for one event, or `None` when the muon is dropped.
    pub fn extract(
        &self,
        event: &TransportEvent,
        muon: &MuonRecord,
        seed: SeedVector,
    ) -> Option<HitRecord> {
        let record = match self.policy {
            DetectionPolicy::FullCollection => {
                return Some(HitRecord::Track(TrackRecord::bare(event.collect().clone())));
            }
            DetectionPolicy::Forward => forward_hit(event.collect_from_sensitive())
                .map(|p| HitRecord::Hit(CompactHit::from_point(p, muon.weight))),
            DetectionPolicy::Backtrack(plane) => {
                backtrack_hit(event.collect(), &plane).map(|p| HitRecord::Backtrack {
                    hit: CompactHit::from_point(p, muon.weight),
                    record: TrackRecord {
                        track: event.collect().clone(),
                        weight: muon.weight,
                        seed: Some(seed),
                        weight_total: None,
                    },
                })
            }
        };
        record.or_else(|| self.placeholder())
    }

    fn placeholder(&self) -> Option<HitRecord> {
        self.return_nan.then_some(HitRecord::Placeholder { layout: self.layout })
    }
}
