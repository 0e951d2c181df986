//! Muon population, track and hit records.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Absolute PDG code of the muon.
pub const MUON_PDG: i32 = 13;

/// Column layout shared by every row of a muon batch.
///
/// Rows are `[px, py, pz, x, y, z, charge]`, optionally followed by a weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnLayout {
    /// 7 columns, no weight.
    Unweighted,
    /// 8 columns, weight last.
    Weighted,
}

impl ColumnLayout {
    /// Number of columns per row.
    pub fn width(self) -> usize {
        match self {
            ColumnLayout::Unweighted => 7,
            ColumnLayout::Weighted => 8,
        }
    }

    /// Layout for a row width. Only 7 and 8 are accepted.
    pub fn from_width(width: usize) -> Result<Self> {
        match width {
            7 => Ok(ColumnLayout::Unweighted),
            8 => Ok(ColumnLayout::Weighted),
            w => Err(Error::Validation(format!("muon rows must have 7 or 8 columns, got {w}"))),
        }
    }

    /// Whether rows carry a weight column.
    pub fn is_weighted(self) -> bool {
        matches!(self, ColumnLayout::Weighted)
    }
}

/// Normalize a raw charge column value to the physical charge sign.
///
/// Accepts a plain sign (`±1`) or a muon PDG code (`±13`). PDG 13 is the
/// negative muon, so `13 -> -1` and `-13 -> +1`.
pub fn normalize_charge(raw: f64) -> Result<i8> {
    if raw == 1.0 {
        Ok(1)
    } else if raw == -1.0 {
        Ok(-1)
    } else if raw == MUON_PDG as f64 {
        Ok(-1)
    } else if raw == -(MUON_PDG as f64) {
        Ok(1)
    } else {
        Err(Error::Validation(format!(
            "charge must be ±1 or a muon PDG code ±{MUON_PDG}, got {raw}"
        )))
    }
}

/// One input muon. `charge` is always `±1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MuonRecord {
    /// `(px, py, pz)`
    pub momentum: [f64; 3],
    /// `(x, y, z)`
    pub position: [f64; 3],
    /// Charge sign, `±1`.
    pub charge: i8,
    /// Statistical weight, present iff the batch layout is weighted.
    pub weight: Option<f64>,
}

impl MuonRecord {
    /// Parse a 7- or 8-column row, normalizing the charge.
    pub fn from_row(row: &[f64]) -> Result<Self> {
        let layout = ColumnLayout::from_width(row.len())?;
        let charge = normalize_charge(row[6])?;
        Ok(Self {
            momentum: [row[0], row[1], row[2]],
            position: [row[3], row[4], row[5]],
            charge,
            weight: layout.is_weighted().then(|| row[7]),
        })
    }

    /// Weight used for survival statistics (1 when unweighted).
    #[inline]
    pub fn statistical_weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// Ordered muon population with a fixed column layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuonBatch {
    layout: ColumnLayout,
    records: Vec<MuonRecord>,
}

impl MuonBatch {
    /// Build a batch from already-normalized records.
    ///
    /// Every record must carry a weight iff `layout` is weighted.
    pub fn new(layout: ColumnLayout, records: Vec<MuonRecord>) -> Result<Self> {
        for (i, r) in records.iter().enumerate() {
            if r.weight.is_some() != layout.is_weighted() {
                return Err(Error::Validation(format!(
                    "record {i} weight presence does not match {layout:?} layout"
                )));
            }
            if r.charge.abs() != 1 {
                return Err(Error::Validation(format!(
                    "record {i} has charge {} (expected ±1)",
                    r.charge
                )));
            }
        }
        Ok(Self { layout, records })
    }

    /// Parse raw rows. All rows must share the width of the first one.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let first = rows
            .first()
            .ok_or_else(|| Error::Validation("muon batch is empty".to_string()))?;
        let layout = ColumnLayout::from_width(first.as_ref().len())?;
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let row = row.as_ref();
                if row.len() != layout.width() {
                    return Err(Error::Validation(format!(
                        "row {i} has {} columns, batch layout has {}",
                        row.len(),
                        layout.width()
                    )));
                }
                MuonRecord::from_row(row)
                    .map_err(|e| Error::Validation(format!("row {i}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layout, records })
    }

    /// Column layout of every row.
    pub fn layout(&self) -> ColumnLayout {
        self.layout
    }

    /// Records in input order.
    pub fn records(&self) -> &[MuonRecord] {
        &self.records
    }

    /// Mutable access for reordering (e.g. shuffling) without changing the layout.
    pub fn records_mut(&mut self) -> &mut [MuonRecord] {
        &mut self.records
    }

    /// Number of muons.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if there are no muons.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keep only the first `n` muons.
    pub fn truncate(&mut self, n: usize) {
        self.records.truncate(n);
    }

    /// Sum of statistical weights (muon count when unweighted).
    pub fn total_weight(&self) -> f64 {
        self.records.iter().map(MuonRecord::statistical_weight).sum()
    }
}

/// 4-component seed handed to the transport engine at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeedVector(pub [u32; 4]);

impl SeedVector {
    /// Same seed in every slot.
    pub fn splat(seed: u32) -> Self {
        Self([seed; 4])
    }

    /// Fold the components into one `u64`, for engines that take a single seed.
    pub fn fold(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, &s| acc.wrapping_mul(0x100000001b3).wrapping_add(s as u64))
    }
}

/// One recorded trajectory point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    /// `(px, py, pz)`
    pub momentum: [f64; 3],
    /// `(x, y, z)`
    pub position: [f64; 3],
    /// Signed PDG code of the particle at this point.
    pub pdg_id: i32,
}

/// Columnar trajectory data as reported by the transport engine.
///
/// A well-formed record has every column of equal length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackData {
    /// x momentum
    pub px: Vec<f64>,
    /// y momentum
    pub py: Vec<f64>,
    /// z momentum
    pub pz: Vec<f64>,
    /// x position
    pub x: Vec<f64>,
    /// y position
    pub y: Vec<f64>,
    /// z position
    pub z: Vec<f64>,
    /// PDG code
    pub pdg_id: Vec<i32>,
}

impl TrackData {
    /// Build from points.
    pub fn from_points<I: IntoIterator<Item = TrackPoint>>(points: I) -> Self {
        let mut t = Self::default();
        for p in points {
            t.push(p);
        }
        t
    }

    /// Append one point.
    pub fn push(&mut self, p: TrackPoint) {
        self.px.push(p.momentum[0]);
        self.py.push(p.momentum[1]);
        self.pz.push(p.momentum[2]);
        self.x.push(p.position[0]);
        self.y.push(p.position[1]);
        self.z.push(p.position[2]);
        self.pdg_id.push(p.pdg_id);
    }

    /// Number of points (length of the `px` column).
    pub fn len(&self) -> usize {
        self.px.len()
    }

    /// `true` if no point was recorded.
    pub fn is_empty(&self) -> bool {
        self.px.is_empty()
    }

    /// `true` if all columns have the same length.
    pub fn is_consistent(&self) -> bool {
        let n = self.px.len();
        [self.py.len(), self.pz.len(), self.x.len(), self.y.len(), self.z.len(), self.pdg_id.len()]
            .iter()
            .all(|&l| l == n)
    }

    /// Point `i`, or `None` when out of range in any column.
    pub fn point(&self, i: usize) -> Option<TrackPoint> {
        Some(TrackPoint {
            momentum: [*self.px.get(i)?, *self.py.get(i)?, *self.pz.get(i)?],
            position: [*self.x.get(i)?, *self.y.get(i)?, *self.z.get(i)?],
            pdg_id: *self.pdg_id.get(i)?,
        })
    }

    /// Last recorded point.
    pub fn last(&self) -> Option<TrackPoint> {
        self.len().checked_sub(1).and_then(|i| self.point(i))
    }
}

/// Compact hit: `[px, py, pz, x, y, z, pdg_id]` plus optional weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompactHit {
    /// `(px, py, pz)` at the hit
    pub momentum: [f64; 3],
    /// `(x, y, z)` at the hit
    pub position: [f64; 3],
    /// Signed PDG code
    pub pdg_id: i32,
    /// Input muon weight, when the batch is weighted
    pub weight: Option<f64>,
}

impl CompactHit {
    /// Build from a track point, carrying the muon weight.
    pub fn from_point(p: TrackPoint, weight: Option<f64>) -> Self {
        Self { momentum: p.momentum, position: p.position, pdg_id: p.pdg_id, weight }
    }

    /// Flat row, 7 or 8 columns.
    pub fn to_row(&self) -> Vec<f64> {
        let mut row = Vec::with_capacity(8);
        row.extend_from_slice(&self.momentum);
        row.extend_from_slice(&self.position);
        row.push(self.pdg_id as f64);
        if let Some(w) = self.weight {
            row.push(w);
        }
        row
    }
}

/// Full engine record retained in full-collection and back-track modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Trajectory as reported by the engine.
    pub track: TrackData,
    /// Input muon weight.
    #[serde(rename = "W")]
    pub weight: Option<f64>,
    /// Seed vector the worker initialized its engine with.
    pub seed: Option<SeedVector>,
    /// Apparatus mass slot; left empty on per-event records.
    pub weight_total: Option<f64>,
}

impl TrackRecord {
    /// Record with no bookkeeping attached.
    pub fn bare(track: TrackData) -> Self {
        Self { track, weight: None, seed: None, weight_total: None }
    }
}

/// Output produced for one input muon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HitRecord {
    /// Valid forward hit on the sensitive plane.
    Hit(CompactHit),
    /// Zero row standing in for a muon without a valid hit.
    Placeholder {
        /// Width of the zero row.
        layout: ColumnLayout,
    },
    /// Whole track, full-collection mode.
    Track(TrackRecord),
    /// Whole track accepted by the back-track policy.
    Backtrack {
        /// Last muon point of the track.
        hit: CompactHit,
        /// Raw engine record with seed and weight attached.
        record: TrackRecord,
    },
}

impl HitRecord {
    /// Weight contributed to the survival numerator, `None` for non-survivors.
    ///
    /// Full-collection tracks are not validated and never count as survivors.
    pub fn surviving_weight(&self) -> Option<f64> {
        match self {
            HitRecord::Hit(h) => Some(h.weight.unwrap_or(1.0)),
            HitRecord::Backtrack { hit, .. } => Some(hit.weight.unwrap_or(1.0)),
            HitRecord::Placeholder { .. } | HitRecord::Track(_) => None,
        }
    }

    /// Flat row, `None` for full-collection tracks.
    pub fn to_row(&self) -> Option<Vec<f64>> {
        match self {
            HitRecord::Hit(h) | HitRecord::Backtrack { hit: h, .. } => Some(h.to_row()),
            HitRecord::Placeholder { layout } => Some(vec![0.0; layout.width()]),
            HitRecord::Track(_) => None,
        }
    }
}
