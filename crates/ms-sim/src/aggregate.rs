//! Result aggregation across workers.

use ms_core::{Error, HitRecord, MuonBatch, Result};
use serde::{Deserialize, Serialize};

use crate::worker::WorkerOutput;

/// Relative tolerance when comparing worker-reported masses.
pub const MASS_REL_TOL: f64 = 1e-9;

/// Survival statistics over one batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurvivalStats {
    /// Input muons.
    pub n_input: usize,
    /// Sum of input weights (muon count when unweighted).
    pub input_weight: f64,
    /// Retained hits, placeholders excluded.
    pub n_hits: usize,
    /// Sum of retained hit weights.
    pub hit_weight: f64,
    /// `hit_weight / input_weight`
    pub survival_rate: f64,
    /// Whether the input carried a weight column.
    pub weighted: bool,
}

impl SurvivalStats {
    /// Statistics for `records` produced from `batch`.
    pub fn compute(batch: &MuonBatch, records: &[HitRecord]) -> Self {
        let input_weight = batch.total_weight();
        let (n_hits, hit_weight) = records
            .iter()
            .filter_map(HitRecord::surviving_weight)
            .fold((0usize, 0.0), |(n, w), x| (n + 1, w + x));
        let survival_rate = if input_weight > 0.0 { hit_weight / input_weight } else { 0.0 };
        Self {
            n_input: batch.len(),
            input_weight,
            n_hits,
            hit_weight,
            survival_rate,
            weighted: batch.layout().is_weighted(),
        }
    }
}

/// Concatenated output of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Records in input order, possibly truncated to the output cap.
    pub records: Vec<HitRecord>,
    /// Apparatus mass agreed on by every worker.
    pub total_mass: f64,
    /// `None` in full-collection mode.
    pub survival: Option<SurvivalStats>,
    /// Record count before truncation.
    pub n_records: usize,
    /// Whether `records` was cut by the output cap.
    pub truncated: bool,
}

impl AggregateResult {
    /// Flat rows of the hit records; full-collection tracks are skipped.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.records.iter().filter_map(HitRecord::to_row).collect()
    }
}

fn masses_agree(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= MASS_REL_TOL * a.abs().max(b.abs())
}

/// Merge worker outputs in partition order.
///
/// Statistics are computed before the output cap is applied.
pub fn aggregate(
    mut outputs: Vec<WorkerOutput>,
    batch: &MuonBatch,
    full_collection: bool,
    cap: Option<usize>,
) -> Result<AggregateResult> {
    if outputs.is_empty() {
        return Err(Error::Inconsistent("no worker output to aggregate".into()));
    }
    outputs.sort_by_key(|o| o.index);
    for (slot, o) in outputs.iter().enumerate() {
        if o.index != slot {
            return Err(Error::Inconsistent(format!(
                "worker slots are not contiguous: expected {slot}, got {}",
                o.index
            )));
        }
    }
    let n_input: usize = outputs.iter().map(|o| o.n_input).sum();
    if n_input != batch.len() {
        return Err(Error::Inconsistent(format!(
            "workers processed {n_input} muons, batch has {}",
            batch.len()
        )));
    }

    let total_mass = outputs[0].total_mass;
    if let Some(o) = outputs.iter().find(|o| !masses_agree(o.total_mass, total_mass)) {
        return Err(Error::Inconsistent(format!(
            "worker {} reports total mass {} but worker 0 reports {total_mass}",
            o.index, o.total_mass
        )));
    }

    let mut records: Vec<HitRecord> = outputs.into_iter().flat_map(|o| o.records).collect();
    let survival = (!full_collection).then(|| SurvivalStats::compute(batch, &records));
    let n_records = records.len();
    let truncated = cap.is_some_and(|c| n_records > c);
    if let Some(c) = cap {
        records.truncate(c);
    }

    Ok(AggregateResult { records, total_mass, survival, n_records, truncated })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ms_core::{ColumnLayout, CompactHit, SeedVector};

    fn batch(weights: &[f64]) -> MuonBatch {
        let rows: Vec<Vec<f64>> =
            weights.iter().map(|&w| vec![0.0, 0.0, 10.0, 0.0, 0.0, -1.0, 13.0, w]).collect();
        MuonBatch::from_rows(&rows).unwrap()
    }

    fn hit(w: f64) -> HitRecord {
        HitRecord::Hit(CompactHit {
            momentum: [0.0, 0.0, 10.0],
            position: [0.0, 0.0, 82.0],
            pdg_id: 13,
            weight: Some(w),
        })
    }

    fn output(index: usize, records: Vec<HitRecord>, n_input: usize, mass: f64) -> WorkerOutput {
        WorkerOutput { index, records, total_mass: mass, n_input, seed: SeedVector::splat(1) }
    }

    #[test]
    fn test_weighted_survival() {
        let b = batch(&[1.0, 2.0, 3.0]);
        let outs = vec![output(1, vec![], 1, 10.0), output(0, vec![hit(2.0)], 2, 10.0)];
        let r = aggregate(outs, &b, false, None).unwrap();
        let s = r.survival.unwrap();
        assert_relative_eq!(s.survival_rate, 2.0 / 6.0);
        assert_eq!(s.n_hits, 1);
        assert!(s.weighted);
        assert_eq!(r.total_mass, 10.0);
    }

    #[test]
    fn test_placeholders_do_not_survive() {
        let b = batch(&[1.0, 1.0]);
        let ph = HitRecord::Placeholder { layout: ColumnLayout::Weighted };
        let r = aggregate(vec![output(0, vec![hit(1.0), ph], 2, 1.0)], &b, false, None).unwrap();
        assert_relative_eq!(r.survival.unwrap().survival_rate, 0.5);
        assert_eq!(r.rows()[1], vec![0.0; 8]);
    }

    #[test]
    fn test_order_follows_partition_slots() {
        let b = batch(&[1.0, 2.0, 3.0]);
        let outs =
            vec![output(1, vec![hit(3.0)], 1, 5.0), output(0, vec![hit(1.0), hit(2.0)], 2, 5.0)];
        let r = aggregate(outs, &b, false, None).unwrap();
        let weights: Vec<f64> = r.rows().iter().map(|row| row[7]).collect();
        assert_eq!(weights, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_mass_mismatch_is_an_error() {
        let b = batch(&[1.0, 1.0]);
        let outs = vec![output(0, vec![], 1, 5.0), output(1, vec![], 1, 5.1)];
        assert!(matches!(aggregate(outs, &b, false, None), Err(Error::Inconsistent(_))));

        let outs = vec![output(0, vec![], 1, 5.0), output(1, vec![], 1, 5.0 * (1.0 + 1e-12))];
        assert!(aggregate(outs, &b, false, None).is_ok());
    }

    #[test]
    fn test_cap_applied_after_statistics() {
        let b = batch(&[1.0; 4]);
        let outs = vec![output(0, (0..4).map(|_| hit(1.0)).collect(), 4, 1.0)];
        let r = aggregate(outs, &b, false, Some(2)).unwrap();
        assert_eq!(r.records.len(), 2);
        assert_eq!(r.n_records, 4);
        assert!(r.truncated);
        assert_relative_eq!(r.survival.unwrap().survival_rate, 1.0);
    }

    #[test]
    fn test_full_collection_has_no_survival() {
        let b = batch(&[1.0]);
        let r = aggregate(vec![output(0, vec![], 1, 1.0)], &b, true, None).unwrap();
        assert!(r.survival.is_none());
    }

    #[test]
    fn test_missing_slot_rejected() {
        let b = batch(&[1.0, 1.0]);
        let outs = vec![output(0, vec![], 1, 1.0), output(2, vec![], 1, 1.0)];
        assert!(aggregate(outs, &b, false, None).is_err());
        let outs = vec![output(0, vec![], 1, 1.0)];
        assert!(aggregate(outs, &b, false, None).is_err());
    }
}
