//! Multi-file sweep: one apparatus over every muon file in a directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ms_core::traits::{DetectorBuilder, TransportEngine};
use ms_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::options::RunConfig;
use crate::persist;
use crate::run::simulate_batch;

/// Survival of one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSurvival {
    /// Input file name.
    pub file: String,
    /// Number embedded in the file name, if any.
    pub file_number: Option<u64>,
    /// Muons in the file.
    pub n_input: usize,
    /// Sum of input weights.
    pub input_weight: f64,
    /// Retained hits.
    pub n_hits: usize,
    /// Sum of hit weights.
    pub hit_weight: f64,
    /// `hit_weight / input_weight`
    pub survival_rate: f64,
}

/// Totals over a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Per-file results, in file-name order.
    pub files: Vec<FileSurvival>,
    /// Unweighted muon count over all files.
    pub total_events: usize,
    /// Sum of input weights over all files.
    pub total_input_weight: f64,
    /// Retained hits over all files.
    pub total_hits: usize,
    /// Sum of hit weights over all files.
    pub total_hit_weight: f64,
    /// `total_hit_weight / total_input_weight`
    pub survival_rate: f64,
    /// Apparatus mass.
    pub total_mass: f64,
}

/// `.json` and `.json.gz` files of `dir`, sorted by name.
pub fn muon_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if path.is_file() && (name.ends_with(".json") || name.ends_with(".json.gz")) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Digits of a file name read as one number, e.g. `muons_12.json.gz` -> 12.
pub fn file_number(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let digits: String = name.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Output file name for the `i`-th input: `muons_data_{n}.json.gz`, with `n`
/// the file number or `i` when the name has no digits.
pub fn output_name(path: &Path, i: usize) -> String {
    format!("muons_data_{}.json.gz", file_number(path).unwrap_or(i as u64))
}

/// Output names for `paths`; two inputs mapping to the same name is an error.
pub fn output_names(paths: &[PathBuf]) -> Result<Vec<String>> {
    let mut seen: HashMap<String, &Path> = HashMap::with_capacity(paths.len());
    let mut names = Vec::with_capacity(paths.len());
    for (i, path) in paths.iter().enumerate() {
        let name = output_name(path, i);
        if let Some(prev) = seen.insert(name.clone(), path.as_path()) {
            return Err(Error::Validation(format!(
                "{} and {} both map to output {name}",
                prev.display(),
                path.display()
            )));
        }
        names.push(name);
    }
    Ok(names)
}

/// Run `config` over every muon file in `dir`.
///
/// Hits of each file are written to `outputs/muons_data_{n}.json.gz` when
/// `outputs` is given; inputs whose names collide are rejected before any
/// simulation. A sensitive film is required.
pub fn sweep_directory<E, B>(
    engine: &E,
    builder: &B,
    dir: &Path,
    config: &RunConfig,
    outputs: Option<&Path>,
) -> Result<SweepSummary>
where
    E: TransportEngine,
    B: DetectorBuilder,
{
    if config.options.collects_full_tracks() {
        return Err(Error::Validation("a sweep needs a sensitive film".into()));
    }
    let paths = muon_files(dir)?;
    if paths.is_empty() {
        return Err(Error::Validation(format!("no muon files in {}", dir.display())));
    }

    let names = match outputs {
        Some(_) => output_names(&paths)?,
        None => Vec::new(),
    };

    let config = RunConfig { output_cap: None, ..config.clone() };
    let mut files = Vec::with_capacity(paths.len());
    let mut total_mass = 0.0;

    for (i, path) in paths.iter().enumerate() {
        let batch = persist::load_muon_batch(path)?;
        let summary = simulate_batch(engine, builder, &batch, &config)?;
        let result = &summary.result;
        let stats = result.survival.ok_or_else(|| {
            Error::Inconsistent("sweep run produced no survival statistics".into())
        })?;
        total_mass = result.total_mass;

        if let (Some(dir), Some(name)) = (outputs, names.get(i)) {
            persist::write_json(&dir.join(name), &result.rows())?;
        }

        tracing::info!(
            file = %path.display(),
            n_input = stats.n_input,
            n_hits = stats.n_hits,
            survival_rate = stats.survival_rate,
            "file done"
        );
        files.push(FileSurvival {
            file: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            file_number: file_number(path),
            n_input: stats.n_input,
            input_weight: stats.input_weight,
            n_hits: stats.n_hits,
            hit_weight: stats.hit_weight,
            survival_rate: stats.survival_rate,
        });
    }

    let total_events = files.iter().map(|f| f.n_input).sum();
    let total_input_weight: f64 = files.iter().map(|f| f.input_weight).sum();
    let total_hits = files.iter().map(|f| f.n_hits).sum();
    let total_hit_weight: f64 = files.iter().map(|f| f.hit_weight).sum();
    let survival_rate =
        if total_input_weight > 0.0 { total_hit_weight / total_input_weight } else { 0.0 };

    Ok(SweepSummary {
        files,
        total_events,
        total_input_weight,
        total_hits,
        total_hit_weight,
        survival_rate,
        total_mass,
    })
}
