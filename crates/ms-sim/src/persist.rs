//! Reading and writing muon populations, parameter files and result datasets.
//!
//! Files ending in `.gz` are gzip-compressed JSON; anything else is plain JSON.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use ms_core::{Error, MuonBatch, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use serde::de::DeserializeOwned;

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "gz")
}

fn open_reader(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)
        .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display()))))?;
    let reader = BufReader::new(file);
    if is_gzip(path) { Ok(Box::new(GzDecoder::new(reader))) } else { Ok(Box::new(reader)) }
}

/// Deserialize a (possibly gzip-compressed) JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = open_reader(path)?;
    Ok(serde_json::from_reader(reader)?)
}

/// Serialize to a (possibly gzip-compressed) JSON file, creating parent directories.
///
/// The file is written next to its destination and renamed into place, so
/// readers never observe a partial file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".partial");
    let tmp = path.with_file_name(tmp_name);

    {
        let file = BufWriter::new(File::create(&tmp)?);
        if is_gzip(path) {
            let mut enc = GzEncoder::new(file, Compression::default());
            serde_json::to_writer(&mut enc, value)?;
            enc.finish()?.flush()?;
        } else {
            let mut file = file;
            serde_json::to_writer(&mut file, value)?;
            file.flush()?;
        }
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Load a muon population stored as a JSON array of 7- or 8-column rows.
pub fn load_muon_batch(path: &Path) -> Result<MuonBatch> {
    let rows: Vec<Vec<f64>> = read_json(path)?;
    MuonBatch::from_rows(&rows)
        .map_err(|e| Error::Validation(format!("{}: {e}", path.display())))
}

/// Shuffle a batch in place; deterministic for a given seed.
pub fn shuffle_batch(batch: &mut MuonBatch, seed: Option<u64>) {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    };
    batch.records_mut().shuffle(&mut rng);
}

/// Keep the first `n` muons when `0 < n <= len`; otherwise keep all.
pub fn select_muons(batch: &mut MuonBatch, n: usize) {
    if n > 0 && n <= batch.len() {
        batch.truncate(n);
    }
}

/// Read a parameter vector from a text file with one number per line.
///
/// Blank lines are skipped.
pub fn read_parameters(path: &Path) -> Result<Vec<f64>> {
    let reader = BufReader::new(File::open(path)?);
    let mut params = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let v: f64 = line.parse().map_err(|_| {
            Error::Validation(format!(
                "{}:{}: not a number: {line:?}",
                path.display(),
                lineno + 1
            ))
        })?;
        params.push(v);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_gz_roundtrip_and_batch_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/muons.json.gz");
        let rows = vec![
            vec![0.0, 0.0, 10.0, 0.0, 0.0, -1.0, 13.0, 1.5],
            vec![0.0, 0.0, 20.0, 0.0, 0.0, -1.0, -13.0, 2.5],
        ];
        write_json(&path, &rows).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("nested/muons.json.gz.partial").exists());

        let batch = load_muon_batch(&path).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.layout().is_weighted());
        assert_eq!(batch.total_weight(), 4.0);
    }

    #[test]
    fn test_plain_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("muons.json");
        std::fs::write(&path, "[[0,0,1,0,0,0,1]]").unwrap();
        let batch = load_muon_batch(&path).unwrap();
        assert_eq!(batch.records()[0].charge, 1);
    }

    #[test]
    fn test_bad_charge_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[[0,0,1,0,0,0,5]]").unwrap();
        let err = load_muon_batch(&path).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn test_read_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.txt");
        std::fs::write(&path, "1.5\n\n 2\n-3e2\n").unwrap();
        assert_eq!(read_parameters(&path).unwrap(), vec![1.5, 2.0, -300.0]);

        std::fs::write(&path, "1.5\nabc\n").unwrap();
        let err = read_parameters(&path).unwrap_err();
        assert!(err.to_string().contains(":2:"));
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let rows: Vec<Vec<f64>> =
            (0..50).map(|i| vec![0.0, 0.0, i as f64, 0.0, 0.0, 0.0, 1.0]).collect();
        let mut a = MuonBatch::from_rows(&rows).unwrap();
        let mut b = a.clone();
        shuffle_batch(&mut a, Some(7));
        shuffle_batch(&mut b, Some(7));
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
    }

    #[test]
    fn test_select_muons() {
        let rows: Vec<Vec<f64>> = (0..5).map(|_| vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]).collect();
        let mut b = MuonBatch::from_rows(&rows).unwrap();
        select_muons(&mut b, 0);
        assert_eq!(b.len(), 5);
        select_muons(&mut b, 9);
        assert_eq!(b.len(), 5);
        select_muons(&mut b, 3);
        assert_eq!(b.len(), 3);
    }
}
