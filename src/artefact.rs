//! Persisted calibration results.
//!
//! An artefact records the dataset it was fitted on, every strategy's fit and
//! the winning [`Sigma`]. It is written in one go, replacing any previous
//! file. The format follows the file extension: `.json` writes JSON,
//! anything else YAML.
//!
//! Robust-sigmoid parameters depend on the raw-score population, so each
//! artefact carries a SHA-256 digest of the raw and ground-truth sequences;
//! [`CalibrationArtefact::matches_dataset`] compares it against new data.

use crate::{
    calibrate::{Calibration, StrategyFit},
    sigma::Sigma,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{info, warn};

/// Format version written into every artefact.
pub const ARTEFACT_VERSION: u32 = 1;

/// Errors raised while reading or writing an artefact.
#[derive(Debug, Error)]
pub enum ArtefactError {
    #[error("failed to access artefact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode or decode artefact: {0}")]
    Format(String),
    #[error("unsupported artefact version {found}")]
    Version { found: u32 },
}

/// Hex SHA-256 over the raw and ground-truth sequences.
///
/// Each value is hashed as its little-endian IEEE-754 bytes, raw scores
/// first, with the lengths mixed in so sequences cannot shift between the
/// two halves.
#[must_use]
pub fn dataset_digest(raw: &[f64], ground_truth: &[f64]) -> String {
    let mut hasher = Sha256::new();
    for values in [raw, ground_truth] {
        hasher.update((values.len() as u64).to_le_bytes());
        for v in values {
            hasher.update(v.to_le_bytes());
        }
    }
    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}

/// Everything a calibration run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationArtefact {
    pub version: u32,
    pub dataset_digest: String,
    pub unit_ids: Vec<u32>,
    /// Raw score per unit; failed units hold `0.0`.
    pub raw_scores: Vec<f64>,
    pub ground_truth: Vec<f64>,
    /// Units whose features could not be extracted.
    #[serde(default)]
    pub failed_units: Vec<u32>,
    pub baseline_correlation: f64,
    pub strategies: Vec<StrategyFit>,
    pub best: Sigma,
    pub best_correlation: f64,
}

impl CalibrationArtefact {
    #[must_use]
    pub fn from_calibration(
        calibration: &Calibration,
        unit_ids: Vec<u32>,
        raw_scores: Vec<f64>,
        ground_truth: Vec<f64>,
        failed_units: Vec<u32>,
    ) -> Self {
        let best = calibration.best();
        Self {
            version: ARTEFACT_VERSION,
            dataset_digest: dataset_digest(&raw_scores, &ground_truth),
            unit_ids,
            raw_scores,
            ground_truth,
            failed_units,
            baseline_correlation: calibration.baseline_correlation,
            strategies: calibration.fits().cloned().collect(),
            best: best.sigma,
            best_correlation: best.correlation,
        }
    }

    /// Whether this artefact was fitted on the given sequences.
    #[must_use]
    pub fn matches_dataset(&self, raw: &[f64], ground_truth: &[f64]) -> bool {
        self.dataset_digest == dataset_digest(raw, ground_truth)
    }

    /// Write the artefact, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError`] if encoding or writing fails.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ArtefactError> {
        let path = path.as_ref();
        let text = if is_json(path) {
            serde_json::to_string_pretty(self).map_err(|e| ArtefactError::Format(e.to_string()))?
        } else {
            serde_yaml::to_string(self).map_err(|e| ArtefactError::Format(e.to_string()))?
        };
        fs::write(path, text).map_err(|source| ArtefactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), best = %self.best, "calibration artefact written");
        Ok(())
    }

    /// Read an artefact written by [`write`](Self::write).
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError`] if the file cannot be read or decoded, or
    /// has an unknown version.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtefactError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ArtefactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artefact: Self = if is_json(path) {
            serde_json::from_str(&text).map_err(|e| ArtefactError::Format(e.to_string()))?
        } else {
            serde_yaml::from_str(&text).map_err(|e| ArtefactError::Format(e.to_string()))?
        };
        if artefact.version != ARTEFACT_VERSION {
            return Err(ArtefactError::Version {
                found: artefact.version,
            });
        }
        Ok(artefact)
    }

    /// Load an artefact and warn when it was fitted on different data.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_for(
        path: impl AsRef<Path>,
        raw: &[f64],
        ground_truth: &[f64],
    ) -> Result<Self, ArtefactError> {
        let artefact = Self::load(&path)?;
        if !artefact.matches_dataset(raw, ground_truth) {
            warn!(
                path = %path.as_ref().display(),
                "artefact was calibrated on a different dataset; robust sigmoid parameters may not transfer"
            );
        }
        Ok(artefact)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibrate::Calibrator;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn artefact() -> CalibrationArtefact {
        let raw = vec![5.0, 10.0, 15.0, 20.0];
        let truth = vec![3.0, 7.0, 11.0, 15.0];
        let calibration = Calibrator::default()
            .calibrate(&raw, &truth)
            .unwrap_or_else(|e| panic!("calibrate: {e}"));
        CalibrationArtefact::from_calibration(&calibration, vec![0, 1, 2, 3], raw, truth, vec![])
    }

    #[rstest]
    #[case("calibration.yaml")]
    #[case("calibration.json")]
    fn written_artefact_loads_back(artefact: CalibrationArtefact, #[case] name: &str) {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("temp dir: {e}"));
        let path = dir.path().join(name);
        artefact
            .write(&path)
            .unwrap_or_else(|e| panic!("write: {e}"));
        let loaded = CalibrationArtefact::load(&path).unwrap_or_else(|e| panic!("load: {e}"));
        assert_eq!(loaded, artefact);
    }

    #[rstest]
    fn write_replaces_existing_file(artefact: CalibrationArtefact) {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("temp dir: {e}"));
        let path = dir.path().join("calibration.yaml");
        fs::write(&path, "stale: true\n".repeat(1000)).unwrap_or_else(|e| panic!("seed: {e}"));
        artefact
            .write(&path)
            .unwrap_or_else(|e| panic!("write: {e}"));
        let text = fs::read_to_string(&path).unwrap_or_else(|e| panic!("read: {e}"));
        assert!(!text.contains("stale"));
    }

    #[rstest]
    fn digest_tracks_dataset(artefact: CalibrationArtefact) {
        assert_eq!(artefact.dataset_digest.len(), 64);
        assert!(artefact.matches_dataset(&[5.0, 10.0, 15.0, 20.0], &[3.0, 7.0, 11.0, 15.0]));
        assert!(!artefact.matches_dataset(&[5.0, 10.0, 15.0], &[20.0, 3.0, 7.0, 11.0, 15.0]));
    }

    #[rstest]
    fn rejects_unknown_version(mut artefact: CalibrationArtefact) {
        artefact.version = 99;
        let dir = TempDir::new().unwrap_or_else(|e| panic!("temp dir: {e}"));
        let path = dir.path().join("calibration.json");
        artefact
            .write(&path)
            .unwrap_or_else(|e| panic!("write: {e}"));
        assert!(matches!(
            CalibrationArtefact::load(&path),
            Err(ArtefactError::Version { found: 99 })
        ));
    }
}
