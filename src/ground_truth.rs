//! Expert-assigned reference scores.
//!
//! The dataset is a YAML (or JSON) document with a `phases` list:
//!
//! ```yaml
//! phases:
//!   - phase_number: 0
//!     phase_name: Foundation
//!     ground_truth_score: 9.0
//! ```
//!
//! `units`, `unit_id` and `unit_name` are accepted as alternative keys.
//! Records keep their file order; that order defines the sequence used for
//! correlation.

use crate::sigma::SCORE_CEILING;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Errors raised while loading a ground-truth dataset.
#[derive(Debug, Error)]
pub enum GroundTruthError {
    #[error("failed to read ground truth {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse ground truth: {0}")]
    Parse(String),
    #[error("ground truth contains no records")]
    Empty,
    #[error("record {index} is missing `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("record {index} has score {score} outside [0, 15]")]
    ScoreOutOfRange { index: usize, score: f64 },
    #[error("record {index} repeats unit {unit_id}")]
    DuplicateUnit { index: usize, unit_id: u32 },
}

/// One expert-scored unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthRecord {
    pub unit_id: u32,
    pub unit_name: String,
    pub ground_truth_score: f64,
}

#[derive(Deserialize)]
struct RawDataset {
    #[serde(alias = "units")]
    phases: Vec<RawRecord>,
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(default, alias = "phase_number")]
    unit_id: Option<u32>,
    #[serde(default, alias = "phase_name")]
    unit_name: Option<String>,
    #[serde(default)]
    ground_truth_score: Option<f64>,
}

impl RawRecord {
    fn validate(self, index: usize) -> Result<GroundTruthRecord, GroundTruthError> {
        let missing = |field| GroundTruthError::MissingField { index, field };
        let unit_id = self.unit_id.ok_or_else(|| missing("phase_number"))?;
        let unit_name = self.unit_name.ok_or_else(|| missing("phase_name"))?;
        let score = self
            .ground_truth_score
            .ok_or_else(|| missing("ground_truth_score"))?;
        if !(0.0..=SCORE_CEILING).contains(&score) {
            return Err(GroundTruthError::ScoreOutOfRange { index, score });
        }
        Ok(GroundTruthRecord {
            unit_id,
            unit_name,
            ground_truth_score: score,
        })
    }
}

/// An ordered, validated ground-truth dataset.
///
/// # Examples
///
/// ```
/// use phase_complexity::GroundTruth;
///
/// # fn main() -> Result<(), phase_complexity::GroundTruthError> {
/// let gt = GroundTruth::from_yaml_str(
///     "phases:\n  - {phase_number: 0, phase_name: Setup, ground_truth_score: 9}\n",
/// )?;
/// assert_eq!(gt.scores(), vec![9.0]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundTruth {
    records: Vec<GroundTruthRecord>,
}

impl GroundTruth {
    /// Load and validate a dataset file.
    ///
    /// # Errors
    ///
    /// Returns [`GroundTruthError`] when the file cannot be read, parsed or
    /// validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GroundTruthError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| GroundTruthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse and validate dataset text.
    ///
    /// # Errors
    ///
    /// Returns [`GroundTruthError`] for malformed, empty or invalid data.
    pub fn from_yaml_str(text: &str) -> Result<Self, GroundTruthError> {
        let raw: RawDataset =
            serde_yaml::from_str(text).map_err(|e| GroundTruthError::Parse(e.to_string()))?;
        let records = raw
            .phases
            .into_iter()
            .enumerate()
            .map(|(index, record)| record.validate(index))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(records)
    }

    /// Build a dataset from records.
    ///
    /// # Errors
    ///
    /// Returns [`GroundTruthError::Empty`], [`GroundTruthError::DuplicateUnit`]
    /// or [`GroundTruthError::ScoreOutOfRange`].
    pub fn new(records: Vec<GroundTruthRecord>) -> Result<Self, GroundTruthError> {
        if records.is_empty() {
            return Err(GroundTruthError::Empty);
        }
        let mut seen = BTreeSet::new();
        for (index, record) in records.iter().enumerate() {
            if !seen.insert(record.unit_id) {
                return Err(GroundTruthError::DuplicateUnit {
                    index,
                    unit_id: record.unit_id,
                });
            }
            let score = record.ground_truth_score;
            if !(0.0..=SCORE_CEILING).contains(&score) {
                return Err(GroundTruthError::ScoreOutOfRange { index, score });
            }
        }
        Ok(Self { records })
    }

    #[must_use]
    pub fn records(&self) -> &[GroundTruthRecord] {
        &self.records
    }

    /// Scores in record order.
    #[must_use]
    pub fn scores(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.ground_truth_score).collect()
    }

    #[must_use]
    pub fn unit_ids(&self) -> Vec<u32> {
        self.records.iter().map(|r| r.unit_id).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always `false`; empty datasets are rejected on construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
