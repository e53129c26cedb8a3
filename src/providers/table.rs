//! Table-backed providers: features and scores looked up by unit id.

use super::FeatureExtractor;
use crate::{
    api::{Estimate, Estimator, Unit},
    features::{Extraction, FeatureVector},
    retry::Transient,
};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Errors raised while loading or querying a [`FeatureTable`].
#[derive(Debug, Error)]
pub enum FeatureTableError {
    #[error("failed to read feature table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse feature table: {0}")]
    Parse(String),
    #[error("unit {unit_id} appears more than once")]
    DuplicateUnit { unit_id: u32 },
    #[error("no features recorded for unit {unit_id}")]
    UnknownUnit { unit_id: u32 },
}

impl Transient for FeatureTableError {
    fn is_transient(&self) -> bool {
        false
    }
}

#[derive(Deserialize)]
struct TableFile {
    units: Vec<TableRow>,
}

#[derive(Deserialize)]
struct TableRow {
    #[serde(alias = "phase_number")]
    unit_id: u32,
    #[serde(default)]
    features: FeatureVector,
}

/// Feature vectors recorded per unit id.
///
/// The file lists `units`, each with a `unit_id` and a `features` mapping.
/// Feature values that are not non-negative integers read as zero.
///
/// # Examples
///
/// ```
/// use phase_complexity::providers::{FeatureExtractor, FeatureTable, Unit};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let table = FeatureTable::from_yaml_str(
///     "units:\n  - unit_id: 0\n    features: {task_count: 14, file_count: \"9\", risk_signal_count: -1}\n",
/// )?;
/// let extraction = table.extract(&Unit::new(0, "Setup", ""))?;
/// assert_eq!(extraction.features.task_count, 14);
/// assert_eq!(extraction.features.file_count, 9);
/// assert_eq!(extraction.features.risk_signal_count, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureTable {
    rows: BTreeMap<u32, FeatureVector>,
}

impl FeatureTable {
    /// Load a table from a YAML or JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureTableError`] when the file cannot be read or parsed,
    /// or lists a unit twice.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FeatureTableError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| FeatureTableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse a table from YAML text. JSON is accepted as a YAML subset.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureTableError::Parse`] or
    /// [`FeatureTableError::DuplicateUnit`].
    pub fn from_yaml_str(text: &str) -> Result<Self, FeatureTableError> {
        let file: TableFile =
            serde_yaml::from_str(text).map_err(|e| FeatureTableError::Parse(e.to_string()))?;
        file.units.into_iter().try_fold(Self::default(), |mut table, row| {
            if table.rows.insert(row.unit_id, row.features).is_some() {
                return Err(FeatureTableError::DuplicateUnit {
                    unit_id: row.unit_id,
                });
            }
            Ok(table)
        })
    }

    #[must_use]
    pub fn get(&self, unit_id: u32) -> Option<&FeatureVector> {
        self.rows.get(&unit_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<(u32, FeatureVector)> for FeatureTable {
    fn from_iter<I: IntoIterator<Item = (u32, FeatureVector)>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl FeatureExtractor for FeatureTable {
    type Error = FeatureTableError;

    fn extract(&self, unit: &Unit) -> Result<Extraction, Self::Error> {
        self.get(unit.id)
            .copied()
            .map(Extraction::from)
            .ok_or(FeatureTableError::UnknownUnit { unit_id: unit.id })
    }
}

/// Error returned by [`TableEstimator`] for ids without a score.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("no score recorded for unit {unit_id}")]
pub struct TableEstimatorError {
    pub unit_id: u32,
}

impl Transient for TableEstimatorError {
    fn is_transient(&self) -> bool {
        false
    }
}

/// Estimator returning fixed scores by unit id.
///
/// # Examples
///
/// ```
/// use phase_complexity::providers::{Estimator, TableEstimator, Unit};
///
/// let estimator: TableEstimator = [(0, 9.0), (1, 8.0)].into_iter().collect();
/// let estimate = estimator.estimate(&Unit::new(0, "Setup", "")).ok();
/// assert_eq!(estimate.map(|e| e.score), Some(9.0));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableEstimator {
    scores: BTreeMap<u32, f64>,
}

impl FromIterator<(u32, f64)> for TableEstimator {
    fn from_iter<I: IntoIterator<Item = (u32, f64)>>(iter: I) -> Self {
        Self {
            scores: iter.into_iter().collect(),
        }
    }
}

impl Estimator for TableEstimator {
    type Error = TableEstimatorError;

    fn estimate(&self, unit: &Unit) -> Result<Estimate, Self::Error> {
        self.scores
            .get(&unit.id)
            .map(|&score| Estimate::from_score(score))
            .ok_or(TableEstimatorError { unit_id: unit.id })
    }
}
