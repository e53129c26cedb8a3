//! Validation of an estimator against ground truth.
//!
//! The harness runs a fixed sequence of [`Stage`]s and always produces a
//! [`ValidationReport`]. Failing thresholds is a verdict, not an error; the
//! only errors are inputs that do not describe the same units.

use crate::{
    api::{Estimator, Unit},
    correlation::{CorrelationError, pearson},
    distribution::{Distribution, DistributionError, variance},
    ground_truth::GroundTruth,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// Pass criteria for a validation run. Both comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Correlation must be greater than this.
    pub min_correlation: f64,
    /// Consistency standard deviation must be less than this.
    pub max_consistency_std: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_correlation: 0.90,
            max_consistency_std: 0.5,
        }
    }
}

/// Repeat-run check on a single unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyCheck {
    pub unit_id: u32,
    pub runs: usize,
}

impl ConsistencyCheck {
    pub const DEFAULT_RUNS: usize = 10;

    #[must_use]
    pub const fn new(unit_id: u32, runs: usize) -> Self {
        Self { unit_id, runs }
    }
}

/// Steps of a validation run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadGroundTruth,
    ObtainScores,
    EvaluateCorrelation,
    EvaluateDistribution,
    EvaluateConsistency,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LoadGroundTruth => "load_ground_truth",
            Self::ObtainScores => "obtain_scores",
            Self::EvaluateCorrelation => "evaluate_correlation",
            Self::EvaluateDistribution => "evaluate_distribution",
            Self::EvaluateConsistency => "evaluate_consistency",
            Self::Report => "report",
        })
    }
}

/// Errors that stop a validation run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HarnessError {
    #[error("expected {expected} units, got {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("unit at index {index} has id {found}, ground truth expects {expected}")]
    UnitMismatch {
        index: usize,
        expected: u32,
        found: u32,
    },
    #[error("consistency unit {unit_id} is not in the ground truth")]
    UnknownConsistencyUnit { unit_id: u32 },
    #[error(transparent)]
    Correlation(#[from] CorrelationError),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

/// Outcome for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitResult {
    pub unit_id: u32,
    pub unit_name: String,
    pub ground_truth: f64,
    /// `None` when the estimator failed for this unit.
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UnitResult {
    /// `score − ground_truth`.
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "error calculation")]
    pub fn delta(&self) -> Option<f64> {
        self.score.map(|s| s - self.ground_truth)
    }
}

/// Repeat-run statistics for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub unit_id: u32,
    pub scores: Vec<f64>,
    pub failures: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation; `None` if every run failed.
    pub std_dev: Option<f64>,
}

/// Which thresholds were met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub correlation_passed: bool,
    /// `None` when no consistency check was requested.
    pub consistency_passed: Option<bool>,
}

impl Verdict {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.correlation_passed && self.consistency_passed.unwrap_or(true)
    }
}

/// Result of a validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub thresholds: Thresholds,
    pub units: Vec<UnitResult>,
    /// Correlation over units with a score; `None` with fewer than two.
    pub correlation: Option<f64>,
    pub mean_abs_error: Option<f64>,
    pub max_abs_error: Option<f64>,
    pub ground_truth_distribution: Distribution,
    pub score_distribution: Option<Distribution>,
    pub consistency: Option<ConsistencyReport>,
    pub verdict: Verdict,
}

impl ValidationReport {
    /// The `n` units with the largest absolute error, largest first.
    #[must_use]
    pub fn largest_errors(&self, n: usize) -> Vec<&UnitResult> {
        let mut scored: Vec<(&UnitResult, f64)> = self
            .units
            .iter()
            .filter_map(|u| u.delta().map(|d| (u, d.abs())))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.into_iter().take(n).map(|(u, _)| u).collect()
    }

    /// Units the estimator could not score.
    pub fn failed_units(&self) -> impl Iterator<Item = &UnitResult> {
        self.units.iter().filter(|u| u.score.is_none())
    }

    /// Process exit status for this report: `0` on pass, `1` otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.verdict.passed())
    }
}

/// Runs validation stages against an [`Estimator`].
///
/// # Examples
///
/// ```
/// use phase_complexity::{GroundTruth, Harness};
/// use phase_complexity::plan::units_from_ground_truth;
/// use phase_complexity::providers::TableEstimator;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let gt = GroundTruth::from_yaml_str(
///     "phases:\n  - {phase_number: 0, phase_name: A, ground_truth_score: 4}\n  - {phase_number: 1, phase_name: B, ground_truth_score: 9}\n",
/// )?;
/// let estimator: TableEstimator = [(0, 5.0), (1, 10.0)].into_iter().collect();
/// let report = Harness::new(&estimator).run(&gt, &units_from_ground_truth(&gt))?;
/// assert!(report.verdict.passed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Harness<'a, E> {
    estimator: &'a E,
    thresholds: Thresholds,
    consistency: Option<ConsistencyCheck>,
}

impl<'a, E: Estimator> Harness<'a, E> {
    #[must_use]
    pub fn new(estimator: &'a E) -> Self {
        Self {
            estimator,
            thresholds: Thresholds::default(),
            consistency: None,
        }
    }

    #[must_use]
    pub const fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[must_use]
    pub const fn with_consistency(mut self, check: ConsistencyCheck) -> Self {
        self.consistency = Some(check);
        self
    }

    /// Validate the estimator on `units`, which must list the ground-truth
    /// units in the same order.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] if `units` does not match `ground_truth` or
    /// the consistency unit is unknown.
    pub fn run(
        &self,
        ground_truth: &GroundTruth,
        units: &[Unit],
    ) -> Result<ValidationReport, HarnessError> {
        info!(stage = %Stage::LoadGroundTruth, units = ground_truth.len());
        check_alignment(ground_truth, units)?;
        let consistency_unit = self
            .consistency
            .map(|check| find_unit(units, check))
            .transpose()?;

        info!(stage = %Stage::ObtainScores);
        let results: Vec<UnitResult> = ground_truth
            .records()
            .iter()
            .zip(units)
            .map(|(record, unit)| {
                let (score, error) = match self.score(unit) {
                    Ok(score) => (Some(score), None),
                    Err(e) => (None, Some(e)),
                };
                UnitResult {
                    unit_id: record.unit_id,
                    unit_name: record.unit_name.clone(),
                    ground_truth: record.ground_truth_score,
                    score,
                    error,
                }
            })
            .collect();

        info!(stage = %Stage::EvaluateCorrelation);
        let (truth, scores): (Vec<f64>, Vec<f64>) = results
            .iter()
            .filter_map(|r| r.score.map(|s| (r.ground_truth, s)))
            .unzip();
        let correlation = if scores.len() < 2 {
            warn!(scored = scores.len(), "too few scored units for correlation");
            None
        } else {
            Some(pearson(&truth, &scores)?)
        };
        let (mean_abs_error, max_abs_error) = abs_errors(&results);

        info!(stage = %Stage::EvaluateDistribution);
        let ground_truth_distribution = Distribution::from_scores(&ground_truth.scores())?;
        let score_distribution = if scores.is_empty() {
            None
        } else {
            Some(Distribution::from_scores(&scores)?)
        };

        let consistency = match (consistency_unit, self.consistency) {
            (Some(unit), Some(check)) => {
                info!(stage = %Stage::EvaluateConsistency, unit = unit.id, runs = check.runs);
                Some(self.consistency_report(unit, check.runs)?)
            }
            _ => None,
        };

        let verdict = Verdict {
            correlation_passed: correlation.is_some_and(|r| r > self.thresholds.min_correlation),
            consistency_passed: consistency.as_ref().map(|c| {
                c.std_dev
                    .is_some_and(|s| s < self.thresholds.max_consistency_std)
            }),
        };
        info!(
            stage = %Stage::Report,
            correlation = ?correlation,
            passed = verdict.passed()
        );

        Ok(ValidationReport {
            thresholds: self.thresholds,
            units: results,
            correlation,
            mean_abs_error,
            max_abs_error,
            ground_truth_distribution,
            score_distribution,
            consistency,
            verdict,
        })
    }

    fn score(&self, unit: &Unit) -> Result<f64, String> {
        match self.estimator.estimate(unit) {
            Ok(estimate) if estimate.score.is_finite() => Ok(estimate.score),
            Ok(estimate) => {
                let message = format!("non-finite score {}", estimate.score);
                warn!(unit = unit.id, "{message}");
                Err(message)
            }
            Err(e) => {
                warn!(unit = unit.id, error = %e, "estimation failed");
                Err(e.to_string())
            }
        }
    }

    #[expect(clippy::float_arithmetic, reason = "mean of repeated scores")]
    #[expect(clippy::cast_precision_loss, reason = "run counts are small")]
    fn consistency_report(
        &self,
        unit: &Unit,
        runs: usize,
    ) -> Result<ConsistencyReport, HarnessError> {
        let mut scores = Vec::with_capacity(runs);
        let mut failures = 0;
        for _ in 0..runs {
            match self.score(unit) {
                Ok(score) => scores.push(score),
                Err(_) => failures += 1,
            }
        }
        let (mean, std_dev) = if scores.is_empty() {
            (None, None)
        } else {
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            (Some(mean), Some(variance(&scores)?.sqrt()))
        };
        Ok(ConsistencyReport {
            unit_id: unit.id,
            scores,
            failures,
            mean,
            std_dev,
        })
    }
}

fn check_alignment(ground_truth: &GroundTruth, units: &[Unit]) -> Result<(), HarnessError> {
    if ground_truth.len() != units.len() {
        return Err(HarnessError::LengthMismatch {
            expected: ground_truth.len(),
            found: units.len(),
        });
    }
    for (index, (record, unit)) in ground_truth.records().iter().zip(units).enumerate() {
        if record.unit_id != unit.id {
            return Err(HarnessError::UnitMismatch {
                index,
                expected: record.unit_id,
                found: unit.id,
            });
        }
    }
    Ok(())
}

fn find_unit(units: &[Unit], check: ConsistencyCheck) -> Result<&Unit, HarnessError> {
    units
        .iter()
        .find(|u| u.id == check.unit_id)
        .ok_or(HarnessError::UnknownConsistencyUnit {
            unit_id: check.unit_id,
        })
}

#[expect(clippy::float_arithmetic, reason = "error summary")]
#[expect(clippy::cast_precision_loss, reason = "unit counts are small")]
fn abs_errors(results: &[UnitResult]) -> (Option<f64>, Option<f64>) {
    let errors: Vec<f64> = results
        .iter()
        .filter_map(UnitResult::delta)
        .map(f64::abs)
        .collect();
    if errors.is_empty() {
        return (None, None);
    }
    let mean = errors.iter().sum::<f64>() / errors.len() as f64;
    let max = errors.iter().copied().fold(0.0, f64::max);
    (Some(mean), Some(max))
}
