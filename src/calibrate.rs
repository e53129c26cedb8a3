//! Grid-search calibration of the normalisation strategies.
//!
//! For each strategy every candidate from its [`GridConfig`] sweep is applied
//! to the raw scores and scored by Pearson correlation against ground truth.
//!
//! Tie-break rule: candidates are visited in ascending parameter order (for
//! the power law, `power` is the outer loop and `scale` the inner one) and a
//! candidate only replaces the incumbent when its correlation is strictly
//! greater. The first maximum found therefore wins. Strategies are compared
//! the same way in the order linear, power law, robust sigmoid.

use crate::{
    config::{ConfigError, GridConfig},
    correlation::{CorrelationError, pearson},
    distribution::{Distribution, DistributionError},
    sigma::{SCORE_CEILING, Sigma, StrategyKind},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Errors returned by [`Calibrator::calibrate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("raw score at index {index} is negative or not finite")]
    InvalidRawScore { index: usize },
    #[error("ground truth at index {index} is outside [0, 15]")]
    InvalidGroundTruth { index: usize },
    #[error("{strategy} grid produced no candidates")]
    EmptyGrid { strategy: StrategyKind },
    #[error(transparent)]
    Correlation(#[from] CorrelationError),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Best parameters found for one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyFit {
    pub sigma: Sigma,
    pub correlation: f64,
    pub calibrated_scores: Vec<f64>,
}

impl StrategyFit {
    fn new(sigma: Sigma, correlation: f64, raw: &[f64]) -> Self {
        Self {
            sigma,
            correlation,
            calibrated_scores: apply_all(&sigma, raw),
        }
    }
}

/// Outcome of one calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Correlation of the unscaled raw scores with ground truth.
    pub baseline_correlation: f64,
    pub linear: StrategyFit,
    pub power_law: StrategyFit,
    pub robust_sigmoid: StrategyFit,
    pub best: StrategyKind,
}

impl Calibration {
    #[must_use]
    pub const fn fit(&self, kind: StrategyKind) -> &StrategyFit {
        match kind {
            StrategyKind::Linear => &self.linear,
            StrategyKind::PowerLaw => &self.power_law,
            StrategyKind::RobustSigmoid => &self.robust_sigmoid,
        }
    }

    /// Fit with the highest correlation.
    #[must_use]
    pub const fn best(&self) -> &StrategyFit {
        self.fit(self.best)
    }

    /// Fits in calibration order.
    pub fn fits(&self) -> impl Iterator<Item = &StrategyFit> {
        StrategyKind::ALL.into_iter().map(|kind| self.fit(kind))
    }
}

/// Exhaustive grid search over every normalisation strategy.
///
/// # Examples
///
/// ```
/// use phase_complexity::Calibrator;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let calibrator = Calibrator::default();
/// let result = calibrator.calibrate(&[5.0, 10.0, 15.0, 20.0], &[3.0, 7.0, 11.0, 15.0])?;
/// assert!(result.best().correlation > 0.99);
/// assert!(result.best().calibrated_scores.iter().all(|s| (0.0..=15.0).contains(s)));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Calibrator {
    grid: GridConfig,
}

impl Calibrator {
    /// Create a calibrator for the given sweeps.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any range is invalid.
    pub fn new(grid: GridConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            grid: grid.validate()?,
        })
    }

    #[must_use]
    pub const fn grid(&self) -> &GridConfig {
        &self.grid
    }

    /// Fit every strategy against `ground_truth` and pick the best.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError`] when the sequences differ in length, hold
    /// fewer than two values, or contain invalid scores.
    pub fn calibrate(
        &self,
        raw: &[f64],
        ground_truth: &[f64],
    ) -> Result<Calibration, CalibrationError> {
        check_inputs(raw, ground_truth)?;
        let baseline_correlation = pearson(ground_truth, raw)?;
        debug!(baseline_correlation, units = raw.len(), "calibration inputs accepted");

        let linear = self.fit_linear(raw, ground_truth)?;
        let power_law = self.fit_power_law(raw, ground_truth)?;
        let robust_sigmoid = self.fit_robust_sigmoid(raw, ground_truth)?;

        let mut best = StrategyKind::Linear;
        let mut best_correlation = linear.correlation;
        for (kind, fit) in [
            (StrategyKind::PowerLaw, &power_law),
            (StrategyKind::RobustSigmoid, &robust_sigmoid),
        ] {
            if fit.correlation > best_correlation {
                best = kind;
                best_correlation = fit.correlation;
            }
        }
        info!(
            strategy = %best,
            correlation = best_correlation,
            baseline_correlation,
            "calibration complete"
        );

        Ok(Calibration {
            baseline_correlation,
            linear,
            power_law,
            robust_sigmoid,
            best,
        })
    }

    /// Best linear factor.
    ///
    /// # Errors
    ///
    /// See [`Calibrator::calibrate`].
    pub fn fit_linear(&self, raw: &[f64], truth: &[f64]) -> Result<StrategyFit, CalibrationError> {
        let candidates = self
            .grid
            .linear
            .factor
            .values()
            .map(|factor| Sigma::Linear { factor });
        search(StrategyKind::Linear, candidates, raw, truth)
    }

    /// Best power and scale, searched jointly.
    ///
    /// # Errors
    ///
    /// See [`Calibrator::calibrate`].
    pub fn fit_power_law(
        &self,
        raw: &[f64],
        truth: &[f64],
    ) -> Result<StrategyFit, CalibrationError> {
        let scales = self.grid.power_law.scale;
        let candidates = self.grid.power_law.power.values().flat_map(move |power| {
            scales
                .values()
                .map(move |scale| Sigma::PowerLaw { power, scale })
        });
        search(StrategyKind::PowerLaw, candidates, raw, truth)
    }

    /// Best steepness for the robust sigmoid; median and IQR are taken from
    /// the raw population.
    ///
    /// # Errors
    ///
    /// See [`Calibrator::calibrate`].
    pub fn fit_robust_sigmoid(
        &self,
        raw: &[f64],
        truth: &[f64],
    ) -> Result<StrategyFit, CalibrationError> {
        let population = Distribution::from_scores(raw)?;
        debug!(
            median = population.median,
            iqr = population.iqr,
            "robust sigmoid population"
        );
        let candidates = self
            .grid
            .robust_sigmoid
            .steepness
            .values()
            .map(|steepness| Sigma::RobustSigmoid {
                median: population.median,
                iqr: population.iqr,
                steepness,
            });
        search(StrategyKind::RobustSigmoid, candidates, raw, truth)
    }
}

/// Apply `sigma` to every raw score.
#[must_use]
pub fn apply_all(sigma: &Sigma, raw: &[f64]) -> Vec<f64> {
    raw.iter().map(|&r| sigma.apply(r)).collect()
}

fn search(
    strategy: StrategyKind,
    candidates: impl Iterator<Item = Sigma>,
    raw: &[f64],
    truth: &[f64],
) -> Result<StrategyFit, CalibrationError> {
    let mut best: Option<(Sigma, f64)> = None;
    let mut evaluated = 0_usize;
    for sigma in candidates {
        let correlation = pearson(truth, &apply_all(&sigma, raw))?;
        evaluated += 1;
        if best.is_none_or(|(_, incumbent)| correlation > incumbent) {
            best = Some((sigma, correlation));
        }
    }
    let (sigma, correlation) = best.ok_or(CalibrationError::EmptyGrid { strategy })?;
    debug!(%strategy, evaluated, %sigma, correlation, "grid search finished");
    Ok(StrategyFit::new(sigma, correlation, raw))
}

fn check_inputs(raw: &[f64], truth: &[f64]) -> Result<(), CalibrationError> {
    if raw.len() != truth.len() {
        return Err(CorrelationError::LengthMismatch {
            left: raw.len(),
            right: truth.len(),
        }
        .into());
    }
    if let Some(index) = raw.iter().position(|r| !r.is_finite() || *r < 0.0) {
        return Err(CalibrationError::InvalidRawScore { index });
    }
    if let Some(index) = truth
        .iter()
        .position(|t| !(0.0..=SCORE_CEILING).contains(t))
    {
        return Err(CalibrationError::InvalidGroundTruth { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LinearGrid, ParamRange};
    use rstest::{fixture, rstest};

    #[fixture]
    fn calibrator() -> Calibrator {
        Calibrator::default()
    }

    #[rstest]
    fn first_maximum_wins_on_ties(calibrator: Calibrator) {
        // Any factor up to 0.75 keeps the scores uncapped and perfectly
        // linear, so the whole prefix of the sweep ties at 1.0.
        let fit = calibrator
            .fit_linear(&[5.0, 10.0, 15.0, 20.0], &[3.0, 7.0, 11.0, 15.0])
            .unwrap_or_else(|e| panic!("fit failed: {e}"));
        assert_eq!(fit.sigma, Sigma::Linear { factor: 0.5 });
        assert_eq!(fit.calibrated_scores, vec![2.5, 5.0, 7.5, 10.0]);
    }

    #[rstest]
    fn constant_ground_truth_degrades_to_zero(calibrator: Calibrator) {
        let result = calibrator
            .calibrate(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0])
            .unwrap_or_else(|e| panic!("calibration failed: {e}"));
        assert!(result.fits().all(|f| f.correlation == 0.0));
        assert_eq!(result.best, StrategyKind::Linear);
    }

    #[rstest]
    #[case(&[1.0, 2.0], &[1.0], CalibrationError::Correlation(CorrelationError::LengthMismatch { left: 2, right: 1 }))]
    #[case(&[1.0, -2.0], &[1.0, 2.0], CalibrationError::InvalidRawScore { index: 1 })]
    #[case(&[1.0, 2.0], &[1.0, 16.0], CalibrationError::InvalidGroundTruth { index: 1 })]
    #[case(&[1.0], &[1.0], CalibrationError::Correlation(CorrelationError::TooShort { len: 1 }))]
    fn rejects_invalid_inputs(
        calibrator: Calibrator,
        #[case] raw: &[f64],
        #[case] truth: &[f64],
        #[case] expected: CalibrationError,
    ) {
        assert_eq!(calibrator.calibrate(raw, truth), Err(expected));
    }

    #[rstest]
    fn rejects_invalid_grid() {
        let grid = GridConfig {
            linear: LinearGrid {
                factor: ParamRange::new(1.0, 0.0, 0.1),
            },
            ..GridConfig::default()
        };
        assert!(Calibrator::new(grid).is_err());
    }
}
