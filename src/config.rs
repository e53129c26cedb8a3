//! Grid-search configuration for calibration.
//!
//! Parameter sweeps are data: each searched parameter is a [`ParamRange`]
//! and every strategy owns a small record of ranges. Coarser or finer sweeps
//! only need a different configuration file.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest number of points a single range may expand to.
const MAX_RANGE_POINTS: usize = 100_000;

/// Slack applied when deciding whether `stop` is reached.
const STOP_TOLERANCE: f64 = 1e-9;

/// Errors raised by configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{parameter}: start, stop and step must be finite")]
    NonFinite { parameter: &'static str },
    #[error("{parameter}: step must be greater than 0")]
    NonPositiveStep { parameter: &'static str },
    #[error("{parameter}: stop must not be less than start")]
    Reversed { parameter: &'static str },
    #[error("{parameter}: range expands to too many grid points")]
    TooManyPoints { parameter: &'static str },
}

/// Inclusive arithmetic sweep `start, start + step, …, ≤ stop`.
///
/// # Examples
///
/// ```
/// use phase_complexity::config::ParamRange;
///
/// let r = ParamRange::new(0.5, 1.0, 0.25);
/// assert_eq!(r.values().collect::<Vec<_>>(), vec![0.5, 0.75, 1.0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl ParamRange {
    #[must_use]
    pub const fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    /// Ensure the range is finite, ascending and reasonably sized.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming `parameter` when the range is invalid.
    #[must_use = "Validation should not be ignored"]
    pub fn validate(self, parameter: &'static str) -> Result<Self, ConfigError> {
        if !(self.start.is_finite() && self.stop.is_finite() && self.step.is_finite()) {
            Err(ConfigError::NonFinite { parameter })
        } else if self.step <= 0.0 {
            Err(ConfigError::NonPositiveStep { parameter })
        } else if self.stop < self.start {
            Err(ConfigError::Reversed { parameter })
        } else if self.point_count() > MAX_RANGE_POINTS {
            Err(ConfigError::TooManyPoints { parameter })
        } else {
            Ok(self)
        }
    }

    /// Number of values produced by [`values`](Self::values).
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "range arithmetic")]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "validated ranges are non-negative and bounded"
    )]
    pub fn point_count(&self) -> usize {
        let spans = ((self.stop - self.start) / self.step + STOP_TOLERANCE).floor();
        if spans.is_finite() && spans >= 0.0 {
            (spans as usize).saturating_add(1)
        } else {
            0
        }
    }

    /// Values in ascending order. Each value is computed from its index, so
    /// step error does not accumulate.
    #[expect(clippy::float_arithmetic, reason = "range arithmetic")]
    #[expect(clippy::cast_precision_loss, reason = "point counts are bounded")]
    pub fn values(&self) -> impl Iterator<Item = f64> + use<> {
        let Self { start, step, .. } = *self;
        (0..self.point_count()).map(move |i| start + step * i as f64)
    }
}

/// Sweep for [`Sigma::Linear`](crate::Sigma::Linear).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinearGrid {
    pub factor: ParamRange,
}

impl Default for LinearGrid {
    fn default() -> Self {
        Self {
            factor: ParamRange::new(0.5, 5.0, 0.05),
        }
    }
}

/// Sweep for [`Sigma::PowerLaw`](crate::Sigma::PowerLaw). `power` is the
/// outer loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PowerLawGrid {
    pub power: ParamRange,
    pub scale: ParamRange,
}

impl Default for PowerLawGrid {
    fn default() -> Self {
        Self {
            power: ParamRange::new(0.5, 2.9, 0.2),
            scale: ParamRange::new(0.5, 9.5, 0.5),
        }
    }
}

/// Sweep for [`Sigma::RobustSigmoid`](crate::Sigma::RobustSigmoid). Median
/// and IQR come from the raw-score population; only steepness is searched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RobustSigmoidGrid {
    pub steepness: ParamRange,
}

impl Default for RobustSigmoidGrid {
    fn default() -> Self {
        Self {
            steepness: ParamRange::new(0.5, 4.9, 0.2),
        }
    }
}

/// Parameter sweeps for every normalisation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub linear: LinearGrid,
    pub power_law: PowerLawGrid,
    pub robust_sigmoid: RobustSigmoidGrid,
}

impl GridConfig {
    /// Ensure every range is valid.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    #[must_use = "Validation should not be ignored"]
    pub fn validate(self) -> Result<Self, ConfigError> {
        self.linear.factor.validate("linear.factor")?;
        self.power_law.power.validate("power_law.power")?;
        self.power_law.scale.validate("power_law.scale")?;
        self.robust_sigmoid
            .steepness
            .validate("robust_sigmoid.steepness")?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::approx_eq;
    use rstest::rstest;

    #[rstest]
    fn default_grids_cover_documented_sweeps() {
        let grid = GridConfig::default();
        assert_eq!(grid.linear.factor.point_count(), 91);
        assert_eq!(grid.power_law.power.point_count(), 13);
        assert_eq!(grid.power_law.scale.point_count(), 19);
        assert_eq!(grid.robust_sigmoid.steepness.point_count(), 23);
        let last = grid.linear.factor.values().last().unwrap_or(f64::NAN);
        assert!(approx_eq(last, 5.0, 1e-9));
    }

    #[rstest]
    fn values_ascend() {
        let values: Vec<f64> = GridConfig::default().power_law.scale.values().collect();
        assert!(values.windows(2).all(|w| matches!(w, [a, b] if a < b)));
    }

    #[rstest]
    #[case(ParamRange::new(0.0, 1.0, 0.0), ConfigError::NonPositiveStep { parameter: "p" })]
    #[case(ParamRange::new(2.0, 1.0, 0.5), ConfigError::Reversed { parameter: "p" })]
    #[case(ParamRange::new(0.0, f64::NAN, 0.5), ConfigError::NonFinite { parameter: "p" })]
    #[case(ParamRange::new(0.0, 1.0, 1e-9), ConfigError::TooManyPoints { parameter: "p" })]
    fn rejects_invalid_ranges(#[case] range: ParamRange, #[case] expected: ConfigError) {
        assert_eq!(range.validate("p"), Err(expected));
    }

    #[rstest]
    fn single_point_range() {
        let r = ParamRange::new(1.5, 1.5, 0.1);
        assert_eq!(r.values().collect::<Vec<_>>(), vec![1.5]);
    }

    #[rstest]
    fn deserialise_partial_config_keeps_defaults() {
        let cfg: GridConfig = serde_json::from_str(
            r#"{"linear":{"factor":{"start":1.0,"stop":2.0,"step":0.5}}}"#,
        )
        .unwrap_or_else(|e| panic!("deserialise GridConfig: {e}"));
        assert_eq!(cfg.linear.factor, ParamRange::new(1.0, 2.0, 0.5));
        assert_eq!(cfg.power_law, PowerLawGrid::default());
    }

    #[rstest]
    fn deserialise_rejects_unknown_strategy() {
        let cfg: Result<GridConfig, _> = serde_json::from_str(r#"{"z_score":{}}"#);
        assert!(cfg.is_err());
    }
}
