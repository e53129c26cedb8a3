//! Normalisation strategies that map a raw score onto the `[0, 15]` scale.
//!
//! `Sigma` implements three strategies:
//! - [`Linear`] multiplies by a factor and caps at the ceiling. It does not
//!   compress outliers, so one extreme raw score skews the whole fit.
//! - [`PowerLaw`] applies `scale × raw^power`. A power below one compresses
//!   high values; above one it separates low scores.
//! - [`RobustSigmoid`] standardises with the median and interquartile range of
//!   the calibration population and maps through a logistic curve. It resists
//!   outliers but its parameters only hold for the population they were
//!   derived from.
//!
//! [`Linear`]: Sigma::Linear
//! [`PowerLaw`]: Sigma::PowerLaw
//! [`RobustSigmoid`]: Sigma::RobustSigmoid

use crate::distribution::{Distribution, DistributionError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound of every calibrated score.
pub const SCORE_CEILING: f64 = 15.0;

/// Spreads with an absolute magnitude below this are treated as zero.
const NEAR_ZERO: f64 = 1e-12;

/// Logistic sigmoid function mapping any real number to `[0, 1]`.
#[expect(clippy::float_arithmetic, reason = "sigmoid uses floats")]
#[inline]
#[must_use]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Strategy for normalising raw scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case", deny_unknown_fields)]
pub enum Sigma {
    /// `min(15, raw × factor)`.
    Linear { factor: f64 },
    /// `min(15, scale × raw^power)`.
    PowerLaw { power: f64, scale: f64 },
    /// `15 / (1 + exp(−steepness × (raw − median) / iqr))`. The standardised
    /// value is zero when `iqr` is zero or non-finite.
    RobustSigmoid {
        median: f64,
        iqr: f64,
        steepness: f64,
    },
}

/// Name of a normalisation strategy without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Linear,
    PowerLaw,
    RobustSigmoid,
}

impl StrategyKind {
    /// Every strategy in calibration order.
    pub const ALL: [Self; 3] = [Self::Linear, Self::PowerLaw, Self::RobustSigmoid];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::PowerLaw => "power_law",
            Self::RobustSigmoid => "robust_sigmoid",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Sigma {
    /// Apply the normalisation strategy to a raw score.
    ///
    /// Negative and non-finite raw scores are treated as zero. The output is
    /// always within `[0, SCORE_CEILING]`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use phase_complexity::Sigma;
    ///
    /// let sigma = Sigma::Linear { factor: 2.0 };
    /// assert_eq!(sigma.apply(3.0), 6.0);
    /// assert_eq!(sigma.apply(100.0), 15.0);
    /// ```
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "normalisation uses floats")]
    pub fn apply(&self, raw: f64) -> f64 {
        let raw = if raw.is_finite() { raw.max(0.0) } else { 0.0 };
        let calibrated = match *self {
            Self::Linear { factor } => raw * factor,
            Self::PowerLaw { power, scale } => scale * raw.powf(power),
            Self::RobustSigmoid {
                median,
                iqr,
                steepness,
            } => SCORE_CEILING * sigmoid(steepness * standardise(raw, median, iqr)),
        };
        clamp_score(calibrated)
    }

    /// Build a robust sigmoid from the raw-score population it will be
    /// applied to.
    ///
    /// # Errors
    ///
    /// Returns a [`DistributionError`] if `population` is empty or contains a
    /// non-finite value.
    pub fn robust_from_population(
        population: &[f64],
        steepness: f64,
    ) -> Result<Self, DistributionError> {
        let dist = Distribution::from_scores(population)?;
        Ok(Self::RobustSigmoid {
            median: dist.median,
            iqr: dist.iqr,
            steepness,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> StrategyKind {
        match self {
            Self::Linear { .. } => StrategyKind::Linear,
            Self::PowerLaw { .. } => StrategyKind::PowerLaw,
            Self::RobustSigmoid { .. } => StrategyKind::RobustSigmoid,
        }
    }
}

impl fmt::Display for Sigma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear { factor } => write!(f, "linear(factor={factor:.3})"),
            Self::PowerLaw { power, scale } => {
                write!(f, "power_law(power={power:.2}, scale={scale:.2})")
            }
            Self::RobustSigmoid {
                median,
                iqr,
                steepness,
            } => write!(
                f,
                "robust_sigmoid(median={median:.2}, iqr={iqr:.2}, steepness={steepness:.2})"
            ),
        }
    }
}

/// `(raw − median) / iqr`, or zero when the spread is degenerate.
#[inline]
#[must_use]
#[expect(clippy::float_arithmetic, reason = "standardisation uses floats")]
fn standardise(raw: f64, median: f64, iqr: f64) -> f64 {
    if !iqr.is_finite() || iqr.abs() < NEAR_ZERO || !median.is_finite() {
        0.0
    } else {
        (raw - median) / iqr
    }
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, SCORE_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(2.5, 5.0)]
    #[case(7.5, 15.0)]
    #[case(40.0, 15.0)]
    #[case(-3.0, 0.0)]
    #[case(f64::NAN, 0.0)]
    #[case(f64::INFINITY, 0.0)]
    fn linear_cases(#[case] raw: f64, #[case] expected: f64) {
        let sigma = Sigma::Linear { factor: 2.0 };
        assert!(approx_eq(sigma.apply(raw), expected, 1e-12));
    }

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(4.0, 6.0)]
    #[case(100.0, 15.0)]
    fn power_law_cases(#[case] raw: f64, #[case] expected: f64) {
        let sigma = Sigma::PowerLaw {
            power: 0.5,
            scale: 3.0,
        };
        assert!(approx_eq(sigma.apply(raw), expected, 1e-12));
    }

    #[rstest]
    fn power_law_negative_power_at_zero_saturates() {
        let sigma = Sigma::PowerLaw {
            power: -1.0,
            scale: 1.0,
        };
        assert!(approx_eq(sigma.apply(0.0), SCORE_CEILING, 1e-12));
    }

    #[rstest]
    fn robust_midpoint_is_half_ceiling() {
        let sigma = Sigma::RobustSigmoid {
            median: 7.0,
            iqr: 5.0,
            steepness: 1.3,
        };
        assert!(approx_eq(sigma.apply(7.0), 7.5, 1e-12));
        assert!(sigma.apply(12.0) > 7.5);
        assert!(sigma.apply(2.0) < 7.5);
    }

    #[rstest]
    #[case(0.0)]
    #[case(1e-15)]
    #[case(f64::NAN)]
    fn robust_degenerate_iqr_standardises_to_zero(#[case] iqr: f64) {
        let sigma = Sigma::RobustSigmoid {
            median: 3.0,
            iqr,
            steepness: 2.0,
        };
        assert!(approx_eq(sigma.apply(20.0), 7.5, 1e-12));
    }

    #[rstest]
    fn robust_from_population_uses_index_quartiles() {
        let sigma = Sigma::robust_from_population(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 1.0)
            .unwrap_or_else(|e| panic!("population stats: {e}"));
        assert_eq!(
            sigma,
            Sigma::RobustSigmoid {
                median: 4.5,
                iqr: 4.0,
                steepness: 1.0,
            }
        );
    }

    #[rstest]
    fn serialises_with_strategy_tag() {
        let json = serde_json::to_string(&Sigma::Linear { factor: 1.5 })
            .unwrap_or_else(|e| panic!("serialise Sigma: {e}"));
        assert_eq!(json, r#"{"strategy":"linear","factor":1.5}"#);
    }

    #[rstest]
    fn rejects_unknown_strategy() {
        let parsed: Result<Sigma, _> = serde_json::from_str(r#"{"strategy":"z_score"}"#);
        assert!(parsed.is_err());
    }

    #[rstest]
    fn kinds_follow_variants() {
        let kinds = [
            Sigma::Linear { factor: 1.0 }.kind(),
            Sigma::PowerLaw {
                power: 1.0,
                scale: 1.0,
            }
            .kind(),
            Sigma::RobustSigmoid {
                median: 0.0,
                iqr: 1.0,
                steepness: 1.0,
            }
            .kind(),
        ];
        assert_eq!(kinds, StrategyKind::ALL);
    }
}
