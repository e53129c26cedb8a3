//! Raw complexity score: a capped, weighted sum of the structural signals.

use crate::features::{FeatureCaps, FeatureVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allowed deviation of the weight sum from 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Errors returned when constructing [`Weights`].
#[derive(Debug, Error, PartialEq)]
pub enum WeightsError {
    #[error("weight at position {index} is {value}; weights must be finite and non-negative")]
    Invalid { index: usize, value: f64 },
    #[error("weights sum to {sum}; they must sum to 1.0")]
    Sum { sum: f64 },
}

/// Positional weights for the five feature signals.
///
/// The weights sum to one, so the raw score is a weighted average of the
/// capped counts rather than an arbitrary sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 5]", into = "[f64; 5]")]
pub struct Weights([f64; 5]);

impl Weights {
    /// Reference weighting: tasks, files, dependencies, tests, risks.
    pub const REFERENCE: Self = Self([0.30, 0.20, 0.20, 0.15, 0.15]);

    /// Validate and wrap a weight vector.
    ///
    /// # Errors
    ///
    /// Returns [`WeightsError::Invalid`] for a negative or non-finite weight
    /// and [`WeightsError::Sum`] if the weights do not sum to 1.0.
    ///
    /// # Examples
    ///
    /// ```
    /// use phase_complexity::score::Weights;
    ///
    /// assert!(Weights::new([0.2; 5]).is_ok());
    /// assert!(Weights::new([0.5; 5]).is_err());
    /// ```
    pub fn new(weights: [f64; 5]) -> Result<Self, WeightsError> {
        if let Some((index, &value)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(WeightsError::Invalid { index, value });
        }
        let sum: f64 = weights.iter().sum();
        #[expect(clippy::float_arithmetic, reason = "tolerance comparison")]
        let off = (sum - 1.0).abs();
        if off > WEIGHT_SUM_TOLERANCE {
            return Err(WeightsError::Sum { sum });
        }
        Ok(Self(weights))
    }

    #[must_use]
    pub const fn as_array(&self) -> [f64; 5] {
        self.0
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self::REFERENCE
    }
}

impl TryFrom<[f64; 5]> for Weights {
    type Error = WeightsError;

    fn try_from(value: [f64; 5]) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Weights> for [f64; 5] {
    fn from(value: Weights) -> Self {
        value.0
    }
}

/// Deterministic raw scorer.
///
/// # Examples
///
/// ```
/// use phase_complexity::{FeatureVector, RawScorer};
///
/// let scorer = RawScorer::default();
/// let raw = scorer.score(&FeatureVector::new(10, 0, 0, 0, 0));
/// assert!((raw - 3.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawScorer {
    weights: Weights,
    caps: FeatureCaps,
}

impl RawScorer {
    #[must_use]
    pub const fn new(weights: Weights, caps: FeatureCaps) -> Self {
        Self { weights, caps }
    }

    #[must_use]
    pub const fn weights(&self) -> Weights {
        self.weights
    }

    #[must_use]
    pub const fn caps(&self) -> FeatureCaps {
        self.caps
    }

    /// `Σ min(feature_i, cap_i) × weight_i`.
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "weighted sum")]
    pub fn score(&self, features: &FeatureVector) -> f64 {
        features
            .capped(&self.caps)
            .as_array()
            .iter()
            .zip(self.weights.as_array())
            .map(|(&count, weight)| f64::from(count) * weight)
            .sum()
    }

    /// The raw score multiplied by 100 and rounded, the form external
    /// analyzers report in their diagnostics.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "raw score is non-negative and bounded by the caps"
    )]
    pub fn score_x100(&self, features: &FeatureVector) -> u32 {
        #[expect(clippy::float_arithmetic, reason = "fixed-point conversion")]
        let scaled = (self.score(features) * 100.0).round();
        scaled as u32
    }
}

/// Score a feature vector with the reference weights and caps.
#[must_use]
pub fn raw_score(features: &FeatureVector) -> f64 {
    RawScorer::default().score(features)
}
