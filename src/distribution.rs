//! Descriptive statistics over score sequences.
//!
//! Variance is accumulated with Welford's method to avoid the catastrophic
//! cancellation of the naive two-pass formula. Quartiles use the simple index
//! method (`sorted[n / 4]`, `sorted[3n / 4]`) rather than interpolation; the
//! robust sigmoid is fitted with these exact values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scores at or above this value count as clustered at the ceiling.
pub const CEILING_THRESHOLD: f64 = 14.5;

/// Fraction of units at the ceiling from which clustering is moderate.
const MODERATE_CLUSTERING: f64 = 3.0 / 8.0;

/// Fraction of units at the ceiling from which clustering is severe.
const SEVERE_CLUSTERING: f64 = 5.0 / 8.0;

/// Errors that can occur while describing a sequence.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DistributionError {
    /// The input slice is empty and no statistics can be calculated.
    #[error("at least one value is required to describe a distribution")]
    Empty,
    #[error("value at index {index} is not finite")]
    NonFinite { index: usize },
}

/// Calculate the sample variance (`n − 1` denominator) of the provided
/// values.
///
/// For a single value the variance is defined as zero.
///
/// # Examples
///
/// ```
/// use phase_complexity::distribution::variance;
///
/// #[expect(clippy::unwrap_used, reason = "test should fail loudly")]
/// let var = variance(&[1.0, 2.0, 3.0]).unwrap();
/// assert!((var - 1.0).abs() < 1e-12);
/// ```
///
/// # Errors
///
/// Returns [`DistributionError::Empty`] if `values` contains no elements and
/// [`DistributionError::NonFinite`] for NaN or infinite values.
#[expect(clippy::float_arithmetic, reason = "variance accumulation")]
pub fn variance(values: &[f64]) -> Result<f64, DistributionError> {
    check_finite(values)?;

    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;
    let mut count = 0f64;

    for &x in values {
        count += 1.0;
        let delta = x - mean;
        mean += delta / count;
        let delta2 = x - mean;
        m2 += delta * delta2;
    }

    if count < 2.0 {
        Ok(0.0)
    } else {
        Ok(m2 / (count - 1.0))
    }
}

fn check_finite(values: &[f64]) -> Result<(), DistributionError> {
    if values.is_empty() {
        return Err(DistributionError::Empty);
    }
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(DistributionError::NonFinite { index }),
        None => Ok(()),
    }
}

/// How strongly scores pile up at the top of the scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clustering {
    None,
    Moderate,
    Severe,
}

/// Summary statistics of a score sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub count: usize,
    pub mean: f64,
    /// Middle value, or the mean of the two middle values for even counts.
    pub median: f64,
    /// Sample standard deviation.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    /// Number of scores at or above [`CEILING_THRESHOLD`].
    pub ceiling_count: usize,
}

impl Distribution {
    /// Describe a non-empty sequence of finite scores.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::Empty`] for an empty slice and
    /// [`DistributionError::NonFinite`] if any value is NaN or infinite.
    ///
    /// # Examples
    ///
    /// ```
    /// use phase_complexity::Distribution;
    ///
    /// # fn main() -> Result<(), phase_complexity::DistributionError> {
    /// let d = Distribution::from_scores(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])?;
    /// assert_eq!((d.q1, d.q3, d.iqr), (3.0, 7.0, 4.0));
    /// # Ok(())
    /// # }
    /// ```
    #[expect(clippy::float_arithmetic, reason = "summary statistics")]
    #[expect(clippy::cast_precision_loss, reason = "score counts are small")]
    pub fn from_scores(scores: &[f64]) -> Result<Self, DistributionError> {
        let var = variance(scores)?;
        let mut sorted = scores.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let at = |index: usize| sorted.get(index).copied().unwrap_or_default();

        let median = if n % 2 == 1 {
            at(n / 2)
        } else {
            (at(n / 2 - 1) + at(n / 2)) / 2.0
        };
        let q1 = at(n / 4);
        let q3 = at(3 * n / 4);

        Ok(Self {
            count: n,
            mean: sorted.iter().sum::<f64>() / n as f64,
            median,
            std_dev: var.sqrt(),
            min: at(0),
            max: at(n - 1),
            q1,
            q3,
            iqr: q3 - q1,
            ceiling_count: sorted.iter().filter(|&&s| s >= CEILING_THRESHOLD).count(),
        })
    }

    /// Share of scores at or above [`CEILING_THRESHOLD`].
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "ratio")]
    #[expect(clippy::cast_precision_loss, reason = "score counts are small")]
    pub fn ceiling_fraction(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.ceiling_count as f64 / self.count as f64
        }
    }

    #[must_use]
    pub fn clustering(&self) -> Clustering {
        let fraction = self.ceiling_fraction();
        if fraction >= SEVERE_CLUSTERING {
            Clustering::Severe
        } else if fraction >= MODERATE_CLUSTERING {
            Clustering::Moderate
        } else {
            Clustering::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::approx_eq;
    use rstest::rstest;

    #[rstest]
    fn variance_empty() {
        assert_eq!(variance(&[]), Err(DistributionError::Empty));
    }

    #[rstest]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn variance_single() {
        let result = variance(&[4.0]).expect("variance of single value");
        assert!(result.abs() < f64::EPSILON);
    }

    #[rstest]
    fn variance_rejects_nan() {
        assert_eq!(
            variance(&[1.0, f64::NAN]),
            Err(DistributionError::NonFinite { index: 1 })
        );
    }

    #[rstest]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn identical_scores_have_exactly_zero_spread() {
        let d = Distribution::from_scores(&[9.0; 10]).expect("distribution");
        assert!(d.std_dev == 0.0, "expected exact zero, got {}", d.std_dev);
        assert!(d.iqr == 0.0);
    }

    #[rstest]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn describes_unsorted_scores() {
        let d = Distribution::from_scores(&[8.0, 1.0, 5.0, 3.0, 7.0]).expect("distribution");
        assert_eq!(d.count, 5);
        assert!(approx_eq(d.mean, 4.8, 1e-12));
        assert!(approx_eq(d.median, 5.0, 1e-12));
        assert!(approx_eq(d.std_dev, 2.863_564_212_655_27, 1e-9));
        assert_eq!((d.min, d.max), (1.0, 8.0));
        // n = 5: q1 at index 1, q3 at index 3.
        assert_eq!((d.q1, d.q3), (3.0, 7.0));
    }

    #[rstest]
    #[case(&[15.0, 15.0, 15.0, 15.0, 15.0, 3.0, 2.0, 1.0], Clustering::Severe)]
    #[case(&[14.5, 15.0, 14.9, 4.0, 3.0, 3.0, 2.0, 1.0], Clustering::Moderate)]
    #[case(&[14.4, 15.0, 4.0, 4.0, 3.0, 3.0, 2.0, 1.0], Clustering::None)]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn ceiling_clustering(#[case] scores: &[f64], #[case] expected: Clustering) {
        let d = Distribution::from_scores(scores).expect("distribution");
        assert_eq!(d.clustering(), expected);
    }
}
