//! Pearson product-moment correlation.

use thiserror::Error;

/// Errors returned by [`pearson`].
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum CorrelationError {
    #[error("sequences differ in length: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("at least two values are required, got {len}")]
    TooShort { len: usize },
    #[error("value at index {index} of the {side} sequence is not finite")]
    NonFinite { side: Side, index: usize },
}

/// Which argument of [`pearson`] an error refers to.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Side {
    Left,
    Right,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Right => "right",
        })
    }
}

/// Pearson correlation of two equal-length sequences.
///
/// A constant sequence has no variance and the coefficient is undefined;
/// this returns `0.0` in that case so batch calibration can keep going.
/// The result is clamped to `[-1, 1]` to absorb rounding.
///
/// # Errors
///
/// Returns [`CorrelationError::LengthMismatch`] for sequences of different
/// lengths, [`CorrelationError::TooShort`] for fewer than two values and
/// [`CorrelationError::NonFinite`] for NaN or infinite inputs.
///
/// # Examples
///
/// ```
/// use phase_complexity::pearson;
///
/// # fn main() -> Result<(), phase_complexity::CorrelationError> {
/// let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.5])?;
/// assert!(r > 0.99);
/// assert_eq!(pearson(&[1.0, 1.0], &[3.0, 4.0])?, 0.0);
/// # Ok(())
/// # }
/// ```
#[expect(clippy::float_arithmetic, reason = "correlation uses floats")]
#[expect(clippy::cast_precision_loss, reason = "sequence lengths are small")]
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64, CorrelationError> {
    if x.len() != y.len() {
        return Err(CorrelationError::LengthMismatch {
            left: x.len(),
            right: y.len(),
        });
    }
    if x.len() < 2 {
        return Err(CorrelationError::TooShort { len: x.len() });
    }
    check_finite(x, Side::Left)?;
    check_finite(y, Side::Right)?;

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let (mut sum_xy, mut sum_xx, mut sum_yy) = (0.0, 0.0, 0.0);
    for (&a, &b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sum_xy += dx * dy;
        sum_xx += dx * dx;
        sum_yy += dy * dy;
    }

    let denominator = (sum_xx * sum_yy).sqrt();
    if denominator == 0.0 {
        return Ok(0.0);
    }
    Ok((sum_xy / denominator).clamp(-1.0, 1.0))
}

fn check_finite(values: &[f64], side: Side) -> Result<(), CorrelationError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(CorrelationError::NonFinite { side, index }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(&[1.0, 2.0, 3.0, 4.0], &[2.0, 4.0, 6.0, 8.0], 1.0)]
    #[case(&[1.0, 2.0, 3.0, 4.0], &[8.0, 6.0, 4.0, 2.0], -1.0)]
    #[case(&[1.0, 2.0, 3.0], &[1.0, 3.0, 2.0], 0.5)]
    #[case(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0], 0.0)]
    #[case(&[5.0, 5.0], &[7.0, 7.0], 0.0)]
    fn computes_coefficient(#[case] x: &[f64], #[case] y: &[f64], #[case] expected: f64) {
        let r = pearson(x, y).unwrap_or_else(|e| panic!("pearson failed: {e}"));
        assert!(approx_eq(r, expected, 1e-12), "expected {expected}, got {r}");
    }

    #[rstest]
    #[case(&[1.0, 2.0], &[1.0], CorrelationError::LengthMismatch { left: 2, right: 1 })]
    #[case(&[1.0], &[1.0], CorrelationError::TooShort { len: 1 })]
    #[case(
        &[1.0, 2.0],
        &[1.0, f64::INFINITY],
        CorrelationError::NonFinite { side: Side::Right, index: 1 }
    )]
    fn rejects_invalid_input(
        #[case] x: &[f64],
        #[case] y: &[f64],
        #[case] expected: CorrelationError,
    ) {
        assert_eq!(pearson(x, y), Err(expected));
    }
}
