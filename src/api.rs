use serde::{Deserialize, Serialize};

/// Calibrated scores above this recommend splitting the unit further.
pub const EXPANSION_THRESHOLD: f64 = 8.0;

/// A unit of planned work: one phase of a plan.
///
/// # Examples
///
/// ```
/// use phase_complexity::api::Unit;
///
/// let unit = Unit::new(3, "Storage layer", "Add the cache.");
/// assert_eq!(unit.name, "Storage layer");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: u32,
    pub name: String,
    pub content: String,
}

impl Unit {
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Complexity estimate for a single unit.
///
/// Only `score` takes part in validation; the remaining fields are passed
/// through from estimators that supply them.
///
/// # Examples
///
/// ```
/// use phase_complexity::api::Estimate;
///
/// let e = Estimate::from_score(9.5);
/// assert_eq!(e.expansion_recommended, Some(true));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expansion_recommended: Option<bool>,
}

impl Estimate {
    /// Build an estimate from a bare score, deriving the expansion
    /// recommendation from [`EXPANSION_THRESHOLD`].
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        Self {
            score,
            confidence: None,
            reasoning: None,
            expansion_recommended: Some(score > EXPANSION_THRESHOLD),
        }
    }
}

/// Trait for estimating the complexity of a unit.
pub trait Estimator {
    /// Error type returned when estimation fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Estimate the complexity of `unit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the estimate cannot be produced.
    fn estimate(&self, unit: &Unit) -> Result<Estimate, Self::Error>;
}

impl<E: Estimator + ?Sized> Estimator for &E {
    type Error = E::Error;

    fn estimate(&self, unit: &Unit) -> Result<Estimate, Self::Error> {
        (**self).estimate(unit)
    }
}
