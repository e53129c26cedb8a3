use super::FeatureExtractor;
use crate::{
    api::{Estimate, Estimator, Unit},
    score::RawScorer,
    sigma::Sigma,
};
use tracing::debug;

/// Estimator that extracts features, scores them and applies a calibrated
/// [`Sigma`].
///
/// # Examples
///
/// ```
/// use phase_complexity::{FeatureVector, RawScorer, Sigma};
/// use phase_complexity::providers::{Estimator, FeatureTable, ScoringEstimator, Unit};
///
/// let table: FeatureTable = [(0, FeatureVector::new(14, 9, 2, 6, 3))].into_iter().collect();
/// let estimator = ScoringEstimator::new(table, RawScorer::default(), Sigma::Linear { factor: 1.0 });
/// let score = estimator.estimate(&Unit::new(0, "Setup", "")).map(|e| e.score).ok();
/// assert!(score.is_some_and(|s| (s - 7.75).abs() < 1e-9));
/// ```
#[derive(Debug, Clone)]
pub struct ScoringEstimator<X> {
    extractor: X,
    scorer: RawScorer,
    sigma: Sigma,
}

impl<X: FeatureExtractor> ScoringEstimator<X> {
    #[must_use]
    pub const fn new(extractor: X, scorer: RawScorer, sigma: Sigma) -> Self {
        Self {
            extractor,
            scorer,
            sigma,
        }
    }

    #[must_use]
    pub const fn sigma(&self) -> &Sigma {
        &self.sigma
    }

    /// Uncalibrated score for `unit`.
    ///
    /// # Errors
    ///
    /// Returns the extractor's error.
    pub fn raw_score(&self, unit: &Unit) -> Result<f64, X::Error> {
        let extraction = self.extractor.extract(unit)?;
        let ours = self.scorer.score_x100(&extraction.features);
        if let Some(reported) = extraction.raw_score_x100.filter(|&r| r != ours) {
            debug!(
                unit = unit.id,
                reported, ours, "extractor raw score differs from local scoring"
            );
        }
        Ok(self.scorer.score(&extraction.features))
    }
}

impl<X: FeatureExtractor> Estimator for ScoringEstimator<X> {
    type Error = X::Error;

    fn estimate(&self, unit: &Unit) -> Result<Estimate, Self::Error> {
        let raw = self.raw_score(unit)?;
        Ok(Estimate::from_score(self.sigma.apply(raw)))
    }
}
