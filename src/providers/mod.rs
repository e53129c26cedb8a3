//! Provider interfaces for feature extraction and complexity estimation.
//!
//! Defines the `FeatureExtractor` trait and the adapters that back both it
//! and [`Estimator`]: an external analyzer process, a fixed feature table,
//! a scoring pipeline and, behind the `provider-api` feature, an HTTP
//! estimator.

pub mod analyzer;
#[cfg(feature = "provider-api")]
pub mod api;
pub mod scoring;
pub mod table;

pub use crate::api::{Estimate, Estimator, Unit};
pub use crate::features::Extraction;
pub use crate::retry::{Retrying, Transient};

pub use analyzer::{AnalyzerCommand, AnalyzerError};
#[cfg(feature = "provider-api")]
pub use api::{ApiEstimator, ApiEstimatorError};
pub use scoring::ScoringEstimator;
pub use table::{FeatureTable, FeatureTableError, TableEstimator, TableEstimatorError};

/// Extracts structural signals from a unit of work.
pub trait FeatureExtractor {
    /// Error type returned when extraction fails.
    ///
    /// Errors must implement `std::error::Error` and be `Send + Sync + 'static`
    /// so they can be logged and stored in per-unit reports.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Extract the features of `unit`.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction fails.
    fn extract(&self, unit: &Unit) -> Result<Extraction, Self::Error>;
}

impl<X: FeatureExtractor + ?Sized> FeatureExtractor for &X {
    type Error = X::Error;

    fn extract(&self, unit: &Unit) -> Result<Extraction, Self::Error> {
        (**self).extract(unit)
    }
}
