//! Core library entry point.
//! Re-exports public types and traits.
//!
//! Phases of planned work are scored by combining five structural signals
//! into a raw score, which a calibrated [`Sigma`] maps onto `[0, 15]`. The
//! [`Calibrator`] fits the normalisation against expert ground truth and the
//! [`Harness`] validates any [`Estimator`] against the same data.

pub mod api;
pub mod artefact;
pub mod calibrate;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod correlation;
pub mod distribution;
pub mod features;
pub mod ground_truth;
pub mod harness;
pub mod plan;
pub mod providers;
pub mod report;
pub mod retry;
pub mod score;
pub mod sigma;

pub use api::{Estimate, Estimator, Unit};
pub use artefact::{ArtefactError, CalibrationArtefact, dataset_digest};
pub use calibrate::{Calibration, CalibrationError, Calibrator, StrategyFit};
#[cfg(feature = "cli")]
pub use cli::PhasecArgs;
pub use config::{ConfigError, GridConfig, ParamRange};
pub use correlation::{CorrelationError, pearson};
pub use distribution::{Clustering, Distribution, DistributionError};
pub use features::{Extraction, FeatureCaps, FeatureVector};
pub use ground_truth::{GroundTruth, GroundTruthError, GroundTruthRecord};
pub use harness::{ConsistencyCheck, Harness, HarnessError, Thresholds, ValidationReport, Verdict};
pub use providers::FeatureExtractor;
pub use retry::{RetryPolicy, Retrying, Transient};
pub use score::{RawScorer, Weights, WeightsError, raw_score};
pub use sigma::{SCORE_CEILING, Sigma, StrategyKind};

pub mod tests;
