//! API-based complexity estimator.
//!
//! Sends a unit to an HTTP endpoint and expects a JSON assessment containing
//! a `complexity_score` (or `score`) in `[0, 15]`, either at the top level or
//! nested under `complexity_assessment`. An optional API key is sent as a
//! bearer token.
//!
//! # Examples
//!
//! ```no_run
//! use phase_complexity::providers::{ApiEstimator, Estimator, Unit};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let estimator = ApiEstimator::new("http://localhost:8080/assess", None)?;
//! let estimate = estimator.estimate(&Unit::new(0, "Setup", "Create the crate."))?;
//! assert!((0.0..=15.0).contains(&estimate.score));
//! # Ok(())
//! # }
//! ```

use crate::{
    api::{Estimate, Estimator, Unit},
    retry::Transient,
    sigma::SCORE_CEILING,
};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error returned by [`ApiEstimator`].
#[derive(Debug, Error)]
pub enum ApiEstimatorError {
    /// Unit content was empty.
    #[error("empty unit content")]
    Empty,
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Endpoint answered with a non-success status.
    #[error("estimator returned HTTP {status}")]
    Status { status: u16 },
    /// Response did not contain a valid assessment.
    #[error("invalid response")]
    InvalidResponse,
    #[error("score {score} is outside [0, 15]")]
    ScoreOutOfRange { score: f64 },
}

impl PartialEq for ApiEstimatorError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Status { status: a }, Self::Status { status: b }) => a == b,
            (Self::ScoreOutOfRange { score: a }, Self::ScoreOutOfRange { score: b }) => {
                a.to_bits() == b.to_bits()
            }
            _ => matches!(
                (self, other),
                (Self::Empty, Self::Empty)
                    | (Self::InvalidResponse, Self::InvalidResponse)
                    | (Self::Request(_), Self::Request(_))
            ),
        }
    }
}

impl Transient for ApiEstimatorError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status } => *status == 429 || (500..600).contains(status),
            Self::Empty | Self::InvalidResponse | Self::ScoreOutOfRange { .. } => false,
        }
    }
}

#[derive(Deserialize)]
struct Assessment {
    #[serde(alias = "score")]
    complexity_score: f64,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    expansion_recommended: Option<bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ApiResponse {
    Nested { complexity_assessment: Assessment },
    Flat(Assessment),
}

impl ApiResponse {
    fn into_assessment(self) -> Assessment {
        match self {
            Self::Nested {
                complexity_assessment,
            } => complexity_assessment,
            Self::Flat(assessment) => assessment,
        }
    }
}

/// Complexity estimator backed by an HTTP API.
#[derive(Debug, Clone)]
pub struct ApiEstimator {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl ApiEstimator {
    /// Create an estimator for the given endpoint with a 30 second timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiEstimatorError::Request`] if the HTTP client cannot be
    /// constructed.
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self, ApiEstimatorError> {
        Self::with_timeout(url, api_key, DEFAULT_TIMEOUT)
    }

    /// Create an estimator with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiEstimatorError::Request`] if the HTTP client cannot be
    /// constructed.
    pub fn with_timeout(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiEstimatorError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }
}

impl Estimator for ApiEstimator {
    type Error = ApiEstimatorError;

    fn estimate(&self, unit: &Unit) -> Result<Estimate, Self::Error> {
        if unit.content.trim().is_empty() {
            return Err(ApiEstimatorError::Empty);
        }
        let mut req = self.client.post(&self.url).json(&serde_json::json!({
            "unit_id": unit.id,
            "unit_name": unit.name,
            "unit_content": unit.content,
        }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiEstimatorError::Status {
                status: status.as_u16(),
            });
        }
        let assessment = resp
            .json::<ApiResponse>()
            .map_err(|_| ApiEstimatorError::InvalidResponse)?
            .into_assessment();

        let score = assessment.complexity_score;
        if !(0.0..=SCORE_CEILING).contains(&score) {
            return Err(ApiEstimatorError::ScoreOutOfRange { score });
        }
        let mut estimate = Estimate::from_score(score);
        estimate.confidence = assessment.confidence;
        estimate.reasoning = assessment.reasoning;
        if assessment.expansion_recommended.is_some() {
            estimate.expansion_recommended = assessment.expansion_recommended;
        }
        Ok(estimate)
    }
}
