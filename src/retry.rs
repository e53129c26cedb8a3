//! Bounded exponential backoff for collaborator calls.
//!
//! Only errors that report themselves as [`Transient`] are retried. Anything
//! else is returned on the first failure.

use crate::{
    api::{Estimate, Estimator, Unit},
    features::Extraction,
    providers::FeatureExtractor,
};
use std::{thread, time::Duration};
use tracing::warn;

/// Classifies an error as worth retrying.
pub trait Transient {
    /// Whether a later attempt may succeed.
    fn is_transient(&self) -> bool;
}

/// How often and how patiently to retry a failing call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero behaves like one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A policy with no delay between attempts.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
            max_backoff: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before retry number `retry` (1-based), capped at
    /// `max_backoff`.
    ///
    /// # Examples
    ///
    /// ```
    /// use phase_complexity::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff(1), Duration::from_millis(500));
    /// assert_eq!(policy.backoff(2), Duration::from_secs(1));
    /// assert_eq!(policy.backoff(10), Duration::from_secs(8));
    /// ```
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "exponential backoff")]
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently or runs out of
    /// attempts. `what` names the operation in log output.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `op`.
    pub fn run<T, E, F>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts && err.is_transient() => {
                    let delay = self.backoff(attempt);
                    warn!(
                        operation = what,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "transient failure, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Wraps an estimator or extractor and retries its transient failures.
#[derive(Debug, Clone)]
pub struct Retrying<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> Retrying<T> {
    #[must_use]
    pub const fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    #[must_use]
    pub const fn inner(&self) -> &T {
        &self.inner
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<T> Estimator for Retrying<T>
where
    T: Estimator,
    T::Error: Transient,
{
    type Error = T::Error;

    fn estimate(&self, unit: &Unit) -> Result<Estimate, Self::Error> {
        self.policy.run("estimate", || self.inner.estimate(unit))
    }
}

impl<T> FeatureExtractor for Retrying<T>
where
    T: FeatureExtractor,
    T::Error: Transient,
{
    type Error = T::Error;

    fn extract(&self, unit: &Unit) -> Result<Extraction, Self::Error> {
        self.policy.run("extract", || self.inner.extract(unit))
    }
}
