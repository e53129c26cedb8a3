//! Fixtures shared by the integration tests.
// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use phase_complexity::{FeatureVector, GroundTruth, GroundTruthRecord};
use std::path::PathBuf;

#[expect(clippy::float_arithmetic, reason = "tolerance comparison")]
#[must_use]
pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

/// Path of a file under `tests/fixtures`.
#[must_use]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Ground-truth scores of the eight-unit reference plan.
pub const REFERENCE_TRUTH: [f64; 8] = [9.0, 8.0, 5.0, 10.0, 11.0, 12.0, 7.0, 8.0];

/// Feature vectors of the eight-unit reference plan, by unit id.
#[must_use]
pub fn reference_features() -> Vec<(u32, FeatureVector)> {
    vec![
        (0, FeatureVector::new(14, 9, 2, 6, 3)),
        (1, FeatureVector::new(12, 6, 2, 5, 2)),
        (2, FeatureVector::new(6, 3, 1, 2, 1)),
        (3, FeatureVector::new(18, 10, 3, 8, 4)),
        (4, FeatureVector::new(20, 12, 3, 9, 5)),
        (5, FeatureVector::new(24, 15, 4, 11, 6)),
        (6, FeatureVector::new(9, 4, 1, 7, 1)),
        (7, FeatureVector::new(11, 7, 2, 4, 2)),
    ]
}

/// The reference ground truth as a dataset.
#[must_use]
pub fn reference_ground_truth() -> GroundTruth {
    let records = REFERENCE_TRUTH
        .iter()
        .zip(0_u32..)
        .map(|(&score, unit_id)| GroundTruthRecord {
            unit_id,
            unit_name: format!("Phase {unit_id}"),
            ground_truth_score: score,
        })
        .collect();
    GroundTruth::new(records).unwrap_or_else(|e| panic!("reference ground truth: {e}"))
}
