//! Plain-text rendering of calibration and validation results.

use crate::{
    calibrate::Calibration,
    distribution::{Clustering, Distribution},
    harness::{ConsistencyReport, ValidationReport},
};
use std::fmt;

/// Number of worst units listed in a validation report.
const LARGEST_ERRORS: usize = 3;

/// Calibration results alongside the per-unit inputs.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationSummary<'a> {
    pub calibration: &'a Calibration,
    pub unit_ids: &'a [u32],
    pub raw_scores: &'a [f64],
    pub ground_truth: &'a [f64],
    pub failed_units: &'a [u32],
}

impl fmt::Display for CalibrationSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let best = self.calibration.best();
        writeln!(f, "Calibration")?;
        writeln!(
            f,
            "  baseline correlation: {:.4}",
            self.calibration.baseline_correlation
        )?;
        for fit in self.calibration.fits() {
            writeln!(f, "  {:<48} r = {:.4}", fit.sigma.to_string(), fit.correlation)?;
        }
        writeln!(f, "  best: {} (r = {:.4})", best.sigma, best.correlation)?;
        writeln!(f)?;
        writeln!(f, "  {:>4}  {:>8}  {:>8}  {:>10}", "unit", "raw", "truth", "calibrated")?;
        let rows = self
            .unit_ids
            .iter()
            .zip(self.raw_scores)
            .zip(self.ground_truth)
            .zip(&best.calibrated_scores);
        for (((id, raw), truth), calibrated) in rows {
            let marker = if self.failed_units.contains(id) {
                "  (failed)"
            } else {
                ""
            };
            writeln!(
                f,
                "  {id:>4}  {raw:>8.2}  {truth:>8.2}  {calibrated:>10.2}{marker}"
            )?;
        }
        Ok(())
    }
}

fn write_distribution(f: &mut fmt::Formatter<'_>, label: &str, d: &Distribution) -> fmt::Result {
    writeln!(
        f,
        "  {label}: mean {:.2}, median {:.2}, std {:.2}, range [{:.1}, {:.1}], q1 {:.1}, q3 {:.1}",
        d.mean, d.median, d.std_dev, d.min, d.max, d.q1, d.q3
    )?;
    match d.clustering() {
        Clustering::None => Ok(()),
        Clustering::Moderate => writeln!(
            f,
            "    moderate ceiling clustering: {}/{} at or above 14.5",
            d.ceiling_count, d.count
        ),
        Clustering::Severe => writeln!(
            f,
            "    severe ceiling clustering: {}/{} at or above 14.5",
            d.ceiling_count, d.count
        ),
    }
}

fn write_consistency(f: &mut fmt::Formatter<'_>, c: &ConsistencyReport, max: f64) -> fmt::Result {
    write!(f, "  consistency (unit {}, {} runs", c.unit_id, c.scores.len())?;
    if c.failures > 0 {
        write!(f, ", {} failed", c.failures)?;
    }
    write!(f, "): ")?;
    match (c.mean, c.std_dev) {
        (Some(mean), Some(std)) => {
            writeln!(f, "mean {mean:.2}, std {std:.3} (threshold < {max})")
        }
        _ => writeln!(f, "no successful runs"),
    }
}

fn pass_fail(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation")?;
        writeln!(
            f,
            "  {:>4}  {:<32}  {:>6}  {:>6}  {:>6}",
            "unit", "name", "truth", "score", "delta"
        )?;
        for unit in &self.units {
            let name: String = unit.unit_name.chars().take(32).collect();
            match (unit.score, unit.delta()) {
                (Some(score), Some(delta)) => writeln!(
                    f,
                    "  {:>4}  {name:<32}  {:>6.1}  {score:>6.1}  {delta:>+6.1}",
                    unit.unit_id, unit.ground_truth
                )?,
                _ => writeln!(
                    f,
                    "  {:>4}  {name:<32}  {:>6.1}  {:>6}  {:>6}  {}",
                    unit.unit_id,
                    unit.ground_truth,
                    "-",
                    "-",
                    unit.error.as_deref().unwrap_or("no score")
                )?,
            }
        }
        writeln!(f)?;
        match self.correlation {
            Some(r) => writeln!(
                f,
                "  correlation: {r:.4} (threshold > {}) {}",
                self.thresholds.min_correlation,
                pass_fail(self.verdict.correlation_passed)
            )?,
            None => writeln!(f, "  correlation: unavailable FAIL")?,
        }
        if let (Some(mean), Some(max)) = (self.mean_abs_error, self.max_abs_error) {
            writeln!(f, "  absolute error: mean {mean:.2}, max {max:.2}")?;
        }
        let worst = self.largest_errors(LARGEST_ERRORS);
        if !worst.is_empty() {
            writeln!(f, "  largest errors:")?;
            for unit in worst {
                if let Some(delta) = unit.delta() {
                    writeln!(f, "    unit {} ({}): {delta:+.1}", unit.unit_id, unit.unit_name)?;
                }
            }
        }
        write_distribution(f, "ground truth", &self.ground_truth_distribution)?;
        if let Some(d) = &self.score_distribution {
            write_distribution(f, "scores", d)?;
        }
        if let Some(c) = &self.consistency {
            write_consistency(f, c, self.thresholds.max_consistency_std)?;
            if let Some(passed) = self.verdict.consistency_passed {
                writeln!(f, "    {}", pass_fail(passed))?;
            }
        }
        writeln!(f)?;
        writeln!(f, "Result: {}", pass_fail(self.verdict.passed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        calibrate::Calibrator,
        ground_truth::GroundTruth,
        harness::{ConsistencyCheck, Harness},
        plan::units_from_ground_truth,
        providers::TableEstimator,
    };
    use rstest::rstest;

    #[rstest]
    fn calibration_summary_lists_every_strategy() {
        let raw = [5.0, 10.0, 15.0, 20.0];
        let truth = [3.0, 7.0, 11.0, 15.0];
        let calibration = Calibrator::default()
            .calibrate(&raw, &truth)
            .unwrap_or_else(|e| panic!("calibrate: {e}"));
        let text = CalibrationSummary {
            calibration: &calibration,
            unit_ids: &[0, 1, 2, 3],
            raw_scores: &raw,
            ground_truth: &truth,
            failed_units: &[2],
        }
        .to_string();
        assert!(text.contains("linear(factor=0.500)"));
        assert!(text.contains("power_law("));
        assert!(text.contains("robust_sigmoid("));
        assert!(text.contains("(failed)"));
    }

    #[rstest]
    fn validation_report_shows_failures_and_verdict() {
        let gt = GroundTruth::from_yaml_str(
            "phases:\n  - {phase_number: 0, phase_name: A, ground_truth_score: 15}\n  - {phase_number: 1, phase_name: B, ground_truth_score: 14.5}\n  - {phase_number: 2, phase_name: C, ground_truth_score: 3}\n",
        )
        .unwrap_or_else(|e| panic!("ground truth: {e}"));
        let estimator: TableEstimator = [(0, 14.0), (2, 4.0)].into_iter().collect();
        let report = Harness::new(&estimator)
            .with_consistency(ConsistencyCheck::new(0, 4))
            .run(&gt, &units_from_ground_truth(&gt))
            .unwrap_or_else(|e| panic!("run: {e}"));
        let text = report.to_string();
        assert!(text.contains("no score recorded for unit 1"));
        assert!(text.contains("severe ceiling clustering: 2/3"));
        assert!(text.contains("std 0.000"));
        assert!(text.ends_with("Result: PASS\n"));
    }
}
