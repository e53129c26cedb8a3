//! Property tests for scoring, normalisation and correlation.

use phase_complexity::{
    Calibrator, FeatureCaps, FeatureVector, SCORE_CEILING, Sigma, pearson, raw_score,
};
use proptest::prelude::*;

mod support;
use support::approx_eq;

const EPSILON: f64 = 1e-9;

fn feature_vector() -> impl Strategy<Value = FeatureVector> {
    (0_u32..60, 0_u32..60, 0_u32..10, 0_u32..40, 0_u32..20)
        .prop_map(|(t, f, d, s, r)| FeatureVector::new(t, f, d, s, r))
}

/// Signal `index` in positional order.
fn count(fv: &FeatureVector, index: usize) -> u32 {
    fv.as_array().get(index).copied().unwrap_or_default()
}

fn with_count(fv: FeatureVector, index: usize, value: u32) -> FeatureVector {
    match index {
        0 => FeatureVector {
            task_count: value,
            ..fv
        },
        1 => FeatureVector {
            file_count: value,
            ..fv
        },
        2 => FeatureVector {
            dependency_depth: value,
            ..fv
        },
        3 => FeatureVector {
            test_signal_count: value,
            ..fv
        },
        4 => FeatureVector {
            risk_signal_count: value,
            ..fv
        },
        _ => panic!("no signal at index {index}"),
    }
}

fn sigma() -> impl Strategy<Value = Sigma> {
    prop_oneof![
        (0.01_f64..5.0).prop_map(|factor| Sigma::Linear { factor }),
        (0.1_f64..3.0, 0.1_f64..10.0).prop_map(|(power, scale)| Sigma::PowerLaw { power, scale }),
        (0.0_f64..20.0, 0.0_f64..10.0, 0.1_f64..5.0).prop_map(|(median, iqr, steepness)| {
            Sigma::RobustSigmoid {
                median,
                iqr,
                steepness,
            }
        }),
    ]
}

fn integer_scores(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((0_u32..100).prop_map(f64::from), len)
}

proptest! {
    #[test]
    fn raw_score_is_non_negative(fv in feature_vector()) {
        prop_assert!(raw_score(&fv) >= 0.0);
    }

    #[test]
    fn raising_any_signal_never_lowers_the_score(
        fv in feature_vector(),
        index in 0_usize..5,
        extra in 1_u32..40,
    ) {
        let current = count(&fv, index);
        let more = with_count(fv, index, current + extra);
        prop_assert!(raw_score(&more) >= raw_score(&fv), "signal {index}");
    }

    #[test]
    fn signals_beyond_their_cap_do_not_change_the_score(
        fv in feature_vector(),
        index in 0_usize..5,
        extra in 1_u32..1000,
    ) {
        let cap = FeatureCaps::REFERENCE
            .as_array()
            .get(index)
            .copied()
            .unwrap_or_default();
        let at_cap = with_count(fv, index, cap);
        let above_cap = with_count(fv, index, cap + extra);
        prop_assert!(
            approx_eq(raw_score(&above_cap), raw_score(&at_cap), EPSILON),
            "signal {index} above its cap of {cap}"
        );
    }

    #[test]
    fn calibrated_scores_stay_on_the_scale(sigma in sigma(), raw in 0.0_f64..1.0e6) {
        let score = sigma.apply(raw);
        prop_assert!(
            (0.0..=SCORE_CEILING).contains(&score),
            "{sigma} mapped {raw} to {score}"
        );
    }

    #[test]
    fn correlation_is_symmetric(
        (x, y) in (2_usize..12).prop_flat_map(|n| (integer_scores(n..n + 1), integer_scores(n..n + 1))),
    ) {
        let xy = pearson(&x, &y).unwrap_or_else(|e| panic!("pearson: {e}"));
        let yx = pearson(&y, &x).unwrap_or_else(|e| panic!("pearson: {e}"));
        prop_assert!(approx_eq(xy, yx, EPSILON));
        prop_assert!((-1.0..=1.0).contains(&xy));
    }

    #[test]
    fn a_varying_sequence_correlates_perfectly_with_itself(x in integer_scores(2..12)) {
        prop_assume!(x.windows(2).any(|w| w.first() != w.last()));
        let r = pearson(&x, &x).unwrap_or_else(|e| panic!("pearson: {e}"));
        prop_assert!(approx_eq(r, 1.0, EPSILON), "r = {r}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn calibration_is_deterministic(
        (raw, truth) in (3_usize..10).prop_flat_map(|n| {
            (
                prop::collection::vec(0.0_f64..30.0, n..=n),
                prop::collection::vec((0_u32..=15).prop_map(f64::from), n..=n),
            )
        }),
    ) {
        let calibrator = Calibrator::default();
        let first = calibrator
            .calibrate(&raw, &truth)
            .unwrap_or_else(|e| panic!("calibrate: {e}"));
        let second = calibrator
            .calibrate(&raw, &truth)
            .unwrap_or_else(|e| panic!("calibrate: {e}"));
        prop_assert_eq!(&first, &second);
        for fit in first.fits() {
            prop_assert!(fit
                .calibrated_scores
                .iter()
                .all(|s| (0.0..=SCORE_CEILING).contains(s)));
            prop_assert!(fit.correlation <= first.best().correlation);
        }
    }
}
