//! BDD tests for Sigma normalisation strategies.

use phase_complexity::{Sigma, tests::support::approx_eq};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

#[derive(Default)]
struct SigmaContext {
    sigma: RefCell<Option<Sigma>>,
    result: RefCell<Option<f64>>,
}

#[fixture]
fn sigma_context() -> SigmaContext {
    SigmaContext::default()
}

#[given("a linear sigma with factor {factor:f64}")]
fn given_linear(factor: f64, #[from(sigma_context)] ctx: &SigmaContext) {
    ctx.sigma.replace(Some(Sigma::Linear { factor }));
}

#[given("a power law sigma with power {power:f64} and scale {scale:f64}")]
fn given_power_law(power: f64, scale: f64, #[from(sigma_context)] ctx: &SigmaContext) {
    ctx.sigma.replace(Some(Sigma::PowerLaw { power, scale }));
}

#[given("a robust sigmoid fitted to \"{population}\"")]
#[expect(
    clippy::needless_pass_by_value,
    reason = "BDD macro injects owned value"
)]
fn given_robust(population: String, #[from(sigma_context)] ctx: &SigmaContext) {
    let values: Vec<f64> = population
        .split_whitespace()
        .map(|v| v.parse().unwrap_or_else(|e| panic!("bad value {v}: {e}")))
        .collect();
    let sigma = Sigma::robust_from_population(&values, 1.3)
        .unwrap_or_else(|e| panic!("population stats: {e}"));
    ctx.sigma.replace(Some(sigma));
}

#[when("normalising {value:f64}")]
fn when_normalising(value: f64, #[from(sigma_context)] ctx: &SigmaContext) {
    let binding = ctx.sigma.borrow();
    let sigma = binding
        .as_ref()
        .unwrap_or_else(|| panic!("sigma to be set"));
    ctx.result.replace(Some(sigma.apply(value)));
}

#[then("the result is {expected:f64}")]
fn then_result(expected: f64, #[from(sigma_context)] ctx: &SigmaContext) {
    let result = ctx
        .result
        .borrow()
        .as_ref()
        .copied()
        .unwrap_or_else(|| panic!("result to be set"));
    assert!(approx_eq(result, expected, 1e-9), "expected {expected}, got {result}");
}

#[scenario(path = "tests/features/normalisation.feature", index = 0)]
fn linear_in_range(sigma_context: SigmaContext) {
    let _ = sigma_context;
}

#[scenario(path = "tests/features/normalisation.feature", index = 1)]
fn linear_capped(sigma_context: SigmaContext) {
    let _ = sigma_context;
}

#[scenario(path = "tests/features/normalisation.feature", index = 2)]
fn power_law_compresses(sigma_context: SigmaContext) {
    let _ = sigma_context;
}

#[scenario(path = "tests/features/normalisation.feature", index = 3)]
fn robust_midpoint(sigma_context: SigmaContext) {
    let _ = sigma_context;
}

#[scenario(path = "tests/features/normalisation.feature", index = 4)]
fn robust_zero_spread(sigma_context: SigmaContext) {
    let _ = sigma_context;
}

#[scenario(path = "tests/features/normalisation.feature", index = 5)]
fn zero_raw_stays_zero(sigma_context: SigmaContext) {
    let _ = sigma_context;
}
