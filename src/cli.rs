//! CLI argument types, layered configuration and the command runner for the
//! `phasec` binary.
//! Loads from CLI args, environment (prefix `PHASEC_`), and optional config
//! files.

use crate::{
    artefact::{ArtefactError, CalibrationArtefact},
    calibrate::{CalibrationError, Calibration, Calibrator},
    config::{ConfigError, GridConfig},
    ground_truth::{GroundTruth, GroundTruthError},
    harness::{ConsistencyCheck, Harness, HarnessError, Thresholds, ValidationReport},
    plan::{self, PlanError, Unit},
    providers::{
        AnalyzerCommand, Estimator, FeatureExtractor, FeatureTable, FeatureTableError,
        ScoringEstimator,
    },
    report::CalibrationSummary,
    retry::{RetryPolicy, Retrying},
    score::RawScorer,
    sigma::Sigma,
};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use ortho_config::OrthoError;
use serde::Deserialize;
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tracing::{info, warn};

/// Command-line arguments for the `phasec` binary.
///
/// Without `--validate` the command calibrates: it scores every
/// ground-truth unit, grid-searches the normalisation strategies and writes
/// the result to `--artefact` unless `--dry-run` is set. With `--validate`
/// it scores units with the calibrated strategy from `--artefact` (or an
/// HTTP estimator) and checks the thresholds.
///
/// # Examples
///
/// Parse flags directly:
/// ```
/// use phase_complexity::cli::PhasecArgs;
/// use ortho_config::OrthoConfig;
///
/// let args = PhasecArgs::load_from_iter(["phasec", "--dry-run=true"])
///     .expect("load args from CLI iterator");
/// assert!(args.dry_run);
/// assert_eq!(args.consistency_runs, 10);
/// ```
///
/// Load from a configuration file:
/// ```
/// use phase_complexity::cli::PhasecArgs;
/// use ortho_config::OrthoConfig;
/// use std::io::Write;
/// use tempfile::NamedTempFile;
///
/// let mut file = NamedTempFile::new().expect("create temp file");
/// writeln!(file, "min_correlation = 0.8").expect("write config");
/// let path = file.path().to_str().expect("path str");
/// let args = PhasecArgs::load_from_iter(["phasec", "--config-path", path])
///     .expect("load args from config path");
/// assert_eq!(args.min_correlation, 0.8);
/// ```
#[derive(Debug, Deserialize, ortho_config::OrthoConfig)]
#[ortho_config(prefix = "PHASEC")]
pub struct PhasecArgs {
    /// Ground-truth dataset (YAML or JSON).
    #[serde(default)]
    pub ground_truth: Option<PathBuf>,

    /// Feature table keyed by unit id.
    #[serde(default)]
    pub features: Option<PathBuf>,

    /// External analyzer used when no feature table is given.
    #[serde(default)]
    pub analyzer: Option<PathBuf>,

    /// Parent plan whose phases supply unit names and content.
    #[serde(default)]
    pub plan: Option<PathBuf>,

    /// Calibration artefact to write, or to read when validating.
    #[serde(default)]
    pub artefact: Option<PathBuf>,

    /// TOML file overriding the calibration grid.
    #[serde(default)]
    pub grid: Option<PathBuf>,

    /// Validate instead of calibrating.
    #[ortho_config(default = false)]
    #[serde(default)]
    pub validate: bool,

    /// Correlation must exceed this to pass.
    #[ortho_config(default = 0.90)]
    #[serde(default = "default_min_correlation")]
    pub min_correlation: f64,

    /// Consistency standard deviation must stay below this to pass.
    #[ortho_config(default = 0.5)]
    #[serde(default = "default_max_consistency_std")]
    pub max_consistency_std: f64,

    /// Repeat runs for the consistency check.
    #[ortho_config(default = 10)]
    #[serde(default = "default_consistency_runs")]
    pub consistency_runs: usize,

    /// Unit re-estimated for the consistency check; no check when unset.
    #[serde(default)]
    pub consistency_unit: Option<u32>,

    /// HTTP estimator endpoint (requires the `provider-api` feature).
    #[serde(default)]
    pub estimator_url: Option<String>,

    /// Bearer token for the HTTP estimator.
    #[serde(default)]
    pub estimator_token: Option<String>,

    /// Attempts per collaborator call, including the first.
    #[ortho_config(default = 3)]
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Run without writing the artefact.
    #[ortho_config(default = false)]
    #[serde(default)]
    pub dry_run: bool,

    /// Optional path to a configuration file.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

const fn default_min_correlation() -> f64 {
    0.90
}

const fn default_max_consistency_std() -> f64 {
    0.5
}

const fn default_consistency_runs() -> usize {
    ConsistencyCheck::DEFAULT_RUNS
}

const fn default_max_attempts() -> u32 {
    3
}

/// Errors that end a `phasec` run with a fatal status.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("missing required option: {0}")]
    MissingOption(&'static str),
    #[error("invalid option {option}: {reason}")]
    InvalidOption {
        option: &'static str,
        reason: &'static str,
    },
    #[error("--estimator-url requires the provider-api feature")]
    ApiUnavailable,
    #[error(transparent)]
    Args(Arc<OrthoError>),
    #[error("failed to load grid configuration: {0}")]
    Grid(#[from] Box<figment::Error>),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    GroundTruth(#[from] GroundTruthError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    FeatureTable(#[from] FeatureTableError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Harness(#[from] HarnessError),
    #[error(transparent)]
    Artefact(#[from] ArtefactError),
    #[cfg(feature = "provider-api")]
    #[error(transparent)]
    Api(#[from] crate::providers::ApiEstimatorError),
}

impl From<OrthoError> for CliError {
    fn from(e: OrthoError) -> Self {
        Self::Args(Arc::new(e))
    }
}

impl From<Arc<OrthoError>> for CliError {
    fn from(e: Arc<OrthoError>) -> Self {
        Self::Args(e)
    }
}

impl PhasecArgs {
    /// Load configuration solely from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if any variable cannot be parsed.
    pub fn load_from_env() -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Env::prefixed("PHASEC_"))
            .extract()
            .map_err(Into::into)
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if the file cannot be read or parsed.
    pub fn load_from_config(path: &str) -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(Into::into)
    }

    /// Load configuration from environment variables and a file path.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if either source contains invalid values.
    pub fn load_from_env_and_config(path: &str) -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("PHASEC_"))
            .extract()
            .map_err(Into::into)
    }

    /// Check option values that parse but make no sense.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::InvalidOption`] naming the offending option.
    #[must_use = "Validation should not be ignored"]
    pub fn validate(self) -> Result<Self, CliError> {
        let invalid = |option, reason| Err(CliError::InvalidOption { option, reason });
        if !(-1.0..=1.0).contains(&self.min_correlation) {
            return invalid("min_correlation", "must be within [-1, 1]");
        }
        if !(self.max_consistency_std.is_finite() && self.max_consistency_std > 0.0) {
            return invalid("max_consistency_std", "must be positive and finite");
        }
        if self.consistency_runs < 2 {
            return invalid("consistency_runs", "must be at least 2");
        }
        if self.max_attempts == 0 {
            return invalid("max_attempts", "must be at least 1");
        }
        Ok(self)
    }

    #[must_use]
    pub const fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_correlation: self.min_correlation,
            max_consistency_std: self.max_consistency_std,
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_attempts(self.max_attempts)
    }

    fn consistency(&self) -> Option<ConsistencyCheck> {
        self.consistency_unit
            .map(|unit| ConsistencyCheck::new(unit, self.consistency_runs))
    }
}

/// Load a calibration grid from TOML, falling back to the defaults for
/// anything the file leaves out.
///
/// # Errors
///
/// Returns [`CliError::Grid`] for unreadable files or unknown keys, and
/// [`CliError::Config`] for invalid ranges.
pub fn load_grid(path: Option<&PathBuf>) -> Result<GridConfig, CliError> {
    let grid: GridConfig = match path {
        Some(path) => Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(Box::new)?,
        None => GridConfig::default(),
    };
    Ok(grid.validate()?)
}

/// Result of a successful `phasec` run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Calibrated {
        calibration: Calibration,
        artefact: CalibrationArtefact,
        /// Where the artefact was written, if anywhere.
        written: Option<PathBuf>,
        min_correlation: f64,
    },
    Validated(ValidationReport),
}

impl Outcome {
    /// `0` on pass, `1` when the thresholds are not met.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Calibrated {
                artefact,
                min_correlation,
                ..
            } => u8::from(artefact.best_correlation <= *min_correlation),
            Self::Validated(report) => report.exit_code(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Calibrated {
                calibration,
                artefact,
                written,
                ..
            } => {
                CalibrationSummary {
                    calibration,
                    unit_ids: &artefact.unit_ids,
                    raw_scores: &artefact.raw_scores,
                    ground_truth: &artefact.ground_truth,
                    failed_units: &artefact.failed_units,
                }
                .fmt(f)?;
                match written {
                    Some(path) => writeln!(f, "\nArtefact written to {}", path.display()),
                    None => writeln!(f, "\nArtefact not written"),
                }
            }
            Self::Validated(report) => report.fmt(f),
        }
    }
}

/// Features extracted for a batch of units.
struct Extracted {
    table: FeatureTable,
    raw_scores: Vec<f64>,
    failed: Vec<u32>,
}

fn extract_all<X: FeatureExtractor>(extractor: &X, units: &[Unit], scorer: &RawScorer) -> Extracted {
    let mut rows = Vec::with_capacity(units.len());
    let mut raw_scores = Vec::with_capacity(units.len());
    let mut failed = Vec::new();
    for unit in units {
        match extractor.extract(unit) {
            Ok(extraction) => {
                raw_scores.push(scorer.score(&extraction.features));
                rows.push((unit.id, extraction.features));
            }
            Err(e) => {
                warn!(unit = unit.id, error = %e, "feature extraction failed, scoring as 0");
                raw_scores.push(0.0);
                failed.push(unit.id);
            }
        }
    }
    Extracted {
        table: rows.into_iter().collect(),
        raw_scores,
        failed,
    }
}

fn extract_features(
    args: &PhasecArgs,
    units: &[Unit],
    scorer: &RawScorer,
) -> Result<Extracted, CliError> {
    if let Some(path) = &args.features {
        let table = FeatureTable::load(path)?;
        Ok(extract_all(&table, units, scorer))
    } else if let Some(program) = &args.analyzer {
        Ok(extract_all(&live_analyzer(args, program), units, scorer))
    } else {
        Err(CliError::MissingOption("features or analyzer"))
    }
}

fn live_analyzer(args: &PhasecArgs, program: &Path) -> Retrying<AnalyzerCommand> {
    Retrying::new(AnalyzerCommand::new(program), args.retry_policy())
}

fn load_units(args: &PhasecArgs, ground_truth: &GroundTruth) -> Result<Vec<Unit>, CliError> {
    match &args.plan {
        Some(path) => Ok(plan::align_units(ground_truth, plan::load_units(path)?)?),
        None => Ok(plan::units_from_ground_truth(ground_truth)),
    }
}

/// Execute the command described by `args`.
///
/// # Errors
///
/// Returns [`CliError`] for missing or invalid inputs. Unmet thresholds are
/// reported through [`Outcome::exit_code`] instead.
pub fn run(args: &PhasecArgs) -> Result<Outcome, CliError> {
    let path = args
        .ground_truth
        .as_ref()
        .ok_or(CliError::MissingOption("ground_truth"))?;
    let ground_truth = GroundTruth::load(path)?;
    let units = load_units(args, &ground_truth)?;
    info!(units = units.len(), validate = args.validate, "inputs loaded");

    if args.validate {
        validate(args, &ground_truth, &units).map(Outcome::Validated)
    } else {
        calibrate(args, &ground_truth, &units)
    }
}

fn calibrate(
    args: &PhasecArgs,
    ground_truth: &GroundTruth,
    units: &[Unit],
) -> Result<Outcome, CliError> {
    let calibrator = Calibrator::new(load_grid(args.grid.as_ref())?)?;
    let scorer = RawScorer::default();
    let extracted = extract_features(args, units, &scorer)?;
    let truth = ground_truth.scores();
    let calibration = calibrator.calibrate(&extracted.raw_scores, &truth)?;
    let artefact = CalibrationArtefact::from_calibration(
        &calibration,
        ground_truth.unit_ids(),
        extracted.raw_scores,
        truth,
        extracted.failed,
    );

    let written = match (&args.artefact, args.dry_run) {
        (Some(path), false) => {
            artefact.write(path)?;
            Some(path.clone())
        }
        _ => None,
    };
    Ok(Outcome::Calibrated {
        calibration,
        artefact,
        written,
        min_correlation: args.min_correlation,
    })
}

fn run_harness<E: Estimator>(
    args: &PhasecArgs,
    estimator: &E,
    ground_truth: &GroundTruth,
    units: &[Unit],
) -> Result<ValidationReport, CliError> {
    let mut harness = Harness::new(estimator).with_thresholds(args.thresholds());
    if let Some(check) = args.consistency() {
        harness = harness.with_consistency(check);
    }
    Ok(harness.run(ground_truth, units)?)
}

fn validate(
    args: &PhasecArgs,
    ground_truth: &GroundTruth,
    units: &[Unit],
) -> Result<ValidationReport, CliError> {
    if let Some(url) = &args.estimator_url {
        return validate_with_api(args, url, ground_truth, units);
    }
    let path = args
        .artefact
        .as_ref()
        .ok_or(CliError::MissingOption("artefact or estimator_url"))?;
    let scorer = RawScorer::default();
    let extracted = extract_features(args, units, &scorer)?;
    let artefact =
        CalibrationArtefact::load_for(path, &extracted.raw_scores, &ground_truth.scores())?;
    let sigma: Sigma = artefact.best;
    info!(%sigma, "validating calibrated scorer");
    // Feature tables are fixed snapshots; the analyzer runs again for every
    // estimate, consistency runs included.
    match (&args.features, &args.analyzer) {
        (None, Some(program)) => {
            let estimator = ScoringEstimator::new(live_analyzer(args, program), scorer, sigma);
            run_harness(args, &estimator, ground_truth, units)
        }
        _ => {
            let estimator = ScoringEstimator::new(extracted.table, scorer, sigma);
            run_harness(args, &estimator, ground_truth, units)
        }
    }
}

#[cfg(feature = "provider-api")]
fn validate_with_api(
    args: &PhasecArgs,
    url: &str,
    ground_truth: &GroundTruth,
    units: &[Unit],
) -> Result<ValidationReport, CliError> {
    let api = crate::providers::ApiEstimator::new(url, args.estimator_token.clone())?;
    let estimator = Retrying::new(api, args.retry_policy());
    run_harness(args, &estimator, ground_truth, units)
}

#[cfg(not(feature = "provider-api"))]
fn validate_with_api(
    _args: &PhasecArgs,
    _url: &str,
    _ground_truth: &GroundTruth,
    _units: &[Unit],
) -> Result<ValidationReport, CliError> {
    Err(CliError::ApiUnavailable)
}
