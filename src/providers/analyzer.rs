//! Feature extraction through an external analyzer process.
//!
//! The analyzer is invoked as `<program> [args…] <unit name> <unit content>`
//! with `COMPLEXITY_DEBUG=1` set, and its diagnostics are read from stderr
//! (falling back to stdout when stderr has none).

use super::FeatureExtractor;
use crate::{
    api::Unit,
    features::{Extraction, parse_diagnostics},
    retry::Transient,
};
use std::{
    io::{self, Read},
    path::PathBuf,
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Error returned by [`AnalyzerCommand`].
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("failed to run analyzer {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("analyzer I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("analyzer did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("analyzer was terminated by a signal")]
    Killed,
}

impl Transient for AnalyzerError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Spawn { source, .. } => !matches!(
                source.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
            ),
            Self::Io(_) | Self::TimedOut(_) | Self::Killed => true,
        }
    }
}

/// Runs an external analyzer for every unit.
///
/// # Examples
///
/// ```no_run
/// use phase_complexity::providers::{AnalyzerCommand, FeatureExtractor, Unit};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let analyzer = AnalyzerCommand::new("./analyze-phase-complexity.sh");
/// let extraction = analyzer.extract(&Unit::new(0, "Setup", "Create the crate."))?;
/// println!("{:?}", extraction.features);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AnalyzerCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl AnalyzerCommand {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Arguments placed before the unit name and content.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn spawn(&self, unit: &Unit) -> Result<Child, AnalyzerError> {
        Command::new(&self.program)
            .args(&self.args)
            .arg(&unit.name)
            .arg(&unit.content)
            .env("COMPLEXITY_DEBUG", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| AnalyzerError::Spawn {
                program: self.program.clone(),
                source,
            })
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, AnalyzerError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                // The child may exit between the check and the kill.
                let _ = child.kill();
                let _ = child.wait();
                return Err(AnalyzerError::TimedOut(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<io::Result<String>> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_string(&mut buf)?;
        }
        Ok(buf)
    })
}

fn collect(handle: thread::JoinHandle<io::Result<String>>) -> Result<String, AnalyzerError> {
    handle
        .join()
        .map_err(|_| io::Error::other("output reader panicked"))?
        .map_err(Into::into)
}

impl FeatureExtractor for AnalyzerCommand {
    type Error = AnalyzerError;

    fn extract(&self, unit: &Unit) -> Result<Extraction, Self::Error> {
        let mut child = self.spawn(unit)?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let status = self.wait(&mut child)?;
        let stderr = collect(stderr)?;
        let stdout = collect(stdout)?;

        match status.code() {
            None => return Err(AnalyzerError::Killed),
            Some(0) => {}
            Some(code) => warn!(unit = unit.id, code, "analyzer exited with failure status"),
        }

        let diagnostics = if stderr.trim().is_empty() {
            &stdout
        } else {
            &stderr
        };
        let extraction = parse_diagnostics(diagnostics);
        debug!(unit = unit.id, features = ?extraction.features, "analyzer diagnostics parsed");
        Ok(extraction)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::features::FeatureVector;
    use rstest::rstest;

    fn shell(script: &str) -> AnalyzerCommand {
        AnalyzerCommand::new("sh").with_args(["-c", script, "analyzer"])
    }

    #[rstest]
    fn parses_stderr_diagnostics() {
        let analyzer = shell(
            r#"echo "Final task count: 14" >&2; echo "File count: 9" >&2; echo "raw_score_int = 775" >&2"#,
        );
        let extraction = analyzer
            .extract(&Unit::new(0, "Setup", "body"))
            .unwrap_or_else(|e| panic!("extract: {e}"));
        assert_eq!(extraction.features, FeatureVector::new(14, 9, 0, 0, 0));
        assert_eq!(extraction.raw_score_x100, Some(775));
    }

    #[rstest]
    fn passes_name_and_content_as_arguments() {
        let analyzer = shell(r#"echo "Final task count: ${#2}" >&2"#);
        let extraction = analyzer
            .extract(&Unit::new(1, "n", "12345"))
            .unwrap_or_else(|e| panic!("extract: {e}"));
        assert_eq!(extraction.features.task_count, 5);
    }

    #[rstest]
    fn debug_flag_is_set() {
        let analyzer = shell(r#"echo "Risk count: $COMPLEXITY_DEBUG""#);
        let extraction = analyzer
            .extract(&Unit::new(2, "n", "c"))
            .unwrap_or_else(|e| panic!("extract: {e}"));
        assert_eq!(extraction.features.risk_signal_count, 1);
    }

    #[rstest]
    fn times_out_slow_analyzers() {
        let analyzer = shell("sleep 5").with_timeout(Duration::from_millis(50));
        let err = analyzer
            .extract(&Unit::new(3, "n", "c"))
            .err()
            .unwrap_or_else(|| panic!("expected timeout"));
        assert!(matches!(err, AnalyzerError::TimedOut(_)));
        assert!(err.is_transient());
    }

    #[rstest]
    fn missing_program_is_permanent() {
        let err = AnalyzerCommand::new("/nonexistent/analyzer")
            .extract(&Unit::new(4, "n", "c"))
            .err()
            .unwrap_or_else(|| panic!("expected spawn failure"));
        assert!(!err.is_transient());
    }
}
