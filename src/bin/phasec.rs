use ortho_config::OrthoConfig;
use phase_complexity::cli::{CliError, PhasecArgs, run};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit status for invalid input or configuration.
const FATAL: u8 = 2;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PHASEC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let outcome = PhasecArgs::load()
        .map_err(CliError::from)
        .and_then(PhasecArgs::validate)
        .and_then(|args| run(&args));
    match outcome {
        Ok(outcome) => {
            print!("{outcome}");
            ExitCode::from(outcome.exit_code())
        }
        Err(e) => {
            error!(error = %e, "phasec failed");
            eprintln!("phasec: {e}");
            ExitCode::from(FATAL)
        }
    }
}
