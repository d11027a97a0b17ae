//! smi2fps - structure records in, FPS1 fingerprints out.
//!
//! Usage errors and unopenable files exit with status 1. Records the
//! engine cannot encode are reported on stderr and do not change the exit
//! status.

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use smi2fps::{
    CommandEngine, ConfigError, EngineConfig, Invocation, LineReader, PipelineError, RunConfig,
    RunSummary, SOFTWARE, convert, open_input, open_output, resolve_args, usage,
};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the tracing filter directive.
const LOG_ENV: &str = "SMI2FPS_LOG";

fn main() -> ExitCode {
    init_tracing();

    let config = match resolve_args(std::env::args_os().skip(1)) {
        Ok(Invocation::Run(config)) => config,
        Ok(Invocation::Help(text) | Invocation::Version(text)) => {
            print!("{text}");
            return ExitCode::SUCCESS;
        }
        Err(ConfigError::Cli(err)) => {
            // clap renders its own message and usage line.
            let _ = err.print();
            return ExitCode::from(1);
        }
        Err(err) => {
            eprintln!("Error: {err}");
            eprintln!("{}", usage());
            return ExitCode::from(1);
        }
    };

    match run(&config) {
        Ok(summary) => {
            if summary.failed > 0 {
                tracing::info!(failed = summary.failed, "some records could not be encoded");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(config: &RunConfig) -> Result<RunSummary, PipelineError> {
    let engine_config = EngineConfig::resolve(config.engine_config.as_deref())?;
    tracing::debug!(
        flavor = %config.spec.flavor(),
        bits = config.spec.bit_length(),
        engine = %engine_config.command,
        "resolved configuration"
    );

    let input = open_input(&config.input)?;
    // The engine starts before the output is created, so a failed start
    // leaves an existing output file untouched.
    let engine = CommandEngine::spawn(&engine_config).map_err(PipelineError::EngineInit)?;
    let output = open_output(&config.output)?;

    let software = match (&engine_config.software, engine.software()) {
        (Some(software), _) => software.clone(),
        (None, Some(engine_software)) => format!("{SOFTWARE} {engine_software}"),
        (None, None) => SOFTWARE.to_string(),
    };

    convert(
        config.spec,
        LineReader::with_trailing(input, config.trailing),
        output,
        engine,
        &software,
        io::stderr(),
    )
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(io::stderr().is_terminal())
        .compact()
        .init();
}
