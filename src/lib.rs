pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod identity;
pub mod privilege;
pub mod provider;
pub mod request;
pub mod script;
pub mod workspace;

pub use error::ScriptError;
pub use provider::{GetOutcome, SENTINEL_EXIT_CODE, ScriptProvider};
pub use request::{ExecutionRequest, Operation, ScriptRequest};

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

use crate::executor::ScriptExecutor;

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    // Logs go to stderr so `get` can print the script output on stdout.
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(filter)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Builds the request from an optional YAML file plus command-line overrides.
pub fn build_request(opts: &cli::ResourceArgs) -> Result<ScriptRequest> {
    let mut request = match &opts.request {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| ScriptError::io(format!("failed to read request {}", path), e))?;
            serde_yaml::from_str(&content).map_err(|e| {
                ScriptError::Config(format!("failed to parse request {}: {}", path, e))
            })?
        }
        None => ScriptRequest::default(),
    };

    let overrides = [
        (&opts.get_script, &mut request.get_script),
        (&opts.set_script, &mut request.set_script),
        (&opts.test_script, &mut request.test_script),
        (&opts.user, &mut request.user),
        (&opts.group, &mut request.group),
    ];
    for (value, field) in overrides {
        if let Some(value) = value {
            field.clone_from(value);
        }
    }

    Ok(request)
}

/// Loads the provider configuration named on the command line, or the defaults.
pub fn load_provider_config(opts: &cli::ResourceArgs) -> Result<config::ProviderConfig> {
    match &opts.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("failed to load config from {}", path)),
        None => Ok(config::ProviderConfig::default()),
    }
}

/// Runs one lifecycle operation and returns its exit code.
///
/// For `get`, the script's standard output is written to `out`.
pub fn run_operation(
    operation: Operation,
    opts: &cli::ResourceArgs,
    executor: Arc<dyn ScriptExecutor>,
    out: &mut dyn Write,
) -> Result<i32> {
    let request = build_request(opts)?;
    let provider = ScriptProvider::new(load_provider_config(opts)?, executor);

    info!("running {} (user: {:?}, group: {:?})", operation, request.user, request.group);

    let exit_code = match operation {
        Operation::Get => {
            let outcome = provider.get(&request);
            out.write_all(outcome.result.as_bytes())
                .context("failed to write get result")?;
            out.flush().context("failed to flush get result")?;
            outcome.exit_code
        }
        Operation::Set => provider.set(&request),
        Operation::Test => provider.test(&request),
    };

    Ok(exit_code)
}
