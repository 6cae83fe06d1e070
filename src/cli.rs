use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the get script and print its standard output
    Get(ResourceArgs),

    /// Run the set script and exit with its exit code
    Set(ResourceArgs),

    /// Run the test script and exit with its exit code
    Test(ResourceArgs),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

/// Properties of the script resource plus invocation options.
#[derive(Args, Debug, Clone)]
pub struct ResourceArgs {
    /// YAML file holding the resource properties (GetScript, SetScript, ...)
    ///
    /// Properties given on the command line override the ones in the file.
    #[arg(short, long)]
    pub request: Option<Utf8PathBuf>,

    /// Script run by `get`
    #[arg(long)]
    pub get_script: Option<String>,

    /// Script run by `set`
    #[arg(long)]
    pub set_script: Option<String>,

    /// Script run by `test`
    #[arg(long)]
    pub test_script: Option<String>,

    /// User to run the script as (empty for no change)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Group to run the script as (empty for no change)
    #[arg(short, long)]
    pub group: Option<String>,

    /// Path to the YAML provider configuration
    #[arg(short, long)]
    pub config: Option<Utf8PathBuf>,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Represents log levels for controlling the verbosity of logging output.
///
/// This enum maps directly to the log levels used by the `tracing` crate.
/// Script output is logged at `Info` (stdout) and `Warn` (stderr), so
/// `--log-level error` silences it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}
