use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use rsnxscript::Operation;
use rsnxscript::cli::{Cli, Commands};
use rsnxscript::executor::RealScriptExecutor;

fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    let (operation, opts) = match &args.command {
        Commands::Get(opts) => (Operation::Get, opts),
        Commands::Set(opts) => (Operation::Set, opts),
        Commands::Test(opts) => (Operation::Test, opts),
        Commands::Completions(opts) => {
            let mut cmd = Cli::command();
            generate(opts.shell, &mut cmd, env!("CARGO_PKG_NAME"), &mut io::stdout());
            return Ok(ExitCode::SUCCESS);
        }
    };

    rsnxscript::init_logging(opts.log_level)?;

    let code = rsnxscript::run_operation(
        operation,
        opts,
        Arc::new(RealScriptExecutor),
        &mut io::stdout().lock(),
    )?;

    // Only the low byte survives as a process status; the -1 sentinel becomes 255.
    Ok(ExitCode::from(code as u8))
}
