//! Script execution abstraction for rsnxscript.
//!
//! This module provides:
//! - [`ScriptCommand`]: Specification of the script to run and the identity to run it as
//! - [`ExecutionResult`]: Exit status and captured output of a run
//! - [`ScriptExecutor`]: Trait for execution strategies
//! - [`RealScriptExecutor`]: Production implementation using `std::process::Command`

mod pipe;
mod real;

use std::ffi::OsString;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

use anyhow::Result;
use camino::Utf8PathBuf;

use crate::privilege::DropPlan;

pub use real::RealScriptExecutor;

/// Specification of a script to execute.
#[derive(Debug, Clone)]
pub struct ScriptCommand {
    /// Path of the program, executed directly without a shell
    pub program: Utf8PathBuf,
    /// Credential changes applied in the child before exec
    pub drop_plan: DropPlan,
    /// Environment variables to set (in addition to inherited environment)
    pub env: Vec<(String, OsString)>,
    /// Working directory of the child (inherited when None)
    pub cwd: Option<Utf8PathBuf>,
    /// Kill the child if it runs longer than this (None waits indefinitely)
    pub timeout: Option<Duration>,
}

impl ScriptCommand {
    /// Creates a new ScriptCommand that runs `program` with the caller's credentials
    #[must_use]
    pub fn new(program: impl Into<Utf8PathBuf>) -> Self {
        Self {
            program: program.into(),
            drop_plan: DropPlan::default(),
            env: Vec::new(),
            cwd: None,
            timeout: None,
        }
    }

    /// Sets the privilege drop plan
    #[must_use]
    pub fn with_drop_plan(mut self, drop_plan: DropPlan) -> Self {
        self.drop_plan = drop_plan;
        self
    }

    /// Adds an environment variable
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets the working directory
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<Utf8PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Sets the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of script execution
#[derive(Debug)]
pub struct ExecutionResult {
    /// Exit status of the child
    pub status: ExitStatus,
    /// Everything the child wrote to stdout
    pub stdout: Vec<u8>,
    /// Everything the child wrote to stderr
    pub stderr: Vec<u8>,
    /// True if the child was killed because the timeout expired
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Returns true if the script exited with status 0 and was not timed out.
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    /// Returns the script's exit code.
    ///
    /// A child terminated by a signal reports the negated signal number.
    /// A death by SIGHUP therefore reports `-1`, the same value as
    /// [`SENTINEL_EXIT_CODE`](crate::SENTINEL_EXIT_CODE); callers that need
    /// to tell them apart must inspect `status` (or the `Err` from the
    /// provider's `run`).
    pub fn exit_code(&self) -> i32 {
        self.status
            .code()
            .or_else(|| self.status.signal().map(|s| -s))
            .unwrap_or(-1)
    }

    /// Returns stdout decoded as UTF-8, replacing invalid sequences.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Trait for script execution.
///
/// Implementations must be `Send + Sync` so a provider holding an
/// `Arc<dyn ScriptExecutor>` can serve concurrent invocations.
pub trait ScriptExecutor: Send + Sync {
    /// Runs the script to completion and returns its captured result.
    fn execute(&self, command: &ScriptCommand) -> Result<ExecutionResult>;
}
