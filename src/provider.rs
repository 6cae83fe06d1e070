//! Get/Set/Test lifecycle of the script resource.
//!
//! Every operation follows the same path: resolve the target identity,
//! create a workspace, materialize the script, run it with privileges
//! dropped, and tear the workspace down again. Identity is resolved before
//! anything touches the filesystem, so an unknown user or group leaves no
//! trace behind.
//!
//! [`ScriptProvider::run`] reports failures as errors. The lifecycle entry
//! points ([`get`](ScriptProvider::get), [`set`](ScriptProvider::set),
//! [`test`](ScriptProvider::test)) log them and return [`SENTINEL_EXIT_CODE`]
//! instead, so the caller only ever sees an exit code.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::config::ProviderConfig;
use crate::descriptor::append_descriptor;
use crate::error::ScriptError;
use crate::executor::{ExecutionResult, ScriptCommand, ScriptExecutor};
use crate::identity::ResolvedIdentity;
use crate::privilege::DropPlan;
use crate::request::{ExecutionRequest, Operation, ScriptRequest};
use crate::script::write_script;
use crate::workspace::Workspace;

/// Exit code reported when the script could not be run at all.
pub const SENTINEL_EXIT_CODE: i32 = -1;

/// Outcome of a `Get` operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOutcome {
    /// Exit code of the get script, or [`SENTINEL_EXIT_CODE`].
    pub exit_code: i32,
    /// The request properties, echoed back unchanged.
    pub request: ScriptRequest,
    /// Standard output of the get script (empty if it could not run).
    pub result: String,
}

/// Runs resource scripts on behalf of the lifecycle operations.
pub struct ScriptProvider {
    config: ProviderConfig,
    executor: Arc<dyn ScriptExecutor>,
}

impl ScriptProvider {
    pub fn new(config: ProviderConfig, executor: Arc<dyn ScriptExecutor>) -> Self {
        Self { config, executor }
    }

    /// Runs the get script and returns its exit code and stdout.
    pub fn get(&self, request: &ScriptRequest) -> GetOutcome {
        self.log_descriptor(Operation::Get, request);
        let (exit_code, result) = match self.run(&request.execution(Operation::Get)) {
            Ok(run) => (run.exit_code(), run.stdout_lossy()),
            Err(e) => (Self::sentinel(Operation::Get, &e), String::new()),
        };
        GetOutcome {
            exit_code,
            request: request.clone(),
            result,
        }
    }

    /// Runs the set script and returns its exit code.
    pub fn set(&self, request: &ScriptRequest) -> i32 {
        self.exit_code_of(Operation::Set, request)
    }

    /// Runs the test script and returns its exit code.
    pub fn test(&self, request: &ScriptRequest) -> i32 {
        self.exit_code_of(Operation::Test, request)
    }

    /// Dispatches to the operation's lifecycle method, returning its exit code.
    pub fn exit_code_of(&self, operation: Operation, request: &ScriptRequest) -> i32 {
        if operation == Operation::Get {
            return self.get(request).exit_code;
        }
        self.log_descriptor(operation, request);
        self.run(&request.execution(operation))
            .map(|run| run.exit_code())
            .unwrap_or_else(|e| Self::sentinel(operation, &e))
    }

    /// Runs one script to completion as the requested identity.
    ///
    /// A non-zero exit of the script is not an error; it is reported in the
    /// returned result.
    ///
    /// # Errors
    ///
    /// Fails if the identity cannot be resolved, the workspace or script
    /// file cannot be prepared, the script cannot be spawned or supervised,
    /// the timeout expires, or the workspace cannot be removed afterwards.
    pub fn run(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let identity = ResolvedIdentity::resolve(request.user(), request.group())?;
        let workspace = Workspace::create(&identity, self.config.temp_root.as_deref())?;

        let run_result = self.run_in_workspace(&workspace, request, &identity);

        // Teardown runs on every path once the workspace exists.
        let teardown_result = workspace.destroy();

        match (run_result, teardown_result) {
            (Ok(result), Ok(())) => Ok(result),
            (Err(e), Ok(())) => Err(e),
            (Ok(_), Err(e)) => Err(e).context("failed to remove workspace"),
            (Err(run_err), Err(tear_err)) => {
                // The run error is primary; log the teardown error separately
                error!("workspace teardown also failed: {:#}", tear_err);
                Err(run_err)
            }
        }
    }

    fn run_in_workspace(
        &self,
        workspace: &Workspace,
        request: &ExecutionRequest,
        identity: &ResolvedIdentity,
    ) -> Result<ExecutionResult> {
        let script_path = workspace.script_path();
        write_script(&script_path, request.script(), identity)?;
        workspace.seal()?;

        let plan = DropPlan::for_identity(identity);
        let home = identity.user().filter(|_| plan.changes_user()).map(|user| &user.home);
        let mut command = ScriptCommand::new(script_path)
            .with_drop_plan(plan)
            .with_timeout(self.config.timeout());
        if let Some(home) = home {
            command = command.with_env("HOME", home.as_os_str());
        }

        let result = self
            .executor
            .execute(&command)
            .with_context(|| format!("failed to execute script {}", command.program))?;

        if result.timed_out {
            return Err(ScriptError::Execution {
                command: command.program.to_string(),
                status: format!("timed out after {:?}", command.timeout.unwrap_or_default()),
            }
            .into());
        }

        info!("script exited with code {}", result.exit_code());
        Ok(result)
    }

    fn log_descriptor(&self, operation: Operation, request: &ScriptRequest) {
        let Some(path) = &self.config.descriptor_log else {
            return;
        };
        if let Err(e) = append_descriptor(path, operation, request) {
            warn!("failed to append descriptor log: {}", e);
        }
    }

    fn sentinel(operation: Operation, err: &anyhow::Error) -> i32 {
        let unknown_identity = err
            .downcast_ref::<ScriptError>()
            .is_some_and(ScriptError::is_unknown_identity);
        if unknown_identity {
            error!("{} not run: {}", operation, err);
        } else {
            error!("{} failed: {:#}", operation, err);
        }
        SENTINEL_EXIT_CODE
    }
}
