use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use rsnxscript::ScriptProvider;
use rsnxscript::config::ProviderConfig;
use rsnxscript::executor::{ExecutionResult, RealScriptExecutor, ScriptCommand, ScriptExecutor};
use rsnxscript::privilege::DropPlan;
use tempfile::TempDir;

/// Creates a scratch directory to use as the workspace root.
#[allow(dead_code)]
pub fn scratch_root() -> (TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .expect("path should be valid UTF-8");
    (dir, path)
}

/// Number of entries left under `root`.
#[allow(dead_code)]
pub fn entry_count(root: &Utf8Path) -> usize {
    fs::read_dir(root).expect("failed to read root").count()
}

/// Provider backed by the real executor, creating workspaces under `root`.
#[allow(dead_code)]
pub fn real_provider(root: &Utf8Path) -> ScriptProvider {
    ScriptProvider::new(config_in(root), Arc::new(RealScriptExecutor))
}

/// Default configuration with workspaces created under `root`.
#[allow(dead_code)]
pub fn config_in(root: &Utf8Path) -> ProviderConfig {
    ProviderConfig {
        temp_root: Some(root.to_owned()),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// What the mock observed when it was asked to run a script.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct RecordedCall {
    pub program: Utf8PathBuf,
    pub drop_plan: DropPlan,
    pub env: Vec<(String, OsString)>,
    /// Script file content at execution time
    pub script: Vec<u8>,
    /// Permission bits of the script file at execution time
    pub file_mode: u32,
    /// Permission bits of the workspace directory at execution time
    pub dir_mode: u32,
}

/// How the mock responds to an execution request.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum MockOutcome {
    Exit { code: i32, stdout: Vec<u8> },
    Error(String),
    TimedOut,
}

/// Records each execution request and answers with a canned outcome.
#[allow(dead_code)]
pub struct MockScriptExecutor {
    calls: Mutex<Vec<RecordedCall>>,
    outcome: MockOutcome,
}

#[allow(dead_code)]
impl MockScriptExecutor {
    pub fn exiting(code: i32, stdout: &[u8]) -> Self {
        Self::with_outcome(MockOutcome::Exit {
            code,
            stdout: stdout.to_vec(),
        })
    }

    pub fn failing(message: &str) -> Self {
        Self::with_outcome(MockOutcome::Error(message.to_string()))
    }

    pub fn timing_out() -> Self {
        Self::with_outcome(MockOutcome::TimedOut)
    }

    pub fn with_outcome(outcome: MockOutcome) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcome,
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl ScriptExecutor for MockScriptExecutor {
    fn execute(&self, command: &ScriptCommand) -> Result<ExecutionResult> {
        let script = fs::read(&command.program)?;
        let file_mode = fs::metadata(&command.program)?.permissions().mode() & 0o777;
        let dir = command.program.parent().expect("script should live in a workspace");
        let dir_mode = fs::metadata(dir)?.permissions().mode() & 0o777;

        self.calls.lock().unwrap().push(RecordedCall {
            program: command.program.clone(),
            drop_plan: command.drop_plan.clone(),
            env: command.env.clone(),
            script,
            file_mode,
            dir_mode,
        });

        match &self.outcome {
            MockOutcome::Exit { code, stdout } => Ok(ExecutionResult {
                status: ExitStatus::from_raw((code & 0xff) << 8),
                stdout: stdout.clone(),
                stderr: Vec::new(),
                timed_out: false,
            }),
            MockOutcome::Error(message) => anyhow::bail!("{}", message),
            MockOutcome::TimedOut => Ok(ExecutionResult {
                status: ExitStatus::from_raw(9),
                stdout: Vec::new(),
                stderr: Vec::new(),
                timed_out: true,
            }),
        }
    }
}
