//! Real script executor implementation.
//!
//! This module provides [`RealScriptExecutor`], which spawns the script
//! directly, applies the privilege drop plan in the child before exec,
//! drains both output pipes on reader threads, and supervises the child
//! until it exits or its timeout expires.

use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Result;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;

use super::pipe::{StreamType, capture_pipe, panic_message};
use super::{ExecutionResult, ScriptCommand, ScriptExecutor};
use crate::error::ScriptError;

/// Interval between `try_wait` polls while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Sends SIGKILL to every process in the script's process group.
///
/// The script is spawned as the leader of its own group, so this also
/// reaches anything it started that still holds the output pipes. Falls
/// back to killing the child alone if the group cannot be signalled.
fn kill_process_group(child: &mut Child) {
    let pgid = Pid::from_raw(child.id() as i32);
    if let Err(e) = killpg(pgid, Signal::SIGKILL) {
        tracing::debug!(%pgid, "killpg returned error (group may have already exited): {}", e);
        if let Err(e) = child.kill() {
            tracing::debug!(pid = child.id(), "kill returned error: {}", e);
        }
    }
}

/// Cleans up a child process and its associated reader threads.
///
/// Kills the child's process group, reaps the child, and joins all reader
/// threads. Called from error paths in [`RealScriptExecutor::execute()`].
fn cleanup_child_process<I>(child: &mut Child, handles: I)
where
    I: IntoIterator<Item = JoinHandle<Vec<u8>>>,
{
    kill_process_group(child);
    if let Err(e) = child.wait() {
        tracing::warn!(pid = child.id(), "failed to wait for child process after kill: {}", e);
    }
    for handle in handles {
        if let Err(e) = handle.join() {
            tracing::warn!("reader thread panicked during cleanup: {}", panic_message(&*e));
        }
    }
}

/// Waits for the child, killing its process group once `deadline` passes.
///
/// Returns the exit status and whether the deadline fired.
fn wait_until(
    child: &mut Child,
    deadline: Option<Instant>,
) -> std::io::Result<(ExitStatus, bool)> {
    let Some(deadline) = deadline else {
        return child.wait().map(|status| (status, false));
    };

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }
        if Instant::now() >= deadline {
            tracing::warn!(pid = child.id(), "script timed out, killing its process group");
            kill_process_group(child);
            let status = child.wait()?;
            return Ok((status, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Waits for the readers to reach EOF, killing the process group once
/// `deadline` passes.
///
/// A process the script left running in the background keeps the pipes
/// open after the script itself has exited. Returns true if the deadline
/// fired.
fn drain_until(
    child: &mut Child,
    readers: &[JoinHandle<Vec<u8>>],
    deadline: Option<Instant>,
) -> bool {
    let Some(deadline) = deadline else {
        return false;
    };

    while !readers.iter().all(JoinHandle::is_finished) {
        if Instant::now() >= deadline {
            tracing::warn!(pid = child.id(), "output still open at timeout, killing process group");
            kill_process_group(child);
            return true;
        }
        thread::sleep(POLL_INTERVAL);
    }
    false
}

/// Starts a named thread draining one of the child's pipes.
fn spawn_reader<R>(pipe: Option<R>, stream: StreamType) -> std::io::Result<JoinHandle<Vec<u8>>>
where
    R: std::io::Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("{}-reader", stream))
        .spawn(move || capture_pipe(pipe, stream))
}

/// Script executor that runs the script as a real child process.
#[derive(Debug, Default, Clone)]
pub struct RealScriptExecutor;

impl ScriptExecutor for RealScriptExecutor {
    fn execute(&self, script: &ScriptCommand) -> Result<ExecutionResult> {
        let mut command = Command::new(script.program.as_std_path());
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        for (key, value) in &script.env {
            command.env(key, value);
        }
        if let Some(cwd) = &script.cwd {
            command.current_dir(cwd.as_std_path());
        }

        // Own process group, so a timeout can kill everything the script started.
        command.process_group(0);

        // Registered even for an empty plan: it keeps the spawn on the
        // fork/exec path, where a script without a shebang line still runs.
        let plan = script.drop_plan.clone();
        // SAFETY: `DropPlan::apply` only issues setgroups/setgid/setuid over a
        // pre-built slice; it does not allocate, lock, or touch shared state.
        unsafe {
            command.pre_exec(move || plan.apply());
        }

        tracing::debug!(program = %script.program, plan = %script.drop_plan, "spawning script");

        let deadline = script.timeout.and_then(|timeout| Instant::now().checked_add(timeout));

        let mut child = command
            .spawn()
            .map_err(|e| ScriptError::spawn(script.program.as_str(), e))?;

        tracing::trace!(program = %script.program, pid = child.id(), "spawned script");

        let failure = |status: String| -> anyhow::Error {
            ScriptError::Execution {
                command: script.program.to_string(),
                status,
            }
            .into()
        };

        let stdout_handle = match spawn_reader(child.stdout.take(), StreamType::Stdout) {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, []);
                return Err(failure(format!("failed to spawn stdout reader thread: {}", e)));
            }
        };
        let stderr_handle = match spawn_reader(child.stderr.take(), StreamType::Stderr) {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, [stdout_handle]);
                return Err(failure(format!("failed to spawn stderr reader thread: {}", e)));
            }
        };

        let (status, mut timed_out) = match wait_until(&mut child, deadline) {
            Ok(waited) => waited,
            Err(e) => {
                cleanup_child_process(&mut child, [stdout_handle, stderr_handle]);
                return Err(failure(format!("failed to wait for script: {}", e)));
            }
        };

        // The readers see EOF once the child and anything it forked have exited.
        let handles = [stdout_handle, stderr_handle];
        timed_out |= drain_until(&mut child, &handles, deadline);

        let mut captured = Vec::with_capacity(2);
        let mut panicked = Vec::new();
        let streams = [StreamType::Stdout, StreamType::Stderr];
        for (stream, handle) in streams.into_iter().zip(handles) {
            match handle.join() {
                Ok(bytes) => captured.push(bytes),
                Err(payload) => {
                    let msg = panic_message(&*payload);
                    tracing::error!(%stream, panic = msg, "reader thread panicked");
                    panicked.push(format!("{}: {}", stream, msg));
                    captured.push(Vec::new());
                }
            }
        }
        if !panicked.is_empty() {
            return Err(failure(format!("output reader panicked: {}", panicked.join(", "))));
        }

        let stderr = captured.pop().unwrap_or_default();
        let stdout = captured.pop().unwrap_or_default();

        tracing::trace!(program = %script.program, %status, timed_out, "script finished");

        Ok(ExecutionResult {
            status,
            stdout,
            stderr,
            timed_out,
        })
    }
}
