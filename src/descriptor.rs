//! Diagnostic descriptor log.
//!
//! When enabled, every lifecycle call appends the resource descriptor it
//! was invoked with to a log file. The log is observational only: failing
//! to write it never changes the outcome of the invocation.

use std::fs::OpenOptions;
use std::io::Write;

use camino::Utf8Path;

use crate::error::ScriptError;
use crate::request::{Operation, ScriptRequest};

/// Renders the descriptor block for one invocation.
pub fn format_descriptor(operation: Operation, request: &ScriptRequest) -> String {
    format!(
        "{} nxScript MyScript \n\
         {{\n    \
         TestScript = \"{}\"\n    \
         GetScript = \"{}\"\n    \
         SetScript = \"{}\"\n    \
         User = \"{}\"\n    \
         Group = \"{}\"\n\
         }}\n",
        operation,
        request.test_script,
        request.get_script,
        request.set_script,
        request.user,
        request.group,
    )
}

/// Appends the descriptor block, followed by a blank line, to `path`.
///
/// # Errors
///
/// Returns `ScriptError::Io` if the file cannot be opened or written.
pub fn append_descriptor(
    path: &Utf8Path,
    operation: Operation,
    request: &ScriptRequest,
) -> Result<(), ScriptError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ScriptError::io(format!("failed to open descriptor log {}", path), e))?;
    writeln!(file, "{}", format_descriptor(operation, request))
        .map_err(|e| ScriptError::io(format!("failed to write descriptor log {}", path), e))
}
