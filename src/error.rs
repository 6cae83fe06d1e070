//! Domain-specific error types for rsnxscript.
//!
//! This module defines `ScriptError`, a `thiserror`-based enum that
//! provides typed error variants for the failure modes of a script
//! invocation. Core functions return `Result<T, ScriptError>` for
//! programmatic error handling, while trait boundaries and the provider
//! lifecycle use `anyhow::Result`.
//!
//! `ScriptError` implements `Into<anyhow::Error>`, so the `?` operator
//! converts it automatically at boundaries that return `anyhow::Result`.

use std::io;

/// Short wording for an I/O failure, used in `Io` and `Spawn` messages.
///
/// Common kinds get a fixed phrase; anything else keeps the OS message,
/// which includes the errno.
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::AlreadyExists => "I/O error: already exists".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Domain-specific error type for rsnxscript.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ScriptError {
    /// A user name was given but does not exist in the passwd database.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// A group name was given but does not exist in the group database.
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// The identity database itself could not be queried.
    #[error("failed to look up {kind} '{name}': {source}")]
    IdentityLookup {
        /// Either `"user"` or `"group"`.
        kind: &'static str,
        /// The name that was being resolved.
        name: String,
        #[source]
        source: nix::errno::Errno,
    },

    /// The script could not be spawned (including a failed privilege drop
    /// inside the child, which aborts the spawn).
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Path of the program that was being spawned.
        program: String,
        /// Human-readable description derived from [`io_error_kind_message`].
        message: String,
        #[source]
        source: io::Error,
    },

    /// Supervision of a running script failed (wait failure, reader thread
    /// failure, timeout).
    #[error("script execution failed: {command}: {status}")]
    Execution {
        /// The command that was executed.
        command: String,
        /// Human-readable reason for the failure.
        status: String,
    },

    /// A configuration file could not be loaded, parsed, or validated.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O operation failed with contextual information.
    #[error("{context}: {message}")]
    Io {
        /// What was being done when the error occurred, usually including a path.
        context: String,
        /// Wording from [`io_error_kind_message`].
        message: String,
        /// The OS error; `raw_os_error()` gives the errno.
        #[source]
        source: io::Error,
    },
}

impl ScriptError {
    /// Wraps an I/O error with what was being attempted.
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }

    /// Creates a `Spawn` variant for the given program.
    pub(crate) fn spawn(program: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }

    /// Returns true if this error reports a name missing from the identity database.
    pub fn is_unknown_identity(&self) -> bool {
        matches!(self, Self::UnknownUser(_) | Self::UnknownGroup(_))
    }
}
