//! Draining of child output pipes.
//!
//! stdout and stderr are each read on their own thread: a script that fills
//! one pipe while the parent blocks on the other would otherwise hang. Lines
//! are logged as they arrive; the raw bytes are kept for the caller.

use std::any::Any;
use std::io::{BufRead, BufReader, Read};

use strum::Display;

/// Which child stream a reader is draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub(super) enum StreamType {
    Stdout,
    Stderr,
}

impl StreamType {
    /// Logs one line of script output; stderr is surfaced as a warning.
    fn emit(self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let text = text.trim_end_matches(['\n', '\r']);
        match self {
            Self::Stdout => tracing::info!(stream = %self, "{}", text),
            Self::Stderr => tracing::warn!(stream = %self, "{}", text),
        }
    }
}

/// Best-effort text of a reader thread's panic payload.
pub(super) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

/// Reads `pipe` to EOF and returns every byte, logging line by line.
///
/// Output is captured verbatim, including invalid UTF-8 and a final line
/// without a newline. A read error ends the capture early with what was
/// read so far.
pub(super) fn capture_pipe<R: Read>(pipe: Option<R>, stream: StreamType) -> Vec<u8> {
    let Some(pipe) = pipe else {
        tracing::error!(%stream, "child pipe missing, nothing captured");
        return Vec::new();
    };

    let mut reader = BufReader::new(pipe);
    let mut captured = Vec::new();
    loop {
        let start = captured.len();
        match reader.read_until(b'\n', &mut captured) {
            Ok(0) => return captured,
            Ok(_) => stream.emit(&captured[start..]),
            Err(e) => {
                tracing::error!(%stream, error = %e, "read failed, output truncated");
                return captured;
            }
        }
    }
}
