use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by sessions and executions. All variants are fatal
/// to the call that produced them; nothing is retried internally.
#[derive(Debug, Error)]
pub enum ShellError {
    /// An operation was attempted on a session family that has been
    /// closed.
    #[error("session is closed; no further commands can be issued")]
    Closed,

    /// `close` was called on a session family that was already closed.
    #[error("session is already closed")]
    AlreadyClosed,

    /// The OS refused to create the process, the working directory could
    /// not be created, or draining the child's streams failed.
    #[error("failed to execute `{command}` in directory {}", display_dir(.dir))]
    Launch {
        command: String,
        dir: Option<PathBuf>,
        #[source]
        source: io::Error,
    },

    /// A configured output sink failed on write, flush, or close.
    #[error("an output sink failed to {operation}")]
    Sink {
        operation: &'static str,
        #[source]
        source: io::Error,
    },
}

fn display_dir(dir: &Option<PathBuf>) -> String {
    match dir {
        Some(path) => format!("\"{}\"", path.display()),
        None => "(inherited)".to_string(),
    }
}
