//! Chained shell-command execution.
//!
//! A [`ShellSession`] owns a working directory, environment overrides,
//! output sinks, and a timeout. [`ShellSession::command`] wraps a
//! [`Command`] in the host interpreter's invocation form and returns a
//! [`PendingExecution`], which can be chained with pipe / sequence /
//! background / redirect operators before [`PendingExecution::execute`]
//! launches the process, drains its output concurrently, and waits for
//! the exit code within the session timeout.
//!
//! ```no_run
//! use shellflow_core::{Command, ShellSession};
//!
//! let session = ShellSession::new().add_standard_output(shellflow_process::stdout_sink());
//! let list = Command::new("ls").with_param("-l");
//! let completion = session.command(&list)?.pipe(&Command::new("sort")).execute()?;
//! assert!(completion.success());
//! # Ok::<(), shellflow_core::ShellError>(())
//! ```

pub mod command;
pub mod env;
pub mod error;
pub mod exec;
pub mod session;

pub use command::Command;
pub use env::EnvStore;
pub use error::ShellError;
pub use exec::{Completion, PendingExecution};
pub use session::{DEFAULT_TIMEOUT, ShellSession};
