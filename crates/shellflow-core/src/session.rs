use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use shellflow_process::{Interpreter, SharedSink, WorkerPool};

use crate::command::Command;
use crate::env::EnvStore;
use crate::error::ShellError;
use crate::exec::PendingExecution;

/// Wait budget applied when a session is built without an explicit
/// timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300_000);

const POOL_SIZE: usize = 4;

/// State shared by every session value derived from one `new()` call:
/// the drain-task pool, the interpreter, and the close-once flag.
pub(crate) struct SessionCore {
    pub(crate) pool: WorkerPool,
    pub(crate) interpreter: Interpreter,
    closed: AtomicBool,
}

impl SessionCore {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        self.pool.shutdown();
    }
}

/// An execution session: working directory, environment overrides,
/// output sinks, and a timeout.
///
/// Sessions are immutable values. Every configuration method returns a
/// new session derived from the old one, so a session held by one chain
/// of executions can never be mutated out from under another. All values
/// derived from one `new()` call share a worker pool and a close-once
/// flag; `close` acts on that whole family.
#[derive(Clone)]
pub struct ShellSession {
    core: Arc<SessionCore>,
    dir: Option<PathBuf>,
    env: EnvStore,
    std_outputs: Vec<SharedSink>,
    err_outputs: Vec<SharedSink>,
    timeout: Option<Duration>,
}

impl ShellSession {
    /// Session inheriting the current working directory, with the
    /// default timeout and no sinks configured.
    pub fn new() -> Self {
        Self {
            core: Arc::new(SessionCore {
                pool: WorkerPool::new(POOL_SIZE),
                interpreter: Interpreter::host(),
                closed: AtomicBool::new(false),
            }),
            dir: None,
            env: EnvStore::new(),
            std_outputs: Vec::new(),
            err_outputs: Vec::new(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Wraps `cmd` in the interpreter-invocation form and returns it as a
    /// pending execution. The two-token interpreter prefix is prepended
    /// here, exactly once; chaining operators only ever append.
    pub fn command(&self, cmd: &Command) -> Result<PendingExecution, ShellError> {
        if self.core.is_closed() {
            return Err(ShellError::Closed);
        }
        let mut tokens = self.core.interpreter.prefix_tokens().to_vec();
        tokens.extend(cmd.tokens().iter().cloned());
        Ok(PendingExecution::new(
            self.clone(),
            Command::from_tokens(tokens),
        ))
    }

    pub fn dir(&self, dir: impl AsRef<Path>) -> Self {
        let mut next = self.clone();
        next.dir = Some(dir.as_ref().to_path_buf());
        next
    }

    pub fn env_var(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.env.set(key, value);
        next
    }

    pub fn env_vars<I, K, V>(&self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut next = self.clone();
        next.env.set_all(vars);
        next
    }

    pub fn timeout(&self, timeout: Duration) -> Self {
        let mut next = self.clone();
        next.timeout = Some(timeout);
        next
    }

    /// Waits for process exit without a deadline.
    pub fn unbounded(&self) -> Self {
        let mut next = self.clone();
        next.timeout = None;
        next
    }

    pub fn add_standard_output(&self, sink: SharedSink) -> Self {
        let mut next = self.clone();
        next.std_outputs.push(sink);
        next
    }

    pub fn add_error_output(&self, sink: SharedSink) -> Self {
        let mut next = self.clone();
        next.err_outputs.push(sink);
        next
    }

    pub fn clear_standard_output_targets(&self) -> Self {
        let mut next = self.clone();
        next.std_outputs.clear();
        next
    }

    pub fn clear_error_output_targets(&self) -> Self {
        let mut next = self.clone();
        next.err_outputs.clear();
        next
    }

    /// Read-only view of the configured overrides.
    pub fn environment(&self) -> &EnvStore {
        &self.env
    }

    /// Closes the session family: every sink registered on this value is
    /// closed (sinks over the process's own standard streams only flush),
    /// and the worker pool stops accepting drain tasks. All sinks are
    /// attempted even when one fails; the first failure is reported after
    /// the pass completes.
    pub fn close(&self) -> Result<(), ShellError> {
        if self.core.closed.swap(true, Ordering::SeqCst) {
            return Err(ShellError::AlreadyClosed);
        }

        let mut first_failure = None;
        for sink in self.std_outputs.iter().chain(&self.err_outputs) {
            let result = match sink.lock() {
                Ok(mut guard) => guard.close(),
                Err(_) => Err(io::Error::other("output sink poisoned")),
            };
            if let Err(e) = result
                && first_failure.is_none()
            {
                first_failure = Some(e);
            }
        }
        self.core.pool.shutdown();

        match first_failure {
            Some(source) => Err(ShellError::Sink {
                operation: "close",
                source,
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn core(&self) -> &SessionCore {
        &self.core
    }

    pub(crate) fn working_dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub(crate) fn env(&self) -> &EnvStore {
        &self.env
    }

    pub(crate) fn std_outputs(&self) -> &[SharedSink] {
        &self.std_outputs
    }

    pub(crate) fn err_outputs(&self) -> &[SharedSink] {
        &self.err_outputs
    }

    pub(crate) fn wait_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for ShellSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShellSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellSession")
            .field("dir", &self.dir)
            .field("env", &self.env)
            .field("std_outputs", &self.std_outputs.len())
            .field("err_outputs", &self.err_outputs.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PartialEq for ShellSession {
    /// Observable configuration only: directory and environment. Two
    /// independently built sessions with the same configuration compare
    /// equal even though they own distinct worker pools.
    fn eq(&self, other: &Self) -> bool {
        self.dir == other.dir && self.env == other.env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shellflow_process::{OutputSink, StringSink};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn configuration_methods_leave_the_original_untouched() {
        let base = ShellSession::new();
        let session = ShellSession::new();

        let _derived = session.dir("scratch");
        assert_eq!(session, base, "dir() must not mutate the session");

        let _derived = session.env_var("home", "/home/me");
        assert_eq!(session, base, "env_var() must not mutate the session");

        let _pending = session.command(&Command::new("tasklist")).unwrap();
        assert_eq!(session, base, "command() must not mutate the session");
    }

    #[test]
    fn derived_session_carries_the_change() {
        let session = ShellSession::new().env_var("HOME", "/home/one");
        let derived = session.env_var("home", "/home/two");

        assert_eq!(session.environment().get("HOME"), Some("/home/one"));
        assert_eq!(derived.environment().get("HOME"), Some("/home/two"));
        assert_eq!(derived.environment().len(), 1);
    }

    #[test]
    fn close_twice_reports_already_closed() {
        let session = ShellSession::new();
        session.close().unwrap();
        assert!(matches!(session.close(), Err(ShellError::AlreadyClosed)));
    }

    #[test]
    fn command_after_close_is_rejected() {
        let session = ShellSession::new();
        let derived = session.dir("scratch");
        session.close().unwrap();

        // The close-once flag spans the whole derived family.
        assert!(matches!(
            derived.command(&Command::new("echo")),
            Err(ShellError::Closed)
        ));
    }

    #[test]
    fn clear_targets_returns_an_empty_list() {
        let session = ShellSession::new()
            .add_standard_output(StringSink::shared())
            .add_standard_output(StringSink::shared());
        assert_eq!(session.std_outputs().len(), 2);

        let cleared = session.clear_standard_output_targets();
        assert!(cleared.std_outputs().is_empty());
        assert_eq!(session.std_outputs().len(), 2);
    }

    struct CountingSink {
        closes: Arc<AtomicUsize>,
        fail_close: bool,
    }

    impl OutputSink for CountingSink {
        fn write_all(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn close(&mut self) -> io::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                Err(io::Error::other("sink refused to close"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn close_attempts_every_sink_before_reporting_failure() {
        let closes = Arc::new(AtomicUsize::new(0));
        let failing: SharedSink = Arc::new(Mutex::new(CountingSink {
            closes: closes.clone(),
            fail_close: true,
        }));
        let healthy: SharedSink = Arc::new(Mutex::new(CountingSink {
            closes: closes.clone(),
            fail_close: false,
        }));

        let session = ShellSession::new()
            .add_standard_output(failing)
            .add_error_output(healthy);

        let err = session.close().unwrap_err();
        assert!(matches!(err, ShellError::Sink { .. }));
        assert_eq!(closes.load(Ordering::SeqCst), 2, "both sinks must be closed");
    }
}
