use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use shellflow_process::{SharedSink, StreamFan, TaskHandle};

use crate::command::Command;
use crate::error::ShellError;
use crate::session::ShellSession;

/// Upper bound on one sleep inside the exit-polling loop.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of an execution.
///
/// A background chain detaches the target program, so the engine only
/// ever observes the launcher's exit code; `Launched` keeps that
/// distinction visible instead of letting it masquerade as the detached
/// program's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The child exited and this is its real exit code.
    Exited(i32),
    /// A detached launch completed; the code belongs to the launcher,
    /// not the program it started.
    Launched(i32),
    /// The wait budget expired before the child exited. The child is
    /// left running.
    TimedOut,
}

impl Completion {
    /// Collapses to the plain integer contract: the exit code, or the
    /// `-1` sentinel for an expired wait.
    pub fn code(&self) -> i32 {
        match self {
            Completion::Exited(code) | Completion::Launched(code) => *code,
            Completion::TimedOut => -1,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, Completion::Exited(0) | Completion::Launched(0))
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, Completion::TimedOut)
    }
}

/// A fully chained command waiting to be executed.
///
/// Every chaining operator is a pure transition returning a new value;
/// nothing observable happens until [`execute`](Self::execute). The
/// wrapped command always begins with the interpreter-invocation prefix
/// prepended by [`ShellSession::command`]; operators append to it but
/// never prepend it again.
#[derive(Clone)]
pub struct PendingExecution {
    session: ShellSession,
    cmd: Command,
    redirect_target: Option<PathBuf>,
    suppress: bool,
    detached: bool,
}

impl PendingExecution {
    pub(crate) fn new(session: ShellSession, cmd: Command) -> Self {
        Self {
            session,
            cmd,
            redirect_target: None,
            suppress: false,
            detached: false,
        }
    }

    /// Feeds this chain's output into `cmd` via the interpreter's `|`.
    pub fn pipe(&self, cmd: &Command) -> Self {
        self.joined("|", cmd)
    }

    /// Runs this chain, then `cmd`, via the interpreter's `&`. This is
    /// unconditional sequencing: `cmd` runs whatever the first chain's
    /// exit code was.
    pub fn and_then_run(&self, cmd: &Command) -> Self {
        self.joined("&", cmd)
    }

    /// Redirects the chain's standard output into `target`, truncating.
    ///
    /// The interpreter writes the file, not this engine; on `execute`
    /// the completed file is read back and fed through the configured
    /// standard-output sinks once the process has exited.
    pub fn redirect_output(&self, target: impl AsRef<Path>) -> Self {
        self.redirected(">", target)
    }

    /// Like [`redirect_output`](Self::redirect_output), appending.
    pub fn redirect_output_appending(&self, target: impl AsRef<Path>) -> Self {
        self.redirected(">>", target)
    }

    /// Rewrites the chain so the interpreter launches it as a detached
    /// process. The execution then completes with the launcher's exit
    /// code ([`Completion::Launched`]); the detached program's own exit
    /// is never observed.
    pub fn background(&self) -> Self {
        let interpreter = &self.session.core().interpreter;
        let tokens = self.cmd.tokens();

        let mut rewritten: Vec<String> = Vec::with_capacity(tokens.len() + 3);
        if tokens.first().is_some_and(|t| interpreter.matches_program(t)) {
            rewritten.extend(interpreter.prefix_tokens());
            rewritten.push(interpreter.detach_token().to_string());
            rewritten.extend(tokens.iter().skip(2).cloned());
        } else {
            rewritten.push(interpreter.detach_token().to_string());
            rewritten.extend(tokens.iter().cloned());
        }

        let mut next = Self::new(self.session.clone(), Command::from_tokens(rewritten));
        next.detached = true;
        next
    }

    /// Keeps draining the child's streams (the child would hang on a
    /// full pipe buffer otherwise) but discards the bytes instead of
    /// forwarding them to the configured sinks.
    pub fn suppress_output(&self) -> Self {
        let mut next = self.clone();
        next.suppress = true;
        next
    }

    /// The fully chained command, for inspection.
    pub fn command(&self) -> &Command {
        &self.cmd
    }

    /// Launches the chain and waits for completion within the session
    /// timeout.
    ///
    /// Both output streams are drained concurrently with the wait; on a
    /// normal exit both drain tasks are joined before this returns, so
    /// no buffered bytes are lost. On timeout the sentinel completion is
    /// returned and the child is left running.
    pub fn execute(&self) -> Result<Completion, ShellError> {
        if self.session.core().is_closed() {
            return Err(ShellError::Closed);
        }

        let interpreter = &self.session.core().interpreter;
        let mut launch = interpreter.launch_command(self.cmd.tokens()).ok_or_else(|| {
            self.launch_error(io::Error::new(io::ErrorKind::InvalidInput, "empty command"))
        })?;

        if let Some(dir) = self.session.working_dir() {
            if !dir.exists() {
                log::info!(
                    "directory \"{}\" does not exist and will be created",
                    dir.display()
                );
                fs::create_dir(dir).map_err(|e| self.launch_error(e))?;
            }
            launch.current_dir(dir);
        }
        self.session.env().apply_to(&mut launch);

        // The engine never writes to child stdin; closing it up front
        // keeps stdin-waiting children (interactive shells) from hanging.
        launch.stdin(Stdio::null());
        let redirecting = self.redirect_target.is_some();
        launch.stdout(if redirecting {
            Stdio::null()
        } else {
            Stdio::piped()
        });
        launch.stderr(Stdio::piped());

        log::debug!(
            "running command `{}` in directory {:?}",
            self.cmd,
            self.session.working_dir()
        );
        let mut child = launch.spawn().map_err(|e| self.launch_error(e))?;

        let mut drains = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            drains.push(self.spawn_drain(stdout, self.session.std_outputs()));
        }
        if let Some(stderr) = child.stderr.take() {
            drains.push(self.spawn_drain(stderr, self.session.err_outputs()));
        }

        let status = match self.session.wait_timeout() {
            None => Some(child.wait().map_err(|e| self.launch_error(e))?),
            Some(limit) => wait_with_deadline(&mut child, limit).map_err(|e| self.launch_error(e))?,
        };

        let Some(status) = status else {
            // The child is still running and its pipes are still open;
            // joining the drain tasks here would block until it exits.
            // They follow the child down on their own.
            return Ok(Completion::TimedOut);
        };

        for drain in drains {
            drain.join().map_err(|e| self.launch_error(e))?;
        }

        if let Some(target) = &self.redirect_target {
            let mut file = File::open(target).map_err(|e| self.launch_error(e))?;
            StreamFan::new(self.sink_selection(self.session.std_outputs()))
                .drain(&mut file)
                .map_err(|e| self.launch_error(e))?;
        }

        let code = status.code().unwrap_or(-1);
        Ok(if self.detached {
            Completion::Launched(code)
        } else {
            Completion::Exited(code)
        })
    }

    fn joined(&self, operator: &str, cmd: &Command) -> Self {
        let mut tokens = self.cmd.tokens().to_vec();
        tokens.push(operator.to_string());
        tokens.extend(cmd.tokens().iter().cloned());
        Self::new(self.session.clone(), Command::from_tokens(tokens))
    }

    fn redirected(&self, operator: &str, target: impl AsRef<Path>) -> Self {
        let target = target.as_ref().to_path_buf();
        let mut tokens = self.cmd.tokens().to_vec();
        tokens.push(operator.to_string());
        tokens.push(target.display().to_string());

        let mut next = Self::new(self.session.clone(), Command::from_tokens(tokens));
        next.redirect_target = Some(target);
        next
    }

    fn spawn_drain(&self, mut stream: impl Read + Send + 'static, sinks: &[SharedSink]) -> TaskHandle {
        let fan = StreamFan::new(self.sink_selection(sinks));
        self.session
            .core()
            .pool
            .submit(move || fan.drain(&mut stream))
    }

    fn sink_selection(&self, sinks: &[SharedSink]) -> Vec<SharedSink> {
        if self.suppress {
            Vec::new()
        } else {
            sinks.to_vec()
        }
    }

    fn launch_error(&self, source: io::Error) -> ShellError {
        ShellError::Launch {
            command: self.cmd.to_string(),
            dir: self.session.working_dir().map(Path::to_path_buf),
            source,
        }
    }
}

/// Bounded poll: try to read the exit code, sleep a capped interval,
/// re-check the remaining budget. Used instead of a blocking wait so the
/// deadline holds without a platform wait-with-timeout primitive. Sleeps
/// never extend past the deadline.
fn wait_with_deadline(child: &mut Child, limit: Duration) -> io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let elapsed = start.elapsed();
        if elapsed >= limit {
            return Ok(None);
        }
        thread::sleep((limit - elapsed).min(POLL_INTERVAL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shellflow_process::Interpreter;

    fn prefix() -> Vec<String> {
        Interpreter::host().prefix_tokens().to_vec()
    }

    fn tokens(pending: &PendingExecution) -> Vec<String> {
        pending.command().tokens().to_vec()
    }

    #[test]
    fn command_prepends_the_interpreter_prefix_once() {
        let session = ShellSession::new();
        let probe = Command::new("probe").with_param("/?");

        let pending = session.command(&probe).unwrap();

        let mut expected = prefix();
        expected.extend(["probe".to_string(), "/?".to_string()]);
        assert_eq!(tokens(&pending), expected);
    }

    #[test]
    fn pipe_chains_flatten_left_to_right() {
        let session = ShellSession::new();
        let list = Command::new("list");
        let filter_pid = Command::new("filter").with_param("PID");
        let filter_one = Command::new("filter").with_param("1");

        let pending = session
            .command(&list)
            .unwrap()
            .pipe(&filter_pid)
            .pipe(&filter_one);

        let mut expected = prefix();
        expected.extend(
            ["list", "|", "filter", "PID", "|", "filter", "1"].map(String::from),
        );
        assert_eq!(tokens(&pending), expected);
    }

    #[test]
    fn sequencing_uses_the_unconditional_operator() {
        let session = ShellSession::new();
        let first = Command::new("first");
        let second = Command::new("second");

        let pending = session.command(&first).unwrap().and_then_run(&second);

        let mut expected = prefix();
        expected.extend(["first", "&", "second"].map(String::from));
        assert_eq!(tokens(&pending), expected);
    }

    #[test]
    fn background_strips_and_rewraps_the_interpreter_prefix() {
        let session = ShellSession::new();
        let list = Command::new("list").with_param("/V");

        let pending = session.command(&list).unwrap().background();

        let interp = Interpreter::host();
        let mut expected = prefix();
        expected.push(interp.detach_token().to_string());
        expected.extend(["list", "/V"].map(String::from));
        assert_eq!(tokens(&pending), expected);
    }

    #[test]
    fn background_without_prefix_only_prepends_the_detach_token() {
        let session = ShellSession::new();
        let raw = PendingExecution::new(session, Command::new("rawprog").with_param("-x"));

        let pending = raw.background();

        let interp = Interpreter::host();
        let expected = vec![
            interp.detach_token().to_string(),
            "rawprog".to_string(),
            "-x".to_string(),
        ];
        assert_eq!(tokens(&pending), expected);
    }

    #[test]
    fn redirect_appends_operator_and_path() {
        let session = ShellSession::new();
        let pending = session
            .command(&Command::new("echo").with_param("hi"))
            .unwrap()
            .redirect_output("out.txt");

        let mut expected = prefix();
        expected.extend(["echo", "hi", ">", "out.txt"].map(String::from));
        assert_eq!(tokens(&pending), expected);
        assert_eq!(pending.redirect_target, Some(PathBuf::from("out.txt")));

        let appending = session
            .command(&Command::new("echo").with_param("hi"))
            .unwrap()
            .redirect_output_appending("out.txt");
        assert!(appending.command().tokens().contains(&">>".to_string()));
    }

    #[test]
    fn chaining_onto_a_redirect_drops_the_target() {
        let session = ShellSession::new();
        let pending = session
            .command(&Command::new("echo").with_param("hi"))
            .unwrap()
            .redirect_output("out.txt")
            .pipe(&Command::new("cat"));

        assert_eq!(pending.redirect_target, None);
    }

    #[test]
    fn suppress_keeps_the_rest_of_the_chain_intact() {
        let session = ShellSession::new();
        let pending = session
            .command(&Command::new("echo"))
            .unwrap()
            .redirect_output("out.txt")
            .suppress_output();

        assert!(pending.suppress);
        assert_eq!(pending.redirect_target, Some(PathBuf::from("out.txt")));
    }

    #[test]
    fn completion_collapses_to_the_integer_contract() {
        assert_eq!(Completion::Exited(0).code(), 0);
        assert_eq!(Completion::Launched(3).code(), 3);
        assert_eq!(Completion::TimedOut.code(), -1);
        assert!(Completion::Exited(0).success());
        assert!(!Completion::Exited(1).success());
        assert!(Completion::TimedOut.timed_out());
    }
}
