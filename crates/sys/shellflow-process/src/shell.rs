use std::process::Command;

/// The host command interpreter: its program token, the run-and-exit
/// flag, and the token that asks it to launch a program detached.
///
/// Each build targets one dialect; there is no cross-platform syntax
/// abstraction. Chained tokens (`|`, `&`, `>`, `>>`) are interpreted by
/// the shell itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    program: String,
    flag: &'static str,
    detach: &'static str,
}

impl Interpreter {
    /// Interpreter for the platform this binary runs on, honoring the
    /// conventional environment override.
    pub fn host() -> Self {
        #[cfg(windows)]
        {
            Self {
                program: std::env::var("COMSPEC").unwrap_or_else(|_| "cmd".to_string()),
                flag: "/c",
                detach: "start",
            }
        }

        #[cfg(not(windows))]
        {
            Self {
                program: std::env::var("SHELL").unwrap_or_else(|_| "sh".to_string()),
                flag: "-c",
                detach: "nohup",
            }
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn flag(&self) -> &str {
        self.flag
    }

    pub fn detach_token(&self) -> &str {
        self.detach
    }

    /// The two tokens prepended exactly once per top-level command.
    pub fn prefix_tokens(&self) -> [String; 2] {
        [self.program.clone(), self.flag.to_string()]
    }

    pub fn matches_program(&self, token: &str) -> bool {
        token.eq_ignore_ascii_case(&self.program)
    }

    /// Builds the OS launch request for a chained token vector.
    ///
    /// A vector carrying the interpreter prefix becomes
    /// `<program> <flag> "<joined tail>"`: the tail is one script
    /// argument, which is how both `cmd /c` and `sh -c` expect their
    /// command line. Anything else launches the first token directly with
    /// the rest as plain arguments.
    pub fn launch_command(&self, tokens: &[String]) -> Option<Command> {
        let (program, rest) = tokens.split_first()?;
        let mut cmd = Command::new(program);
        if self.matches_program(program) && rest.first().map(String::as_str) == Some(self.flag) {
            cmd.arg(self.flag).arg(rest[1..].join(" "));
        } else {
            cmd.args(rest);
        }
        Some(cmd)
    }
}
