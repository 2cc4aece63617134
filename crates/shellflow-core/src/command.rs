use std::fmt;

/// An immutable program invocation: the program name followed by its
/// arguments, as an ordered token sequence.
///
/// Every append returns a new value; equality and hashing are structural
/// over the token sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command {
    tokens: Vec<String>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            tokens: vec![program.into()],
        }
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// New command with `param` appended as one token.
    pub fn with_param(&self, param: impl Into<String>) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(param.into());
        Self { tokens }
    }

    /// New command with a `name value` pair appended as two tokens.
    pub fn with_named_param(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(name.into());
        tokens.push(value.into());
        Self { tokens }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn with_param_appends_without_mutating() {
        let base = Command::new("tasklist");
        let extended = base.with_param("/?");

        assert_eq!(base.tokens(), ["tasklist"]);
        assert_eq!(extended.tokens(), ["tasklist", "/?"]);
    }

    #[test]
    fn named_param_appends_two_tokens() {
        let cmd = Command::new("tasklist").with_param("/V").with_named_param("/FO", "LIST");
        assert_eq!(cmd.tokens(), ["tasklist", "/V", "/FO", "LIST"]);
    }

    #[test]
    fn equality_is_structural() {
        let a = Command::new("test").with_param("x");
        let b = Command::new("test").with_param("x");
        let c = Command::new("test").with_param("y");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_joins_tokens() {
        let cmd = Command::new("echo").with_param("hello");
        assert_eq!(cmd.to_string(), "echo hello");
    }

    proptest! {
        #[test]
        fn append_law_holds(
            tokens in proptest::collection::vec("[a-z/][a-z0-9._-]{0,7}", 1..6),
            extra in "[a-z0-9._-]{1,8}",
        ) {
            let base = Command::from_tokens(tokens.clone());
            let appended = base.with_param(extra.clone());

            let mut expected = tokens.clone();
            expected.push(extra);
            prop_assert_eq!(appended.tokens(), expected.as_slice());
            prop_assert_eq!(base.tokens(), tokens.as_slice());
        }
    }
}
