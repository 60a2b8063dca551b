//! Command-line parsing for control messages
//!
//! A control message is interpreted as whitespace-separated tokens:
//! ```text
//! <program> [arg]...
//! ```
//! There is no quoting or expansion; each token is passed to the program as a
//! single opaque argument.

use std::fmt;
use thiserror::Error;

/// Raised when a control message carries no tokens at all
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("empty command")]
pub struct EmptyCommand;

/// A parsed, non-empty command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Parse raw message bytes. Returns `None` for empty or whitespace-only input.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(raw);
        let mut tokens = text.split_whitespace().map(str::to_owned);
        let program = tokens.next()?;

        Some(Self {
            program,
            args: tokens.collect(),
        })
    }

    /// Like [`CommandLine::parse`], but reports the empty case as an error
    pub fn try_parse(raw: &[u8]) -> Result<Self, EmptyCommand> {
        Self::parse(raw).ok_or(EmptyCommand)
    }

    /// Full argument vector, program first
    pub fn argv(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str))
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let argv: Vec<&str> = self.argv().collect();
        write!(f, "{}", argv.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_and_args() {
        let cmd = CommandLine::parse(b"ls -la /tmp").expect("should parse");
        assert_eq!(cmd.program, "ls");
        assert_eq!(cmd.args, vec!["-la", "/tmp"]);
    }

    #[test]
    fn test_runs_of_whitespace_collapse() {
        let cmd = CommandLine::parse(b"  echo \t hello\n  world  ").expect("should parse");
        assert_eq!(cmd.argv().collect::<Vec<_>>(), vec!["echo", "hello", "world"]);
    }

    #[test]
    fn test_no_quoting_semantics() {
        let cmd = CommandLine::parse(b"echo \"a b\" $HOME").expect("should parse");
        assert_eq!(cmd.args, vec!["\"a", "b\"", "$HOME"]);
    }

    #[test]
    fn test_empty_and_whitespace_only() {
        assert!(CommandLine::parse(b"").is_none());
        assert!(CommandLine::parse(b"   \n\t ").is_none());
        assert_eq!(CommandLine::try_parse(b" "), Err(EmptyCommand));
    }

    #[test]
    fn test_display_rejoins_tokens() {
        let cmd = CommandLine::parse(b"echo   hello").unwrap();
        assert_eq!(cmd.to_string(), "echo hello");
    }
}
