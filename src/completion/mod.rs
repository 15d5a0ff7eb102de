//! Shell completion
//!
//! The engine re-parses a partial command line in resilient mode to find
//! the active command level, then proposes candidates for the word being
//! typed. The shell module implements the environment variable protocol
//! that bash, zsh and fish use to ask for those candidates.

pub mod engine;
pub mod shell;

pub use engine::{complete, resolve_context, resolve_incomplete, Target};
pub use shell::{complete_var_name, handle_completion, split_arg_string, Shell};

use std::fmt;

/// How the shell should treat a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionKind {
    /// A literal word
    #[default]
    Plain,
    /// Let the shell complete directory names
    Dir,
    /// Let the shell complete file names
    File,
}

impl CompletionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionKind::Plain => "plain",
            CompletionKind::Dir => "dir",
            CompletionKind::File => "file",
        }
    }
}

impl fmt::Display for CompletionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completion candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    pub value: String,
    pub help: Option<String>,
    pub kind: CompletionKind,
}

impl CompletionItem {
    pub fn new(value: impl Into<String>) -> Self {
        CompletionItem {
            value: value.into(),
            help: None,
            kind: CompletionKind::Plain,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_kind(mut self, kind: CompletionKind) -> Self {
        self.kind = kind;
        self
    }
}
