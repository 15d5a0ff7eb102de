//! Invocation runtime
//!
//! Contexts, parameter resolution, dispatch across nested commands, and the
//! shell runner used by manifest commands.

pub mod command;
pub mod context;
pub mod dispatch;
pub mod interpolate;
pub mod prompt;
pub mod scheduler;

pub use command::{template_vars, ShellCommand};
pub use context::{current_context, Context, ContextGuard, ContextSettings, ParameterSource};
pub use interpolate::{interpolate, interpolate_strict};
pub use prompt::{Prompter, ScriptedPrompter, TerminalPrompter};
