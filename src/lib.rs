//! Clasp - a declarative command line toolkit
//!
//! Commands and their parameters are declared up front with builders. At
//! run time Clasp tokenizes argv, resolves every parameter from the command
//! line, the environment, default maps, defaults or a prompt, fires the
//! parameter callbacks in a fixed order, and walks nested subcommands, each
//! level getting its own [`Context`]. The same machinery drives shell
//! completion for bash, zsh and fish.
//!
//! ```no_run
//! use clasp::{Command, Parameter};
//!
//! let hello = Command::builder("hello")
//!     .param(Parameter::option(["-n", "--name"]).default("World"))
//!     .callback(|ctx| {
//!         println!("Hello, {}!", ctx.value("name"));
//!         Ok(())
//!     })
//!     .build()
//!     .unwrap();
//! std::process::exit(hello.run());
//! ```

pub mod cli;
pub mod completion;
pub mod config;
pub mod error;
pub mod help;
pub mod model;
pub mod parser;
pub mod runner;

// Re-export commonly used types
pub use completion::{CompletionItem, CompletionKind};
pub use config::DefaultMap;
pub use error::{Error, Result, UsageError, UsageErrorKind};
pub use model::{
    Choice, Command, CommandBuilder, CommandSource, CommandCollection, LazyCommands, ParamType,
    Parameter, PathType, StaticCommands, Value,
};
pub use parser::NegativeNumbers;
pub use runner::{current_context, Context, ContextSettings, ParameterSource, Prompter};

/// Current version of Clasp
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
