//! Configuration: default maps and YAML command manifests
//!
//! Default maps feed per-invocation parameter defaults. Manifests
//! (`clasp.yml`) describe a whole command tree for the `clasp` binary.

pub mod build;
pub mod defaults;
pub mod parse;
pub mod schema;
pub mod types;

pub use build::{build_command, BuildOptions};
pub use defaults::DefaultMap;
pub use parse::*;
pub use schema::*;
pub use types::*;
