//! Manifest data structures
//!
//! A manifest (`clasp.yml`) declares a command tree in YAML:
//!
//! ```yaml
//! name: deploy-tool
//! help: Deploy things
//! env_prefix: DEPLOY
//! options:
//!   - name: verbose
//!     short: v
//!     type: count
//! commands:
//!   push:
//!     help: Push a build
//!     arguments:
//!       - name: target
//!         choices: [staging, prod]
//!     run: ./push.sh ${target}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level manifest: the root command plus program-wide settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Manifest {
    /// Program name shown in usage lines (defaults to the binary name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Version printed by `--version`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Prefix for automatic environment variable names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_prefix: Option<String>,

    /// Interpreter used for `run` scripts, e.g. `["bash", "-c"]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<Vec<String>>,

    /// Extra spellings for the help option, e.g. `["-h", "--help"]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_option_names: Option<Vec<String>>,

    /// The root command
    #[serde(flatten)]
    pub root: CommandSpec,
}

/// One command in the tree
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CommandSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,

    /// One-line summary for command listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_help: Option<String>,

    /// Hidden from help and completion
    #[serde(default)]
    pub hidden: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<ArgumentSpec>,

    /// Subcommands; a command with subcommands is a dispatch node
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<String, CommandSpec>,

    /// Script run when this command is invoked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunSpec>,

    /// Run this node's script even when no subcommand is given
    #[serde(default)]
    pub invoke_without_command: bool,

    /// Show help when invoked without any arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_args_is_help: Option<bool>,

    /// Accept and ignore surplus positional tokens
    #[serde(default)]
    pub allow_extra_args: bool,
}

/// A `run` entry: a bare script or a script with a working directory
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RunSpec {
    Script(String),
    Detail(RunDetail),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunDetail {
    pub script: String,

    /// Working directory, relative to the manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl RunSpec {
    pub fn script(&self) -> &str {
        match self {
            RunSpec::Script(script) => script,
            RunSpec::Detail(detail) => &detail.script,
        }
    }

    pub fn dir(&self) -> Option<&str> {
        match self {
            RunSpec::Script(_) => None,
            RunSpec::Detail(detail) => detail.dir.as_deref(),
        }
    }
}

/// A named option
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OptionSpec {
    /// Destination name; the long spelling is `--name` with `_` as `-`
    pub name: String,

    /// Single-character short spelling, without the dash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,

    /// `string`, `int`, `float`, `bool`, `count`, `path`, `file`, `dir`
    /// or `choice`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub option_type: Option<String>,

    /// Allowed values; implies `type: choice`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_yaml::Value>,

    #[serde(default)]
    pub required: bool,

    /// Accept the option repeatedly, collecting every value
    #[serde(default)]
    pub multiple: bool,

    /// Values consumed per occurrence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nargs: Option<i32>,

    /// For `bool` options: also accept `--no-<name>`
    #[serde(default)]
    pub negatable: bool,

    /// Environment variable read when the option is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envvar: Option<String>,

    /// Ask interactively when no value is found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Hide the prompt input
    #[serde(default)]
    pub secret: bool,

    #[serde(default)]
    pub hidden: bool,
}

/// A positional argument
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArgumentSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub argument_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_yaml::Value>,

    /// Defaults to required unless a default is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// `-1` takes every remaining token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nargs: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envvar: Option<String>,
}

impl OptionSpec {
    /// The long spelling, `--dry-run` for `dry_run`
    pub fn long(&self) -> String {
        format!("--{}", self.name.replace('_', "-"))
    }
}
