//! Running manifest `run` templates through the shell

use crate::error::{Error, Result};
use crate::model::{envvar_name, Value};
use crate::runner::interpolate::interpolate_strict;
use crate::runner::Context;
use log::debug;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command as StdCommand, Stdio};

/// A shell script with its interpreter and working directory
#[derive(Debug, Clone)]
pub struct ShellCommand {
    script: String,
    interpreter: Vec<String>,
    dir: Option<PathBuf>,
}

impl ShellCommand {
    pub fn new(script: impl Into<String>) -> Self {
        ShellCommand {
            script: script.into(),
            interpreter: vec!["sh".to_string(), "-c".to_string()],
            dir: None,
        }
    }

    pub fn with_interpreter(mut self, interpreter: Vec<String>) -> Self {
        if !interpreter.is_empty() {
            self.interpreter = interpreter;
        }
        self
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    /// Interpolate the context's values into the script and run it. Values
    /// are also exported as upper-cased environment variables.
    ///
    /// `${name}` is substituted as raw text before the interpreter sees the
    /// script, so a value containing `;` or `$(..)` becomes shell code. Use
    /// the exported variable (`"$NAME"`) for values that come from users.
    pub fn run(&self, ctx: &Context) -> Result<()> {
        let vars = template_vars(ctx);
        let script = interpolate_strict(&self.script, &vars)?;
        debug!("{}: running '{}'", ctx.command_path(), script);

        let mut command = StdCommand::new(&self.interpreter[0]);
        command.args(&self.interpreter[1..]);
        command.arg(&script);
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }
        command.stdin(Stdio::inherit());
        command.stdout(Stdio::inherit());
        command.stderr(Stdio::inherit());
        for (key, value) in &vars {
            command.env(envvar_name(key), value);
        }

        let status = command.status()?;
        if status.success() {
            return Ok(());
        }
        let code = status.code().unwrap_or(1);
        Err(Error::failure(
            format!("Command '{}' failed with exit code {}", ctx.command_path(), code),
            code,
        ))
    }
}

/// Every resolved value of `ctx` and its ancestors as strings; inner levels
/// shadow outer ones
pub fn template_vars(ctx: &Context) -> HashMap<String, String> {
    let mut levels = vec![ctx.params()];
    let mut parent = ctx.parent();
    while let Some(p) = parent {
        levels.push(p.params());
        parent = p.parent();
    }

    let mut vars = HashMap::new();
    for params in levels.into_iter().rev() {
        for (name, value) in params {
            vars.insert(name, render_value(&value));
        }
    }
    vars
}

fn render_value(value: &Value) -> String {
    match value {
        Value::None => String::new(),
        Value::List(_) => value.to_strings().join(" "),
        other => other.to_string(),
    }
}
