//! Parameter types: converting raw strings into typed values
//!
//! Every parameter carries a [`ParamType`]. Raw command line input arrives as
//! [`Value::Str`]; defaults may already be typed, so every type accepts its
//! own variant unchanged, which keeps conversion idempotent.

use crate::completion::{CompletionItem, CompletionKind};
use crate::error::{Error, Result};
use crate::model::{Parameter, Value};
use crate::runner::Context;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

/// Converts raw values for one parameter and drives its completion
pub trait ParamType: fmt::Debug {
    /// Short name used in help metavars, e.g. `INTEGER`
    fn name(&self) -> &str;

    /// Convert a raw or already-typed value. Failures should be
    /// [`Error::bad_parameter`]; the parameter hint is attached by the caller.
    fn convert(&self, value: Value, param: &Parameter, ctx: &Context) -> Result<Value>;

    /// Split an environment variable into individual raw values
    fn split_env_value(&self, raw: &str) -> Vec<String> {
        raw.split_whitespace().map(str::to_string).collect()
    }

    /// Completion candidates for a value of this type
    fn shell_complete(
        &self,
        _ctx: &Context,
        _param: &Parameter,
        _incomplete: &str,
    ) -> Vec<CompletionItem> {
        Vec::new()
    }

    /// Whether completion filtering compares case-sensitively
    fn case_sensitive_completion(&self) -> bool {
        true
    }

    /// Bool types get flag handling in prompts and help
    fn is_bool(&self) -> bool {
        false
    }

    /// Metavar shown in help for options taking a value
    fn metavar(&self) -> String {
        self.name().to_uppercase()
    }
}

/// Free-form text
#[derive(Debug, Clone, Copy, Default)]
pub struct StringType;

impl ParamType for StringType {
    fn name(&self) -> &str {
        "text"
    }

    fn convert(&self, value: Value, _param: &Parameter, _ctx: &Context) -> Result<Value> {
        match value {
            Value::Str(_) | Value::None => Ok(value),
            other => Ok(Value::Str(other.to_string())),
        }
    }
}

/// Signed integers, optionally limited to a closed range
#[derive(Debug, Clone, Copy, Default)]
pub struct IntType {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl IntType {
    pub fn new() -> Self {
        IntType::default()
    }

    pub fn range(min: Option<i64>, max: Option<i64>) -> Self {
        IntType { min, max }
    }

    fn check_range(&self, n: i64) -> Result<Value> {
        let below = self.min.map_or(false, |min| n < min);
        let above = self.max.map_or(false, |max| n > max);
        if below || above {
            let describe = match (self.min, self.max) {
                (Some(min), Some(max)) => format!("{}<=x<={}", min, max),
                (Some(min), None) => format!("x>={}", min),
                (None, Some(max)) => format!("x<={}", max),
                (None, None) => unreachable!(),
            };
            return Err(Error::bad_parameter(format!(
                "{} is not in the range {}.",
                n, describe
            )));
        }
        Ok(Value::Int(n))
    }
}

impl ParamType for IntType {
    fn name(&self) -> &str {
        "integer"
    }

    fn convert(&self, value: Value, _param: &Parameter, _ctx: &Context) -> Result<Value> {
        match value {
            Value::Int(n) => self.check_range(n),
            Value::Str(s) => match s.trim().parse::<i64>() {
                Ok(n) => self.check_range(n),
                Err(_) => Err(Error::bad_parameter(format!(
                    "'{}' is not a valid integer.",
                    s
                ))),
            },
            other => Err(Error::bad_parameter(format!(
                "'{}' is not a valid integer.",
                other
            ))),
        }
    }
}

/// Floating point numbers
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatType;

impl ParamType for FloatType {
    fn name(&self) -> &str {
        "float"
    }

    fn convert(&self, value: Value, _param: &Parameter, _ctx: &Context) -> Result<Value> {
        match value {
            Value::Float(_) => Ok(value),
            Value::Int(n) => Ok(Value::Float(n as f64)),
            Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                Error::bad_parameter(format!("'{}' is not a valid float.", s))
            }),
            other => Err(Error::bad_parameter(format!(
                "'{}' is not a valid float.",
                other
            ))),
        }
    }
}

/// Booleans; accepts the usual yes/no spellings
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolType;

impl ParamType for BoolType {
    fn name(&self) -> &str {
        "boolean"
    }

    fn convert(&self, value: Value, _param: &Parameter, _ctx: &Context) -> Result<Value> {
        match value {
            Value::Bool(_) => Ok(value),
            Value::Str(s) => match s.trim().to_lowercase().as_str() {
                "1" | "true" | "t" | "yes" | "y" | "on" => Ok(Value::Bool(true)),
                "0" | "false" | "f" | "no" | "n" | "off" => Ok(Value::Bool(false)),
                _ => Err(Error::bad_parameter(format!(
                    "'{}' is not a valid boolean.",
                    s
                ))),
            },
            other => Err(Error::bad_parameter(format!(
                "'{}' is not a valid boolean.",
                other
            ))),
        }
    }

    fn is_bool(&self) -> bool {
        true
    }
}

/// One of a fixed set of strings
#[derive(Debug, Clone)]
pub struct Choice {
    pub choices: Vec<String>,
    pub case_sensitive: bool,
}

impl Choice {
    pub fn new<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Choice {
            choices: choices.into_iter().map(Into::into).collect(),
            case_sensitive: true,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    fn matches(&self, choice: &str, candidate: &str, ctx: &Context) -> bool {
        let choice = ctx.normalize_token(choice);
        let candidate = ctx.normalize_token(candidate);
        if self.case_sensitive {
            choice == candidate
        } else {
            choice.to_lowercase() == candidate.to_lowercase()
        }
    }
}

impl ParamType for Choice {
    fn name(&self) -> &str {
        "choice"
    }

    fn convert(&self, value: Value, _param: &Parameter, ctx: &Context) -> Result<Value> {
        let raw = value.to_string();
        match self.choices.iter().find(|c| self.matches(c, &raw, ctx)) {
            Some(choice) => Ok(Value::Str(choice.clone())),
            None => {
                let quoted: Vec<String> = self.choices.iter().map(|c| format!("'{}'", c)).collect();
                Err(Error::bad_parameter(format!(
                    "'{}' is not one of {}.",
                    raw,
                    quoted.join(", ")
                )))
            }
        }
    }

    fn shell_complete(
        &self,
        _ctx: &Context,
        _param: &Parameter,
        incomplete: &str,
    ) -> Vec<CompletionItem> {
        self.choices
            .iter()
            .filter(|c| {
                if self.case_sensitive {
                    c.starts_with(incomplete)
                } else {
                    c.to_lowercase().starts_with(&incomplete.to_lowercase())
                }
            })
            .map(|c| CompletionItem::new(c.clone()))
            .collect()
    }

    fn case_sensitive_completion(&self) -> bool {
        self.case_sensitive
    }

    fn metavar(&self) -> String {
        format!("[{}]", self.choices.join("|"))
    }
}

/// Filesystem paths; completion is delegated to the shell
#[derive(Debug, Clone, Copy)]
pub struct PathType {
    pub exists: bool,
    pub file_okay: bool,
    pub dir_okay: bool,
}

impl Default for PathType {
    fn default() -> Self {
        PathType {
            exists: false,
            file_okay: true,
            dir_okay: true,
        }
    }
}

impl PathType {
    pub fn new() -> Self {
        PathType::default()
    }

    pub fn existing(mut self) -> Self {
        self.exists = true;
        self
    }

    pub fn dir_only(mut self) -> Self {
        self.file_okay = false;
        self.dir_okay = true;
        self
    }

    pub fn file_only(mut self) -> Self {
        self.file_okay = true;
        self.dir_okay = false;
        self
    }
}

impl ParamType for PathType {
    fn name(&self) -> &str {
        "path"
    }

    fn convert(&self, value: Value, _param: &Parameter, _ctx: &Context) -> Result<Value> {
        let path = match value {
            Value::Path(p) => p,
            Value::Str(s) => PathBuf::from(s),
            other => PathBuf::from(other.to_string()),
        };

        if self.exists || !self.file_okay || !self.dir_okay {
            match path.metadata() {
                Ok(meta) => {
                    if meta.is_file() && !self.file_okay {
                        return Err(Error::bad_parameter(format!(
                            "File '{}' is a file.",
                            path.display()
                        )));
                    }
                    if meta.is_dir() && !self.dir_okay {
                        return Err(Error::bad_parameter(format!(
                            "Directory '{}' is a directory.",
                            path.display()
                        )));
                    }
                }
                Err(_) if self.exists => {
                    return Err(Error::bad_parameter(format!(
                        "Path '{}' does not exist.",
                        path.display()
                    )));
                }
                Err(_) => {}
            }
        }

        Ok(Value::Path(path))
    }

    fn split_env_value(&self, raw: &str) -> Vec<String> {
        std::env::split_paths(raw)
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.display().to_string())
            .collect()
    }

    fn shell_complete(
        &self,
        _ctx: &Context,
        _param: &Parameter,
        incomplete: &str,
    ) -> Vec<CompletionItem> {
        let kind = if self.dir_okay && !self.file_okay {
            CompletionKind::Dir
        } else {
            CompletionKind::File
        };
        vec![CompletionItem::new(incomplete).with_kind(kind)]
    }
}

/// Pick a type from the shape of a default value
pub fn infer_type(value: &Value) -> Rc<dyn ParamType> {
    match value {
        Value::Bool(_) => Rc::new(BoolType),
        Value::Int(_) => Rc::new(IntType::new()),
        Value::Float(_) => Rc::new(FloatType),
        Value::Path(_) => Rc::new(PathType::new()),
        Value::List(items) => match items.first() {
            Some(first) => infer_type(first),
            None => Rc::new(StringType),
        },
        Value::None | Value::Str(_) => Rc::new(StringType),
    }
}
