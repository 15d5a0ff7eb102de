//! Parameter descriptors (options and positional arguments)

use crate::completion::CompletionItem;
use crate::error::{ConfigError, ConfigResult, Result};
use crate::model::types::{infer_type, BoolType, IntType, ParamType, StringType};
use crate::model::Value;
use crate::runner::Context;
use std::fmt;
use std::rc::Rc;

/// Callback fired after conversion; may transform the value or fail
pub type ParamCallback = Rc<dyn Fn(&Context, &Parameter, Value) -> Result<Value>>;

/// Custom completion for a parameter's values
pub type CompleteFn = Rc<dyn Fn(&Context, &Parameter, &str) -> Vec<CompletionItem>>;

/// Whether a parameter is named or positional
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Option,
    Argument,
}

/// Static default or a factory evaluated on each use
#[derive(Clone)]
pub enum DefaultValue {
    Value(Value),
    Factory(Rc<dyn Fn() -> Value>),
}

impl DefaultValue {
    pub fn get(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Factory(f) => f(),
        }
    }
}

/// How to ask for a value that wasn't supplied anywhere
#[derive(Debug, Clone)]
pub struct Prompt {
    pub text: String,
    pub hide_input: bool,
    pub confirmation: bool,
}

/// A declared option or argument.
///
/// Built with [`Parameter::option`] / [`Parameter::argument`] and the
/// chained setters; the command builder calls [`Parameter::finalize`] which
/// infers the destination name and the type.
#[derive(Clone)]
pub struct Parameter {
    pub(crate) decls: Vec<String>,
    pub(crate) name: String,
    pub(crate) kind: ParamKind,
    pub(crate) opts: Vec<String>,
    pub(crate) secondary_opts: Vec<String>,
    pub(crate) ty: Option<Rc<dyn ParamType>>,
    pub(crate) nargs: i32,
    pub(crate) multiple: bool,
    pub(crate) count: bool,
    pub(crate) is_flag: bool,
    pub(crate) flag_value: Option<Value>,
    pub(crate) required: bool,
    pub(crate) required_explicit: Option<bool>,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) envvars: Vec<String>,
    pub(crate) eager: bool,
    pub(crate) hidden: bool,
    pub(crate) expose_value: bool,
    pub(crate) help: Option<String>,
    pub(crate) metavar: Option<String>,
    pub(crate) prompt: Option<Prompt>,
    pub(crate) callback: Option<ParamCallback>,
    pub(crate) complete: Option<CompleteFn>,
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("opts", &self.opts)
            .field("secondary_opts", &self.secondary_opts)
            .field("nargs", &self.nargs)
            .field("multiple", &self.multiple)
            .field("eager", &self.eager)
            .finish()
    }
}

impl Parameter {
    fn with_kind(kind: ParamKind, decls: Vec<String>) -> Self {
        Parameter {
            decls,
            name: String::new(),
            kind,
            opts: Vec::new(),
            secondary_opts: Vec::new(),
            ty: None,
            nargs: 1,
            multiple: false,
            count: false,
            is_flag: false,
            flag_value: None,
            required: false,
            required_explicit: None,
            default: None,
            envvars: Vec::new(),
            eager: false,
            hidden: false,
            expose_value: true,
            help: None,
            metavar: None,
            prompt: None,
            callback: None,
            complete: None,
        }
    }

    /// A named option, e.g. `Parameter::option(["-n", "--name"])`.
    ///
    /// An unprefixed declaration sets the destination name explicitly.
    /// `"--shout/--no-shout"` declares a boolean flag with an "off" spelling.
    pub fn option<I, S>(decls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(ParamKind::Option, decls.into_iter().map(Into::into).collect())
    }

    /// A positional argument. Fixed-arity arguments without a default are
    /// required unless `required(false)` is called; variadic ones are not.
    pub fn argument(name: impl Into<String>) -> Self {
        Self::with_kind(ParamKind::Argument, vec![name.into()])
    }

    pub fn ty(mut self, ty: impl ParamType + 'static) -> Self {
        self.ty = Some(Rc::new(ty));
        self
    }

    pub fn ty_rc(mut self, ty: Rc<dyn ParamType>) -> Self {
        self.ty = Some(ty);
        self
    }

    /// Number of values consumed per occurrence; `-1` takes all remaining
    /// positionals (arguments only)
    pub fn nargs(mut self, nargs: i32) -> Self {
        self.nargs = nargs;
        self
    }

    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    /// Count occurrences, as in `-vvv`
    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Boolean flag taking no value
    pub fn flag(mut self) -> Self {
        self.is_flag = true;
        self
    }

    /// Flag storing `value` when present
    pub fn flag_value(mut self, value: impl Into<Value>) -> Self {
        self.is_flag = true;
        self.flag_value = Some(value.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required_explicit = Some(required);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn default_factory(mut self, factory: impl Fn() -> Value + 'static) -> Self {
        self.default = Some(DefaultValue::Factory(Rc::new(factory)));
        self
    }

    /// Environment variables tried in order when no value was given
    pub fn envvar(mut self, name: impl Into<String>) -> Self {
        self.envvars.push(name.into());
        self
    }

    pub fn eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Whether the resolved value is stored in the context
    pub fn expose_value(mut self, expose: bool) -> Self {
        self.expose_value = expose;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn metavar(mut self, metavar: impl Into<String>) -> Self {
        self.metavar = Some(metavar.into());
        self
    }

    pub fn prompt(mut self, text: impl Into<String>) -> Self {
        self.prompt = Some(Prompt {
            text: text.into(),
            hide_input: false,
            confirmation: false,
        });
        self
    }

    /// Prompt without echo, asking twice when `confirmation` is set
    pub fn password_prompt(mut self, text: impl Into<String>, confirmation: bool) -> Self {
        self.prompt = Some(Prompt {
            text: text.into(),
            hide_input: true,
            confirmation,
        });
        self
    }

    pub fn callback(
        mut self,
        callback: impl Fn(&Context, &Parameter, Value) -> Result<Value> + 'static,
    ) -> Self {
        self.callback = Some(Rc::new(callback));
        self
    }

    pub fn shell_complete(
        mut self,
        complete: impl Fn(&Context, &Parameter, &str) -> Vec<CompletionItem> + 'static,
    ) -> Self {
        self.complete = Some(Rc::new(complete));
        self
    }

    /// Infer the destination name, split primary/secondary spellings and
    /// settle the flag, count and type configuration.
    pub fn finalize(mut self) -> ConfigResult<Self> {
        self.required = self.required_explicit.unwrap_or(
            self.kind == ParamKind::Argument && self.default.is_none() && self.nargs > 0,
        );

        match self.kind {
            ParamKind::Argument => self.finalize_argument()?,
            ParamKind::Option => self.finalize_option()?,
        }

        if self.ty.is_none() {
            self.ty = Some(match &self.default {
                Some(DefaultValue::Value(v)) => infer_type(v),
                _ => Rc::new(StringType),
            });
        }

        Ok(self)
    }

    fn finalize_argument(&mut self) -> ConfigResult<()> {
        let decl = self
            .decls
            .first()
            .cloned()
            .ok_or_else(|| ConfigError::UnnamedParameter(self.decls.clone()))?;
        if decl.is_empty() {
            return Err(ConfigError::UnnamedParameter(self.decls.clone()));
        }
        self.name = decl.replace('-', "_").to_lowercase();
        self.opts = vec![decl];
        if self.nargs == 0 || self.nargs < -1 {
            return Err(ConfigError::Invalid(format!(
                "argument '{}' has invalid nargs {}",
                self.name, self.nargs
            )));
        }
        Ok(())
    }

    fn finalize_option(&mut self) -> ConfigResult<()> {
        let mut explicit_name: Option<String> = None;
        let mut possible_names: Vec<(String, String)> = Vec::new();

        for decl in &self.decls {
            if is_identifier(decl) {
                if explicit_name.is_some() {
                    return Err(ConfigError::Invalid(format!(
                        "name defined twice in {:?}",
                        self.decls
                    )));
                }
                explicit_name = Some(decl.clone());
                continue;
            }

            let split_char = if decl.starts_with('/') { ';' } else { '/' };
            if let Some((first, second)) = decl.split_once(split_char) {
                let first = first.trim_end();
                let second = second.trim_start();
                if first == second {
                    return Err(ConfigError::Invalid(format!(
                        "boolean option '{}' cannot use the same flag for true and false",
                        decl
                    )));
                }
                if !first.is_empty() {
                    possible_names.push(split_opt_checked(first)?);
                    self.opts.push(first.to_string());
                }
                if !second.is_empty() {
                    split_opt_checked(second)?;
                    self.secondary_opts.push(second.to_string());
                }
            } else {
                possible_names.push(split_opt_checked(decl)?);
                self.opts.push(decl.clone());
            }
        }

        self.name = match explicit_name {
            Some(name) => name,
            None => infer_name(&possible_names)
                .ok_or_else(|| ConfigError::UnnamedParameter(self.decls.clone()))?,
        };

        if self.opts.is_empty() && self.secondary_opts.is_empty() {
            return Err(ConfigError::UnnamedParameter(self.decls.clone()));
        }

        if !self.secondary_opts.is_empty() {
            self.is_flag = true;
        }

        if self.count {
            self.is_flag = false;
            if self.ty.is_none() {
                self.ty = Some(Rc::new(IntType::range(Some(0), None)));
            }
            if self.default.is_none() {
                self.default = Some(DefaultValue::Value(Value::Int(0)));
            }
        }

        if self.is_flag {
            let flag_value = self.flag_value.clone().unwrap_or(Value::Bool(true));
            if self.ty.is_none() {
                self.ty = Some(infer_type(&flag_value));
            }
            if self.default.is_none() && !self.required && matches!(flag_value, Value::Bool(_)) {
                self.default = Some(DefaultValue::Value(Value::Bool(false)));
            }
            self.flag_value = Some(flag_value);
            if self.ty.as_ref().map_or(false, |t| !t.is_bool()) && !self.secondary_opts.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "secondary flag spellings only apply to boolean flags ({})",
                    self.name
                )));
            }
        }

        if self.nargs < 1 && !self.is_flag && !self.count {
            return Err(ConfigError::Invalid(format!(
                "option '{}' must take at least one value",
                self.name
            )));
        }

        if self.is_flag && self.ty.is_none() {
            self.ty = Some(Rc::new(BoolType));
        }

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn is_option(&self) -> bool {
        self.kind == ParamKind::Option
    }

    pub fn is_argument(&self) -> bool {
        self.kind == ParamKind::Argument
    }

    pub fn opts(&self) -> &[String] {
        &self.opts
    }

    pub fn secondary_opts(&self) -> &[String] {
        &self.secondary_opts
    }

    pub fn param_type(&self) -> Rc<dyn ParamType> {
        self.ty.clone().unwrap_or_else(|| Rc::new(StringType))
    }

    pub fn get_nargs(&self) -> i32 {
        self.nargs
    }

    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    pub fn is_count(&self) -> bool {
        self.count
    }

    pub fn is_flag(&self) -> bool {
        self.is_flag
    }

    /// Whether the parser should consume value tokens after this option
    pub fn takes_value(&self) -> bool {
        self.is_option() && !self.is_flag && !self.count
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_eager(&self) -> bool {
        self.eager
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn get_help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn get_flag_value(&self) -> Value {
        self.flag_value.clone().unwrap_or(Value::Bool(true))
    }

    pub fn default_value(&self) -> Option<Value> {
        self.default.as_ref().map(DefaultValue::get)
    }

    pub fn envvars(&self) -> &[String] {
        &self.envvars
    }

    /// Hint used in error messages: `'-n' / '--name'` or `'SRC'`
    pub fn error_hint(&self) -> String {
        match self.kind {
            ParamKind::Argument => format!("'{}'", self.human_name()),
            ParamKind::Option => self
                .opts
                .iter()
                .map(|o| format!("'{}'", o))
                .collect::<Vec<_>>()
                .join(" / "),
        }
    }

    /// Name shown in messages and usage lines
    pub fn human_name(&self) -> String {
        match self.kind {
            ParamKind::Argument => self
                .metavar
                .clone()
                .unwrap_or_else(|| self.name.to_uppercase()),
            ParamKind::Option => self.name.clone(),
        }
    }

    pub fn param_type_name(&self) -> &'static str {
        match self.kind {
            ParamKind::Argument => "argument",
            ParamKind::Option => "option",
        }
    }

    /// Metavar for help and usage output
    pub fn make_metavar(&self) -> String {
        let base = match &self.metavar {
            Some(m) => m.clone(),
            None => match self.kind {
                ParamKind::Argument => self.name.to_uppercase(),
                ParamKind::Option => self.param_type().metavar(),
            },
        };
        let base = if self.is_argument() && !self.required {
            format!("[{}]", base)
        } else {
            base
        };
        if self.nargs != 1 {
            format!("{}...", base)
        } else {
            base
        }
    }

    /// First set, non-empty environment variable, including the one derived
    /// from the context's auto prefix for options
    pub fn resolve_envvar_value(&self, ctx: &Context) -> Option<String> {
        for name in &self.envvars {
            if let Ok(value) = std::env::var(name) {
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }

        if self.is_option() && self.envvars.is_empty() {
            if let Some(prefix) = ctx.auto_envvar_prefix() {
                let name = envvar_name(&format!("{}_{}", prefix, self.name));
                if let Ok(value) = std::env::var(&name) {
                    if !value.is_empty() {
                        return Some(value);
                    }
                }
            }
        }

        None
    }

    /// Completion candidates for this parameter's value
    pub fn complete_value(&self, ctx: &Context, incomplete: &str) -> Vec<CompletionItem> {
        match &self.complete {
            Some(complete) => complete(ctx, self, incomplete),
            None => self.param_type().shell_complete(ctx, self, incomplete),
        }
    }
}

/// Split an option spelling into prefix and name: `--foo` → (`--`, `foo`),
/// `-f` → (`-`, `f`), `+w` → (`+`, `w`), `name` → (``, `name`)
pub fn split_opt(opt: &str) -> (&str, &str) {
    let mut chars = opt.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return ("", opt),
    };
    if first.is_alphanumeric() {
        return ("", opt);
    }
    let first_len = first.len_utf8();
    if chars.next() == Some(first) {
        let split = first_len * 2;
        return (&opt[..split], &opt[split..]);
    }
    (&opt[..first_len], &opt[first_len..])
}

fn split_opt_checked(opt: &str) -> ConfigResult<(String, String)> {
    let (prefix, name) = split_opt(opt);
    if prefix.is_empty() || name.is_empty() {
        return Err(ConfigError::InvalidOptionName(opt.to_string()));
    }
    Ok((prefix.to_string(), name.to_string()))
}

/// Longer prefixes first (stable sort), so the first long spelling wins over
/// the first short one
fn infer_name(possible: &[(String, String)]) -> Option<String> {
    let mut sorted: Vec<&(String, String)> = possible.iter().collect();
    sorted.sort_by_key(|(prefix, _)| std::cmp::Reverse(prefix.chars().count()));
    let (prefix, name) = sorted.first()?;
    let prefix_char = prefix.chars().next()?;
    let name: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == prefix_char { '_' } else { c })
        .collect();
    if is_identifier(&name) {
        Some(name)
    } else {
        None
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Upper-case and replace anything non-alphanumeric with `_`
pub fn envvar_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_of(decls: &[&str]) -> String {
        Parameter::option(decls.iter().copied())
            .finalize()
            .unwrap()
            .name
    }

    #[test]
    fn test_unprefixed_name_wins() {
        assert_eq!(name_of(&["-f", "--file", "target"]), "target");
    }

    #[test]
    fn test_first_long_wins() {
        assert_eq!(name_of(&["-f", "--file-name", "--other"]), "file_name");
    }

    #[test]
    fn test_short_only() {
        assert_eq!(name_of(&["-x", "-y"]), "x");
    }

    #[test]
    fn test_single_dash_is_not_long() {
        assert_eq!(name_of(&["-n", "-name"]), "n");
    }

    #[test]
    fn test_custom_prefix() {
        let p = Parameter::option(["+w", "++with-thing"]).finalize().unwrap();
        assert_eq!(p.name(), "with_thing");
    }

    #[test]
    fn test_case_folded() {
        assert_eq!(name_of(&["--Verbose"]), "verbose");
    }

    #[test]
    fn test_secondary_flag() {
        let p = Parameter::option(["--shout/--no-shout"]).finalize().unwrap();
        assert_eq!(p.name(), "shout");
        assert!(p.is_flag());
        assert_eq!(p.opts(), ["--shout"]);
        assert_eq!(p.secondary_opts(), ["--no-shout"]);
        assert_eq!(p.default_value(), Some(Value::Bool(false)));
    }

    #[test]
    fn test_invalid_spelling() {
        let err = Parameter::option(["--"]).finalize().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOptionName(_)));
    }

    #[test]
    fn test_count_defaults() {
        let p = Parameter::option(["-v"]).count().finalize().unwrap();
        assert_eq!(p.default_value(), Some(Value::Int(0)));
        assert!(!p.takes_value());
    }

    #[test]
    fn test_argument_name() {
        let p = Parameter::argument("src-dir").finalize().unwrap();
        assert_eq!(p.name(), "src_dir");
        assert_eq!(p.error_hint(), "'SRC_DIR'");
        assert!(p.is_required());
    }

    #[test]
    fn test_error_hint() {
        let p = Parameter::option(["-n", "--name"]).finalize().unwrap();
        assert_eq!(p.error_hint(), "'-n' / '--name'");
    }

    #[test]
    fn test_split_opt() {
        assert_eq!(split_opt("--foo"), ("--", "foo"));
        assert_eq!(split_opt("-f"), ("-", "f"));
        assert_eq!(split_opt("foo"), ("", "foo"));
        assert_eq!(split_opt("/debug"), ("/", "debug"));
    }

    #[test]
    fn test_envvar_name() {
        assert_eq!(envvar_name("my-app_sub.cmd"), "MY_APP_SUB_CMD");
    }
}
