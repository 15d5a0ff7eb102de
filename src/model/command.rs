//! Command descriptors and their builder

use crate::error::{ConfigError, ConfigResult, Result};
use crate::help;
use crate::model::source::{CommandCollection, CommandSource, StaticCommands};
use crate::model::{ParamKind, Parameter};
use crate::runner::{Context, ContextSettings};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// The function a command runs once its parameters are resolved
pub type CommandCallback = Rc<dyn Fn(&Context) -> Result<()>>;

/// An immutable command: leaf, or dispatch node when it has children
pub struct Command {
    pub(crate) name: String,
    pub(crate) help: Option<String>,
    pub(crate) short_help: Option<String>,
    pub(crate) params: Vec<Parameter>,
    pub(crate) callback: Option<CommandCallback>,
    pub(crate) hidden: bool,
    pub(crate) no_args_is_help: bool,
    pub(crate) add_help_option: bool,
    pub(crate) allow_extra_args: bool,
    pub(crate) allow_interspersed_args: bool,
    pub(crate) ignore_unknown_options: bool,
    pub(crate) invoke_without_command: bool,
    pub(crate) settings: ContextSettings,
    pub(crate) children: Option<Box<dyn CommandSource>>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("hidden", &self.hidden)
            .field("group", &self.children.is_some())
            .finish()
    }
}

impl Command {
    pub fn builder(name: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Explicit short help, else the first line of the help text
    pub fn short_help(&self) -> Option<String> {
        self.short_help.clone().or_else(|| {
            self.help
                .as_deref()
                .and_then(|h| h.lines().map(str::trim).find(|l| !l.is_empty()))
                .map(str::to_string)
        })
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_group(&self) -> bool {
        self.children.is_some()
    }

    pub fn children(&self) -> Option<&dyn CommandSource> {
        self.children.as_deref()
    }

    pub fn invoke_without_command(&self) -> bool {
        self.invoke_without_command
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// Declared parameters plus the help option for this context
    pub fn get_params(&self, ctx: &Context) -> Vec<Parameter> {
        let mut params = self.params.clone();
        if let Some(help) = self.get_help_option(ctx) {
            params.push(help);
        }
        params
    }

    pub fn get_help_option(&self, ctx: &Context) -> Option<Parameter> {
        if !self.add_help_option {
            return None;
        }
        let taken: HashSet<&str> = self
            .params
            .iter()
            .flat_map(|p| p.opts.iter().chain(p.secondary_opts.iter()))
            .map(String::as_str)
            .collect();
        let names: Vec<String> = ctx
            .help_option_names()
            .into_iter()
            .filter(|n| !taken.contains(n.as_str()))
            .collect();
        help::help_option(names)
    }
}

/// Accumulates a command definition; [`CommandBuilder::build`] validates it
/// and freezes it behind an `Rc`.
pub struct CommandBuilder {
    name: String,
    help: Option<String>,
    short_help: Option<String>,
    params: Vec<Parameter>,
    callback: Option<CommandCallback>,
    hidden: bool,
    no_args_is_help: Option<bool>,
    add_help_option: bool,
    allow_extra_args: Option<bool>,
    allow_interspersed_args: Option<bool>,
    ignore_unknown_options: bool,
    invoke_without_command: bool,
    settings: ContextSettings,
    group: bool,
    commands: StaticCommands,
    sources: Vec<Box<dyn CommandSource>>,
}

impl CommandBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        CommandBuilder {
            name: name.into(),
            help: None,
            short_help: None,
            params: Vec::new(),
            callback: None,
            hidden: false,
            no_args_is_help: None,
            add_help_option: true,
            allow_extra_args: None,
            allow_interspersed_args: None,
            ignore_unknown_options: false,
            invoke_without_command: false,
            settings: ContextSettings::default(),
            group: false,
            commands: StaticCommands::new(),
            sources: Vec::new(),
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn short_help(mut self, short_help: impl Into<String>) -> Self {
        self.short_help = Some(short_help.into());
        self
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn callback(mut self, callback: impl Fn(&Context) -> Result<()> + 'static) -> Self {
        self.callback = Some(Rc::new(callback));
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Show help instead of parsing when argv is empty
    pub fn no_args_is_help(mut self, value: bool) -> Self {
        self.no_args_is_help = Some(value);
        self
    }

    pub fn add_help_option(mut self, value: bool) -> Self {
        self.add_help_option = value;
        self
    }

    pub fn allow_extra_args(mut self, value: bool) -> Self {
        self.allow_extra_args = Some(value);
        self
    }

    pub fn allow_interspersed_args(mut self, value: bool) -> Self {
        self.allow_interspersed_args = Some(value);
        self
    }

    pub fn ignore_unknown_options(mut self, value: bool) -> Self {
        self.ignore_unknown_options = value;
        self
    }

    pub fn context_settings(mut self, settings: ContextSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Make this a dispatch node even before any child is added
    pub fn group(mut self) -> Self {
        self.group = true;
        self
    }

    /// Run this node's callback even when no child was named
    pub fn invoke_without_command(mut self, value: bool) -> Self {
        self.group = true;
        self.invoke_without_command = value;
        self
    }

    pub fn subcommand(mut self, command: Rc<Command>) -> Self {
        self.group = true;
        self.commands.add(command);
        self
    }

    /// Add a child registry; static children are consulted first, then
    /// sources in the order they were added
    pub fn source(mut self, source: impl CommandSource + 'static) -> Self {
        self.group = true;
        self.sources.push(Box::new(source));
        self
    }

    pub fn build(self) -> ConfigResult<Rc<Command>> {
        let mut params = Vec::with_capacity(self.params.len());
        for param in self.params {
            params.push(param.finalize()?);
        }
        validate_params(&self.name, &params)?;

        let children: Option<Box<dyn CommandSource>> = if !self.group {
            None
        } else if self.sources.is_empty() {
            Some(Box::new(self.commands))
        } else if self.commands.is_empty() && self.sources.len() == 1 {
            self.sources.into_iter().next()
        } else {
            let mut collection = CommandCollection::new();
            if !self.commands.is_empty() {
                collection.push(Box::new(self.commands));
            }
            for source in self.sources {
                collection.push(source);
            }
            Some(Box::new(collection))
        };
        let is_group = children.is_some();

        Ok(Rc::new(Command {
            name: self.name,
            help: self.help,
            short_help: self.short_help,
            params,
            callback: self.callback,
            hidden: self.hidden,
            no_args_is_help: self
                .no_args_is_help
                .unwrap_or(is_group && !self.invoke_without_command),
            add_help_option: self.add_help_option,
            allow_extra_args: self.allow_extra_args.unwrap_or(is_group),
            allow_interspersed_args: self.allow_interspersed_args.unwrap_or(!is_group),
            ignore_unknown_options: self.ignore_unknown_options,
            invoke_without_command: self.invoke_without_command,
            settings: self.settings,
            children,
        }))
    }
}

/// Unique destinations; at most one variadic argument and it comes last
fn validate_params(command: &str, params: &[Parameter]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for param in params {
        if !seen.insert(param.name()) {
            return Err(ConfigError::DuplicateNames(
                param.name().to_string(),
                command.to_string(),
            ));
        }
    }

    let arguments: Vec<&Parameter> = params
        .iter()
        .filter(|p| p.kind() == ParamKind::Argument)
        .collect();
    for (idx, arg) in arguments.iter().enumerate() {
        if arg.get_nargs() == -1 && idx + 1 != arguments.len() {
            return Err(ConfigError::VariadicNotLast(arg.name().to_string()));
        }
    }

    Ok(())
}
