//! Walking argv across nested command levels
//!
//! Each level is parsed into its own [`Context`]. A dispatch node takes the
//! first leftover token as its child's name, runs its own callback, then
//! hands the remaining tokens to the child.

use crate::error::{Error, Result, UsageError, UsageErrorKind};
use crate::help;
use crate::model::{split_opt, Command};
use crate::parser::{OptionParser, ParserConfig};
use crate::runner::context::{Context, ContextSettings};
use crate::runner::scheduler;
use log::debug;
use std::rc::Rc;

impl Command {
    /// Create a context for this command and parse `args` into it.
    ///
    /// `extra` overrides both the command's own settings and anything
    /// inherited from `parent`.
    pub fn make_context(
        self: &Rc<Self>,
        info_name: &str,
        args: Vec<String>,
        parent: Option<&Rc<Context>>,
        extra: ContextSettings,
    ) -> Result<Rc<Context>> {
        let settings = self.settings.merged(&extra);
        let ctx = Context::new(self.clone(), info_name, parent, settings);
        let parsed = {
            let _guard = ctx.scope_with(false);
            self.parse_args(&ctx, args)
        };
        if let Err(err) = parsed {
            // No callback will run at this level; release what parameter
            // callbacks registered.
            ctx.close();
            return Err(ctx.attach_level(err));
        }
        Ok(ctx)
    }

    /// Parse this level's parameters and leave the rest in the context.
    /// Returns the arguments left for a child.
    pub fn parse_args(&self, ctx: &Context, args: Vec<String>) -> Result<Vec<String>> {
        if args.is_empty() && self.no_args_is_help && !ctx.resilient_parsing() {
            print!("{}", help::render(ctx));
            return Err(ctx.exit(0));
        }

        let params = self.get_params(ctx);
        let config = ParserConfig {
            allow_interspersed_args: ctx.allow_interspersed_args(),
            ignore_unknown_options: ctx.ignore_unknown_options(),
            negative_numbers: ctx.negative_numbers(),
            resilient: ctx.resilient_parsing(),
            normalize: ctx.token_normalize().cloned(),
        };
        let parser = OptionParser::new(&params, config);
        let parsed = parser.parse_args(&args)?;
        scheduler::process_params(ctx, &params, &parsed)?;

        let mut rest = parsed.leftovers;
        ctx.add_opt_prefixes(&parsed.prefixes);

        if self.is_group() {
            if !rest.is_empty() {
                let tail = rest.split_off(1);
                ctx.set_protected_args(rest);
                ctx.set_args(tail);
            } else {
                ctx.set_args(Vec::new());
            }
            return Ok(ctx.args());
        }

        if !rest.is_empty() && !ctx.allow_extra_args() && !ctx.resilient_parsing() {
            return Err(Error::Usage(UsageError::new(
                UsageErrorKind::UnexpectedExtraArgs(rest),
            )));
        }
        ctx.set_args(rest.clone());
        Ok(rest)
    }

    /// Run this level: a leaf runs its callback, a dispatch node resolves
    /// and invokes its child
    pub fn invoke(self: &Rc<Self>, ctx: &Rc<Context>) -> Result<()> {
        if !self.is_group() {
            return self.invoke_callback(ctx);
        }

        let mut args = ctx.protected_args();
        if args.is_empty() {
            if self.invoke_without_command {
                return self.invoke_callback(ctx);
            }
            print!("{}", help::render(ctx));
            return Err(ctx.exit(0));
        }
        args.extend(ctx.args());
        ctx.set_protected_args(Vec::new());
        ctx.set_args(Vec::new());

        let _guard = ctx.scope();
        let (name, command, rest) = self.resolve_command(ctx, args)?;
        let (name, command) = match (name, command) {
            (Some(name), Some(command)) => (name, command),
            _ => return Err(ctx.usage_error(UsageErrorKind::MissingCommand)),
        };
        ctx.set_invoked_subcommand(Some(name.clone()));
        self.invoke_callback(ctx)?;

        debug!("dispatching to '{}'", name);
        let sub_ctx = command.make_context(&name, rest, Some(ctx), ContextSettings::default())?;
        let _sub_guard = sub_ctx.scope();
        command.invoke(&sub_ctx)
    }

    fn invoke_callback(&self, ctx: &Rc<Context>) -> Result<()> {
        let callback = match &self.callback {
            Some(callback) => callback.clone(),
            None => return Ok(()),
        };
        let _guard = ctx.scope();
        callback(ctx).map_err(|err| ctx.attach_level(err))
    }

    /// Split the child name off `args` and resolve it. Unknown names fail,
    /// except in resilient mode where `(None, None, rest)` comes back.
    pub fn resolve_command(
        &self,
        ctx: &Context,
        args: Vec<String>,
    ) -> Result<(Option<String>, Option<Rc<Command>>, Vec<String>)> {
        let mut args = args.into_iter();
        let original = match args.next() {
            Some(name) => name,
            None => return Ok((None, None, Vec::new())),
        };
        let rest: Vec<String> = args.collect();
        let children = match self.children() {
            Some(children) => children,
            None => return Ok((None, None, rest)),
        };

        let mut name = original.clone();
        let mut command = children.get_command(ctx, &name)?;
        if command.is_none() && ctx.token_normalize().is_some() {
            name = ctx.normalize_token(&name);
            command = children.get_command(ctx, &name)?;
        }

        match command {
            Some(command) => Ok((Some(name), Some(command), rest)),
            None if ctx.resilient_parsing() => Ok((None, None, rest)),
            None => {
                let kind = if split_opt(&name).0.is_empty() {
                    UsageErrorKind::NoSuchCommand(original)
                } else {
                    UsageErrorKind::NoSuchOption { name }
                };
                Err(ctx.usage_error(kind))
            }
        }
    }

    /// Parse `args` and run the whole tree under `prog_name`.
    ///
    /// Errors come back unprinted; [`Command::main`](crate::cli) is the
    /// handler that prints them and maps them to exit codes.
    pub fn dispatch(self: &Rc<Self>, prog_name: &str, args: Vec<String>) -> Result<()> {
        self.dispatch_with(prog_name, args, ContextSettings::default())
    }

    pub fn dispatch_with(
        self: &Rc<Self>,
        prog_name: &str,
        args: Vec<String>,
        extra: ContextSettings,
    ) -> Result<()> {
        let ctx = self.make_context(prog_name, args, None, extra)?;
        let _guard = ctx.scope();
        self.invoke(&ctx)
    }
}
