//! Candidate generation for a partial command line

use crate::completion::{CompletionItem, CompletionKind};
use crate::error::Result;
use crate::model::{Command, Parameter};
use crate::parser::tokens::first_char;
use crate::runner::{Context, ContextSettings, ParameterSource};
use log::debug;
use std::rc::Rc;

/// What the word being completed belongs to
#[derive(Debug, Clone)]
pub enum Target {
    /// A child name or an option spelling of the active command
    Command,
    /// A value for this parameter
    Parameter(Parameter),
}

/// Parse the completed words in resilient mode, descending into children
/// as far as the words name them.
///
/// Returns the whole context chain, root first; the last entry is the
/// active level. Parents are only weakly linked, so the chain keeps them
/// alive.
pub fn resolve_context(
    cli: &Rc<Command>,
    prog_name: &str,
    args: &[String],
    extra: ContextSettings,
) -> Result<Vec<Rc<Context>>> {
    let settings = extra.with_resilient_parsing(true);
    let root = cli.make_context(prog_name, args.to_vec(), None, settings)?;
    let mut remaining = [root.protected_args(), root.args()].concat();
    let mut chain = vec![root];

    while !remaining.is_empty() {
        let ctx = match chain.last() {
            Some(ctx) => ctx.clone(),
            None => break,
        };
        let command = ctx.command().clone();
        if !command.is_group() {
            break;
        }
        let (name, child, rest) = command.resolve_command(&ctx, remaining)?;
        let (name, child) = match (name, child) {
            (Some(name), Some(child)) => (name, child),
            _ => break,
        };
        let sub = child.make_context(&name, rest, Some(&ctx), ContextSettings::default())?;
        remaining = [sub.protected_args(), sub.args()].concat();
        chain.push(sub);
    }

    Ok(chain)
}

fn start_of_option(ctx: &Context, value: &str) -> bool {
    !value.is_empty() && ctx.opt_prefixes().contains(first_char(value))
}

/// Whether the last words are an option still waiting for its values
fn is_incomplete_option(ctx: &Context, args: &[String], param: &Parameter) -> bool {
    if !param.takes_value() {
        return false;
    }
    let mut last_option = None;
    for (index, arg) in args.iter().rev().enumerate() {
        if index + 1 > param.get_nargs().max(1) as usize {
            break;
        }
        if start_of_option(ctx, arg) {
            last_option = Some(arg);
        }
    }
    last_option.map_or(false, |opt| param.opts().contains(opt))
}

/// Whether an argument can still take the word being completed
fn is_incomplete_argument(ctx: &Context, param: &Parameter) -> bool {
    if !param.is_argument() {
        return false;
    }
    let nargs = param.get_nargs();
    if nargs == -1 || ctx.get_parameter_source(param.name()) != Some(ParameterSource::CommandLine) {
        return true;
    }
    match ctx.value(param.name()).as_list() {
        Some(items) => nargs > 1 && items.len() < nargs as usize,
        None => false,
    }
}

/// Decide what the fragment `incomplete` completes. `args` are the
/// completed words; an `--opt=frag` fragment is split and the option moves
/// into `args`.
pub fn resolve_incomplete(ctx: &Context, args: &mut Vec<String>, incomplete: &str) -> (Target, String) {
    let mut incomplete = incomplete.to_string();
    if incomplete == "=" {
        incomplete.clear();
    } else if incomplete.contains('=') && start_of_option(ctx, &incomplete) {
        if let Some((name, value)) = incomplete.clone().split_once('=') {
            args.push(name.to_string());
            incomplete = value.to_string();
        }
    }

    if !args.iter().any(|a| a == "--") && start_of_option(ctx, &incomplete) {
        return (Target::Command, incomplete);
    }

    let params = ctx.command().get_params(ctx);
    if let Some(param) = params.iter().find(|p| is_incomplete_option(ctx, args, p)) {
        return (Target::Parameter(param.clone()), incomplete);
    }
    if let Some(param) = params.iter().find(|p| is_incomplete_argument(ctx, p)) {
        return (Target::Parameter(param.clone()), incomplete);
    }
    (Target::Command, incomplete)
}

fn matches(value: &str, incomplete: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        value.starts_with(incomplete)
    } else {
        value.to_lowercase().starts_with(&incomplete.to_lowercase())
    }
}

/// Child names, then option spellings when the fragment looks like one
fn command_candidates(ctx: &Context, incomplete: &str) -> Vec<CompletionItem> {
    let command = ctx.command();
    let mut results = Vec::new();

    if let Some(children) = command.children() {
        for name in children.list_commands(ctx) {
            if !name.starts_with(incomplete) {
                continue;
            }
            match children.get_command(ctx, &name) {
                Ok(Some(child)) if !child.is_hidden() => {
                    let mut item = CompletionItem::new(name);
                    item.help = child.short_help();
                    results.push(item);
                }
                Ok(_) => {}
                Err(err) => debug!("skipping '{}' in completion: {}", name, err),
            }
        }
    }

    let option_like = incomplete
        .chars()
        .next()
        .map_or(false, |c| !c.is_alphanumeric());
    if option_like {
        for param in command.get_params(ctx) {
            let used = !param.is_multiple()
                && ctx.get_parameter_source(param.name()) == Some(ParameterSource::CommandLine);
            if !param.is_option() || param.is_hidden() || used {
                continue;
            }
            for name in param.opts().iter().chain(param.secondary_opts()) {
                if name.starts_with(incomplete) {
                    let mut item = CompletionItem::new(name.clone());
                    item.help = param.get_help().map(str::to_string);
                    results.push(item);
                }
            }
        }
    }

    results
}

/// Candidates for `incomplete`, given the completed words `args` after the
/// program name
pub fn complete(
    cli: &Rc<Command>,
    prog_name: &str,
    args: &[String],
    incomplete: &str,
    extra: ContextSettings,
) -> Result<Vec<CompletionItem>> {
    let chain = resolve_context(cli, prog_name, args, extra)?;
    let ctx = match chain.last() {
        Some(ctx) => ctx,
        None => return Ok(Vec::new()),
    };
    let mut args = args.to_vec();
    let (target, incomplete) = resolve_incomplete(ctx, &mut args, incomplete);
    debug!(
        "completing '{}' at level '{}'",
        incomplete,
        ctx.command_path()
    );

    let items = match target {
        Target::Command => command_candidates(ctx, &incomplete),
        Target::Parameter(param) => {
            let case_sensitive = param.param_type().case_sensitive_completion();
            param
                .complete_value(ctx, &incomplete)
                .into_iter()
                .filter(|item| {
                    item.kind != CompletionKind::Plain
                        || matches(&item.value, &incomplete, case_sensitive)
                })
                .collect()
        }
    };
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Choice, PathType};

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn values(items: Vec<CompletionItem>) -> Vec<String> {
        items.into_iter().map(|i| i.value).collect()
    }

    fn cli() -> Rc<Command> {
        let sub1 = Command::builder("sub1")
            .help("First sub")
            .param(Parameter::option(["--color"]).ty(Choice::new(["red", "green", "Grey"])))
            .param(Parameter::option(["--out"]).ty(PathType::new().dir_only()))
            .param(Parameter::option(["--tag"]).multiple(true))
            .param(Parameter::option(["--once"]))
            .param(Parameter::option(["--secret"]).hidden(true))
            .param(Parameter::argument("mode").ty(Choice::new(["fast", "slow"])))
            .build()
            .unwrap();
        let sub2 = Command::builder("sub2").build().unwrap();
        let other = Command::builder("other").build().unwrap();
        let hidden = Command::builder("sub3").hidden(true).build().unwrap();
        Command::builder("prog")
            .param(Parameter::option(["-v", "--verbose"]).flag())
            .subcommand(sub1)
            .subcommand(sub2)
            .subcommand(other)
            .subcommand(hidden)
            .build()
            .unwrap()
    }

    fn run(args: &[&str], incomplete: &str) -> Vec<String> {
        values(complete(&cli(), "prog", &argv(args), incomplete, ContextSettings::default()).unwrap())
    }

    #[test]
    fn test_child_names_by_prefix() {
        assert_eq!(run(&[], "su"), vec!["sub1", "sub2"]);
        assert_eq!(run(&["-v"], ""), vec!["other", "sub1", "sub2"]);
    }

    #[test]
    fn test_child_help_is_short_help() {
        let items = complete(&cli(), "prog", &[], "sub1", ContextSettings::default()).unwrap();
        assert_eq!(items[0].help.as_deref(), Some("First sub"));
    }

    #[test]
    fn test_option_names() {
        assert_eq!(run(&[], "--"), vec!["--verbose", "--help"]);
        assert_eq!(run(&["sub1"], "--c"), vec!["--color"]);
    }

    #[test]
    fn test_used_options_excluded() {
        let opts = run(&["sub1", "--once", "x", "--tag", "a"], "--");
        assert!(!opts.contains(&"--once".to_string()));
        assert!(opts.contains(&"--tag".to_string()));
        assert!(!opts.contains(&"--secret".to_string()));
    }

    #[test]
    fn test_option_value_choices() {
        assert_eq!(run(&["sub1", "--color"], "g"), vec!["green"]);
        assert_eq!(run(&["sub1"], "--color=r"), vec!["red"]);
    }

    #[test]
    fn test_path_value_kind() {
        let items = complete(
            &cli(),
            "prog",
            &argv(&["sub1", "--out"]),
            "sr",
            ContextSettings::default(),
        )
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, CompletionKind::Dir);
    }

    #[test]
    fn test_argument_choices() {
        assert_eq!(run(&["sub1"], "f"), vec!["fast"]);
        assert!(run(&["sub1", "fast"], "").is_empty());
    }

    #[test]
    fn test_no_command_callbacks() {
        let cmd = Command::builder("prog")
            .param(Parameter::option(["--boom"]).flag().callback(|ctx, _p, v| {
                assert!(ctx.resilient_parsing());
                Ok(v)
            }))
            .callback(|_ctx| panic!("command callbacks never run while completing"))
            .build()
            .unwrap();
        let result = complete(&cmd, "prog", &argv(&["--boom"]), "--", ContextSettings::default()).unwrap();
        assert_eq!(values(result), vec!["--help"]);
    }

    #[test]
    fn test_unknown_child_completes_at_parent() {
        assert_eq!(run(&["nope"], "su"), vec!["sub1", "sub2"]);
    }

    #[test]
    fn test_resolve_context_chain() {
        let chain =
            resolve_context(&cli(), "prog", &argv(&["-v", "sub1", "--color", "red"]), ContextSettings::default())
                .unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].command_path(), "prog sub1");
        assert!(chain[1].resilient_parsing());
    }
}
