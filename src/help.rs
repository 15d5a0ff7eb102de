//! Usage lines and help pages
//!
//! Deliberately plain: a usage line, the command's help text, then the
//! visible options and subcommands in two columns.

use crate::error::Error;
use crate::model::Parameter;
use crate::runner::Context;

const MAX_FIRST_COLUMN: usize = 30;

/// `Usage: prog sub [OPTIONS] SRC [DSTS]...`
pub fn usage_line(ctx: &Context) -> String {
    let command = ctx.command();
    let mut pieces = vec![format!("Usage: {}", ctx.command_path())];
    if command.params().iter().any(|p| p.is_option()) || command.add_help_option {
        pieces.push("[OPTIONS]".to_string());
    }
    for param in command.params().iter().filter(|p| p.is_argument()) {
        pieces.push(param.make_metavar());
    }
    if command.is_group() {
        pieces.push("COMMAND [ARGS]...".to_string());
    }
    pieces.join(" ")
}

fn option_label(param: &Parameter) -> String {
    let mut label = param.opts().join(", ");
    if !param.secondary_opts().is_empty() {
        label = format!("{} / {}", label, param.secondary_opts().join(", "));
    }
    if param.takes_value() {
        label = format!("{} {}", label, param.make_metavar());
    }
    label
}

fn write_rows(out: &mut String, title: &str, rows: &[(String, String)]) {
    if rows.is_empty() {
        return;
    }
    let width = rows
        .iter()
        .map(|(first, _)| first.chars().count())
        .filter(|w| *w <= MAX_FIRST_COLUMN)
        .max()
        .unwrap_or(0);
    out.push_str(&format!("\n{}:\n", title));
    for (first, second) in rows {
        if second.is_empty() {
            out.push_str(&format!("  {}\n", first));
        } else if first.chars().count() > MAX_FIRST_COLUMN {
            out.push_str(&format!("  {}\n  {:width$}  {}\n", first, "", second, width = width));
        } else {
            out.push_str(&format!("  {:width$}  {}\n", first, second, width = width));
        }
    }
}

/// The full help page for the context's command
pub fn render(ctx: &Context) -> String {
    let command = ctx.command();
    let mut out = usage_line(ctx);
    out.push('\n');

    if let Some(help) = command.help() {
        out.push('\n');
        for line in help.trim().lines() {
            if line.trim().is_empty() {
                out.push('\n');
            } else {
                out.push_str(&format!("  {}\n", line.trim()));
            }
        }
    }

    let options: Vec<(String, String)> = command
        .get_params(ctx)
        .iter()
        .filter(|p| p.is_option() && !p.is_hidden())
        .map(|p| (option_label(p), p.get_help().unwrap_or_default().to_string()))
        .collect();
    write_rows(&mut out, "Options", &options);

    if let Some(children) = command.children() {
        let mut rows = Vec::new();
        for name in children.list_commands(ctx) {
            if let Ok(Some(child)) = children.get_command(ctx, &name) {
                if !child.is_hidden() {
                    rows.push((name, child.short_help().unwrap_or_default()));
                }
            }
        }
        write_rows(&mut out, "Commands", &rows);
    }

    out
}

/// The built-in help flag for the given spellings; prints the help page
/// and exits unless parsing is resilient
pub fn help_option(names: Vec<String>) -> Option<Parameter> {
    if names.is_empty() {
        return None;
    }
    Parameter::option(names)
        .flag()
        .eager(true)
        .expose_value(false)
        .help("Show this message and exit.")
        .callback(|ctx, _param, value| {
            if value.as_bool() == Some(true) && !ctx.resilient_parsing() {
                print!("{}", render(ctx));
                return Err(Error::Exit(0));
            }
            Ok(value)
        })
        .finalize()
        .ok()
}

/// A `--version` flag printing `<prog>, version <version>`
pub fn version_option(version: impl Into<String>) -> Parameter {
    let version = version.into();
    Parameter::option(["--version"])
        .flag()
        .eager(true)
        .expose_value(false)
        .help("Show the version and exit.")
        .callback(move |ctx, _param, value| {
            if value.as_bool() == Some(true) && !ctx.resilient_parsing() {
                println!("{}, version {}", ctx.find_root().info_name(), version);
                return Err(Error::Exit(0));
            }
            Ok(value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Command;
    use crate::runner::ContextSettings;
    use std::rc::Rc;

    fn sample() -> Rc<Command> {
        let hidden = Command::builder("secret").hidden(true).build().unwrap();
        let sub = Command::builder("sync")
            .help("Sync the tree.\n\nMore detail.")
            .build()
            .unwrap();
        Command::builder("prog")
            .help("Top level tool.")
            .param(Parameter::option(["-n", "--name"]).help("Who to greet"))
            .param(Parameter::option(["--token"]).hidden(true))
            .subcommand(sub)
            .subcommand(hidden)
            .build()
            .unwrap()
    }

    #[test]
    fn test_usage_line() {
        let cmd = Command::builder("cp")
            .param(Parameter::argument("src"))
            .param(Parameter::argument("dsts").nargs(-1))
            .build()
            .unwrap();
        let ctx = Context::new(cmd, "cp", None, ContextSettings::default());
        assert_eq!(usage_line(&ctx), "Usage: cp [OPTIONS] SRC [DSTS]...");
    }

    #[test]
    fn test_render_hides_hidden_entries() {
        let ctx = Context::new(sample(), "prog", None, ContextSettings::default());
        let page = render(&ctx);
        assert!(page.starts_with("Usage: prog [OPTIONS] COMMAND [ARGS]...\n"));
        assert!(page.contains("Top level tool."));
        assert!(page.contains("-n, --name TEXT"));
        assert!(page.contains("Who to greet"));
        assert!(page.contains("--help"));
        assert!(page.contains("sync"));
        assert!(page.contains("Sync the tree."));
        assert!(!page.contains("More detail."));
        assert!(!page.contains("--token"));
        assert!(!page.contains("secret"));
    }

    #[test]
    fn test_help_option_names_configurable() {
        let cmd = Command::builder("prog").build().unwrap();
        let settings = ContextSettings::new().with_help_option_names(["-h", "--help"]);
        let ctx = Context::new(cmd.clone(), "prog", None, settings);
        let help = cmd.get_help_option(&ctx).unwrap();
        assert_eq!(help.opts(), ["-h", "--help"]);
        assert!(help.is_eager());
    }

    #[test]
    fn test_help_exits_zero() {
        let cmd = sample();
        let err = cmd
            .dispatch("prog", vec!["--help".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::Exit(0)));
    }

    #[test]
    fn test_version_option() {
        let cmd = Command::builder("prog")
            .param(version_option("1.2.3"))
            .build()
            .unwrap();
        let err = cmd
            .dispatch("prog", vec!["--version".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::Exit(0)));
    }
}
