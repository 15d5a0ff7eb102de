//! Turning a manifest into a command tree

use crate::config::types::{ArgumentSpec, CommandSpec, Manifest, OptionSpec};
use crate::error::Result;
use crate::help;
use crate::model::{
    BoolType, Choice, Command, CommandBuilder, FloatType, IntType, ParamType, Parameter, PathType,
    StringType, Value,
};
use crate::runner::{ContextSettings, ShellCommand};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Where `run` scripts execute and with which interpreter
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Directory `run.dir` entries are relative to (the manifest's)
    pub base_dir: Option<PathBuf>,
    pub interpreter: Option<Vec<String>>,
}

impl BuildOptions {
    pub fn for_manifest(manifest: &Manifest, manifest_path: Option<&Path>) -> Self {
        BuildOptions {
            base_dir: manifest_path.and_then(Path::parent).map(Path::to_path_buf),
            interpreter: manifest.interpreter.clone(),
        }
    }
}

/// Build the root command of `manifest`, named `prog_name` unless the
/// manifest names itself
pub fn build_command(manifest: &Manifest, prog_name: &str, options: &BuildOptions) -> Result<Rc<Command>> {
    let name = manifest.name.as_deref().unwrap_or(prog_name);

    let mut settings = ContextSettings::new();
    if let Some(prefix) = &manifest.env_prefix {
        settings = settings.with_auto_envvar_prefix(prefix.clone());
    }
    if let Some(names) = &manifest.help_option_names {
        settings = settings.with_help_option_names(names.clone());
    }

    let mut builder = command_builder(name, &manifest.root, options)?.context_settings(settings);
    if let Some(version) = &manifest.version {
        builder = builder.param(help::version_option(version.clone()));
    }
    Ok(builder.build()?)
}

fn command_builder(
    name: &str,
    spec: &CommandSpec,
    options: &BuildOptions,
) -> Result<CommandBuilder> {
    let mut builder = Command::builder(name).hidden(spec.hidden);
    if spec.allow_extra_args {
        builder = builder.allow_extra_args(true);
    }
    if let Some(help) = &spec.help {
        builder = builder.help(help.clone());
    }
    if let Some(short_help) = &spec.short_help {
        builder = builder.short_help(short_help.clone());
    }
    if let Some(no_args_is_help) = spec.no_args_is_help {
        builder = builder.no_args_is_help(no_args_is_help);
    }

    for option in &spec.options {
        builder = builder.param(option_param(option));
    }
    for argument in &spec.arguments {
        builder = builder.param(argument_param(argument));
    }

    if !spec.commands.is_empty() {
        builder = builder
            .group()
            .invoke_without_command(spec.invoke_without_command);
        for (child_name, child) in &spec.commands {
            builder = builder.subcommand(command_builder(child_name, child, options)?.build()?);
        }
    }

    if let Some(run) = &spec.run {
        let mut shell = ShellCommand::new(run.script());
        if let Some(interpreter) = &options.interpreter {
            shell = shell.with_interpreter(interpreter.clone());
        }
        let base = options.base_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        match run.dir() {
            Some(dir) => shell = shell.with_dir(base.join(dir)),
            None if options.base_dir.is_some() => shell = shell.with_dir(base),
            None => {}
        }
        builder = builder.callback(move |ctx| shell.run(ctx));
    }

    Ok(builder)
}

/// The converter named by a manifest type, `None` to let the parameter
/// infer one
fn param_type(ty: Option<&str>, choices: &[String]) -> Option<Rc<dyn ParamType>> {
    if !choices.is_empty() {
        return Some(Rc::new(Choice::new(choices.iter().cloned())));
    }
    let ty: Rc<dyn ParamType> = match ty? {
        "string" | "str" => Rc::new(StringType),
        "int" | "integer" => Rc::new(IntType::new()),
        "float" => Rc::new(FloatType),
        "bool" | "boolean" => Rc::new(BoolType),
        "path" => Rc::new(PathType::new()),
        "file" => Rc::new(PathType::new().file_only()),
        "dir" => Rc::new(PathType::new().dir_only()),
        _ => return None,
    };
    Some(ty)
}

fn option_param(spec: &OptionSpec) -> Parameter {
    let ty = spec.option_type.as_deref();
    let long = if spec.negatable {
        format!("{}/--no-{}", spec.long(), spec.name.replace('_', "-"))
    } else {
        spec.long()
    };
    let mut decls = Vec::new();
    if let Some(short) = &spec.short {
        decls.push(format!("-{}", short));
    }
    decls.push(long);

    let mut param = Parameter::option(decls)
        .required(spec.required)
        .multiple(spec.multiple)
        .hidden(spec.hidden);

    match ty {
        Some("bool" | "boolean") => param = param.flag(),
        Some("count") => param = param.count(),
        _ => {
            if let Some(converter) = param_type(ty, &spec.choices) {
                param = param.ty_rc(converter);
            }
        }
    }
    if let Some(nargs) = spec.nargs {
        param = param.nargs(nargs);
    }
    if let Some(default) = &spec.default {
        param = param.default(Value::from(default));
    }
    if let Some(envvar) = &spec.envvar {
        param = param.envvar(envvar.clone());
    }
    if let Some(text) = &spec.prompt {
        param = if spec.secret {
            param.password_prompt(text.clone(), false)
        } else {
            param.prompt(text.clone())
        };
    }
    if let Some(help) = &spec.help {
        param = param.help(help.clone());
    }
    param
}

fn argument_param(spec: &ArgumentSpec) -> Parameter {
    let mut param = Parameter::argument(spec.name.clone());
    if let Some(converter) = param_type(spec.argument_type.as_deref(), &spec.choices) {
        param = param.ty_rc(converter);
    }
    if let Some(nargs) = spec.nargs {
        param = param.nargs(nargs);
    }
    if let Some(default) = &spec.default {
        param = param.default(Value::from(default));
    }
    if let Some(required) = spec.required {
        param = param.required(required);
    }
    if let Some(envvar) = &spec.envvar {
        param = param.envvar(envvar.clone());
    }
    if let Some(help) = &spec.help {
        param = param.help(help.clone());
    }
    param
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_manifest;
    use crate::runner::Context;

    fn build(yaml: &str) -> Rc<Command> {
        let manifest = parse_manifest(yaml).unwrap();
        build_command(&manifest, "tool", &BuildOptions::default()).unwrap()
    }

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tree_shape() {
        let cmd = build(
            r#"
help: Top
commands:
  greet:
    help: Say hello
  secret:
    hidden: true
"#,
        );
        assert_eq!(cmd.name(), "tool");
        assert!(cmd.is_group());
        let ctx = Context::new(cmd.clone(), "tool", None, ContextSettings::default());
        let names = cmd.children().unwrap().list_commands(&ctx);
        assert_eq!(names, vec!["greet", "secret"]);
    }

    #[test]
    fn test_manifest_name_wins() {
        let cmd = build("name: deploy\n");
        assert_eq!(cmd.name(), "deploy");
    }

    #[test]
    fn test_option_spellings_and_types() {
        let cmd = build(
            r#"
options:
  - name: dry_run
    short: n
    type: bool
    negatable: true
  - name: level
    type: int
    default: 2
  - name: verbose
    short: v
    type: count
  - name: color
    choices: [red, green]
"#,
        );
        let ctx = cmd
            .make_context("tool", argv(&["-n", "-vv", "--color", "red"]), None, ContextSettings::default())
            .unwrap();
        assert_eq!(ctx.value("dry_run"), Value::Bool(true));
        assert_eq!(ctx.value("level"), Value::Int(2));
        assert_eq!(ctx.value("verbose"), Value::Int(2));
        assert_eq!(ctx.value("color"), Value::from("red"));

        let ctx = cmd
            .make_context("tool", argv(&["--no-dry-run", "--level", "5"]), None, ContextSettings::default())
            .unwrap();
        assert_eq!(ctx.value("dry_run"), Value::Bool(false));
        assert_eq!(ctx.value("level"), Value::Int(5));
    }

    #[test]
    fn test_arguments() {
        let cmd = build(
            r#"
arguments:
  - name: src
  - name: dsts
    nargs: -1
"#,
        );
        let ctx = cmd
            .make_context("tool", argv(&["a", "b", "c"]), None, ContextSettings::default())
            .unwrap();
        assert_eq!(ctx.value("src"), Value::from("a"));
        assert_eq!(ctx.value("dsts").to_strings(), vec!["b", "c"]);
    }

    #[test]
    fn test_env_prefix() {
        std::env::set_var("BUILDTEST_TARGET", "from-env");
        let cmd = build("env_prefix: BUILDTEST\noptions:\n  - name: target\n");
        let ctx = cmd
            .make_context("tool", Vec::new(), None, ContextSettings::default())
            .unwrap();
        assert_eq!(ctx.value("target"), Value::from("from-env"));
        std::env::remove_var("BUILDTEST_TARGET");
    }

    #[test]
    fn test_run_callback_executes() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = parse_manifest(
            r#"
commands:
  touch:
    arguments:
      - name: file
    run: touch "${file}"
"#,
        )
        .unwrap();
        let options = BuildOptions {
            base_dir: Some(dir.path().to_path_buf()),
            interpreter: None,
        };
        let cmd = build_command(&manifest, "tool", &options).unwrap();
        cmd.dispatch("tool", argv(&["touch", "made.txt"])).unwrap();
        assert!(dir.path().join("made.txt").exists());
    }

    #[test]
    fn test_version_option() {
        let cmd = build("version: 1.0.0\n");
        let err = cmd.dispatch("tool", argv(&["--version"])).unwrap_err();
        assert!(matches!(err, crate::error::Error::Exit(0)));
    }
}
