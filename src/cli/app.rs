//! Top-level handlers
//!
//! [`Command::main`] is what a program built on this crate calls from its
//! `main`: it answers shell completion requests, dispatches, and turns errors
//! into messages on stderr and an exit code. [`run`] is the `clasp` binary,
//! which builds its command tree from a YAML manifest.

use crate::completion::handle_completion;
use crate::config::{
    build_command, find_manifest, load_dotenv, parse_manifest_file, BuildOptions,
};
use crate::error::{Error, Result};
use crate::model::{Command, Parameter, PathType, Value};
use crate::runner::ContextSettings;
use anyhow::Context as _;
use colored::Colorize;
use log::{debug, LevelFilter};
use std::env;
use std::path::{Path, PathBuf};
use std::rc::Rc;

impl Command {
    /// Run as the program entry point and return the process exit code
    pub fn main(self: &Rc<Self>, prog_name: &str, args: Vec<String>) -> i32 {
        self.main_with(prog_name, args, ContextSettings::default())
    }

    /// [`Command::main`] with extra root context settings
    pub fn main_with(self: &Rc<Self>, prog_name: &str, args: Vec<String>, extra: ContextSettings) -> i32 {
        if let Some(code) = handle_completion(self, prog_name, extra.clone()) {
            return code;
        }
        match self.dispatch_with(prog_name, args, extra) {
            Ok(()) => 0,
            Err(err) => report_error(&err),
        }
    }

    /// [`Command::main`] with the process arguments; the program name is
    /// the file name of `argv[0]`
    pub fn run(self: &Rc<Self>) -> i32 {
        let mut argv = env::args();
        let prog_name = argv
            .next()
            .as_deref()
            .and_then(|p| Path::new(p).file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name().to_string());
        self.main(&prog_name, argv.collect())
    }
}

/// The text printed to stderr for `err`, or `None` when nothing is printed
pub fn render_error(err: &Error) -> Option<String> {
    match err {
        Error::Exit(_) => None,
        Error::Abort => Some("Aborted!".to_string()),
        Error::Usage(usage) => {
            let mut out = String::new();
            if let Some(line) = &usage.usage {
                out.push_str(line);
                out.push('\n');
            }
            if let Some(hint) = usage.help_hint() {
                out.push_str(&hint);
                out.push('\n');
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("{} {}", "Error:".red().bold(), usage.format_message()));
            Some(out)
        }
        other => Some(format!("{} {}", "Error:".red().bold(), other)),
    }
}

/// Print `err` the way the top-level handler does and return its exit code
pub fn report_error(err: &Error) -> i32 {
    if let Some(text) = render_error(err) {
        eprintln!("{}", text);
    }
    err.exit_code()
}

/// Options of the `clasp` binary itself, parsed ahead of the manifest's
/// command tree. Unknown options and everything from the first positional
/// on are left for the manifest.
fn launcher() -> Result<Rc<Command>> {
    Ok(Command::builder("clasp")
        .param(
            Parameter::option(["-f", "--file"])
                .ty(PathType::new())
                .help("Manifest to load instead of searching for clasp.yml"),
        )
        .param(
            Parameter::option(["-v", "--verbose"])
                .count()
                .help("Log more; repeat for more detail"),
        )
        .add_help_option(false)
        .allow_extra_args(true)
        .allow_interspersed_args(false)
        .ignore_unknown_options(true)
        .build()?)
}

fn init_logging(verbosity: i64) {
    let mut builder = env_logger::Builder::from_default_env();
    let level = match verbosity {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };
    if let Some(level) = level {
        builder.filter_level(level);
    }
    let _ = builder.try_init();
}

/// Entry point of the `clasp` binary; returns the exit code
pub fn run() -> anyhow::Result<i32> {
    let args: Vec<String> = env::args().skip(1).collect();
    run_with_args(args)
}

/// [`run`] with explicit arguments (without the program name)
pub fn run_with_args(args: Vec<String>) -> anyhow::Result<i32> {
    let launcher = launcher()?;
    let ctx = match launcher.make_context("clasp", args, None, ContextSettings::default()) {
        Ok(ctx) => ctx,
        Err(err) => return Ok(report_error(&err)),
    };
    init_logging(ctx.value("verbose").as_int().unwrap_or(0));

    let manifest_path: PathBuf = match ctx.value("file") {
        Value::Path(path) => path,
        _ => find_manifest()?,
    };
    debug!("using manifest {}", manifest_path.display());

    let manifest = parse_manifest_file(&manifest_path)
        .with_context(|| format!("failed to load {}", manifest_path.display()))?;
    load_dotenv(&manifest_path)?;

    let options = BuildOptions::for_manifest(&manifest, Some(&manifest_path));
    let cli = build_command(&manifest, "clasp", &options)?;
    let prog_name = cli.name().to_string();
    Ok(cli.main(&prog_name, ctx.args()))
}
