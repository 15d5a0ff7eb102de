//! Manifest validation
//!
//! Catches mistakes the command builder can't phrase well: unknown type
//! names, malformed spellings, and conflicting settings.

use crate::config::types::{ArgumentSpec, CommandSpec, Manifest, OptionSpec};
use crate::error::{ConfigError, ConfigResult};
use std::collections::HashSet;

const TYPES: &[&str] = &[
    "string", "str", "int", "integer", "float", "bool", "boolean", "count", "path", "file", "dir",
    "choice",
];

/// Validate a whole manifest
pub fn validate_manifest(manifest: &Manifest) -> ConfigResult<()> {
    let root_name = manifest.name.as_deref().unwrap_or("root");
    validate_command(root_name, &manifest.root)
}

/// Validate one command and, recursively, its subcommands
pub fn validate_command(path: &str, spec: &CommandSpec) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for name in spec
        .options
        .iter()
        .map(|o| &o.name)
        .chain(spec.arguments.iter().map(|a| &a.name))
    {
        validate_name(name)?;
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::DuplicateNames(name.clone(), path.to_string()));
        }
    }

    for option in &spec.options {
        validate_option(option)?;
    }
    for argument in &spec.arguments {
        validate_argument(argument)?;
    }

    if let Some(pos) = spec.arguments.iter().position(|a| a.nargs == Some(-1)) {
        if pos + 1 != spec.arguments.len() {
            return Err(ConfigError::VariadicNotLast(spec.arguments[pos].name.clone()));
        }
    }

    if spec.invoke_without_command && spec.commands.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "'{}' sets invoke_without_command but has no commands",
            path
        )));
    }

    for (name, child) in &spec.commands {
        validate_name(name)?;
        validate_command(&format!("{} {}", path, name), child)?;
    }
    Ok(())
}

fn validate_name(name: &str) -> ConfigResult<()> {
    let valid = name
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("'{}' is not a valid name", name)))
    }
}

/// Check a type name and its choices
fn validate_type(owner: &str, ty: Option<&str>, choices: &[String]) -> ConfigResult<()> {
    if let Some(ty) = ty {
        if !TYPES.contains(&ty) {
            return Err(ConfigError::Invalid(format!(
                "Invalid type '{}' for '{}'. Must be one of: {}",
                ty,
                owner,
                TYPES.join(", ")
            )));
        }
        if ty == "choice" && choices.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "'{}' has type choice but no choices",
                owner
            )));
        }
        if ty != "choice" && !choices.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "'{}' lists choices but has type {}",
                owner, ty
            )));
        }
    }
    Ok(())
}

fn validate_option(option: &OptionSpec) -> ConfigResult<()> {
    let ty = option.option_type.as_deref();
    validate_type(&option.name, ty, &option.choices)?;

    if let Some(short) = &option.short {
        if short.chars().count() != 1 || !short.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidOptionName(format!("-{}", short)));
        }
    }

    let is_flag = matches!(ty, Some("bool" | "boolean" | "count"));
    if is_flag && option.nargs.is_some() {
        return Err(ConfigError::Invalid(format!(
            "flag '{}' cannot take nargs",
            option.name
        )));
    }
    if option.negatable && !matches!(ty, Some("bool" | "boolean")) {
        return Err(ConfigError::Invalid(format!(
            "only bool options can be negatable ('{}')",
            option.name
        )));
    }
    if let Some(nargs) = option.nargs {
        if nargs < 1 {
            return Err(ConfigError::Invalid(format!(
                "option '{}' must take at least one value",
                option.name
            )));
        }
    }
    Ok(())
}

fn validate_argument(argument: &ArgumentSpec) -> ConfigResult<()> {
    let ty = argument.argument_type.as_deref();
    validate_type(&argument.name, ty, &argument.choices)?;
    if ty == Some("count") {
        return Err(ConfigError::Invalid(format!(
            "argument '{}' cannot be a counter",
            argument.name
        )));
    }
    match argument.nargs {
        Some(n) if n == 0 || n < -1 => Err(ConfigError::Invalid(format!(
            "argument '{}' has invalid nargs {}",
            argument.name, n
        ))),
        _ => Ok(()),
    }
}
