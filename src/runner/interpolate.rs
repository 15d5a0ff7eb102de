//! `${name}` placeholders in manifest `run` templates
//!
//! Placeholders are replaced in a single pass, so a value that itself
//! contains `${...}` is inserted literally. `$${` produces a literal `${`.

use crate::error::{InterpolationError, InterpolationResult};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::env;
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$(\$)?\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern"))
}

/// Replace `${name}` with `vars[name]`, falling back to the process
/// environment. Unknown names are left as they are.
pub fn interpolate(s: &str, vars: &HashMap<String, String>) -> String {
    placeholder()
        .replace_all(s, |caps: &Captures| {
            let name = &caps[2];
            if caps.get(1).is_some() {
                return format!("${{{}}}", name);
            }
            vars.get(name)
                .cloned()
                .or_else(|| env::var(name).ok())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Like [`interpolate`], but an unknown name is an error
pub fn interpolate_strict(s: &str, vars: &HashMap<String, String>) -> InterpolationResult<String> {
    let mut missing = None;
    let result = placeholder().replace_all(s, |caps: &Captures| {
        let name = &caps[2];
        if caps.get(1).is_some() {
            return format!("${{{}}}", name);
        }
        match vars.get(name).cloned().or_else(|| env::var(name).ok()) {
            Some(value) => value,
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(InterpolationError::UndefinedVariable(name)),
        None => Ok(result.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_simple_interpolation() {
        let result = interpolate("Hello, ${name}!", &vars(&[("name", "world")]));
        assert_eq!(result, "Hello, world!");
    }

    #[test]
    fn test_multiple_variables() {
        let result = interpolate("${first} ${last}", &vars(&[("first", "John"), ("last", "Doe")]));
        assert_eq!(result, "John Doe");
    }

    #[test]
    fn test_environment_fallback() {
        env::set_var("CLASP_TEST_INTERPOLATE", "from-env");
        let result = interpolate("v=${CLASP_TEST_INTERPOLATE}", &HashMap::new());
        assert_eq!(result, "v=from-env");
        env::remove_var("CLASP_TEST_INTERPOLATE");
    }

    #[test]
    fn test_undefined_variable_lenient() {
        let result = interpolate("Hello, ${undefined_xyz}!", &HashMap::new());
        assert_eq!(result, "Hello, ${undefined_xyz}!");
    }

    #[test]
    fn test_undefined_variable_strict() {
        let result = interpolate_strict("Hello, ${undefined_xyz}!", &HashMap::new());
        assert!(matches!(
            result,
            Err(InterpolationError::UndefinedVariable(name)) if name == "undefined_xyz"
        ));
    }

    #[test]
    fn test_single_pass() {
        let result = interpolate_strict("${outer}", &vars(&[("outer", "${inner}")])).unwrap();
        assert_eq!(result, "${inner}");
    }

    #[test]
    fn test_escape() {
        let result = interpolate_strict("echo $${HOME} ${x}", &vars(&[("x", "1")])).unwrap();
        assert_eq!(result, "echo ${HOME} 1");
    }

    #[test]
    fn test_non_identifiers_untouched() {
        assert_eq!(interpolate("${} ${1x}", &HashMap::new()), "${} ${1x}");
    }
}
