//! Parameter resolution and callback ordering
//!
//! After the parser has bound raw strings, every parameter of the level is
//! resolved in processing order: eager parameters first, then the rest;
//! within each group the parameters seen on the command line come in order of
//! their first occurrence, followed by the unseen ones in declaration order.

use crate::error::{Error, Result, UsageError, UsageErrorKind};
use crate::model::{Parameter, Value};
use crate::parser::ParseResult;
use crate::runner::context::{Context, ParameterSource};
use log::{debug, trace};

/// Parameters in the order their values are resolved and callbacks fire
pub fn processing_order<'a>(params: &'a [Parameter], parsed: &ParseResult) -> Vec<&'a Parameter> {
    let mut ordered: Vec<&Parameter> = params.iter().collect();
    ordered.sort_by_key(|p| {
        (
            !p.is_eager(),
            parsed.first_index(p.name()).unwrap_or(usize::MAX),
        )
    });
    ordered
}

/// Resolve every parameter of the level into the context
pub fn process_params(ctx: &Context, params: &[Parameter], parsed: &ParseResult) -> Result<()> {
    for param in processing_order(params, parsed) {
        handle_parse_result(ctx, param, parsed)?;
    }
    Ok(())
}

/// Resolve one parameter: pick its value source, convert, validate, fire
/// its callback and store the result
pub fn handle_parse_result(ctx: &Context, param: &Parameter, parsed: &ParseResult) -> Result<Value> {
    let outcome = consume_value(ctx, param, parsed).and_then(|(value, source)| {
        if let Some(source) = source {
            ctx.set_parameter_source(param.name(), source);
        }
        process_value(ctx, param, value)
    });

    let value = match outcome {
        Ok(value) => value,
        Err(err) if ctx.resilient_parsing() => {
            trace!("resilient: '{}' resolved to nothing ({})", param.name(), err);
            Value::None
        }
        Err(err) => return Err(err),
    };

    if param.expose_value {
        trace!("{} = {:?}", param.name(), value);
        ctx.set_param(param.name(), value.clone());
    }
    Ok(value)
}

/// The raw value and where it came from, trying the command line, the
/// environment, the default map, the declared default and finally a prompt
pub fn consume_value(
    ctx: &Context,
    param: &Parameter,
    parsed: &ParseResult,
) -> Result<(Value, Option<ParameterSource>)> {
    if let Some(value) = value_from_command_line(param, parsed) {
        return Ok((value, Some(ParameterSource::CommandLine)));
    }
    if let Some(value) = value_from_envvar(ctx, param) {
        return Ok((value, Some(ParameterSource::Environment)));
    }
    if let Some(value) = ctx.lookup_default(param.name()) {
        return Ok((value, Some(ParameterSource::DefaultMap)));
    }
    if let Some(value) = param.default_value() {
        return Ok((value, Some(ParameterSource::Default)));
    }
    if param.prompt.is_some() && !ctx.resilient_parsing() {
        let value = prompt_for_value(ctx, param)?;
        return Ok((value, Some(ParameterSource::Prompt)));
    }
    Ok((Value::None, None))
}

fn value_from_command_line(param: &Parameter, parsed: &ParseResult) -> Option<Value> {
    let occurrences = parsed.occurrences(param.name())?;
    if param.is_count() {
        return Some(Value::Int(occurrences.len() as i64));
    }

    let mut values: Vec<Value> = occurrences
        .iter()
        .map(|occ| {
            if param.is_flag() {
                if occ.secondary {
                    Value::Bool(false)
                } else {
                    param.get_flag_value()
                }
            } else if param.get_nargs() == 1 {
                occ.values
                    .first()
                    .cloned()
                    .map(Value::Str)
                    .unwrap_or_default()
            } else {
                Value::List(occ.values.iter().cloned().map(Value::Str).collect())
            }
        })
        .collect();

    if param.is_multiple() {
        Some(Value::List(values))
    } else {
        values.pop()
    }
}

fn value_from_envvar(ctx: &Context, param: &Parameter) -> Option<Value> {
    let raw = param.resolve_envvar_value(ctx)?;
    debug!("'{}' taken from the environment", param.name());
    if !param.is_multiple() && param.get_nargs() == 1 {
        return Some(Value::Str(raw));
    }

    let parts: Vec<Value> = param
        .param_type()
        .split_env_value(&raw)
        .into_iter()
        .map(Value::Str)
        .collect();
    let nargs = param.get_nargs();
    if param.is_multiple() && nargs > 1 {
        let chunks = parts
            .chunks(nargs as usize)
            .map(|chunk| Value::List(chunk.to_vec()))
            .collect();
        return Some(Value::List(chunks));
    }
    Some(Value::List(parts))
}

fn prompt_for_value(ctx: &Context, param: &Parameter) -> Result<Value> {
    let prompt = match &param.prompt {
        Some(prompt) => prompt,
        None => return Ok(Value::None),
    };
    let prompter = ctx.prompter();

    if param.is_flag() && param.param_type().is_bool() {
        let default = param.default_value().and_then(|v| v.as_bool());
        return prompter.confirm(&prompt.text, default).map(Value::Bool);
    }

    let default = param.default_value().filter(|v| !v.is_none()).map(|v| v.to_string());
    loop {
        let raw = if prompt.hide_input {
            prompter.read_hidden(&prompt.text, prompt.confirmation)?
        } else {
            prompter.read_line(&prompt.text, default.as_deref())?
        };
        match type_cast_value(ctx, param, Value::Str(raw)) {
            Ok(value) => return Ok(value),
            Err(Error::Usage(err)) => prompter.report_error(&err.format_message()),
            Err(err) => return Err(err),
        }
    }
}

/// Convert `value` with the parameter's type, honoring arity and
/// multiplicity. Missing values become `None`, or an empty list for
/// parameters that collect several values.
pub fn type_cast_value(ctx: &Context, param: &Parameter, value: Value) -> Result<Value> {
    if value.is_none() {
        return Ok(if param.is_multiple() || param.get_nargs() == -1 {
            Value::List(Vec::new())
        } else {
            Value::None
        });
    }

    let convert = |value: Value| -> Result<Value> {
        let ty = param.param_type();
        let nargs = param.get_nargs();
        if nargs == 1 || param.is_flag() || param.is_count() {
            return ty.convert(value, param, ctx);
        }
        let items = into_items(value);
        if nargs > 1 && items.len() != nargs as usize {
            return Err(Error::bad_parameter(format!(
                "Takes {} values but {} {} given.",
                nargs,
                items.len(),
                if items.len() == 1 { "was" } else { "were" }
            )));
        }
        items
            .into_iter()
            .map(|item| ty.convert(item, param, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::List)
    };

    let result = if param.is_multiple() {
        into_items(value)
            .into_iter()
            .map(convert)
            .collect::<Result<Vec<_>>>()
            .map(Value::List)
    } else {
        convert(value)
    };
    result.map_err(|err| augment(err, param))
}

fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::List(items) => items,
        Value::None => Vec::new(),
        other => vec![other],
    }
}

/// Whether `value` counts as "not given" for a required check
pub fn value_is_missing(param: &Parameter, value: &Value) -> bool {
    match value {
        Value::None => true,
        Value::List(items) => (param.get_nargs() != 1 || param.is_multiple()) && items.is_empty(),
        _ => false,
    }
}

/// Convert, enforce `required` and run the parameter callback
pub fn process_value(ctx: &Context, param: &Parameter, value: Value) -> Result<Value> {
    let value = type_cast_value(ctx, param, value)?;

    if param.is_required() && value_is_missing(param, &value) {
        return Err(Error::Usage(UsageError::new(UsageErrorKind::MissingParameter {
            param_hint: param.error_hint(),
            param_type: param.param_type_name().to_string(),
        })));
    }

    match &param.callback {
        Some(callback) => callback(ctx, param, value).map_err(|err| augment(err, param)),
        None => Ok(value),
    }
}

fn augment(err: Error, param: &Parameter) -> Error {
    match err {
        Error::Usage(mut usage) => {
            usage.kind = usage.kind.augment(&param.error_hint());
            Error::Usage(usage)
        }
        other => other,
    }
}
