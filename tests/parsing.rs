//! Parsing and parameter resolution through the public API

mod common;

use clasp::model::{BoolType, FloatType, IntType, StringType};
use clasp::{
    Command, Context, ContextSettings, Error, ParamType, Parameter, ParameterSource, PathType,
    UsageErrorKind, Value,
};
use common::{argv, log, Log};
use std::rc::Rc;

fn recorder(log: &Log, tag: &str) -> impl Fn(&Context, &Parameter, Value) -> clasp::Result<Value> {
    let log = log.clone();
    let tag = tag.to_string();
    move |_ctx, _param, value| {
        log.borrow_mut().push(tag.clone());
        Ok(value)
    }
}

fn parse(cmd: &Rc<Command>, args: &[&str]) -> clasp::Result<Rc<Context>> {
    cmd.make_context("prog", argv(args), None, ContextSettings::default())
}

#[test]
fn test_callbacks_fire_in_first_occurrence_order() {
    let log = log();
    let cmd = Command::builder("prog")
        .param(Parameter::option(["--a"]).callback(recorder(&log, "a")))
        .param(Parameter::option(["--b"]).callback(recorder(&log, "b")))
        .param(Parameter::option(["--c"]).callback(recorder(&log, "c")))
        .param(Parameter::option(["--e"]).flag().eager(true).callback(recorder(&log, "e")))
        .build()
        .unwrap();

    parse(&cmd, &["--c", "1", "--a", "2", "--e", "--c", "3"]).unwrap();
    assert_eq!(*log.borrow(), vec!["e", "c", "a", "b"]);
}

fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            out.push(tail);
        }
    }
    out
}

#[test]
fn test_firing_order_holds_for_every_token_order() {
    let log = log();
    let cmd = Command::builder("prog")
        .param(Parameter::option(["--a"]).callback(recorder(&log, "a")))
        .param(Parameter::option(["--b"]).callback(recorder(&log, "b")))
        .param(Parameter::option(["--c"]).callback(recorder(&log, "c")))
        .param(Parameter::option(["--e"]).flag().eager(true).callback(recorder(&log, "e")))
        .build()
        .unwrap();

    let groups: Vec<(&str, Vec<&str>)> = vec![
        ("a", vec!["--a", "1"]),
        ("b", vec!["--b", "2"]),
        ("c", vec!["--c", "3"]),
        ("e", vec!["--e"]),
    ];
    let orders = permutations(&groups);
    assert_eq!(orders.len(), 24);

    for order in orders {
        log.borrow_mut().clear();
        let tokens: Vec<&str> = order.iter().flat_map(|(_, t)| t.iter().copied()).collect();
        parse(&cmd, &tokens).unwrap();

        let mut expected = vec!["e".to_string()];
        expected.extend(
            order
                .iter()
                .map(|(tag, _)| tag.to_string())
                .filter(|tag| tag != "e"),
        );
        assert_eq!(*log.borrow(), expected, "tokens: {:?}", tokens);
    }
}

#[test]
fn test_repeated_option_last_wins_or_accumulates() {
    let cmd = Command::builder("prog")
        .param(Parameter::option(["--m"]))
        .param(Parameter::option(["--n"]).multiple(true))
        .build()
        .unwrap();

    let ctx = parse(&cmd, &["--m", "foo", "--m", "bar", "--n", "foo", "--n", "bar"]).unwrap();
    assert_eq!(ctx.value("m"), Value::from("bar"));
    assert_eq!(ctx.value("n").to_strings(), vec!["foo", "bar"]);
}

#[test]
fn test_fixed_and_variadic_arguments() {
    let cmd = Command::builder("cp")
        .param(Parameter::argument("src"))
        .param(Parameter::argument("dsts").nargs(-1))
        .build()
        .unwrap();

    let ctx = parse(&cmd, &["a", "b", "c", "d"]).unwrap();
    assert_eq!(ctx.value("src"), Value::from("a"));
    assert_eq!(ctx.value("dsts").to_strings(), vec!["b", "c", "d"]);
}

#[test]
fn test_separator_makes_option_positional() {
    let cmd = Command::builder("prog")
        .param(Parameter::option(["-x"]).flag())
        .param(Parameter::argument("name"))
        .build()
        .unwrap();

    let ctx = parse(&cmd, &["--", "-x"]).unwrap();
    assert_eq!(ctx.value("name"), Value::from("-x"));
    assert_eq!(ctx.value("x"), Value::Bool(false));
}

#[test]
fn test_required_option_missing_everywhere() {
    let cmd = Command::builder("prog")
        .param(Parameter::option(["--token"]).required(true).envvar("CLASP_IT_UNSET_TOKEN"))
        .build()
        .unwrap();

    let err = parse(&cmd, &[]).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    let usage = err.as_usage().unwrap();
    assert!(matches!(usage.kind, UsageErrorKind::MissingParameter { .. }));
    assert_eq!(usage.format_message(), "Missing option '--token'.");
    assert_eq!(usage.help_hint().as_deref(), Some("Try 'prog --help' for help."));
}

#[test]
fn test_value_sources() {
    std::env::set_var("CLASP_IT_REGION", "env-region");
    let cmd = Command::builder("prog")
        .param(Parameter::option(["--region"]).envvar("CLASP_IT_REGION"))
        .param(Parameter::option(["--zone"]).default("z1"))
        .param(Parameter::option(["--tier"]))
        .build()
        .unwrap();

    let ctx = parse(&cmd, &["--tier", "gold"]).unwrap();
    assert_eq!(ctx.get_parameter_source("tier"), Some(ParameterSource::CommandLine));
    assert_eq!(ctx.value("region"), Value::from("env-region"));
    assert_eq!(ctx.get_parameter_source("region"), Some(ParameterSource::Environment));
    assert_eq!(ctx.get_parameter_source("zone"), Some(ParameterSource::Default));
    std::env::remove_var("CLASP_IT_REGION");
}

#[test]
fn test_bad_value_names_parameter() {
    let cmd = Command::builder("prog")
        .param(Parameter::option(["-n", "--count"]).ty(IntType::new()))
        .build()
        .unwrap();

    let err = parse(&cmd, &["--count", "many"]).unwrap_err();
    let message = err.as_usage().unwrap().format_message();
    assert!(message.starts_with("Invalid value for '-n' / '--count':"), "{}", message);
}

#[test]
fn test_unknown_option() {
    let cmd = Command::builder("prog").build().unwrap();
    let err = parse(&cmd, &["--nope"]).unwrap_err();
    assert!(matches!(
        err,
        Error::Usage(ref usage) if matches!(usage.kind, UsageErrorKind::NoSuchOption { .. })
    ));
}

#[test]
fn test_scalar_types_reconvert_their_display() {
    let cmd = Command::builder("prog").build().unwrap();
    let ctx = Context::new(cmd, "prog", None, ContextSettings::default());
    let param = Parameter::option(["--x"]);

    let cases: Vec<(Box<dyn ParamType>, &str)> = vec![
        (Box::new(IntType::new()), "-42"),
        (Box::new(FloatType), "2.5"),
        (Box::new(BoolType), "yes"),
        (Box::new(StringType), "hello world"),
        (Box::new(PathType::new()), "some/dir/file.txt"),
    ];
    for (ty, raw) in cases {
        let first = ty.convert(Value::from(raw), &param, &ctx).unwrap();
        let again = ty
            .convert(Value::from(first.to_string()), &param, &ctx)
            .unwrap();
        assert_eq!(first, again, "{} did not round-trip through {}", raw, ty.name());
    }
}
