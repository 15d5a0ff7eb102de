//! The option parser for one command level
//!
//! Scans argv left to right, binding option tokens to their values, then
//! distributes the remaining positionals over the declared arguments. The
//! result only records raw strings and positions; conversion, defaulting and
//! callbacks happen in the scheduler.

use crate::error::{Error, Result, UsageError, UsageErrorKind};
use crate::model::{split_opt, Parameter};
use crate::parser::tokens::{first_char, first_two_chars, is_negative_number, NegativeNumbers, SEPARATOR};
use log::trace;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::rc::Rc;

/// Maps option names and subcommand names to a canonical form before lookup
pub type TokenNormalizer = Rc<dyn Fn(&str) -> String>;

/// Parser behavior switches for one level
#[derive(Clone, Default)]
pub struct ParserConfig {
    /// Keep scanning for options after the first positional
    pub allow_interspersed_args: bool,
    /// Pass unknown options through as positionals instead of failing
    pub ignore_unknown_options: bool,
    pub negative_numbers: NegativeNumbers,
    /// Swallow parse errors and keep what was bound so far
    pub resilient: bool,
    pub normalize: Option<TokenNormalizer>,
}

/// One appearance of a parameter on the command line
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    /// Raw values consumed (empty for flags and counters)
    pub values: Vec<String>,
    /// Index into argv of the token that introduced the occurrence
    pub index: usize,
    /// Whether the secondary ("off") spelling of a flag was used
    pub secondary: bool,
}

/// Raw bindings for one level
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    /// Destination name → occurrences in command line order
    pub bindings: HashMap<String, Vec<Occurrence>>,
    /// Positionals not bound to any argument
    pub leftovers: Vec<String>,
    /// Destination name → argv index of its first occurrence
    pub first_seen: HashMap<String, usize>,
    /// Destination names in the order occurrences were processed
    pub order: Vec<String>,
    /// Option prefixes known at this level, e.g. `-` and `--`
    pub prefixes: BTreeSet<String>,
}

impl ParseResult {
    fn record(&mut self, dest: &str, occurrence: Occurrence) {
        self.first_seen
            .entry(dest.to_string())
            .or_insert(occurrence.index);
        self.order.push(dest.to_string());
        self.bindings
            .entry(dest.to_string())
            .or_default()
            .push(occurrence);
    }

    pub fn occurrences(&self, dest: &str) -> Option<&[Occurrence]> {
        self.bindings.get(dest).map(Vec::as_slice)
    }

    pub fn first_index(&self, dest: &str) -> Option<usize> {
        self.first_seen.get(dest).copied()
    }

    /// Whether `dest` appeared on the command line
    pub fn contains(&self, dest: &str) -> bool {
        self.bindings.contains_key(dest)
    }
}

#[derive(Default)]
struct ParsingState {
    largs: Vec<(usize, String)>,
    rargs: VecDeque<(usize, String)>,
    result: ParseResult,
}

#[derive(Clone, Copy)]
struct Spelling {
    option: usize,
    secondary: bool,
}

/// Parser for one command level's parameters
pub struct OptionParser<'a> {
    config: ParserConfig,
    options: Vec<&'a Parameter>,
    arguments: Vec<&'a Parameter>,
    long_opt: HashMap<String, Spelling>,
    short_opt: HashMap<String, Spelling>,
    prefixes: BTreeSet<String>,
    numeric_spelling: bool,
}

impl<'a> OptionParser<'a> {
    pub fn new(params: &'a [Parameter], config: ParserConfig) -> Self {
        let mut parser = OptionParser {
            config,
            options: Vec::new(),
            arguments: Vec::new(),
            long_opt: HashMap::new(),
            short_opt: HashMap::new(),
            prefixes: ["-", "--"].iter().map(|p| p.to_string()).collect(),
            numeric_spelling: false,
        };

        for param in params {
            if param.is_argument() {
                parser.arguments.push(param);
                continue;
            }
            let option = parser.options.len();
            parser.options.push(param);
            for opt in param.opts() {
                parser.register(opt, Spelling { option, secondary: false });
            }
            for opt in param.secondary_opts() {
                parser.register(opt, Spelling { option, secondary: true });
            }
        }

        parser
    }

    fn register(&mut self, spelling: &str, target: Spelling) {
        let (prefix, name) = split_opt(spelling);
        self.prefixes.insert(first_char(prefix).to_string());
        self.prefixes.insert(prefix.to_string());
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            self.numeric_spelling = true;
        }
        let normalized = self.normalize_opt(spelling);
        if prefix.chars().count() == 1 && name.chars().count() == 1 {
            self.short_opt.insert(normalized, target);
        } else {
            self.long_opt.insert(normalized, target);
        }
    }

    pub fn prefixes(&self) -> &BTreeSet<String> {
        &self.prefixes
    }

    fn normalize_opt(&self, opt: &str) -> String {
        match &self.config.normalize {
            Some(normalize) => {
                let (prefix, name) = split_opt(opt);
                format!("{}{}", prefix, normalize(name))
            }
            None => opt.to_string(),
        }
    }

    fn is_declared(&self, token: &str) -> bool {
        let name = token.split_once('=').map_or(token, |(n, _)| n);
        let normalized = self.normalize_opt(name);
        self.long_opt.contains_key(&normalized) || self.short_opt.contains_key(&normalized)
    }

    /// Whether `token` should be handled as an option at this level
    pub fn looks_like_option(&self, token: &str) -> bool {
        if token.chars().count() < 2 || !self.prefixes.contains(first_char(token)) {
            return false;
        }
        if is_negative_number(token) && !self.is_declared(token) {
            return match self.config.negative_numbers {
                NegativeNumbers::AsPositional => false,
                NegativeNumbers::AsOption => true,
                NegativeNumbers::Auto => self.numeric_spelling,
            };
        }
        true
    }

    /// Parse `args` into raw bindings and leftovers
    pub fn parse_args(&self, args: &[String]) -> Result<ParseResult> {
        let mut state = ParsingState {
            rargs: args.iter().cloned().enumerate().collect(),
            ..Default::default()
        };

        let outcome = self
            .process_args_for_options(&mut state)
            .and_then(|_| self.process_args_for_args(&mut state));

        if let Err(err) = outcome {
            if !self.config.resilient {
                return Err(err);
            }
            trace!("resilient parse ignored: {}", err);
            let rest: Vec<(usize, String)> = state.rargs.drain(..).collect();
            state.largs.extend(rest);
        }

        let mut result = state.result;
        result.leftovers = state.largs.into_iter().map(|(_, arg)| arg).collect();
        result.prefixes = self.prefixes.clone();
        trace!(
            "parsed {} binding(s), {} leftover(s)",
            result.bindings.len(),
            result.leftovers.len()
        );
        Ok(result)
    }

    fn process_args_for_options(&self, state: &mut ParsingState) -> Result<()> {
        while let Some((idx, arg)) = state.rargs.pop_front() {
            if arg == SEPARATOR {
                return Ok(());
            } else if self.looks_like_option(&arg) {
                self.process_opts(&arg, idx, state)?;
            } else if self.config.allow_interspersed_args {
                state.largs.push((idx, arg));
            } else {
                state.rargs.push_front((idx, arg));
                return Ok(());
            }
        }
        Ok(())
    }

    fn process_args_for_args(&self, state: &mut ParsingState) -> Result<()> {
        let mut pending: VecDeque<(usize, String)> = state.largs.drain(..).collect();
        pending.extend(state.rargs.drain(..));

        for arg in &self.arguments {
            if arg.get_nargs() < 0 {
                let taken: Vec<(usize, String)> = pending.drain(..).collect();
                if let Some((index, _)) = taken.first() {
                    let index = *index;
                    let values = taken.into_iter().map(|(_, v)| v).collect();
                    state.result.record(
                        arg.name(),
                        Occurrence {
                            values,
                            index,
                            secondary: false,
                        },
                    );
                }
                continue;
            }

            let nargs = arg.get_nargs() as usize;
            if pending.len() >= nargs {
                let taken: Vec<(usize, String)> = pending.drain(..nargs).collect();
                if let Some((index, _)) = taken.first() {
                    let index = *index;
                    let values = taken.into_iter().map(|(_, v)| v).collect();
                    state.result.record(
                        arg.name(),
                        Occurrence {
                            values,
                            index,
                            secondary: false,
                        },
                    );
                }
            } else if !pending.is_empty() {
                return Err(usage(UsageErrorKind::BadArgumentUsage(format!(
                    "Argument '{}' takes {} values.",
                    arg.human_name(),
                    nargs
                ))));
            }
        }

        state.largs = pending.into_iter().collect();
        Ok(())
    }

    fn process_opts(&self, arg: &str, idx: usize, state: &mut ParsingState) -> Result<()> {
        let (long_opt, explicit_value) = match arg.split_once('=') {
            Some((opt, value)) => (opt, Some(value.to_string())),
            None => (arg, None),
        };
        let normalized = self.normalize_opt(long_opt);

        if let Some(spelling) = self.long_opt.get(&normalized).copied() {
            return self.match_long_opt(&normalized, spelling, explicit_value, idx, state);
        }

        if !self.prefixes.contains(first_two_chars(arg)) {
            return self.match_short_opt(arg, idx, state);
        }

        if !self.config.ignore_unknown_options {
            return Err(usage(UsageErrorKind::NoSuchOption { name: normalized }));
        }
        state.largs.push((idx, arg.to_string()));
        Ok(())
    }

    fn match_long_opt(
        &self,
        opt: &str,
        spelling: Spelling,
        explicit_value: Option<String>,
        idx: usize,
        state: &mut ParsingState,
    ) -> Result<()> {
        let param = self.options[spelling.option];
        let values = if param.takes_value() {
            if let Some(value) = explicit_value {
                state.rargs.push_front((idx, value));
            }
            self.take_values(opt, param, state)?
        } else if explicit_value.is_some() {
            return Err(usage(UsageErrorKind::BadOptionUsage {
                option: opt.to_string(),
                message: format!("Option '{}' does not take a value.", opt),
            }));
        } else {
            Vec::new()
        };

        state.result.record(
            param.name(),
            Occurrence {
                values,
                index: idx,
                secondary: spelling.secondary,
            },
        );
        Ok(())
    }

    fn match_short_opt(&self, arg: &str, idx: usize, state: &mut ParsingState) -> Result<()> {
        let prefix = first_char(arg);
        let mut unknown = String::new();

        for (offset, ch) in arg.char_indices().skip(1) {
            let opt = self.normalize_opt(&format!("{}{}", prefix, ch));
            let spelling = match self.short_opt.get(&opt) {
                Some(spelling) => *spelling,
                None => {
                    if self.config.ignore_unknown_options {
                        unknown.push(ch);
                        continue;
                    }
                    return Err(usage(UsageErrorKind::NoSuchOption { name: opt }));
                }
            };

            let param = self.options[spelling.option];
            if param.takes_value() {
                let rest_start = offset + ch.len_utf8();
                let stop = rest_start < arg.len();
                if stop {
                    state.rargs.push_front((idx, arg[rest_start..].to_string()));
                }
                let values = self.take_values(&opt, param, state)?;
                state.result.record(
                    param.name(),
                    Occurrence {
                        values,
                        index: idx,
                        secondary: spelling.secondary,
                    },
                );
                if stop {
                    break;
                }
            } else {
                state.result.record(
                    param.name(),
                    Occurrence {
                        values: Vec::new(),
                        index: idx,
                        secondary: spelling.secondary,
                    },
                );
            }
        }

        if !unknown.is_empty() {
            state.largs.push((idx, format!("{}{}", prefix, unknown)));
        }
        Ok(())
    }

    fn take_values(
        &self,
        opt: &str,
        param: &Parameter,
        state: &mut ParsingState,
    ) -> Result<Vec<String>> {
        let nargs = param.get_nargs().max(1) as usize;
        if state.rargs.len() < nargs {
            let message = if nargs == 1 {
                format!("Option '{}' requires an argument.", opt)
            } else {
                format!("Option '{}' requires {} arguments.", opt, nargs)
            };
            return Err(usage(UsageErrorKind::BadOptionUsage {
                option: opt.to_string(),
                message,
            }));
        }
        Ok(state.rargs.drain(..nargs).map(|(_, v)| v).collect())
    }
}

fn usage(kind: UsageErrorKind) -> Error {
    Error::Usage(UsageError::new(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(list: Vec<Parameter>) -> Vec<Parameter> {
        list.into_iter().map(|p| p.finalize().unwrap()).collect()
    }

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn interspersed() -> ParserConfig {
        ParserConfig {
            allow_interspersed_args: true,
            ..Default::default()
        }
    }

    fn values(result: &ParseResult, dest: &str) -> Vec<Vec<String>> {
        result
            .occurrences(dest)
            .unwrap_or_default()
            .iter()
            .map(|o| o.values.clone())
            .collect()
    }

    #[test]
    fn test_long_option_with_equals() {
        let ps = params(vec![Parameter::option(["--name"])]);
        let parser = OptionParser::new(&ps, interspersed());
        let result = parser.parse_args(&argv(&["--name=bob"])).unwrap();
        assert_eq!(values(&result, "name"), vec![vec!["bob"]]);
    }

    #[test]
    fn test_short_cluster_with_value() {
        let ps = params(vec![
            Parameter::option(["-a"]).flag(),
            Parameter::option(["-b"]).flag(),
            Parameter::option(["-c"]).flag(),
            Parameter::option(["-o"]),
        ]);
        let parser = OptionParser::new(&ps, interspersed());
        let result = parser.parse_args(&argv(&["-abcofile", "-ob", "x"])).unwrap();
        assert_eq!(values(&result, "a").len(), 1);
        assert_eq!(values(&result, "b").len(), 1);
        assert_eq!(values(&result, "c").len(), 1);
        assert_eq!(values(&result, "o"), vec![vec!["file"], vec!["b"]]);
        assert_eq!(result.leftovers, vec!["x"]);
    }

    #[test]
    fn test_short_value_from_next_token() {
        let ps = params(vec![Parameter::option(["-o"])]);
        let parser = OptionParser::new(&ps, interspersed());
        let result = parser.parse_args(&argv(&["-o", "out.txt"])).unwrap();
        assert_eq!(values(&result, "o"), vec![vec!["out.txt"]]);
    }

    #[test]
    fn test_separator_stops_options() {
        let ps = params(vec![
            Parameter::option(["-x"]).flag(),
            Parameter::argument("rest").nargs(-1),
        ]);
        let parser = OptionParser::new(&ps, interspersed());
        let result = parser.parse_args(&argv(&["--", "-x"])).unwrap();
        assert!(!result.contains("x"));
        assert_eq!(values(&result, "rest"), vec![vec!["-x"]]);
    }

    #[test]
    fn test_unknown_option() {
        let ps = params(vec![Parameter::option(["--known"])]);
        let parser = OptionParser::new(&ps, interspersed());
        let err = parser.parse_args(&argv(&["--unknown"])).unwrap_err();
        assert_eq!(err.to_string(), "No such option: --unknown");

        let err = parser.parse_args(&argv(&["-z"])).unwrap_err();
        assert_eq!(err.to_string(), "No such option: -z");
    }

    #[test]
    fn test_ignore_unknown_options() {
        let ps = params(vec![Parameter::option(["-a"]).flag()]);
        let config = ParserConfig {
            ignore_unknown_options: true,
            ..interspersed()
        };
        let parser = OptionParser::new(&ps, config);
        let result = parser.parse_args(&argv(&["--what", "-azq"])).unwrap();
        assert_eq!(result.leftovers, vec!["--what", "-zq"]);
        assert!(result.contains("a"));
    }

    #[test]
    fn test_missing_option_value() {
        let ps = params(vec![Parameter::option(["--name"])]);
        let parser = OptionParser::new(&ps, interspersed());
        let err = parser.parse_args(&argv(&["--name"])).unwrap_err();
        assert_eq!(err.to_string(), "Option '--name' requires an argument.");
    }

    #[test]
    fn test_flag_rejects_value() {
        let ps = params(vec![Parameter::option(["--force"]).flag()]);
        let parser = OptionParser::new(&ps, interspersed());
        let err = parser.parse_args(&argv(&["--force=yes"])).unwrap_err();
        assert_eq!(err.to_string(), "Option '--force' does not take a value.");
    }

    #[test]
    fn test_multi_value_option() {
        let ps = params(vec![Parameter::option(["--point"]).nargs(2)]);
        let parser = OptionParser::new(&ps, interspersed());
        let result = parser.parse_args(&argv(&["--point", "1", "2"])).unwrap();
        assert_eq!(values(&result, "point"), vec![vec!["1", "2"]]);

        let err = parser.parse_args(&argv(&["--point", "1"])).unwrap_err();
        assert_eq!(err.to_string(), "Option '--point' requires 2 arguments.");
    }

    #[test]
    fn test_fixed_then_variadic_arguments() {
        let ps = params(vec![
            Parameter::argument("src"),
            Parameter::argument("dsts").nargs(-1),
        ]);
        let parser = OptionParser::new(&ps, interspersed());
        let result = parser.parse_args(&argv(&["a", "b", "c", "d"])).unwrap();
        assert_eq!(values(&result, "src"), vec![vec!["a"]]);
        assert_eq!(values(&result, "dsts"), vec![vec!["b", "c", "d"]]);
        assert!(result.leftovers.is_empty());
    }

    #[test]
    fn test_partial_tuple_argument() {
        let ps = params(vec![Parameter::argument("pair").nargs(2)]);
        let parser = OptionParser::new(&ps, interspersed());
        let err = parser.parse_args(&argv(&["only"])).unwrap_err();
        assert_eq!(err.to_string(), "Argument 'PAIR' takes 2 values.");
    }

    #[test]
    fn test_zero_arity_argument_binds_nothing() {
        // not finalized, so nargs 0 is not rejected up front
        let ps = vec![Parameter::argument("zero").nargs(0)];
        let parser = OptionParser::new(&ps, interspersed());
        let result = parser.parse_args(&argv(&["a"])).unwrap();
        assert!(result.occurrences(ps[0].name()).is_none());
        assert_eq!(result.leftovers, vec!["a"]);
    }

    #[test]
    fn test_extra_positionals_are_leftovers() {
        let ps = params(vec![Parameter::argument("one")]);
        let parser = OptionParser::new(&ps, interspersed());
        let result = parser.parse_args(&argv(&["a", "b"])).unwrap();
        assert_eq!(result.leftovers, vec!["b"]);
    }

    #[test]
    fn test_not_interspersed_stops_at_positional() {
        let ps = params(vec![Parameter::option(["-v"]).flag()]);
        let parser = OptionParser::new(&ps, ParserConfig::default());
        let result = parser.parse_args(&argv(&["-v", "sub", "-v"])).unwrap();
        assert_eq!(values(&result, "v").len(), 1);
        assert_eq!(result.leftovers, vec!["sub", "-v"]);
    }

    #[test]
    fn test_first_seen_positions() {
        let ps = params(vec![
            Parameter::option(["-a"]),
            Parameter::option(["-b"]),
        ]);
        let parser = OptionParser::new(&ps, interspersed());
        let result = parser
            .parse_args(&argv(&["-b", "1", "-a", "2", "-b", "3"]))
            .unwrap();
        assert_eq!(result.first_index("b"), Some(0));
        assert_eq!(result.first_index("a"), Some(2));
        assert_eq!(result.order, vec!["b", "a", "b"]);
    }

    #[test]
    fn test_secondary_spelling() {
        let ps = params(vec![Parameter::option(["--color/--no-color"])]);
        let parser = OptionParser::new(&ps, interspersed());
        let result = parser.parse_args(&argv(&["--no-color"])).unwrap();
        assert!(result.occurrences("color").unwrap()[0].secondary);
    }

    #[test]
    fn test_negative_number_policy() {
        let ps = params(vec![
            Parameter::option(["-x"]).flag(),
            Parameter::argument("n"),
        ]);
        let parser = OptionParser::new(&ps, interspersed());
        let result = parser.parse_args(&argv(&["-5"])).unwrap();
        assert_eq!(values(&result, "n"), vec![vec!["-5"]]);

        let strict = OptionParser::new(
            &ps,
            ParserConfig {
                negative_numbers: NegativeNumbers::AsOption,
                ..interspersed()
            },
        );
        assert!(strict.parse_args(&argv(&["-5"])).is_err());
    }

    #[test]
    fn test_numeric_spelling_makes_auto_strict() {
        let ps = params(vec![
            Parameter::option(["-1", "one"]).flag(),
            Parameter::argument("n").required(false),
        ]);
        let parser = OptionParser::new(&ps, interspersed());
        let result = parser.parse_args(&argv(&["-1"])).unwrap();
        assert!(result.contains("one"));
        assert!(!result.contains("n"));
        assert!(parser.parse_args(&argv(&["-5"])).is_err());
    }

    #[test]
    fn test_custom_prefix() {
        let ps = params(vec![Parameter::option(["+w", "++with"]).flag()]);
        let parser = OptionParser::new(&ps, interspersed());
        let result = parser.parse_args(&argv(&["+w", "++with", "plain"])).unwrap();
        assert_eq!(result.occurrences("with").unwrap().len(), 2);
        assert_eq!(result.leftovers, vec!["plain"]);
    }

    #[test]
    fn test_normalizer() {
        let ps = params(vec![Parameter::option(["--name"])]);
        let config = ParserConfig {
            normalize: Some(Rc::new(|s: &str| s.to_lowercase())),
            ..interspersed()
        };
        let parser = OptionParser::new(&ps, config);
        let result = parser.parse_args(&argv(&["--NAME", "x"])).unwrap();
        assert_eq!(values(&result, "name"), vec![vec!["x"]]);
    }

    #[test]
    fn test_resilient_keeps_partial_bindings() {
        let ps = params(vec![
            Parameter::option(["-a"]).flag(),
            Parameter::option(["--name"]),
        ]);
        let config = ParserConfig {
            resilient: true,
            ..interspersed()
        };
        let parser = OptionParser::new(&ps, config);
        let result = parser.parse_args(&argv(&["-a", "--name"])).unwrap();
        assert!(result.contains("a"));
        assert!(!result.contains("name"));
    }
}
