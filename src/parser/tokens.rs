//! Token classification
//!
//! Whether an argv element is an option depends on the prefixes declared by
//! the current command level, and for negative numbers on a policy.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// The end-of-options separator
pub const SEPARATOR: &str = "--";

/// How a token like `-5` is treated when it is not a declared spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegativeNumbers {
    /// Positional, unless the level declares a numeric-looking option
    /// spelling such as `-1`; then it is an option (and usually unknown)
    #[default]
    Auto,
    /// Always positional
    AsPositional,
    /// Always an option
    AsOption,
}

/// Classification of one argv element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `--name` or `--name=value` (also single-prefix multi-character
    /// spellings like `-name` when declared)
    LongOption,
    /// `-abc`: one or more short options behind one prefix
    ShortCluster,
    /// `--`
    Separator,
    /// Anything else
    Positional,
}

fn negative_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^-(\d+|\d*\.\d+)([eE][-+]?\d+)?$").expect("valid negative number pattern")
    })
}

/// `-5`, `-0.5`, `-.5`, `-1e3`
pub fn is_negative_number(token: &str) -> bool {
    negative_number_re().is_match(token)
}

/// First character of `token` as a string slice
pub fn first_char(token: &str) -> &str {
    match token.chars().next() {
        Some(c) => &token[..c.len_utf8()],
        None => "",
    }
}

/// First two characters of `token`
pub fn first_two_chars(token: &str) -> &str {
    let mut indices = token.char_indices().map(|(i, c)| i + c.len_utf8());
    match (indices.next(), indices.next()) {
        (_, Some(end)) => &token[..end],
        (Some(end), None) => &token[..end],
        _ => "",
    }
}

/// Classify a token by shape alone, given the level's prefixes
pub fn classify(token: &str, prefixes: &BTreeSet<String>) -> TokenKind {
    if token == SEPARATOR {
        return TokenKind::Separator;
    }
    if token.chars().count() < 2 || !prefixes.contains(first_char(token)) {
        return TokenKind::Positional;
    }
    let head = first_two_chars(token);
    if prefixes.contains(head) && head.chars().count() == 2 {
        TokenKind::LongOption
    } else {
        TokenKind::ShortCluster
    }
}
