//! Command line tokenizing and option parsing

pub mod parse;
pub mod tokens;

pub use parse::{Occurrence, OptionParser, ParseResult, ParserConfig, TokenNormalizer};
pub use tokens::{classify, is_negative_number, NegativeNumbers, TokenKind, SEPARATOR};
