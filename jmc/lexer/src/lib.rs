//! Lexical analysis for the jmc language.
//!
//! Produces statements of typed tokens from a character stream. Bracketed
//! substrings stay opaque single tokens here and are re-tokenized on demand
//! by whoever consumes them.

mod macros;
mod token;
mod tokenizer;

pub use macros::{MacroDef, MacroTable};
pub use token::{is_operator_char, Token, TokenKind};
pub use tokenizer::{tokenize_inner, tokenize_source, Tokenizer};
