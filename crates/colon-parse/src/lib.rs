#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

mod diagnostic;
mod lexer;
mod parser;
mod token;

pub use diagnostic::Diagnostic;
pub use lexer::{token_at, tokenize, Lexer};
pub use parser::{parse, parse_str, Parsed, MAX_NESTING_DEPTH};
pub use token::{Keyword, Token, TokenType, OPERATORS};
