//! Plain-text renderings used by the pretty output format.

use colon_ast::ast::Ast;
use colon_ast::span::line_col;
use colon_parse::{Diagnostic, Token};
use serde::Serialize;

#[derive(Serialize)]
pub struct ParseOutput<'a> {
    pub ast: &'a Ast,
    pub diagnostics: &'a [Diagnostic],
}

/// `line:col  start..end  Type  "text"`
pub fn token_line(src: &str, tok: &Token) -> String {
    let (line, col) = line_col(src, tok.span.start);
    format!(
        "{line}:{col}  {}..{}  {}  {:?}",
        tok.span.start, tok.span.end, tok.kind, tok.text
    )
}

/// `file:line:col: message`
pub fn diagnostic_line(file: &str, src: &str, diag: &Diagnostic) -> String {
    let (line, col) = line_col(src, diag.span.start);
    format!("{file}:{line}:{col}: {}", diag.message)
}
