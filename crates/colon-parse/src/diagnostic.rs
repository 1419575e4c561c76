use colon_ast::span::Span;
use serde::Serialize;

/// A parse problem at a location. Parsing continues past every diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{}..{}: {}", .span.start, .span.end, .message)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}
