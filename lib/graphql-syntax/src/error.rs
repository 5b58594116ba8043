use thiserror::Error;

use crate::position::Span;

/// Error produced while tokenizing or parsing GraphQL source.
///
/// The span always points at the offending token, not at the enclosing
/// grammar production.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Syntax Error: {message} ({})", span.start)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}
