// dtFabric
// SPDX-License-Identifier: MPL-2.0

use thiserror::Error;

/// Failure kinds produced while parsing or evaluating a dtFabric expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprErrorKind {
    /// The input did not match the expression grammar (§6.1 of the schema spec).
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },
    /// A dotted path referenced during evaluation has no bound value in the context.
    #[error("unbound path: {0}")]
    UnboundPath(String),
}

/// An error parsing or evaluating an expression, with the source text attached for context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct ExprError {
    #[source]
    pub kind: ExprErrorKind,
    /// The original expression text this error came from, when available.
    pub source_text: Option<String>,
}

impl ExprError {
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self {
            kind: ExprErrorKind::Syntax {
                offset,
                message: message.into(),
            },
            source_text: None,
        }
    }

    pub fn unbound_path(path: &[String]) -> Self {
        Self {
            kind: ExprErrorKind::UnboundPath(path.join(".")),
            source_text: None,
        }
    }

    pub fn with_source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = Some(text.into());
        self
    }
}
