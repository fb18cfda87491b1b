// dtFabric
// SPDX-License-Identifier: MPL-2.0

#![warn(missing_docs)]

//! Expression parsing and evaluation for dtFabric's `number_of_elements`,
//! `elements_data_size`, and `condition` attributes.
//!
//! Expressions are parsed once, at schema-read time, into an [`ast::Expr`]
//! or [`ast::Condition`] AST. They are never interpreted as strings at
//! decode time (see the design notes in the schema specification) —
//! evaluation walks the AST against an [`ExprContext`] supplied by the
//! caller.

mod ast;
mod error;
mod eval;
mod lexer;
mod parser;

pub use ast::{BinaryOp, CompareOp, Condition, Expr};
pub use error::{ExprError, ExprErrorKind};
pub use eval::{eval, eval_condition, ExprContext};
pub use parser::{parse_condition, parse_expr};
