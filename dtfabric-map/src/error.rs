// dtFabric
// SPDX-License-Identifier: MPL-2.0

use thiserror::Error;

use dtfabric_expr::ExprError;

/// The distinct ways a decode (or size computation) can fail (§7).
#[derive(Error, Debug)]
pub enum MapErrorKind {
    #[error("need {needed} bytes at offset {offset}, only {available} available")]
    ByteStreamTooSmall {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("value {raw} is neither the false ({false_value}) nor true encoding of a boolean")]
    InvalidBooleanEncoding { raw: i64, false_value: i64 },
    #[error("invalid {encoding} byte sequence")]
    InvalidEncoding { encoding: &'static str },
    #[error("decoded value does not match the pinned value or set of values")]
    ConstantMismatch,
    #[error("{extra} bytes remained after decoding a bounded element run")]
    TrailingBytes { extra: usize },
    #[error("discriminant did not match any variant and no default was declared")]
    UnknownGroupVariant,
    #[error("path '{0}' is not defined in the current map context")]
    UnboundExpressionPath(String),
    #[error("expression error: {0}")]
    Expression(#[from] ExprError),
    #[error("recursion limit of {0} exceeded")]
    RecursionLimitExceeded(u32),
}

/// A decode-time failure, carrying the definition/member/offset context
/// every runtime error kind must surface (§7).
#[derive(Error, Debug)]
#[error("{kind}")]
pub struct MapError {
    #[source]
    pub kind: MapErrorKind,
    pub definition: Option<String>,
    pub member: Option<String>,
    pub offset: Option<usize>,
}

impl MapError {
    pub fn new(kind: MapErrorKind) -> Self {
        Self {
            kind,
            definition: None,
            member: None,
            offset: None,
        }
    }

    pub fn in_definition(mut self, name: impl Into<String>) -> Self {
        self.definition = Some(name.into());
        self
    }

    pub fn in_member(mut self, name: impl Into<String>) -> Self {
        self.member = Some(name.into());
        self
    }

    pub fn at_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn too_small(offset: usize, needed: usize, available: usize) -> Self {
        Self::new(MapErrorKind::ByteStreamTooSmall {
            offset,
            needed,
            available,
        })
        .at_offset(offset)
    }
}

impl From<ExprError> for MapError {
    fn from(value: ExprError) -> Self {
        Self::new(MapErrorKind::Expression(value))
    }
}
