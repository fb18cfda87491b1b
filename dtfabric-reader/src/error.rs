// dtFabric
// SPDX-License-Identifier: MPL-2.0

use thiserror::Error;

use dtfabric_definitions::DefinitionError;
use dtfabric_expr::ExprError;

/// The distinct failure kinds the reader can raise (§7).
#[derive(Error, Debug)]
pub enum ReaderErrorKind {
    #[error("malformed schema document: {0}")]
    Schema(String),
    #[error("duplicate name or alias '{0}'")]
    DuplicateName(String),
    #[error("unresolved reference to '{0}'")]
    UnresolvedReference(String),
    #[error("cycle detected involving '{0}'")]
    DefinitionCycle(String),
    #[error("structure family member mismatch: {0}")]
    FamilyMemberMismatch(String),
    #[error("structure group member invalid: {0}")]
    GroupMemberInvalid(String),
    #[error("structure group discriminant collision between '{0}' and '{1}'")]
    GroupDiscriminantCollision(String, String),
    #[error("expression syntax error: {0}")]
    ExpressionSyntax(#[from] ExprError),
}

/// A reader/validation failure, carrying the YAML document index and, where
/// identifiable, the definition and member name (§4.2, §7).
#[derive(Error, Debug)]
#[error("{kind}")]
pub struct ReaderError {
    #[source]
    pub kind: ReaderErrorKind,
    pub document_index: Option<usize>,
    pub definition: Option<String>,
    pub member: Option<String>,
}

impl ReaderError {
    pub fn new(kind: ReaderErrorKind) -> Self {
        Self {
            kind,
            document_index: None,
            definition: None,
            member: None,
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ReaderErrorKind::Schema(message.into()))
    }

    pub fn at_document(mut self, index: usize) -> Self {
        self.document_index = Some(index);
        self
    }

    pub fn in_definition(mut self, name: impl Into<String>) -> Self {
        self.definition = Some(name.into());
        self
    }

    pub fn in_member(mut self, name: impl Into<String>) -> Self {
        self.member = Some(name.into());
        self
    }
}

impl From<DefinitionError> for ReaderError {
    fn from(value: DefinitionError) -> Self {
        let kind = match value {
            DefinitionError::DuplicateName(name) => ReaderErrorKind::DuplicateName(name),
            DefinitionError::UnresolvedReference(name) => {
                ReaderErrorKind::UnresolvedReference(name)
            }
        };
        Self::new(kind)
    }
}

impl From<ExprError> for ReaderError {
    fn from(value: ExprError) -> Self {
        Self::new(ReaderErrorKind::ExpressionSyntax(value))
    }
}

impl From<serde_yaml::Error> for ReaderError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::schema(value.to_string())
    }
}
