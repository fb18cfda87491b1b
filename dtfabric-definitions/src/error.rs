// dtFabric
// SPDX-License-Identifier: MPL-2.0

use thiserror::Error;

/// Errors raised by [`crate::Registry`] operations (§4.1, §7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// Two definitions share a name or alias; registration order does not matter.
    #[error("duplicate name or alias '{0}'")]
    DuplicateName(String),
    /// A referenced name has no registered definition.
    #[error("unresolved reference to '{0}'")]
    UnresolvedReference(String),
}
