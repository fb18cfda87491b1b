// dtFabric
// SPDX-License-Identifier: MPL-2.0

use std::fmt;

/// An index into a [`crate::Registry`]'s definition arena.
///
/// Definitions reference each other by name prior to resolution and by
/// `DefinitionId` afterwards (see [`crate::TypeRef`]); this is the "arena
/// keyed by a definition identifier" shape called for by the schema
/// specification's design notes, used instead of shared ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefinitionId(pub(crate) u32);

impl DefinitionId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reference to another definition by name, which becomes a direct
/// [`DefinitionId`] handle after the reader's resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// The name as it appeared in the schema document, not yet resolved.
    Unresolved(String),
    /// A resolved handle into the owning registry's arena.
    Resolved(DefinitionId),
}

impl TypeRef {
    /// Returns the unresolved name, if this reference has not yet been resolved.
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRef::Unresolved(name) => Some(name),
            TypeRef::Resolved(_) => None,
        }
    }

    /// Returns the resolved id, if this reference has been resolved.
    pub fn id(&self) -> Option<DefinitionId> {
        match self {
            TypeRef::Unresolved(_) => None,
            TypeRef::Resolved(id) => Some(*id),
        }
    }

    pub(crate) fn resolve_to(&mut self, id: DefinitionId) {
        *self = TypeRef::Resolved(id);
    }
}

/// Byte order for multi-byte fixed-size values.
///
/// `Native` is resolved once per process against the host's byte order (see
/// [`crate::host_byte_order`] in `dtfabric-map`); there is no middle-endian
/// support (explicit non-goal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
    Native,
}

/// The encoded size of a fixed-size value: a literal byte count, or the
/// literal `native` (the host pointer-sized convention does not apply here;
/// `native` size still resolves to a fixed byte count per kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSpec {
    Bytes(u8),
    Native,
}

/// The unit `size` is expressed in. Only `bytes` is supported at present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    #[default]
    Bytes,
}

/// `signed` or `unsigned` for `integer` definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerFormat {
    Signed,
    Unsigned,
}

/// Attributes shared by every fixed-size storage kind (§3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedSizeAttributes {
    pub byte_order: Option<ByteOrder>,
    pub size: SizeSpec,
    pub units: Units,
}

/// Attributes specific to `boolean`: the false encoding, and optionally the
/// single true encoding that must be matched exactly (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BooleanAttributes {
    pub false_value: i64,
    pub true_value: Option<i64>,
}

impl Default for BooleanAttributes {
    fn default() -> Self {
        Self {
            false_value: 0,
            true_value: None,
        }
    }
}

/// Fields every definition carries regardless of kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommonInfo {
    pub name: String,
    pub aliases: Vec<String>,
    pub description: Option<String>,
    pub urls: Vec<String>,
}
