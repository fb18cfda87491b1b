// dtFabric
// SPDX-License-Identifier: MPL-2.0

use dtfabric_expr::{Condition, Expr};

use crate::common::TypeRef;

/// Text encodings supported by `string` definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Ascii,
    Utf8,
    Utf16,
}

/// The three mutually-compatible ways a `sequence`/`stream`/`string` can
/// bound its element run (§3.1). At least one of `count`/`data_size` must be
/// set, or `terminator` must be set; since revision 20200621 a terminator
/// may coexist with one of the other two.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementBound {
    pub number_of_elements: Option<Expr>,
    pub elements_data_size: Option<Expr>,
    /// Compared against each decoded element's integer value (§4.5:
    /// "exact bitwise equality of the element-sized value" — equivalent to
    /// comparing the already-decoded value, since decoding and comparison
    /// use the same element size and byte order).
    pub elements_terminator: Option<i64>,
}

/// Attributes shared by `sequence`, `stream`, and `string` (§3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSequenceAttributes {
    pub element_data_type: TypeRef,
    pub bound: ElementBound,
}

/// Attributes specific to `string`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringAttributes {
    pub encoding: TextEncoding,
}

/// Attributes for `padding`: advance to the next multiple of `alignment_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingAttributes {
    pub alignment_size: u8,
}

/// A pinned expected byte pattern on a member: a single pattern (`value`) or
/// a set of acceptable patterns (`values`) — mutually exclusive (§3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pin {
    Value(Vec<u8>),
    Values(Vec<Vec<u8>>),
}

impl Pin {
    /// Whether `bytes` satisfies this pin.
    pub fn accepts(&self, bytes: &[u8]) -> bool {
        match self {
            Pin::Value(v) => v.as_slice() == bytes,
            Pin::Values(vs) => vs.iter().any(|v| v.as_slice() == bytes),
        }
    }
}

/// An inline, anonymous member type — only `sequence`/`stream`/`string`/`padding`
/// may be declared this way (§3.2); every other kind must be a named reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineType {
    Sequence(ElementSequenceAttributes),
    Stream(ElementSequenceAttributes),
    String(ElementSequenceAttributes, StringAttributes),
    Padding(PaddingAttributes),
}

/// A member's declared type: either a named reference or an inline anonymous type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberType {
    Named(TypeRef),
    Inline(InlineType),
}

/// A member of a `structure` or `union` (§3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Required unless the parent is a `union`.
    pub name: Option<String>,
    pub aliases: Vec<String>,
    pub description: Option<String>,
    /// Gates presence; defaults to always-present when absent.
    pub condition: Option<Condition>,
    pub data_type: MemberType,
    pub pin: Option<Pin>,
}

/// Attributes for `structure` and `union`: an ordered list of members.
///
/// For `structure` the order is the declaration (and decode) order; for
/// `union` every member shares the same starting offset, but the list is
/// still stored in declaration order for deterministic iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureAttributes {
    pub members: Vec<Member>,
}

/// Attributes for `constant`: a single literal integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantAttributes {
    pub value: i64,
}

/// One variant of an `enumeration`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationVariant {
    pub name: String,
    pub number: i64,
    pub description: Option<String>,
    pub aliases: Vec<String>,
}

/// Attributes for `enumeration`: an ordered list of named numeric variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationAttributes {
    pub variants: Vec<EnumerationVariant>,
}

/// One entry of a `format`'s `layout` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    pub data_type: TypeRef,
    pub offset: u64,
}

/// Attributes for `format`: the top-level descriptor binding data types to
/// absolute offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatAttributes {
    pub layout: Vec<LayoutEntry>,
}

/// Attributes for `structure-family`: variant structures that share a base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureFamilyAttributes {
    pub base: TypeRef,
    pub variants: Vec<TypeRef>,
}

/// Attributes for `structure-group`: a tagged union dispatched by a
/// discriminant member on the base structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureGroupAttributes {
    pub base: TypeRef,
    pub identifier: String,
    pub variants: Vec<TypeRef>,
    pub default: Option<TypeRef>,
}
