// dtFabric
// SPDX-License-Identifier: MPL-2.0

use crate::attributes::{
    ConstantAttributes, ElementSequenceAttributes, EnumerationAttributes, FormatAttributes,
    PaddingAttributes, StringAttributes, StructureAttributes, StructureFamilyAttributes,
    StructureGroupAttributes,
};
use crate::common::{BooleanAttributes, CommonInfo, FixedSizeAttributes, IntegerFormat};

/// A single named data-type definition, tagged by kind (§3.1).
///
/// Modeled as a sum type with one constructor per kind rather than dynamic
/// dispatch on a `type` tag, per the design note favoring tagged variants
/// for the definition model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    Boolean(CommonInfo, FixedSizeAttributes, BooleanAttributes),
    Character(CommonInfo, FixedSizeAttributes),
    Integer(CommonInfo, FixedSizeAttributes, IntegerFormat),
    FloatingPoint(CommonInfo, FixedSizeAttributes),
    Uuid(CommonInfo, FixedSizeAttributes),
    Sequence(CommonInfo, ElementSequenceAttributes),
    Stream(CommonInfo, ElementSequenceAttributes),
    String(CommonInfo, ElementSequenceAttributes, StringAttributes),
    Padding(CommonInfo, PaddingAttributes),
    Structure(CommonInfo, StructureAttributes),
    Union(CommonInfo, StructureAttributes),
    Constant(CommonInfo, ConstantAttributes),
    Enumeration(CommonInfo, FixedSizeAttributes, EnumerationAttributes),
    Format(CommonInfo, FormatAttributes),
    StructureFamily(CommonInfo, StructureFamilyAttributes),
    StructureGroup(CommonInfo, StructureGroupAttributes),
}

impl Definition {
    /// The definition's `name`, unique within its registry.
    pub fn name(&self) -> &str {
        &self.common().name
    }

    /// The definition's extra lookup keys.
    pub fn aliases(&self) -> &[String] {
        &self.common().aliases
    }

    /// A short tag naming this definition's kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Definition::Boolean(..) => "boolean",
            Definition::Character(..) => "character",
            Definition::Integer(..) => "integer",
            Definition::FloatingPoint(..) => "floating-point",
            Definition::Uuid(..) => "uuid",
            Definition::Sequence(..) => "sequence",
            Definition::Stream(..) => "stream",
            Definition::String(..) => "string",
            Definition::Padding(..) => "padding",
            Definition::Structure(..) => "structure",
            Definition::Union(..) => "union",
            Definition::Constant(..) => "constant",
            Definition::Enumeration(..) => "enumeration",
            Definition::Format(..) => "format",
            Definition::StructureFamily(..) => "structure-family",
            Definition::StructureGroup(..) => "structure-group",
        }
    }

    pub fn common(&self) -> &CommonInfo {
        match self {
            Definition::Boolean(c, ..)
            | Definition::Character(c, ..)
            | Definition::Integer(c, ..)
            | Definition::FloatingPoint(c, ..)
            | Definition::Uuid(c, ..)
            | Definition::Sequence(c, ..)
            | Definition::Stream(c, ..)
            | Definition::String(c, ..)
            | Definition::Padding(c, ..)
            | Definition::Structure(c, ..)
            | Definition::Union(c, ..)
            | Definition::Constant(c, ..)
            | Definition::Enumeration(c, ..)
            | Definition::Format(c, ..)
            | Definition::StructureFamily(c, ..)
            | Definition::StructureGroup(c, ..) => c,
        }
    }

    pub fn common_mut(&mut self) -> &mut CommonInfo {
        match self {
            Definition::Boolean(c, ..)
            | Definition::Character(c, ..)
            | Definition::Integer(c, ..)
            | Definition::FloatingPoint(c, ..)
            | Definition::Uuid(c, ..)
            | Definition::Sequence(c, ..)
            | Definition::Stream(c, ..)
            | Definition::String(c, ..)
            | Definition::Padding(c, ..)
            | Definition::Structure(c, ..)
            | Definition::Union(c, ..)
            | Definition::Constant(c, ..)
            | Definition::Enumeration(c, ..)
            | Definition::Format(c, ..)
            | Definition::StructureFamily(c, ..)
            | Definition::StructureGroup(c, ..) => c,
        }
    }

    /// Whether this kind owns an ordered member list (`structure`/`union`).
    pub fn is_structure_like(&self) -> bool {
        matches!(self, Definition::Structure(..) | Definition::Union(..))
    }
}
