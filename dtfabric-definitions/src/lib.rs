// dtFabric
// SPDX-License-Identifier: MPL-2.0

#![warn(missing_docs)]

//! The typed object graph of dtFabric data-type definitions, the attributes
//! each kind carries, and the registry that stores them.
//!
//! This crate has no opinion on YAML or bytes: `dtfabric-reader` builds
//! [`Definition`] values from schema documents, and `dtfabric-map` builds
//! runtime decoders from resolved ones.

mod attributes;
mod common;
mod definition;
mod error;
mod registry;

pub use attributes::{
    ConstantAttributes, ElementBound, ElementSequenceAttributes, EnumerationAttributes,
    EnumerationVariant, FormatAttributes, InlineType, LayoutEntry, Member, MemberType,
    PaddingAttributes, Pin, StringAttributes, StructureAttributes, StructureFamilyAttributes,
    StructureGroupAttributes, TextEncoding,
};
pub use common::{
    BooleanAttributes, ByteOrder, CommonInfo, DefinitionId, FixedSizeAttributes, IntegerFormat,
    SizeSpec, TypeRef, Units,
};
pub use definition::Definition;
pub use error::DefinitionError;
pub use registry::Registry;
