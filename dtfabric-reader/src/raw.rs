// dtFabric
// SPDX-License-Identifier: MPL-2.0

//! The serde-deserializable shape of a single YAML document (§6.1). Each
//! variant accepts exactly the attribute keys its kind defines in §3.1 —
//! `deny_unknown_fields` rejects anything else, and required fields with no
//! `#[serde(default)]` reject omission, giving most of §4.2 step 2 "for
//! free" from the shape of the type alone.
//!
//! Common fields (`name`, `aliases`, `description`, `urls`) are duplicated
//! into every variant rather than flattened from a shared struct: serde does
//! not support `flatten` together with `deny_unknown_fields`.

use serde::Deserialize;

fn default_units() -> RawUnits {
    RawUnits::Bytes
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum RawByteOrder {
    BigEndian,
    LittleEndian,
    Native,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum RawUnits {
    Bytes,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum RawIntegerFormat {
    Signed,
    Unsigned,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub(crate) enum RawSize {
    Bytes(u64),
    Keyword(String),
}

/// Either a bare integer literal or an expression source string — both
/// `number_of_elements: 12` and `number_of_elements: sphere3d.count` parse
/// through this type.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub(crate) enum RawExprSource {
    Int(i64),
    Text(String),
}

impl RawExprSource {
    pub(crate) fn as_text(&self) -> String {
        match self {
            RawExprSource::Int(v) => v.to_string(),
            RawExprSource::Text(s) => s.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub(crate) enum RawPinValue {
    Int(i64),
    Bytes(Vec<u8>),
    Hex(String),
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawEncoding {
    #[serde(rename = "ascii")]
    Ascii,
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "utf-16")]
    Utf16,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawFixedSize {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub byte_order: Option<RawByteOrder>,
    pub size: RawSize,
    #[serde(default = "default_units")]
    pub units: RawUnits,
    #[serde(default)]
    pub format: Option<RawIntegerFormat>,
    #[serde(default)]
    pub false_value: Option<i64>,
    #[serde(default)]
    pub true_value: Option<i64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawElementSequence {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    pub element_data_type: String,
    #[serde(default)]
    pub number_of_elements: Option<RawExprSource>,
    #[serde(default)]
    pub elements_data_size: Option<RawExprSource>,
    #[serde(default)]
    pub elements_terminator: Option<i64>,
    #[serde(default)]
    pub encoding: Option<RawEncoding>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawPadding {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    pub alignment_size: u8,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawInlineMember {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub element_data_type: Option<String>,
    #[serde(default)]
    pub number_of_elements: Option<RawExprSource>,
    #[serde(default)]
    pub elements_data_size: Option<RawExprSource>,
    #[serde(default)]
    pub elements_terminator: Option<i64>,
    #[serde(default)]
    pub encoding: Option<RawEncoding>,
    #[serde(default)]
    pub alignment_size: Option<u8>,
    #[serde(default)]
    pub value: Option<RawPinValue>,
    #[serde(default)]
    pub values: Option<Vec<RawPinValue>>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawNamedMember {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    pub data_type: String,
    #[serde(default)]
    pub value: Option<RawPinValue>,
    #[serde(default)]
    pub values: Option<Vec<RawPinValue>>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub(crate) enum RawMember {
    Inline(RawInlineMember),
    Named(RawNamedMember),
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawStructure {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub members: Vec<RawMember>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawConstant {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    pub value: i64,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawEnumerationVariant {
    pub name: String,
    pub number: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawEnumeration {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub byte_order: Option<RawByteOrder>,
    pub size: RawSize,
    #[serde(default = "default_units")]
    pub units: RawUnits,
    pub values: Vec<RawEnumerationVariant>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawLayoutEntry {
    pub data_type: String,
    pub offset: u64,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawFormat {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    pub layout: Vec<RawLayoutEntry>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawStructureFamily {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    pub base: String,
    pub members: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawStructureGroup {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    pub base: String,
    pub identifier: String,
    pub members: Vec<String>,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub(crate) enum RawDocument {
    Boolean(RawFixedSize),
    Character(RawFixedSize),
    Integer(RawFixedSize),
    FloatingPoint(RawFixedSize),
    Uuid(RawFixedSize),
    Sequence(RawElementSequence),
    Stream(RawElementSequence),
    String(RawElementSequence),
    Padding(RawPadding),
    Structure(RawStructure),
    Union(RawStructure),
    Constant(RawConstant),
    Enumeration(RawEnumeration),
    Format(RawFormat),
    StructureFamily(RawStructureFamily),
    StructureGroup(RawStructureGroup),
}
