// dtFabric
// SPDX-License-Identifier: MPL-2.0

/// A language-neutral decoded value (§6.3).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// A single decoded code point (`character`).
    Character(u32),
    Text(String),
    Bytes(Vec<u8>),
    /// Declaration-order decode of a `sequence`/`stream`.
    Sequence(Vec<Value>),
    /// Declaration-order member decodes of a `structure`.
    Structure(Vec<(String, Value)>),
    /// Per-member decodes of a `union`, all read from the same offset.
    Union(Vec<(String, Value)>),
    /// Entry decodes of a top-level `format`.
    Format(Vec<(String, Value)>),
    Enumeration(EnumerationValue),
}

impl Value {
    /// The integer this value represents, if it is integer-shaped
    /// (`Integer`, `Boolean`, `Character`, or a raw `Enumeration`).
    ///
    /// Used to feed decoded member values into a [`crate::MapContext`] for
    /// subsequent size/count/condition expressions.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Boolean(b) => Some(if *b { 1 } else { 0 }),
            Value::Character(c) => Some(*c as i64),
            Value::Enumeration(EnumerationValue::Raw(v)) => Some(*v),
            Value::Enumeration(EnumerationValue::Named(_, v)) => Some(*v),
            _ => None,
        }
    }
}

/// §6.3: an enumeration decodes as its symbolic name when the numeric value
/// matches a declared variant, otherwise as the raw integer. The matched
/// variant's number travels alongside its name so a later expression can
/// still reference the member (§4.5: decoded members feed the MapContext
/// regardless of kind).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumerationValue {
    Named(String, i64),
    Raw(i64),
}
