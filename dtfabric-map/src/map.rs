// dtFabric
// SPDX-License-Identifier: MPL-2.0

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use byteorder::{BigEndian, ByteOrder as Endian, LittleEndian, WriteBytesExt};
use log::trace;

use dtfabric_definitions::{
    ByteOrder, Definition, DefinitionId, ElementBound, EnumerationVariant, IntegerFormat, Member,
    MemberType, Pin, Registry, SizeSpec, TextEncoding,
};
use dtfabric_expr::{eval, eval_condition, Condition, ExprContext};

use crate::byte_order::resolve as resolved_byte_order;
use crate::context::{MapContext, Scope};
use crate::error::{MapError, MapErrorKind};
use crate::options::{DecodingOptions, DepthLock};
use crate::value::{EnumerationValue, Value};

const BOOLEAN_NATIVE_SIZE: u8 = 1;
const CHARACTER_NATIVE_SIZE: u8 = 4;
const INTEGER_NATIVE_SIZE: u8 = 4;
const FLOAT_NATIVE_SIZE: u8 = 8;
const ENUMERATION_NATIVE_SIZE: u8 = 4;

fn resolve_size(spec: SizeSpec, kind_default: u8) -> u8 {
    match spec {
        SizeSpec::Bytes(n) => n,
        SizeSpec::Native => kind_default,
    }
}

/// A structure/union member bound to its built child map (§4.4).
#[derive(Debug)]
pub struct MappedMember {
    pub name: Option<String>,
    pub aliases: Vec<String>,
    pub condition: Option<Condition>,
    pub pin: Option<Pin>,
    pub map: Rc<DataTypeMap>,
}

impl MappedMember {
    fn matches(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name) || self.aliases.iter().any(|a| a == name)
    }
}

/// A runtime decoder built from a resolved [`Definition`] (§4.4). One variant
/// per definition kind; composite kinds hold child maps built recursively.
#[derive(Debug)]
pub enum DataTypeMap {
    Boolean {
        name: String,
        byte_order: ByteOrder,
        size: u8,
        false_value: i64,
        true_value: Option<i64>,
    },
    Character {
        name: String,
        byte_order: ByteOrder,
        size: u8,
    },
    Integer {
        name: String,
        byte_order: ByteOrder,
        size: u8,
        format: IntegerFormat,
    },
    FloatingPoint {
        name: String,
        byte_order: ByteOrder,
        size: u8,
    },
    Uuid {
        name: String,
        byte_order: ByteOrder,
    },
    Sequence {
        name: String,
        element: Rc<DataTypeMap>,
        bound: ElementBound,
    },
    Stream {
        name: String,
        element: Rc<DataTypeMap>,
        bound: ElementBound,
    },
    String {
        name: String,
        element: Rc<DataTypeMap>,
        bound: ElementBound,
        encoding: TextEncoding,
    },
    Padding {
        name: String,
        alignment_size: u8,
    },
    Structure {
        name: String,
        members: Vec<MappedMember>,
    },
    Union {
        name: String,
        members: Vec<MappedMember>,
    },
    Constant {
        name: String,
        value: i64,
    },
    Enumeration {
        name: String,
        byte_order: ByteOrder,
        size: u8,
        variants: Vec<EnumerationVariant>,
    },
    Format {
        name: String,
        layout: Vec<(Rc<DataTypeMap>, u64)>,
    },
    StructureFamily {
        name: String,
        base: Rc<DataTypeMap>,
        variants: HashMap<String, Rc<DataTypeMap>>,
    },
    StructureGroup {
        name: String,
        base: Rc<DataTypeMap>,
        identifier: String,
        variants: Vec<Rc<DataTypeMap>>,
        default: Option<Rc<DataTypeMap>>,
    },
}

impl DataTypeMap {
    pub fn name(&self) -> &str {
        match self {
            DataTypeMap::Boolean { name, .. }
            | DataTypeMap::Character { name, .. }
            | DataTypeMap::Integer { name, .. }
            | DataTypeMap::FloatingPoint { name, .. }
            | DataTypeMap::Uuid { name, .. }
            | DataTypeMap::Sequence { name, .. }
            | DataTypeMap::Stream { name, .. }
            | DataTypeMap::String { name, .. }
            | DataTypeMap::Padding { name, .. }
            | DataTypeMap::Structure { name, .. }
            | DataTypeMap::Union { name, .. }
            | DataTypeMap::Constant { name, .. }
            | DataTypeMap::Enumeration { name, .. }
            | DataTypeMap::Format { name, .. }
            | DataTypeMap::StructureFamily { name, .. }
            | DataTypeMap::StructureGroup { name, .. } => name,
        }
    }

    /// The fixed encoded size, or `None` if any part of this definition is
    /// variable-length, conditional, or dispatch-based (§4.5 "Size contracts").
    pub fn get_byte_size(&self) -> Option<usize> {
        match self {
            DataTypeMap::Boolean { size, .. }
            | DataTypeMap::Character { size, .. }
            | DataTypeMap::Integer { size, .. }
            | DataTypeMap::FloatingPoint { size, .. }
            | DataTypeMap::Enumeration { size, .. } => Some(*size as usize),
            DataTypeMap::Uuid { .. } => Some(16),
            DataTypeMap::Constant { .. } => Some(0),
            DataTypeMap::Sequence { element, bound, .. }
            | DataTypeMap::Stream { element, bound, .. }
            | DataTypeMap::String { element, bound, .. } => static_element_count(bound)
                .map(|count| count as usize)
                .and_then(|count| element.get_byte_size().map(|size| count * size)),
            DataTypeMap::Padding { .. } => None,
            DataTypeMap::Structure { members, .. } => fixed_size_of_members(members),
            DataTypeMap::Union { members, .. } => {
                if members.iter().any(|m| m.condition.is_some()) {
                    return None;
                }
                let mut max = 0usize;
                for m in members {
                    max = max.max(m.map.get_byte_size()?);
                }
                Some(max)
            }
            DataTypeMap::Format { layout, .. } => {
                let mut end = 0usize;
                for (map, offset) in layout {
                    let size = map.get_byte_size()?;
                    end = end.max(*offset as usize + size);
                }
                Some(end)
            }
            DataTypeMap::StructureFamily { .. } | DataTypeMap::StructureGroup { .. } => None,
        }
    }
}

/// `padding` is the one variable-shaped kind whose contribution is still
/// statically computable, as long as every member before it in the same
/// structure is itself fixed-size: its length depends only on the running
/// byte offset, not on anything read from the stream.
fn fixed_size_of_members(members: &[MappedMember]) -> Option<usize> {
    let mut offset = 0usize;
    for member in members {
        if member.condition.is_some() {
            return None;
        }
        if let DataTypeMap::Padding { alignment_size, .. } = member.map.as_ref() {
            let alignment = *alignment_size as usize;
            let pad = (alignment - (offset % alignment)) % alignment;
            offset += pad;
            continue;
        }
        offset += member.map.get_byte_size()?;
    }
    Some(offset)
}

/// An `ElementBound`'s count, if `number_of_elements` is set and its
/// expression references no MapContext path — a literal count makes an
/// otherwise "variable-size" sequence/stream/string fixed-size after all.
fn static_element_count(bound: &ElementBound) -> Option<i64> {
    if bound.elements_terminator.is_some() {
        return None;
    }
    let expr = bound.number_of_elements.as_ref()?;
    let mut references_context = false;
    expr.for_each_path(|_| references_context = true);
    if references_context {
        return None;
    }
    struct NoContext;
    impl ExprContext for NoContext {
        fn resolve(&self, _path: &[String]) -> Option<i64> {
            None
        }
    }
    eval(expr, &NoContext).ok().filter(|count| *count >= 0)
}

/// Builds [`DataTypeMap`]s from a resolved [`Registry`], caching by
/// [`DefinitionId`] so repeated requests for the same definition return the
/// same instance (§4.4).
pub struct Factory<'r> {
    registry: &'r Registry,
    cache: RefCell<HashMap<DefinitionId, Rc<DataTypeMap>>>,
}

impl<'r> Factory<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn build_by_name(&self, name: &str) -> Result<Rc<DataTypeMap>, MapError> {
        let id = self
            .registry
            .lookup(name)
            .ok_or_else(|| MapError::new(MapErrorKind::UnboundExpressionPath(name.to_owned())))?;
        self.build(id)
    }

    pub fn build(&self, id: DefinitionId) -> Result<Rc<DataTypeMap>, MapError> {
        if let Some(existing) = self.cache.borrow().get(&id) {
            return Ok(existing.clone());
        }
        let def = self.registry.get(id);
        trace!("building map for '{}' ({})", def.name(), def.kind_name());
        let map = Rc::new(self.build_definition(def)?);
        self.cache.borrow_mut().insert(id, map.clone());
        Ok(map)
    }

    fn build_ref(&self, target: dtfabric_definitions::TypeRef) -> Result<Rc<DataTypeMap>, MapError> {
        let id = target
            .id()
            .expect("reference resolved before a Map is ever built");
        self.build(id)
    }

    fn build_definition(&self, def: &Definition) -> Result<DataTypeMap, MapError> {
        let name = def.name().to_owned();
        Ok(match def {
            Definition::Boolean(_, fixed, attrs) => DataTypeMap::Boolean {
                name,
                byte_order: fixed.byte_order.unwrap_or(ByteOrder::LittleEndian),
                size: resolve_size(fixed.size, BOOLEAN_NATIVE_SIZE),
                false_value: attrs.false_value,
                true_value: attrs.true_value,
            },
            Definition::Character(_, fixed) => DataTypeMap::Character {
                name,
                byte_order: fixed.byte_order.unwrap_or(ByteOrder::LittleEndian),
                size: resolve_size(fixed.size, CHARACTER_NATIVE_SIZE),
            },
            Definition::Integer(_, fixed, format) => DataTypeMap::Integer {
                name,
                byte_order: fixed.byte_order.unwrap_or(ByteOrder::LittleEndian),
                size: resolve_size(fixed.size, INTEGER_NATIVE_SIZE),
                format: *format,
            },
            Definition::FloatingPoint(_, fixed) => DataTypeMap::FloatingPoint {
                name,
                byte_order: fixed.byte_order.unwrap_or(ByteOrder::LittleEndian),
                size: resolve_size(fixed.size, FLOAT_NATIVE_SIZE),
            },
            Definition::Uuid(_, fixed) => DataTypeMap::Uuid {
                name,
                byte_order: fixed.byte_order.unwrap_or(ByteOrder::LittleEndian),
            },
            Definition::Sequence(_, attrs) => DataTypeMap::Sequence {
                name,
                element: self.build_ref(attrs.element_data_type.clone())?,
                bound: attrs.bound.clone(),
            },
            Definition::Stream(_, attrs) => DataTypeMap::Stream {
                name,
                element: self.build_ref(attrs.element_data_type.clone())?,
                bound: attrs.bound.clone(),
            },
            Definition::String(_, attrs, string_attrs) => DataTypeMap::String {
                name,
                element: self.build_ref(attrs.element_data_type.clone())?,
                bound: attrs.bound.clone(),
                encoding: string_attrs.encoding,
            },
            Definition::Padding(_, attrs) => DataTypeMap::Padding {
                name,
                alignment_size: attrs.alignment_size,
            },
            Definition::Structure(_, attrs) => DataTypeMap::Structure {
                name,
                members: self.build_members(&attrs.members)?,
            },
            Definition::Union(_, attrs) => DataTypeMap::Union {
                name,
                members: self.build_members(&attrs.members)?,
            },
            Definition::Constant(_, attrs) => DataTypeMap::Constant {
                name,
                value: attrs.value,
            },
            Definition::Enumeration(_, fixed, attrs) => DataTypeMap::Enumeration {
                name,
                byte_order: fixed.byte_order.unwrap_or(ByteOrder::LittleEndian),
                size: resolve_size(fixed.size, ENUMERATION_NATIVE_SIZE),
                variants: attrs.variants.clone(),
            },
            Definition::Format(_, attrs) => DataTypeMap::Format {
                name,
                layout: attrs
                    .layout
                    .iter()
                    .map(|entry| Ok((self.build_ref(entry.data_type.clone())?, entry.offset)))
                    .collect::<Result<Vec<_>, MapError>>()?,
            },
            Definition::StructureFamily(_, attrs) => DataTypeMap::StructureFamily {
                name,
                base: self.build_ref(attrs.base.clone())?,
                variants: attrs
                    .variants
                    .iter()
                    .map(|v| {
                        let map = self.build_ref(v.clone())?;
                        Ok((map.name().to_owned(), map))
                    })
                    .collect::<Result<HashMap<_, _>, MapError>>()?,
            },
            Definition::StructureGroup(_, attrs) => DataTypeMap::StructureGroup {
                name,
                base: self.build_ref(attrs.base.clone())?,
                identifier: attrs.identifier.clone(),
                variants: attrs
                    .variants
                    .iter()
                    .map(|v| self.build_ref(v.clone()))
                    .collect::<Result<Vec<_>, MapError>>()?,
                default: attrs.default.clone().map(|d| self.build_ref(d)).transpose()?,
            },
        })
    }

    fn build_members(&self, members: &[Member]) -> Result<Vec<MappedMember>, MapError> {
        members.iter().map(|m| self.build_member(m)).collect()
    }

    fn build_member(&self, member: &Member) -> Result<MappedMember, MapError> {
        let map = match &member.data_type {
            MemberType::Named(r) => self.build_ref(r.clone())?,
            MemberType::Inline(inline) => Rc::new(self.build_inline(inline)?),
        };
        Ok(MappedMember {
            name: member.name.clone(),
            aliases: member.aliases.clone(),
            condition: member.condition.clone(),
            pin: member.pin.clone(),
            map,
        })
    }

    fn build_inline(
        &self,
        inline: &dtfabric_definitions::InlineType,
    ) -> Result<DataTypeMap, MapError> {
        use dtfabric_definitions::InlineType;
        Ok(match inline {
            InlineType::Sequence(attrs) => DataTypeMap::Sequence {
                name: "<inline sequence>".to_owned(),
                element: self.build_ref(attrs.element_data_type.clone())?,
                bound: attrs.bound.clone(),
            },
            InlineType::Stream(attrs) => DataTypeMap::Stream {
                name: "<inline stream>".to_owned(),
                element: self.build_ref(attrs.element_data_type.clone())?,
                bound: attrs.bound.clone(),
            },
            InlineType::String(attrs, string_attrs) => DataTypeMap::String {
                name: "<inline string>".to_owned(),
                element: self.build_ref(attrs.element_data_type.clone())?,
                bound: attrs.bound.clone(),
                encoding: string_attrs.encoding,
            },
            InlineType::Padding(attrs) => DataTypeMap::Padding {
                name: "<inline padding>".to_owned(),
                alignment_size: attrs.alignment_size,
            },
        })
    }
}

fn require_bytes<'b>(
    bytes: &'b [u8],
    offset: usize,
    len: usize,
    name: &str,
) -> Result<&'b [u8], MapError> {
    bytes
        .get(offset..offset + len)
        .ok_or_else(|| MapError::too_small(offset, len, bytes.len().saturating_sub(offset)).in_definition(name))
}

fn read_uint(slice: &[u8], order: ByteOrder) -> u64 {
    match order {
        ByteOrder::BigEndian => BigEndian::read_uint(slice, slice.len()),
        ByteOrder::LittleEndian => LittleEndian::read_uint(slice, slice.len()),
        ByteOrder::Native => unreachable!("resolved before any byte is read"),
    }
}

fn read_int(slice: &[u8], order: ByteOrder) -> i64 {
    match order {
        ByteOrder::BigEndian => BigEndian::read_int(slice, slice.len()),
        ByteOrder::LittleEndian => LittleEndian::read_int(slice, slice.len()),
        ByteOrder::Native => unreachable!("resolved before any byte is read"),
    }
}

fn encode_int(value: i64, order: ByteOrder, size: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(size as usize);
    match order {
        ByteOrder::BigEndian => buf.write_int::<BigEndian>(value, size as usize).unwrap(),
        ByteOrder::LittleEndian => buf.write_int::<LittleEndian>(value, size as usize).unwrap(),
        ByteOrder::Native => unreachable!("resolved before any byte is written"),
    }
    buf
}

impl DataTypeMap {
    /// Decodes one value starting at `offset`, returning the value and the
    /// number of bytes consumed (§4.5). `scope` supplies the MapContext used
    /// to evaluate `condition`/`number_of_elements`/`elements_data_size`;
    /// absent for a standalone, context-free decode.
    pub fn map_byte_stream(
        &self,
        bytes: &[u8],
        offset: usize,
        scope: Option<&Scope<'_>>,
        options: &DecodingOptions,
    ) -> Result<(Value, usize), MapError> {
        let _lock = DepthLock::obtain(&options.depth_gauge)?;
        match self {
            DataTypeMap::Boolean {
                name,
                byte_order,
                size,
                false_value,
                true_value,
            } => {
                let order = resolved_byte_order(*byte_order);
                let slice = require_bytes(bytes, offset, *size as usize, name)?;
                let raw = read_uint(slice, order) as i64;
                if raw == *false_value {
                    Ok((Value::Boolean(false), *size as usize))
                } else if true_value.is_none() || *true_value == Some(raw) {
                    Ok((Value::Boolean(true), *size as usize))
                } else {
                    Err(MapError::new(MapErrorKind::InvalidBooleanEncoding {
                        raw,
                        false_value: *false_value,
                    })
                    .in_definition(name)
                    .at_offset(offset))
                }
            }
            DataTypeMap::Character {
                name,
                byte_order,
                size,
            } => {
                let order = resolved_byte_order(*byte_order);
                let slice = require_bytes(bytes, offset, *size as usize, name)?;
                let code_point = read_uint(slice, order) as u32;
                Ok((Value::Character(code_point), *size as usize))
            }
            DataTypeMap::Integer {
                name,
                byte_order,
                size,
                format,
            } => {
                let order = resolved_byte_order(*byte_order);
                let slice = require_bytes(bytes, offset, *size as usize, name)?;
                let raw = match format {
                    IntegerFormat::Signed => read_int(slice, order),
                    IntegerFormat::Unsigned => read_uint(slice, order) as i64,
                };
                Ok((Value::Integer(raw), *size as usize))
            }
            DataTypeMap::FloatingPoint {
                name,
                byte_order,
                size,
            } => {
                let order = resolved_byte_order(*byte_order);
                let slice = require_bytes(bytes, offset, *size as usize, name)?;
                let value = match (*size, order) {
                    (4, ByteOrder::BigEndian) => BigEndian::read_f32(slice) as f64,
                    (4, ByteOrder::LittleEndian) => LittleEndian::read_f32(slice) as f64,
                    (8, ByteOrder::BigEndian) => BigEndian::read_f64(slice),
                    (8, ByteOrder::LittleEndian) => LittleEndian::read_f64(slice),
                    _ => unreachable!("only sizes 4 and 8 pass schema validation"),
                };
                Ok((Value::Float(value), *size as usize))
            }
            DataTypeMap::Uuid { name, byte_order } => {
                let order = resolved_byte_order(*byte_order);
                let slice = require_bytes(bytes, offset, 16, name)?;
                let mut canonical = [0u8; 16];
                let (d1, d2, d3) = match order {
                    ByteOrder::BigEndian => (
                        BigEndian::read_u32(&slice[0..4]),
                        BigEndian::read_u16(&slice[4..6]),
                        BigEndian::read_u16(&slice[6..8]),
                    ),
                    ByteOrder::LittleEndian => (
                        LittleEndian::read_u32(&slice[0..4]),
                        LittleEndian::read_u16(&slice[4..6]),
                        LittleEndian::read_u16(&slice[6..8]),
                    ),
                    ByteOrder::Native => unreachable!("resolved before any byte is read"),
                };
                BigEndian::write_u32(&mut canonical[0..4], d1);
                BigEndian::write_u16(&mut canonical[4..6], d2);
                BigEndian::write_u16(&mut canonical[6..8], d3);
                canonical[8..16].copy_from_slice(&slice[8..16]);
                Ok((Value::Bytes(canonical.to_vec()), 16))
            }
            DataTypeMap::Sequence { element, bound, .. }
            | DataTypeMap::Stream { element, bound, .. } => {
                let (values, consumed) =
                    decode_element_run(element, bound, bytes, offset, scope, options, self.name())?;
                Ok((Value::Sequence(values), consumed))
            }
            DataTypeMap::String {
                element,
                bound,
                encoding,
                ..
            } => {
                let (values, consumed) =
                    decode_element_run(element, bound, bytes, offset, scope, options, self.name())?;
                let code_points = values
                    .iter()
                    .map(|v| v.as_integer().unwrap_or(0) as u32)
                    .collect::<Vec<_>>();
                let text = decode_text(&code_points, *encoding, self.name())?;
                Ok((Value::Text(text), consumed))
            }
            DataTypeMap::Padding { alignment_size, .. } => {
                let alignment = *alignment_size as usize;
                let pad = (alignment - (offset % alignment)) % alignment;
                require_bytes(bytes, offset, pad, self.name())?;
                Ok((Value::Bytes(Vec::new()), pad))
            }
            DataTypeMap::Structure { name, members } => {
                decode_structure(name, members, bytes, offset, scope, options)
            }
            DataTypeMap::Union { name, members } => {
                let mut decoded = Vec::with_capacity(members.len());
                let mut max_consumed = 0usize;
                for member in members {
                    if let Some(cond) = &member.condition {
                        if !eval_condition_in(cond, scope)? {
                            continue;
                        }
                    }
                    let (value, consumed) = member.map.map_byte_stream(bytes, offset, scope, options)?;
                    check_pin(member, &bytes[offset..offset + consumed], name)?;
                    max_consumed = max_consumed.max(consumed);
                    decoded.push((member_label(member), value));
                }
                Ok((Value::Union(decoded), max_consumed))
            }
            DataTypeMap::Constant { value, .. } => Ok((Value::Integer(*value), 0)),
            DataTypeMap::Enumeration {
                name,
                byte_order,
                size,
                variants,
            } => {
                let order = resolved_byte_order(*byte_order);
                let slice = require_bytes(bytes, offset, *size as usize, name)?;
                let raw = read_int(slice, order);
                let decoded = variants
                    .iter()
                    .find(|v| v.number == raw)
                    .map(|v| EnumerationValue::Named(v.name.clone(), v.number))
                    .unwrap_or(EnumerationValue::Raw(raw));
                Ok((Value::Enumeration(decoded), *size as usize))
            }
            DataTypeMap::Format { layout, .. } => {
                let mut entries = Vec::with_capacity(layout.len());
                let mut end = 0usize;
                for (map, entry_offset) in layout {
                    let entry_offset = *entry_offset as usize;
                    let (value, consumed) =
                        map.map_byte_stream(bytes, offset + entry_offset, scope, options)?;
                    end = end.max(entry_offset + consumed);
                    entries.push((map.name().to_owned(), value));
                }
                Ok((Value::Format(entries), end))
            }
            DataTypeMap::StructureFamily { .. } => Err(MapError::new(MapErrorKind::UnknownGroupVariant)
                .in_definition(self.name())
                .at_offset(offset)),
            DataTypeMap::StructureGroup {
                base,
                identifier,
                variants,
                default,
                ..
            } => decode_structure_group(
                self.name(),
                base,
                identifier,
                variants,
                default.as_ref(),
                bytes,
                offset,
                scope,
                options,
            ),
        }
    }

    /// Decodes a `structure-family` as the named variant (§4.5: "the caller
    /// must pre-select a variant by name").
    pub fn map_family_variant(
        &self,
        variant_name: &str,
        bytes: &[u8],
        offset: usize,
        scope: Option<&Scope<'_>>,
        options: &DecodingOptions,
    ) -> Result<(Value, usize), MapError> {
        match self {
            DataTypeMap::StructureFamily { variants, .. } => {
                let variant = variants.get(variant_name).ok_or_else(|| {
                    MapError::new(MapErrorKind::UnknownGroupVariant)
                        .in_definition(self.name())
                        .at_offset(offset)
                })?;
                variant.map_byte_stream(bytes, offset, scope, options)
            }
            _ => variant_not_a_family(self.name()),
        }
    }
}

fn variant_not_a_family(name: &str) -> Result<(Value, usize), MapError> {
    Err(MapError::new(MapErrorKind::UnknownGroupVariant).in_definition(name))
}

fn member_label(member: &MappedMember) -> String {
    member.name.clone().unwrap_or_default()
}

fn eval_condition_in(condition: &Condition, scope: Option<&Scope<'_>>) -> Result<bool, MapError> {
    match scope {
        Some(s) => Ok(eval_condition(condition, s)?),
        None => Err(MapError::new(MapErrorKind::UnboundExpressionPath(
            "condition requires a map context".to_owned(),
        ))),
    }
}

/// Checks a member's pinned `value`/`values` against the raw bytes it was
/// decoded from. The pin is itself stored as raw bytes encoded with the
/// member's resolved `byte_order`/`size` (`resolve_pending_pins`), so the
/// comparison is byte-for-byte against what was actually read, not a
/// re-encoding of the decoded `Value` (which would need to guess back the
/// member's original size and byte order).
fn check_pin(member: &MappedMember, raw: &[u8], definition_name: &str) -> Result<(), MapError> {
    let Some(pin) = &member.pin else {
        return Ok(());
    };
    if pin.accepts(raw) {
        Ok(())
    } else {
        Err(MapError::new(MapErrorKind::ConstantMismatch)
            .in_definition(definition_name)
            .in_member(member_label(member)))
    }
}

fn decode_structure(
    name: &str,
    members: &[MappedMember],
    bytes: &[u8],
    offset: usize,
    scope: Option<&Scope<'_>>,
    options: &DecodingOptions,
) -> Result<(Value, usize), MapError> {
    let context = MapContext::new(name);
    let own_scope = match scope {
        Some(parent) => Scope::nested(&context, parent),
        None => Scope::root(&context),
    };
    let mut decoded = Vec::with_capacity(members.len());
    let mut cursor = offset;
    for member in members {
        if let Some(cond) = &member.condition {
            if !eval_condition(cond, &own_scope)? {
                continue;
            }
        }
        // `padding` aligns relative to the structure's own start, not to
        // absolute offset zero in `bytes`, so it is computed here from
        // `cursor - offset` instead of going through the generic dispatch.
        let (value, consumed) = if let DataTypeMap::Padding { alignment_size, .. } = member.map.as_ref() {
            let alignment = *alignment_size as usize;
            let relative = cursor - offset;
            let pad = (alignment - (relative % alignment)) % alignment;
            require_bytes(bytes, cursor, pad, name)?;
            (Value::Bytes(Vec::new()), pad)
        } else {
            member.map.map_byte_stream(bytes, cursor, Some(&own_scope), options)?
        };
        check_pin(member, &bytes[cursor..cursor + consumed], name)?;
        cursor += consumed;
        let label = member_label(member);
        if !label.is_empty() {
            context.record(&label, &value);
        }
        decoded.push((label, value));
    }
    if let Some(parent) = scope {
        parent.current().attach(context);
    }
    Ok((Value::Structure(decoded), cursor - offset))
}

fn decode_structure_group(
    name: &str,
    base: &Rc<DataTypeMap>,
    identifier: &str,
    variants: &[Rc<DataTypeMap>],
    default: Option<&Rc<DataTypeMap>>,
    bytes: &[u8],
    offset: usize,
    scope: Option<&Scope<'_>>,
    options: &DecodingOptions,
) -> Result<(Value, usize), MapError> {
    let (base_value, _) = base.map_byte_stream(bytes, offset, scope, options)?;
    let Value::Structure(base_members) = base_value else {
        unreachable!("a structure-group's base always decodes to Value::Structure");
    };
    let discriminant = base_members
        .iter()
        .find(|(member_name, _)| member_name == identifier)
        .and_then(|(_, v)| v.as_integer())
        .ok_or_else(|| {
            MapError::new(MapErrorKind::UnboundExpressionPath(identifier.to_owned()))
                .in_definition(name)
                .at_offset(offset)
        })?;
    let identifier_map = base_member_map(base, identifier)
        .ok_or_else(|| MapError::new(MapErrorKind::UnknownGroupVariant).in_definition(name))?;
    let pattern = match identifier_map.as_ref() {
        DataTypeMap::Integer {
            byte_order, size, ..
        }
        | DataTypeMap::Enumeration {
            byte_order, size, ..
        } => encode_int(discriminant, resolved_byte_order(*byte_order), *size),
        _ => discriminant.to_be_bytes().to_vec(),
    };
    for variant in variants {
        if variant_pins(variant, identifier)
            .map(|pin| pin.accepts(&pattern))
            .unwrap_or(false)
        {
            return variant.map_byte_stream(bytes, offset, scope, options);
        }
    }
    if let Some(default) = default {
        return default.map_byte_stream(bytes, offset, scope, options);
    }
    Err(MapError::new(MapErrorKind::UnknownGroupVariant)
        .in_definition(name)
        .at_offset(offset))
}

fn base_member_map(base: &DataTypeMap, identifier: &str) -> Option<Rc<DataTypeMap>> {
    match base {
        DataTypeMap::Structure { members, .. } => members
            .iter()
            .find(|m| m.matches(identifier))
            .map(|m| m.map.clone()),
        _ => None,
    }
}

fn variant_pins<'a>(variant: &'a DataTypeMap, identifier: &str) -> Option<&'a Pin> {
    match variant {
        DataTypeMap::Structure { members, .. } => members
            .iter()
            .find(|m| m.matches(identifier))
            .and_then(|m| m.pin.as_ref()),
        _ => None,
    }
}

fn eval_count(expr: &dtfabric_expr::Expr, scope: Option<&Scope<'_>>, name: &str) -> Result<i64, MapError> {
    match scope {
        Some(s) => Ok(eval(expr, s)?),
        None => match expr {
            dtfabric_expr::Expr::Integer(v) => Ok(*v),
            _ => Err(MapError::new(MapErrorKind::UnboundExpressionPath(
                "size/count expression requires a map context".to_owned(),
            ))
            .in_definition(name)),
        },
    }
}

/// Decodes a run of elements per the bound priority order (§4.5): exact
/// count, then byte-size budget, then terminator — with a terminator, when
/// also present, ending the run early regardless of which bound is primary.
fn decode_element_run(
    element: &Rc<DataTypeMap>,
    bound: &ElementBound,
    bytes: &[u8],
    offset: usize,
    scope: Option<&Scope<'_>>,
    options: &DecodingOptions,
    name: &str,
) -> Result<(Vec<Value>, usize), MapError> {
    let mut values = Vec::new();
    let mut consumed = 0usize;

    let terminates = |value: &Value| -> bool {
        match (bound.elements_terminator, value.as_integer()) {
            (Some(t), Some(v)) => t == v,
            _ => false,
        }
    };

    if let Some(expr) = &bound.number_of_elements {
        let count = eval_count(expr, scope, name)?.max(0);
        for _ in 0..count {
            let (value, n) = element.map_byte_stream(bytes, offset + consumed, scope, options)?;
            consumed += n;
            if terminates(&value) {
                break;
            }
            values.push(value);
        }
        return Ok((values, consumed));
    }

    if let Some(expr) = &bound.elements_data_size {
        let budget = eval_count(expr, scope, name)?.max(0) as usize;
        while consumed < budget {
            let (value, n) = element.map_byte_stream(bytes, offset + consumed, scope, options)?;
            consumed += n;
            if terminates(&value) {
                break;
            }
            values.push(value);
        }
        if consumed > budget {
            return Err(MapError::new(MapErrorKind::TrailingBytes {
                extra: consumed - budget,
            })
            .in_definition(name)
            .at_offset(offset));
        }
        return Ok((values, consumed));
    }

    loop {
        let (value, n) = element.map_byte_stream(bytes, offset + consumed, scope, options)?;
        consumed += n;
        if terminates(&value) {
            break;
        }
        values.push(value);
    }
    Ok((values, consumed))
}

fn decode_text(code_points: &[u32], encoding: TextEncoding, name: &str) -> Result<String, MapError> {
    match encoding {
        TextEncoding::Ascii => {
            let mut s = String::with_capacity(code_points.len());
            for &cp in code_points {
                if cp > 0x7f {
                    return Err(MapError::new(MapErrorKind::InvalidEncoding { encoding: "ascii" })
                        .in_definition(name));
                }
                s.push(cp as u8 as char);
            }
            Ok(s)
        }
        TextEncoding::Utf8 | TextEncoding::Utf16 => {
            let mut s = String::with_capacity(code_points.len());
            for &cp in code_points {
                let ch = char::from_u32(cp).ok_or_else(|| {
                    MapError::new(MapErrorKind::InvalidEncoding {
                        encoding: if matches!(encoding, TextEncoding::Utf8) {
                            "utf-8"
                        } else {
                            "utf-16"
                        },
                    })
                    .in_definition(name)
                })?;
                s.push(ch);
            }
            Ok(s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtfabric_reader::Reader;

    fn build(schema: &str) -> (Registry, DecodingOptions) {
        let registry = Reader::new().read(schema).expect("schema reads");
        (registry, DecodingOptions::default())
    }

    #[test]
    fn decodes_a_fixed_size_structure() {
        let (registry, options) = build(
            r#"
name: float32
type: floating-point
byte_order: little-endian
size: 4
---
name: point3d
type: structure
members:
  - name: x
    data_type: float32
  - name: y
    data_type: float32
  - name: z
    data_type: float32
"#,
        );
        let factory = Factory::new(&registry);
        let map = factory.build_by_name("point3d").unwrap();
        assert_eq!(map.get_byte_size(), Some(12));

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        bytes.extend_from_slice(&2.0f32.to_le_bytes());
        bytes.extend_from_slice(&3.0f32.to_le_bytes());
        let (value, consumed) = map.map_byte_stream(&bytes, 0, None, &options).unwrap();
        assert_eq!(consumed, 12);
        let Value::Structure(members) = value else { panic!("expected structure") };
        assert_eq!(members[0], ("x".to_owned(), Value::Float(1.0)));
        assert_eq!(members[2], ("z".to_owned(), Value::Float(3.0)));
    }

    #[test]
    fn variable_sequence_uses_a_prior_member_as_its_count() {
        let (registry, options) = build(
            r#"
name: uint32
type: integer
format: unsigned
byte_order: little-endian
size: 4
---
name: triangles
type: structure
members:
  - name: number_of_triangles
    data_type: uint32
  - name: indices
    type: sequence
    element_data_type: uint32
    number_of_elements: number_of_triangles
"#,
        );
        let factory = Factory::new(&registry);
        let map = factory.build_by_name("triangles").unwrap();
        assert_eq!(map.get_byte_size(), None);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&10u32.to_le_bytes());
        bytes.extend_from_slice(&20u32.to_le_bytes());
        let (value, consumed) = map.map_byte_stream(&bytes, 0, None, &options).unwrap();
        assert_eq!(consumed, 12);
        let Value::Structure(members) = value else { panic!("expected structure") };
        assert_eq!(
            members[1].1,
            Value::Sequence(vec![Value::Integer(10), Value::Integer(20)])
        );
    }

    #[test]
    fn structure_group_dispatches_on_discriminant() {
        let (registry, options) = build(
            r#"
name: uint8
type: integer
format: unsigned
byte_order: little-endian
size: 1
---
name: header
type: structure
members:
  - name: token_type
    data_type: uint8
---
name: header_a
type: structure
members:
  - name: token_type
    data_type: uint8
    value: 0x01
  - name: payload
    data_type: uint8
---
name: header_b
type: structure
members:
  - name: token_type
    data_type: uint8
    value: 0x02
  - name: payload
    data_type: uint8
---
name: token
type: structure-group
base: header
identifier: token_type
members:
  - header_a
  - header_b
"#,
        );
        let factory = Factory::new(&registry);
        let map = factory.build_by_name("token").unwrap();

        let (value, consumed) = map
            .map_byte_stream(&[0x02, 0x2a], 0, None, &options)
            .unwrap();
        assert_eq!(consumed, 2);
        let Value::Structure(members) = value else { panic!("expected structure") };
        assert_eq!(members[1], ("payload".to_owned(), Value::Integer(0x2a)));

        let err = map.map_byte_stream(&[0xff, 0x00], 0, None, &options).unwrap_err();
        assert!(matches!(err.kind, MapErrorKind::UnknownGroupVariant));
    }

    #[test]
    fn padding_advances_to_the_next_alignment_boundary() {
        let (registry, options) = build(
            r#"
name: uint8
type: integer
format: unsigned
byte_order: little-endian
size: 1
---
name: uint32
type: integer
format: unsigned
byte_order: little-endian
size: 4
---
name: aligned
type: structure
members:
  - name: tag
    data_type: uint8
  - type: padding
    alignment_size: 4
  - name: value
    data_type: uint32
"#,
        );
        let factory = Factory::new(&registry);
        let map = factory.build_by_name("aligned").unwrap();
        assert_eq!(map.get_byte_size(), Some(8));

        let mut bytes = vec![0xaa, 0, 0, 0];
        bytes.extend_from_slice(&0x01020304u32.to_le_bytes());
        let (_, consumed) = map.map_byte_stream(&bytes, 0, None, &options).unwrap();
        assert_eq!(consumed, 8);
    }

    #[test]
    fn padding_alignment_is_relative_to_its_enclosing_structure() {
        let (registry, options) = build(
            r#"
name: uint8
type: integer
format: unsigned
byte_order: little-endian
size: 1
---
name: uint32
type: integer
format: unsigned
byte_order: little-endian
size: 4
---
name: aligned
type: structure
members:
  - name: tag
    data_type: uint8
  - type: padding
    alignment_size: 4
  - name: value
    data_type: uint32
---
name: wrapper
type: structure
members:
  - name: lead
    data_type: uint8
  - name: inner
    data_type: aligned
"#,
        );
        let factory = Factory::new(&registry);
        let map = factory.build_by_name("wrapper").unwrap();

        // `inner` starts at absolute offset 1, where `lead` alone would have
        // already been 4-byte aligned; the padding must still measure from
        // `inner`'s own start (relative offset 1), not from absolute offset 1.
        let mut bytes = vec![0xff, 0xaa, 0, 0, 0];
        bytes.extend_from_slice(&0x01020304u32.to_le_bytes());
        let (value, consumed) = map.map_byte_stream(&bytes, 0, None, &options).unwrap();
        assert_eq!(consumed, 9);
        let Value::Structure(members) = value else { panic!("expected structure") };
        let Value::Structure(inner) = &members[1].1 else { panic!("expected nested structure") };
        assert_eq!(inner[1], ("value".to_owned(), Value::Integer(0x01020304)));
    }

    #[test]
    fn a_nested_structure_is_reachable_from_an_ancestor_scope() {
        let (registry, options) = build(
            r#"
name: uint32
type: integer
format: unsigned
byte_order: little-endian
size: 4
---
name: sphere3d
type: structure
members:
  - name: number_of_triangles
    data_type: uint32
---
name: mesh
type: structure
members:
  - name: sphere3d
    data_type: sphere3d
  - name: indices
    type: sequence
    element_data_type: uint32
    number_of_elements: sphere3d.number_of_triangles
"#,
        );
        let factory = Factory::new(&registry);
        let map = factory.build_by_name("mesh").unwrap();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&10u32.to_le_bytes());
        bytes.extend_from_slice(&20u32.to_le_bytes());
        let (value, consumed) = map.map_byte_stream(&bytes, 0, None, &options).unwrap();
        assert_eq!(consumed, 12);
        let Value::Structure(members) = value else { panic!("expected structure") };
        assert_eq!(
            members[1].1,
            Value::Sequence(vec![Value::Integer(10), Value::Integer(20)])
        );
    }
}
