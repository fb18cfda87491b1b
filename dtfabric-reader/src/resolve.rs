// dtFabric
// SPDX-License-Identifier: MPL-2.0

//! Cross-reference resolution (§4.2, second half): turns every
//! [`TypeRef::Unresolved`] into a [`TypeRef::Resolved`] handle, walks the
//! ownership graph for cycles, validates family/group/fixed-size invariants,
//! statically checks expression path scopes, and finishes the integer-pin
//! byte conversions [`crate::build`] deferred until a member's data type was
//! known.

use std::collections::{HashMap, HashSet};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use log::trace;
use dtfabric_definitions::{
    ByteOrder, Definition, DefinitionId, InlineType, Member, MemberType, Pin, Registry, SizeSpec,
    TypeRef,
};

use crate::build::PendingPin;
use crate::error::{ReaderError, ReaderErrorKind};

/// Per-document pending work handed off from [`crate::build`]: pin literals
/// that still need their member's resolved type to become concrete bytes.
pub(crate) struct PendingWork {
    pub definition: DefinitionId,
    pub member_index: usize,
    pub pin: PendingPin,
}

/// Every unresolved name a definition references, in a fixed traversal
/// order; [`apply_resolved`] writes handles back in that same order.
fn unresolved_refs(def: &Definition) -> Vec<&str> {
    let mut names = Vec::new();
    match def {
        Definition::Sequence(_, a) | Definition::Stream(_, a) => {
            if let TypeRef::Unresolved(n) = &a.element_data_type {
                names.push(n.as_str());
            }
        }
        Definition::String(_, a, _) => {
            if let TypeRef::Unresolved(n) = &a.element_data_type {
                names.push(n.as_str());
            }
        }
        Definition::Format(_, a) => {
            for e in &a.layout {
                if let TypeRef::Unresolved(n) = &e.data_type {
                    names.push(n.as_str());
                }
            }
        }
        Definition::StructureFamily(_, a) => {
            if let TypeRef::Unresolved(n) = &a.base {
                names.push(n.as_str());
            }
            for v in &a.variants {
                if let TypeRef::Unresolved(n) = v {
                    names.push(n.as_str());
                }
            }
        }
        Definition::StructureGroup(_, a) => {
            if let TypeRef::Unresolved(n) = &a.base {
                names.push(n.as_str());
            }
            for v in &a.variants {
                if let TypeRef::Unresolved(n) = v {
                    names.push(n.as_str());
                }
            }
            if let Some(TypeRef::Unresolved(n)) = &a.default {
                names.push(n.as_str());
            }
        }
        Definition::Structure(_, a) | Definition::Union(_, a) => {
            for m in &a.members {
                match &m.data_type {
                    MemberType::Named(TypeRef::Unresolved(n)) => names.push(n.as_str()),
                    MemberType::Inline(InlineType::Sequence(a) | InlineType::Stream(a)) => {
                        if let TypeRef::Unresolved(n) = &a.element_data_type {
                            names.push(n.as_str());
                        }
                    }
                    MemberType::Inline(InlineType::String(a, _)) => {
                        if let TypeRef::Unresolved(n) = &a.element_data_type {
                            names.push(n.as_str());
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
    names
}

/// Writes resolved handles back into `def`, in the same order
/// [`unresolved_refs`] visited them. `ids` must have the same length.
fn apply_resolved(def: &mut Definition, ids: &[DefinitionId]) {
    let mut it = ids.iter().copied();
    match def {
        Definition::Sequence(_, a) | Definition::Stream(_, a) => {
            if matches!(a.element_data_type, TypeRef::Unresolved(_)) {
                a.element_data_type.resolve_to(it.next().unwrap());
            }
        }
        Definition::String(_, a, _) => {
            if matches!(a.element_data_type, TypeRef::Unresolved(_)) {
                a.element_data_type.resolve_to(it.next().unwrap());
            }
        }
        Definition::Format(_, a) => {
            for e in &mut a.layout {
                if matches!(e.data_type, TypeRef::Unresolved(_)) {
                    e.data_type.resolve_to(it.next().unwrap());
                }
            }
        }
        Definition::StructureFamily(_, a) => {
            if matches!(a.base, TypeRef::Unresolved(_)) {
                a.base.resolve_to(it.next().unwrap());
            }
            for v in &mut a.variants {
                if matches!(v, TypeRef::Unresolved(_)) {
                    v.resolve_to(it.next().unwrap());
                }
            }
        }
        Definition::StructureGroup(_, a) => {
            if matches!(a.base, TypeRef::Unresolved(_)) {
                a.base.resolve_to(it.next().unwrap());
            }
            for v in &mut a.variants {
                if matches!(v, TypeRef::Unresolved(_)) {
                    v.resolve_to(it.next().unwrap());
                }
            }
            if let Some(d) = &mut a.default {
                if matches!(d, TypeRef::Unresolved(_)) {
                    d.resolve_to(it.next().unwrap());
                }
            }
        }
        Definition::Structure(_, a) | Definition::Union(_, a) => {
            for m in &mut a.members {
                match &mut m.data_type {
                    MemberType::Named(r @ TypeRef::Unresolved(_)) => r.resolve_to(it.next().unwrap()),
                    MemberType::Inline(InlineType::Sequence(a) | InlineType::Stream(a)) => {
                        if matches!(a.element_data_type, TypeRef::Unresolved(_)) {
                            a.element_data_type.resolve_to(it.next().unwrap());
                        }
                    }
                    MemberType::Inline(InlineType::String(a, _)) => {
                        if matches!(a.element_data_type, TypeRef::Unresolved(_)) {
                            a.element_data_type.resolve_to(it.next().unwrap());
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

fn allowed_sizes(def: &Definition) -> Option<&'static [u8]> {
    match def {
        Definition::Boolean(..) => Some(&[1, 2, 4]),
        Definition::Character(..) => Some(&[1, 2, 4]),
        Definition::Integer(..) => Some(&[1, 2, 4, 8]),
        Definition::FloatingPoint(..) => Some(&[4, 8]),
        Definition::Uuid(..) => Some(&[16]),
        Definition::Enumeration(..) => Some(&[1, 2, 4, 8]),
        _ => None,
    }
}

fn fixed_size_of(def: &Definition) -> Option<dtfabric_definitions::FixedSizeAttributes> {
    match def {
        Definition::Boolean(_, f, _)
        | Definition::Character(_, f)
        | Definition::Integer(_, f, _)
        | Definition::FloatingPoint(_, f)
        | Definition::Uuid(_, f)
        | Definition::Enumeration(_, f, _) => Some(f.clone()),
        _ => None,
    }
}

/// A member's element kind and, if fixed-size, its byte size — the two
/// properties §3.3 requires a family variant to match on a base member it
/// redeclares. `Native` sizes are treated as compatible with anything,
/// since the concrete size is resolved at Map-build time, identically for
/// base and variant.
fn member_shape(registry: &Registry, member: &Member) -> (&'static str, Option<u8>) {
    match &member.data_type {
        MemberType::Named(r) => {
            let def = registry.get(r.id().expect("resolved by now"));
            let size = fixed_size_of(def).and_then(|f| match f.size {
                SizeSpec::Bytes(n) => Some(n),
                SizeSpec::Native => None,
            });
            (def.kind_name(), size)
        }
        MemberType::Inline(InlineType::Sequence(_)) => ("sequence", None),
        MemberType::Inline(InlineType::Stream(_)) => ("stream", None),
        MemberType::Inline(InlineType::String(..)) => ("string", None),
        MemberType::Inline(InlineType::Padding(a)) => ("padding", Some(a.alignment_size)),
    }
}

/// Resolves every unresolved reference in `registry`, then validates the
/// invariants in §3.5/§4.2 that only make sense once references are handles.
pub(crate) fn resolve(registry: &mut Registry, pending: Vec<PendingWork>) -> Result<(), ReaderError> {
    resolve_references(registry)?;
    // Pin literals must become concrete bytes before `check_groups`, which
    // verifies every structure-group variant pins its discriminant member.
    resolve_pending_pins(registry, pending)?;
    check_cycles(registry)?;
    check_fixed_sizes(registry)?;
    check_families(registry)?;
    check_groups(registry)?;
    check_expression_scopes(registry);
    Ok(())
}

fn resolve_references(registry: &mut Registry) -> Result<(), ReaderError> {
    let ids: Vec<DefinitionId> = registry.iter().map(|(id, _)| id).collect();
    for id in ids {
        let def_name = registry.get(id).name().to_owned();
        let names: Vec<String> = unresolved_refs(registry.get(id))
            .into_iter()
            .map(str::to_owned)
            .collect();
        if names.is_empty() {
            continue;
        }
        let mut targets = Vec::with_capacity(names.len());
        for name in &names {
            let target = registry
                .resolve(name)
                .map_err(|e| ReaderError::from(e).in_definition(&def_name))?;
            targets.push(target);
        }
        apply_resolved(registry.get_mut(id), &targets);
    }
    Ok(())
}

fn owned_targets(def: &Definition) -> Vec<DefinitionId> {
    match def {
        Definition::Sequence(_, a) | Definition::Stream(_, a) => a.element_data_type.id().into_iter().collect(),
        Definition::String(_, a, _) => a.element_data_type.id().into_iter().collect(),
        Definition::Format(_, a) => a.layout.iter().filter_map(|e| e.data_type.id()).collect(),
        Definition::StructureFamily(_, a) => std::iter::once(a.base.id())
            .flatten()
            .chain(a.variants.iter().filter_map(|v| v.id()))
            .collect(),
        Definition::StructureGroup(_, a) => std::iter::once(a.base.id())
            .flatten()
            .chain(a.variants.iter().filter_map(|v| v.id()))
            .chain(a.default.as_ref().and_then(|d| d.id()))
            .collect(),
        Definition::Structure(_, a) | Definition::Union(_, a) => a
            .members
            .iter()
            .filter_map(|m| match &m.data_type {
                MemberType::Named(r) => r.id(),
                MemberType::Inline(InlineType::Sequence(a) | InlineType::Stream(a)) => {
                    a.element_data_type.id()
                }
                MemberType::Inline(InlineType::String(a, _)) => a.element_data_type.id(),
                MemberType::Inline(InlineType::Padding(_)) => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn check_cycles(registry: &Registry) -> Result<(), ReaderError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(registry: &Registry, id: DefinitionId, marks: &mut HashMap<DefinitionId, Mark>) -> Result<(), ReaderError> {
        match marks.get(&id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(ReaderError::new(ReaderErrorKind::DefinitionCycle(
                    registry.get(id).name().to_owned(),
                )))
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        for target in owned_targets(registry.get(id)) {
            visit(registry, target, marks)?;
        }
        marks.insert(id, Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    for (id, _) in registry.iter() {
        visit(registry, id, &mut marks)?;
    }
    Ok(())
}

fn check_fixed_sizes(registry: &Registry) -> Result<(), ReaderError> {
    for (_, def) in registry.iter() {
        if let (Some(allowed), Some(fixed)) = (allowed_sizes(def), fixed_size_of(def)) {
            if let SizeSpec::Bytes(n) = fixed.size {
                if !allowed.contains(&n) {
                    return Err(ReaderError::schema(format!(
                        "'{}' size {} is not one of the allowed sizes for {}",
                        def.name(),
                        n,
                        def.kind_name()
                    ))
                    .in_definition(def.name()));
                }
            }
        }
    }
    Ok(())
}

fn check_families(registry: &Registry) -> Result<(), ReaderError> {
    for (_, def) in registry.iter() {
        let Definition::StructureFamily(c, attrs) = def else { continue };
        let base_id = attrs.base.id().expect("resolved");
        let Definition::Structure(_, base) = registry.get(base_id) else {
            return Err(
                ReaderError::schema(format!("family '{}' base is not a structure", c.name)).in_definition(&c.name)
            );
        };
        for variant_ref in &attrs.variants {
            let variant_id = variant_ref.id().expect("resolved");
            let Definition::Structure(vc, variant) = registry.get(variant_id) else {
                return Err(ReaderError::schema(format!(
                    "family '{}' variant '{}' is not a structure",
                    c.name,
                    variant_ref.name().unwrap_or_default()
                ))
                .in_definition(&c.name));
            };
            for base_member in &base.members {
                let Some(base_name) = &base_member.name else { continue };
                let matched = variant.members.iter().find(|m| m.name.as_ref() == Some(base_name));
                let Some(matched) = matched else {
                    return Err(ReaderError::new(ReaderErrorKind::FamilyMemberMismatch(format!(
                        "variant '{}' is missing base member '{}'",
                        vc.name, base_name
                    )))
                    .in_definition(&c.name));
                };
                let (base_kind, base_size) = member_shape(registry, base_member);
                let (variant_kind, variant_size) = member_shape(registry, matched);
                if base_kind != variant_kind
                    || matches!((base_size, variant_size), (Some(a), Some(b)) if a != b)
                {
                    return Err(ReaderError::new(ReaderErrorKind::FamilyMemberMismatch(format!(
                        "variant '{}' redeclares base member '{}' with an incompatible type",
                        vc.name, base_name
                    )))
                    .in_definition(&c.name));
                }
            }
        }
    }
    Ok(())
}

fn pins_overlap(a: &Pin, b: &Pin) -> bool {
    let values_of = |p: &Pin| -> Vec<&[u8]> {
        match p {
            Pin::Value(v) => vec![v.as_slice()],
            Pin::Values(vs) => vs.iter().map(Vec::as_slice).collect(),
        }
    };
    let (av, bv) = (values_of(a), values_of(b));
    av.iter().any(|x| bv.contains(x))
}

fn check_groups(registry: &Registry) -> Result<(), ReaderError> {
    for (_, def) in registry.iter() {
        let Definition::StructureGroup(c, attrs) = def else { continue };
        let base_id = attrs.base.id().expect("resolved");
        let Definition::Structure(_, base) = registry.get(base_id) else {
            return Err(
                ReaderError::schema(format!("group '{}' base is not a structure", c.name)).in_definition(&c.name)
            );
        };
        if !base.members.iter().any(|m| m.name.as_deref() == Some(attrs.identifier.as_str())) {
            return Err(ReaderError::new(ReaderErrorKind::GroupMemberInvalid(format!(
                "base '{}' has no identifier member '{}'",
                base_id, attrs.identifier
            )))
            .in_definition(&c.name));
        }

        let mut seen: Vec<(String, Pin)> = Vec::new();
        for variant_ref in attrs.variants.iter().chain(attrs.default.iter()) {
            let variant_id = variant_ref.id().expect("resolved");
            let Definition::Structure(vc, variant) = registry.get(variant_id) else {
                return Err(ReaderError::new(ReaderErrorKind::GroupMemberInvalid(format!(
                    "variant '{}' is not a structure",
                    variant_ref.name().unwrap_or_default()
                )))
                .in_definition(&c.name));
            };
            let discriminant = variant
                .members
                .iter()
                .find(|m| m.name.as_deref() == Some(attrs.identifier.as_str()));
            let Some(discriminant) = discriminant else {
                return Err(ReaderError::new(ReaderErrorKind::GroupMemberInvalid(format!(
                    "variant '{}' does not declare the identifier member '{}'",
                    vc.name, attrs.identifier
                )))
                .in_definition(&c.name));
            };
            let Some(pin) = &discriminant.pin else {
                return Err(ReaderError::new(ReaderErrorKind::GroupMemberInvalid(format!(
                    "variant '{}' does not pin its identifier member with 'value'",
                    vc.name
                )))
                .in_definition(&c.name));
            };
            for (other_name, other_pin) in &seen {
                if pins_overlap(pin, other_pin) {
                    return Err(ReaderError::new(ReaderErrorKind::GroupDiscriminantCollision(
                        vc.name.clone(),
                        other_name.clone(),
                    ))
                    .in_definition(&c.name));
                }
            }
            seen.push((vc.name.clone(), pin.clone()));
        }
    }
    Ok(())
}

/// Best-effort static scope check (§4.2): a single-segment path must name a
/// preceding sibling, or is left to the runtime MapContext walk — ancestor
/// scopes cannot be known without the caller's embedding context (decision
/// recorded in `SPEC_FULL.md`). An unresolvable one surfaces as
/// `UnboundExpressionPath` at decode time; this pass never hard-fails on it.
fn check_expression_scopes(registry: &Registry) {
    for (_, def) in registry.iter() {
        let (Definition::Structure(c, attrs) | Definition::Union(c, attrs)) = def else { continue };
        let mut siblings: HashSet<&str> = HashSet::new();
        for member in &attrs.members {
            if let Some(cond) = &member.condition {
                cond.for_each_path(|path| check_single_segment(&c.name, path, &siblings));
            }
            if let MemberType::Inline(InlineType::Sequence(a) | InlineType::Stream(a))
            | MemberType::Inline(InlineType::String(a, _)) = &member.data_type
            {
                if let Some(e) = &a.bound.number_of_elements {
                    e.for_each_path(|path| check_single_segment(&c.name, path, &siblings));
                }
                if let Some(e) = &a.bound.elements_data_size {
                    e.for_each_path(|path| check_single_segment(&c.name, path, &siblings));
                }
            }
            if let Some(name) = &member.name {
                siblings.insert(name.as_str());
            }
        }
    }
}

/// A single-segment path with no preceding sibling of that name may still
/// resolve against an ancestor scope at decode time (the Reader cannot know
/// the embedding context); trace it so a malformed schema is at least
/// diagnosable without waiting for `UnboundExpressionPath` at decode time.
fn check_single_segment(owner: &str, path: &[String], siblings: &HashSet<&str>) {
    if path.len() == 1 && !siblings.contains(path[0].as_str()) {
        trace!(
            "'{}' in '{owner}' does not name a preceding sibling; it must resolve against an ancestor scope at decode time",
            path[0]
        );
    }
}

fn resolve_pending_pins(registry: &mut Registry, pending: Vec<PendingWork>) -> Result<(), ReaderError> {
    for work in pending {
        let PendingPin::Int { value, values } = work.pin else { continue };
        if values {
            continue;
        }
        let (def_name, member_type) = {
            let def = registry.get(work.definition);
            let Definition::Structure(c, attrs) | Definition::Union(c, attrs) = def else {
                continue;
            };
            (c.name.clone(), attrs.members[work.member_index].data_type.clone())
        };
        let MemberType::Named(r) = &member_type else {
            return Err(ReaderError::schema("an inline member cannot pin an integer literal").in_definition(&def_name));
        };
        let target_id = r.id().expect("resolved by now");
        let target = registry.get(target_id);
        let fixed = fixed_size_of(target).ok_or_else(|| {
            ReaderError::schema(format!(
                "member pins an integer literal but its type '{}' is not fixed-size",
                target.name()
            ))
            .in_definition(&def_name)
        })?;
        let byte_order = fixed.byte_order.ok_or_else(|| {
            ReaderError::schema(format!(
                "member pins an integer literal on '{}', which has no explicit byte_order (native order resolves too late for schema-time pin encoding)",
                target.name()
            ))
            .in_definition(&def_name)
        })?;
        if matches!(byte_order, ByteOrder::Native) {
            return Err(ReaderError::schema(format!(
                "member pins an integer literal on '{}' with byte_order 'native', which is not supported",
                target.name()
            ))
            .in_definition(&def_name));
        }
        let SizeSpec::Bytes(size) = fixed.size else {
            return Err(ReaderError::schema(format!(
                "member pins an integer literal on '{}', which has no fixed byte size",
                target.name()
            ))
            .in_definition(&def_name));
        };

        let mut buf = Vec::with_capacity(8);
        match byte_order {
            ByteOrder::BigEndian => buf.write_int::<BigEndian>(value, size as usize).unwrap(),
            ByteOrder::LittleEndian => buf.write_int::<LittleEndian>(value, size as usize).unwrap(),
            ByteOrder::Native => unreachable!(),
        }

        let def = registry.get_mut(work.definition);
        if let Definition::Structure(_, attrs) | Definition::Union(_, attrs) = def {
            attrs.members[work.member_index].pin = Some(Pin::Value(buf));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::ReaderErrorKind;
    use crate::reader::Reader;

    #[test]
    fn a_self_referencing_structure_is_a_cycle() {
        let yaml = r#"
name: looping
type: structure
members:
  - name: self
    data_type: looping
"#;
        let err = Reader::new().read(yaml).unwrap_err();
        assert!(matches!(err.kind, ReaderErrorKind::DefinitionCycle(_)));
    }

    #[test]
    fn a_structure_family_variant_missing_a_base_member_is_rejected() {
        let yaml = r#"
name: uint32
type: integer
format: unsigned
byte_order: little-endian
size: 4
---
name: base_header
type: structure
members:
  - name: version
    data_type: uint32
  - name: flags
    data_type: uint32
---
name: variant_a
type: structure
members:
  - name: version
    data_type: uint32
---
name: header_family
type: structure-family
base: base_header
members:
  - variant_a
"#;
        let err = Reader::new().read(yaml).unwrap_err();
        assert!(matches!(err.kind, ReaderErrorKind::FamilyMemberMismatch(_)));
    }

    #[test]
    fn two_structure_group_variants_pinning_the_same_discriminant_collide() {
        let yaml = r#"
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
name: variant_one
type: structure
members:
  - name: token_type
    data_type: uint8
    value: 0x01
---
name: variant_two
type: structure
members:
  - name: token_type
    data_type: uint8
    value: 0x01
---
name: token
type: structure-group
base: header
identifier: token_type
members:
  - variant_one
  - variant_two
"#;
        let err = Reader::new().read(yaml).unwrap_err();
        assert!(matches!(err.kind, ReaderErrorKind::GroupDiscriminantCollision(..)));
    }

    #[test]
    fn an_illegal_fixed_size_is_rejected_at_resolution() {
        let yaml = r#"
name: weird_int
type: integer
format: unsigned
byte_order: little-endian
size: 3
"#;
        let err = Reader::new().read(yaml).unwrap_err();
        assert!(matches!(err.kind, ReaderErrorKind::Schema(_)));
    }
}
