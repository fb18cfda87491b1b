// dtFabric
// SPDX-License-Identifier: MPL-2.0

//! Top-level entry point: ingest a multi-document YAML stream into a
//! resolved [`Registry`] (§4.2).

use dtfabric_definitions::Registry;
use log::{debug, trace};
use serde::Deserialize;

use crate::build::{self, PendingPin};
use crate::error::ReaderError;
use crate::raw::RawDocument;
use crate::resolve::{self, PendingWork};

/// Bounds accepted by [`Reader::read`] (§2.3 of `SPEC_FULL.md`).
#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    /// Maximum number of YAML documents accepted in a single stream.
    pub max_documents: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self { max_documents: 4096 }
    }
}

/// Ingests schema documents into a [`Registry`].
///
/// A `Reader` is used for a single one-shot build: construct it, call
/// [`Reader::read`] once with the full document stream, and discard it.
#[derive(Debug, Default)]
pub struct Reader {
    options: ReaderOptions,
}

impl Reader {
    /// Creates a reader with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reader with explicit options.
    pub fn with_options(options: ReaderOptions) -> Self {
        Self { options }
    }

    /// Parses `input` as a stream of `---`-separated YAML documents,
    /// builds a [`Definition`](dtfabric_definitions::Definition) for each,
    /// registers them, and resolves every cross-reference.
    pub fn read(&self, input: &str) -> Result<Registry, ReaderError> {
        let mut registry = Registry::new();
        let mut pending = Vec::new();

        for (index, document) in serde_yaml::Deserializer::from_str(input).enumerate() {
            if index >= self.options.max_documents {
                return Err(ReaderError::schema(format!(
                    "document stream exceeds the configured limit of {} documents",
                    self.options.max_documents
                ))
                .at_document(index));
            }
            trace!("reading document {index}");
            let raw = RawDocument::deserialize(document).map_err(|e| ReaderError::from(e).at_document(index))?;

            let (def, member_pins) = build::build_document(raw).map_err(|e| e.at_document(index))?;
            let name = def.name().to_owned();
            let id = registry.register(def).map_err(|e| ReaderError::from(e).at_document(index))?;
            for (member_index, pin) in member_pins {
                if matches!(pin, PendingPin::Int { .. }) {
                    pending.push(PendingWork {
                        definition: id,
                        member_index,
                        pin,
                    });
                }
            }
            debug!("registered '{name}' ({}) as document {index}", registry.get(id).kind_name());
        }

        resolve::resolve(&mut registry, pending)?;
        debug!("resolved {} definitions", registry.len());
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_resolves_point3d() {
        let yaml = r#"
name: int32
type: integer
byte_order: little-endian
size: 4
format: signed
---
name: point3d
type: structure
members:
  - name: x
    data_type: int32
  - name: y
    data_type: int32
  - name: z
    data_type: int32
"#;
        let registry = Reader::new().read(yaml).unwrap();
        assert_eq!(registry.len(), 2);
        let point3d = registry.get(registry.lookup("point3d").unwrap());
        assert_eq!(point3d.kind_name(), "structure");
    }

    #[test]
    fn unresolved_reference_is_reported() {
        let yaml = r#"
name: point3d
type: structure
members:
  - name: x
    data_type: int32
"#;
        let err = Reader::new().read(yaml).unwrap_err();
        assert!(matches!(
            err.kind,
            crate::error::ReaderErrorKind::UnresolvedReference(_)
        ));
    }

    #[test]
    fn duplicate_name_is_reported() {
        let yaml = r#"
name: thing
type: constant
value: 1
---
name: thing
type: constant
value: 2
"#;
        let err = Reader::new().read(yaml).unwrap_err();
        assert!(matches!(err.kind, crate::error::ReaderErrorKind::DuplicateName(_)));
    }

    #[test]
    fn document_limit_is_enforced() {
        let yaml = "name: a\ntype: constant\nvalue: 1\n---\nname: b\ntype: constant\nvalue: 2\n";
        let reader = Reader::with_options(ReaderOptions { max_documents: 1 });
        let err = reader.read(yaml).unwrap_err();
        assert_eq!(err.document_index, Some(1));
    }

    #[test]
    fn bsm_token_group_dispatches_without_collision() {
        let yaml = r#"
name: uint8
type: integer
byte_order: little-endian
size: 1
format: unsigned
---
name: bsm_header
type: structure
members:
  - name: token_type
    data_type: uint8
---
name: bsm_token_arg32
type: structure
members:
  - name: token_type
    data_type: uint8
    value: 0x2d
---
name: bsm_token_arg64
type: structure
members:
  - name: token_type
    data_type: uint8
    value: 0x71
---
name: bsm_token
type: structure-group
base: bsm_header
identifier: token_type
members:
  - bsm_token_arg32
  - bsm_token_arg64
"#;
        let registry = Reader::new().read(yaml).unwrap();
        assert_eq!(registry.len(), 5);
    }
}
