// dtFabric
// SPDX-License-Identifier: MPL-2.0

#![warn(missing_docs)]

//! A declarative, schema-driven binary-format toolkit.
//!
//! An author describes the layout of a binary format in a YAML-based
//! definition language; this crate validates the schema, resolves
//! cross-references, and produces runtime maps that parse a byte buffer into
//! structured values.
//!
//! ```no_run
//! use dtfabric::reader::Reader;
//! use dtfabric::map::{Factory, DecodingOptions};
//!
//! let registry = Reader::new().read(r#"
//! name: int32
//! type: integer
//! format: signed
//! byte_order: little-endian
//! size: 4
//! ---
//! name: point3d
//! type: structure
//! members:
//!   - name: x
//!     data_type: int32
//! "#).unwrap();
//! let factory = Factory::new(&registry);
//! let map = factory.build_by_name("point3d").unwrap();
//! let bytes = [0u8; 4];
//! let (_value, _consumed) = map.map_byte_stream(&bytes, 0, None, &DecodingOptions::default()).unwrap();
//! ```
//!
//! The crate is split into four focused libraries, re-exported here under
//! friendly names: [`definitions`] (the Definition object graph and
//! Registry), [`expr`] (the expression parser/evaluator), [`reader`] (YAML
//! ingestion and resolution), and [`map`] (the DataTypeMap runtime).

pub use dtfabric_definitions as definitions;
pub use dtfabric_expr as expr;
pub use dtfabric_map as map;
pub use dtfabric_reader as reader;
