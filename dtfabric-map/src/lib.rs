// dtFabric
// SPDX-License-Identifier: MPL-2.0

#![warn(missing_docs)]

//! Runtime byte-stream decoding for resolved dtFabric definitions (§4.4,
//! §4.5).
//!
//! A [`Factory`] turns a resolved [`dtfabric_definitions::Registry`] into
//! [`DataTypeMap`] trees, caching one per definition; [`DataTypeMap::map_byte_stream`]
//! then decodes a byte slice into a [`Value`] against those trees. Decoded
//! member values flow through a [`MapContext`]/[`Scope`] pair so later
//! members' size, count, and condition expressions can reference earlier
//! ones (§3.6).

mod byte_order;
mod context;
mod error;
mod map;
mod options;
mod value;

pub use byte_order::host_byte_order;
pub use context::{MapContext, Scope};
pub use error::{MapError, MapErrorKind};
pub use map::{DataTypeMap, Factory, MappedMember};
pub use options::{DecodingOptions, DepthGauge, DepthLock};
pub use value::{EnumerationValue, Value};
