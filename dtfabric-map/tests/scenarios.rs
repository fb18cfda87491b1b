// dtFabric
// SPDX-License-Identifier: MPL-2.0

use dtfabric_map::{DecodingOptions, Factory, MapErrorKind, Value};
use dtfabric_reader::Reader;

#[test]
fn point3d_fixed_decode() {
    let registry = Reader::new()
        .read(
            r#"
name: int32
type: integer
format: signed
byte_order: little-endian
size: 4
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
"#,
        )
        .expect("schema reads and resolves");
    let factory = Factory::new(&registry);
    let map = factory.build_by_name("point3d").unwrap();
    assert_eq!(map.get_byte_size(), Some(12));

    let bytes = [
        0x01, 0x00, 0x00, 0x00, 0xFE, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00,
    ];
    let (value, consumed) = map
        .map_byte_stream(&bytes, 0, None, &DecodingOptions::default())
        .unwrap();
    assert_eq!(consumed, 12);
    let Value::Structure(members) = value else {
        panic!("expected a structure")
    };
    assert_eq!(
        members,
        vec![
            ("x".to_owned(), Value::Integer(1)),
            ("y".to_owned(), Value::Integer(-2)),
            ("z".to_owned(), Value::Integer(0)),
        ]
    );
}

const TRIANGLE_SCHEMA: &str = r#"
name: int32
type: integer
format: signed
byte_order: little-endian
size: 4
---
name: uint32
type: integer
format: unsigned
byte_order: little-endian
size: 4
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
---
name: triangle3d
type: structure
members:
  - name: a
    data_type: point3d
  - name: b
    data_type: point3d
  - name: c
    data_type: point3d
"#;

fn point3d_bytes(x: i32, y: i32, z: i32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(12);
    bytes.extend_from_slice(&x.to_le_bytes());
    bytes.extend_from_slice(&y.to_le_bytes());
    bytes.extend_from_slice(&z.to_le_bytes());
    bytes
}

fn triangle_bytes(seed: i32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(36);
    bytes.extend(point3d_bytes(seed, seed + 1, seed + 2));
    bytes.extend(point3d_bytes(seed + 3, seed + 4, seed + 5));
    bytes.extend(point3d_bytes(seed + 6, seed + 7, seed + 8));
    bytes
}

#[test]
fn sphere3d_variable_decode() {
    let schema = format!(
        "{TRIANGLE_SCHEMA}---\n\
name: sphere3d\n\
type: structure\n\
members:\n\
  - name: number_of_triangles\n\
    data_type: uint32\n\
  - name: triangles\n\
    type: sequence\n\
    element_data_type: triangle3d\n\
    number_of_elements: number_of_triangles\n"
    );
    let registry = Reader::new().read(&schema).expect("schema reads and resolves");
    let factory = Factory::new(&registry);
    let map = factory.build_by_name("sphere3d").unwrap();
    assert_eq!(map.get_byte_size(), None);

    let mut bytes = 2u32.to_le_bytes().to_vec();
    bytes.extend(triangle_bytes(0));
    bytes.extend(triangle_bytes(100));

    let (value, consumed) = map
        .map_byte_stream(&bytes, 0, None, &DecodingOptions::default())
        .unwrap();
    assert_eq!(consumed, 4 + 72);
    let Value::Structure(members) = value else {
        panic!("expected a structure")
    };
    let Value::Sequence(triangles) = &members[1].1 else {
        panic!("expected a sequence of triangles")
    };
    assert_eq!(triangles.len(), 2);
}

#[test]
fn box3d_size() {
    let schema = format!(
        "{TRIANGLE_SCHEMA}---\n\
name: box3d\n\
type: structure\n\
members:\n\
  - name: triangles\n\
    type: sequence\n\
    element_data_type: triangle3d\n\
    number_of_elements: 12\n"
    );
    let registry = Reader::new().read(&schema).expect("schema reads and resolves");
    let factory = Factory::new(&registry);
    let map = factory.build_by_name("box3d").unwrap();
    assert_eq!(map.get_byte_size(), Some(432));
}

#[test]
fn ext2_group_descriptor_round_trip() {
    let registry = Reader::new()
        .read(
            r#"
name: uint32
type: integer
format: unsigned
byte_order: little-endian
size: 4
---
name: uint16
type: integer
format: unsigned
byte_order: little-endian
size: 2
---
name: uint8
type: integer
format: unsigned
byte_order: little-endian
size: 1
---
name: ext2_group_descriptor
type: structure
members:
  - name: block_bitmap
    data_type: uint32
  - name: inode_bitmap
    data_type: uint32
  - name: inode_table
    data_type: uint32
  - name: free_blocks_count
    data_type: uint16
  - name: free_inodes_count
    data_type: uint16
  - name: used_dirs_count
    data_type: uint16
  - name: pad
    data_type: uint16
  - name: reserved
    type: sequence
    element_data_type: uint8
    number_of_elements: 12
"#,
        )
        .expect("schema reads and resolves");
    let factory = Factory::new(&registry);
    let map = factory.build_by_name("ext2_group_descriptor").unwrap();
    assert_eq!(map.get_byte_size(), Some(32));

    let mut original = Vec::with_capacity(32);
    original.extend_from_slice(&100u32.to_le_bytes());
    original.extend_from_slice(&200u32.to_le_bytes());
    original.extend_from_slice(&300u32.to_le_bytes());
    original.extend_from_slice(&10u16.to_le_bytes());
    original.extend_from_slice(&20u16.to_le_bytes());
    original.extend_from_slice(&3u16.to_le_bytes());
    original.extend_from_slice(&0u16.to_le_bytes());
    original.extend((0..12u8).collect::<Vec<_>>());
    assert_eq!(original.len(), 32);

    let (value, consumed) = map
        .map_byte_stream(&original, 0, None, &DecodingOptions::default())
        .unwrap();
    assert_eq!(consumed, 32);
    let Value::Structure(members) = value else {
        panic!("expected a structure")
    };

    let mut roundtrip = Vec::with_capacity(32);
    roundtrip.extend_from_slice(&(as_u32(&members[0].1)).to_le_bytes());
    roundtrip.extend_from_slice(&(as_u32(&members[1].1)).to_le_bytes());
    roundtrip.extend_from_slice(&(as_u32(&members[2].1)).to_le_bytes());
    roundtrip.extend_from_slice(&(as_u16(&members[3].1)).to_le_bytes());
    roundtrip.extend_from_slice(&(as_u16(&members[4].1)).to_le_bytes());
    roundtrip.extend_from_slice(&(as_u16(&members[5].1)).to_le_bytes());
    roundtrip.extend_from_slice(&(as_u16(&members[6].1)).to_le_bytes());
    let Value::Sequence(reserved) = &members[7].1 else {
        panic!("expected the reserved bytes as a sequence")
    };
    for v in reserved {
        roundtrip.push(as_u8(v));
    }

    assert_eq!(roundtrip, original);
}

fn as_u32(value: &Value) -> u32 {
    value.as_integer().expect("integer member") as u32
}

fn as_u16(value: &Value) -> u16 {
    value.as_integer().expect("integer member") as u16
}

fn as_u8(value: &Value) -> u8 {
    value.as_integer().expect("integer member") as u8
}

const BSM_SCHEMA: &str = r#"
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
name: uint64
type: integer
format: unsigned
byte_order: little-endian
size: 8
---
name: bsm_token_header
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
  - name: arg32
    data_type: uint32
---
name: bsm_token_arg64
type: structure
members:
  - name: token_type
    data_type: uint8
    value: 0x71
  - name: arg64
    data_type: uint64
---
name: bsm_token
type: structure-group
base: bsm_token_header
identifier: token_type
members:
  - bsm_token_arg32
  - bsm_token_arg64
"#;

#[test]
fn bsm_token_dispatch() {
    let registry = Reader::new().read(BSM_SCHEMA).expect("schema reads and resolves");
    let factory = Factory::new(&registry);
    let map = factory.build_by_name("bsm_token").unwrap();
    let options = DecodingOptions::default();

    let arg32_bytes = [0x2d, 0x01, 0x00, 0x00, 0x00];
    let (value, consumed) = map.map_byte_stream(&arg32_bytes, 0, None, &options).unwrap();
    assert_eq!(consumed, 5);
    let Value::Structure(members) = value else {
        panic!("expected a structure")
    };
    assert_eq!(members[1].0, "arg32");

    let mut arg64_bytes = vec![0x71];
    arg64_bytes.extend_from_slice(&1u64.to_le_bytes());
    let (value, consumed) = map.map_byte_stream(&arg64_bytes, 0, None, &options).unwrap();
    assert_eq!(consumed, 9);
    let Value::Structure(members) = value else {
        panic!("expected a structure")
    };
    assert_eq!(members[1].0, "arg64");

    let unknown_bytes = [0xFF, 0x00, 0x00, 0x00, 0x00];
    let err = map.map_byte_stream(&unknown_bytes, 0, None, &options).unwrap_err();
    assert!(matches!(err.kind, MapErrorKind::UnknownGroupVariant));
}

#[test]
fn conditional_member() {
    let registry = Reader::new()
        .read(
            r#"
name: uint8
type: integer
format: unsigned
byte_order: little-endian
size: 1
---
name: versioned
type: structure
members:
  - name: version
    data_type: uint8
  - name: extra
    data_type: uint8
    condition: version > 1
"#,
        )
        .expect("schema reads and resolves");
    let factory = Factory::new(&registry);
    let map = factory.build_by_name("versioned").unwrap();
    let options = DecodingOptions::default();

    let (value, consumed) = map.map_byte_stream(&[1], 0, None, &options).unwrap();
    assert_eq!(consumed, 1);
    let Value::Structure(members) = value else {
        panic!("expected a structure")
    };
    assert_eq!(members.len(), 1);

    let (value, consumed) = map.map_byte_stream(&[2, 0x2a], 0, None, &options).unwrap();
    assert_eq!(consumed, 2);
    let Value::Structure(members) = value else {
        panic!("expected a structure")
    };
    assert_eq!(members.len(), 2);
    assert_eq!(members[1], ("extra".to_owned(), Value::Integer(0x2a)));
}

#[test]
fn structure_family_decodes_the_caller_selected_variant() {
    let registry = Reader::new()
        .read(
            r#"
name: uint32
type: integer
format: unsigned
byte_order: little-endian
size: 4
---
name: header_v1
type: structure
members:
  - name: version
    data_type: uint32
---
name: header_v2
type: structure
members:
  - name: version
    data_type: uint32
  - name: checksum
    data_type: uint32
---
name: header
type: structure-family
base: header_v1
members:
  - header_v1
  - header_v2
"#,
        )
        .expect("schema reads and resolves");
    let factory = Factory::new(&registry);
    let family = factory.build_by_name("header").unwrap();
    let options = DecodingOptions::default();

    let mut bytes = 1u32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&0xdeadbeefu32.to_le_bytes());

    let (v1, consumed) = family
        .map_family_variant("header_v1", &bytes, 0, None, &options)
        .unwrap();
    assert_eq!(consumed, 4);
    let Value::Structure(members) = v1 else {
        panic!("expected a structure")
    };
    assert_eq!(members.len(), 1);

    let (v2, consumed) = family
        .map_family_variant("header_v2", &bytes, 0, None, &options)
        .unwrap();
    assert_eq!(consumed, 8);
    let Value::Structure(members) = v2 else {
        panic!("expected a structure")
    };
    assert_eq!(members[1], ("checksum".to_owned(), Value::Integer(0xdeadbeefu32 as i64)));
}
