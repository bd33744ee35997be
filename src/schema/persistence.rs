//! # Index-File Schema Codec
//!
//! Serializes a `TableSchema` as the self-describing blob stored in a
//! table's `.idx` file. All integers are big-endian, independent of host
//! byte order.
//!
//! ## On-Disk Layout
//!
//! ```text
//! Offset  Size  Description
//! ------  ----  ----------------------------------------------
//! 0       4     column_count (u32)
//! 4       4     primary_ordinal (u32, 0xFFFFFFFF = none)
//! 8       12*N  column descriptors:
//!                 u32 name_offset   (into the name area)
//!                 u32 name_length
//!                 u32 type_tag      (0 = INT, 1 = STRING)
//! 8+12*N  ...   name area: concatenated column names, no separators
//! ```
//!
//! Total serialized size is `8 + 12·column_count + Σ name_length`.
//!
//! The codec reads from and writes into caller-supplied buffers and reports
//! its required size; growing the underlying file to fit is the table's
//! job. The encoder assigns name offsets sequentially without padding; the
//! decoder trusts the recorded offsets and lengths.

use eyre::{ensure, Result};
use zerocopy::big_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::TableSchema;
use crate::error::StorageError;
use crate::types::{ColumnDef, DataType};
use crate::zerocopy_be_accessors;

/// On-disk sentinel for "no primary column".
pub const NO_PRIMARY: u32 = 0xFFFF_FFFF;

/// Fixed-size prefix of the schema blob.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct SchemaHeader {
    column_count: U32,
    primary_ordinal: U32,
}

pub const SCHEMA_HEADER_SIZE: usize = size_of::<SchemaHeader>();

const _: () = assert!(SCHEMA_HEADER_SIZE == 8);

impl SchemaHeader {
    pub fn new(column_count: u32, primary_ordinal: Option<u32>) -> Self {
        Self {
            column_count: U32::new(column_count),
            primary_ordinal: U32::new(primary_ordinal.unwrap_or(NO_PRIMARY)),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        ensure!(
            data.len() >= SCHEMA_HEADER_SIZE,
            "buffer too small for SchemaHeader: {} < {}",
            data.len(),
            SCHEMA_HEADER_SIZE
        );

        Self::ref_from_bytes(&data[..SCHEMA_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read SchemaHeader: {:?}", e))
    }

    zerocopy_be_accessors! {
        column_count: u32,
        primary_ordinal: u32,
    }
}

/// One 12-byte column descriptor.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ColumnDescriptor {
    name_offset: U32,
    name_length: U32,
    type_tag: U32,
}

pub const COLUMN_DESCRIPTOR_SIZE: usize = size_of::<ColumnDescriptor>();

const _: () = assert!(COLUMN_DESCRIPTOR_SIZE == 12);

impl ColumnDescriptor {
    pub fn new(name_offset: u32, name_length: u32, type_tag: u32) -> Self {
        Self {
            name_offset: U32::new(name_offset),
            name_length: U32::new(name_length),
            type_tag: U32::new(type_tag),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        ensure!(
            data.len() >= COLUMN_DESCRIPTOR_SIZE,
            "buffer too small for ColumnDescriptor: {} < {}",
            data.len(),
            COLUMN_DESCRIPTOR_SIZE
        );

        Self::ref_from_bytes(&data[..COLUMN_DESCRIPTOR_SIZE])
            .map_err(|e| eyre::eyre!("failed to read ColumnDescriptor: {:?}", e))
    }

    zerocopy_be_accessors! {
        name_offset: u32,
        name_length: u32,
        type_tag: u32,
    }
}

/// Bytes required to serialize `schema`.
pub fn encoded_size(schema: &TableSchema) -> usize {
    let names: usize = schema.columns().iter().map(|c| c.name().len()).sum();
    SCHEMA_HEADER_SIZE + COLUMN_DESCRIPTOR_SIZE * schema.len() + names
}

/// Serializes `schema` into the front of `buf`.
///
/// `buf` must be at least [`encoded_size`] bytes; trailing bytes are left
/// untouched.
pub fn encode_into(schema: &TableSchema, buf: &mut [u8]) -> Result<()> {
    let required = encoded_size(schema);
    ensure!(
        buf.len() >= required,
        "schema buffer too small: {} < {}",
        buf.len(),
        required
    );

    let header = SchemaHeader::new(schema.len() as u32, schema.primary_ordinal());
    buf[..SCHEMA_HEADER_SIZE].copy_from_slice(header.as_bytes());

    let name_area_start = SCHEMA_HEADER_SIZE + COLUMN_DESCRIPTOR_SIZE * schema.len();
    let mut name_offset = 0usize;
    for (i, col) in schema.columns().iter().enumerate() {
        let desc = ColumnDescriptor::new(
            name_offset as u32,
            col.name().len() as u32,
            col.data_type().tag(),
        );
        let desc_at = SCHEMA_HEADER_SIZE + COLUMN_DESCRIPTOR_SIZE * i;
        buf[desc_at..desc_at + COLUMN_DESCRIPTOR_SIZE].copy_from_slice(desc.as_bytes());

        let name_at = name_area_start + name_offset;
        buf[name_at..name_at + col.name().len()].copy_from_slice(col.name().as_bytes());
        name_offset += col.name().len();
    }

    Ok(())
}

/// Decodes a schema blob produced by [`encode_into`].
///
/// Unknown type tags and truncated buffers are fatal; duplicate column
/// names surface as an error from `TableSchema::new`.
pub fn decode(buf: &[u8]) -> Result<TableSchema> {
    let header = SchemaHeader::from_bytes(buf)?;
    let column_count = header.column_count() as usize;

    let name_area_start = SCHEMA_HEADER_SIZE + COLUMN_DESCRIPTOR_SIZE * column_count;
    if buf.len() < name_area_start {
        return Err(StorageError::CorruptSchema {
            reason: format!(
                "schema blob truncated: {} bytes cannot hold {} descriptors",
                buf.len(),
                column_count
            ),
        }
        .into());
    }
    let name_area = &buf[name_area_start..];

    let mut columns = Vec::with_capacity(column_count);
    let mut primary = None;
    for i in 0..column_count {
        let desc_at = SCHEMA_HEADER_SIZE + COLUMN_DESCRIPTOR_SIZE * i;
        let desc = ColumnDescriptor::from_bytes(&buf[desc_at..])?;

        let start = desc.name_offset() as usize;
        let end = start + desc.name_length() as usize;
        if end > name_area.len() {
            return Err(StorageError::CorruptSchema {
                reason: format!(
                    "column {} name range {}..{} exceeds the name area",
                    i, start, end
                ),
            }
            .into());
        }
        let name = String::from_utf8_lossy(&name_area[start..end]).into_owned();

        let data_type = DataType::from_tag(desc.type_tag())?;
        let mut col = ColumnDef::new(name, data_type);
        if header.primary_ordinal() != NO_PRIMARY && header.primary_ordinal() as usize == i {
            col = col.primary();
            primary = Some(i as u32);
        }
        columns.push(col);
    }

    let schema = TableSchema::new(columns)?;
    debug_assert_eq!(schema.primary_ordinal(), primary);
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDef::int("a").primary(),
            ColumnDef::text("bb"),
            ColumnDef::int("ccc"),
        ])
        .unwrap()
    }

    #[test]
    fn encoded_size_counts_header_descriptors_and_names() {
        let schema = sample_schema();

        assert_eq!(encoded_size(&schema), 8 + 12 * 3 + 6);
    }

    #[test]
    fn encode_produces_expected_bytes() {
        let schema = sample_schema();
        let mut buf = vec![0u8; encoded_size(&schema)];

        encode_into(&schema, &mut buf).unwrap();

        // header: 3 columns, primary ordinal 0
        assert_eq!(&buf[0..8], &[0, 0, 0, 3, 0, 0, 0, 0]);
        // descriptor 0: offset 0, length 1, tag INT
        assert_eq!(&buf[8..20], &[0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0]);
        // descriptor 1: offset 1, length 2, tag STRING
        assert_eq!(&buf[20..32], &[0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 1]);
        // descriptor 2: offset 3, length 3, tag INT
        assert_eq!(&buf[32..44], &[0, 0, 0, 3, 0, 0, 0, 3, 0, 0, 0, 0]);
        // packed name area
        assert_eq!(&buf[44..50], b"abbccc");
    }

    #[test]
    fn decode_round_trips() {
        let schema = sample_schema();
        let mut buf = vec![0u8; encoded_size(&schema)];
        encode_into(&schema, &mut buf).unwrap();

        let decoded = decode(&buf).unwrap();

        assert_eq!(decoded, schema);
    }

    #[test]
    fn no_primary_uses_all_ones_sentinel() {
        let schema = TableSchema::new(vec![ColumnDef::int("k")]).unwrap();
        let mut buf = vec![0u8; encoded_size(&schema)];
        encode_into(&schema, &mut buf).unwrap();

        assert_eq!(&buf[4..8], &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(decode(&buf).unwrap().primary_ordinal(), None);
    }

    #[test]
    fn unknown_type_tag_is_fatal() {
        let schema = TableSchema::new(vec![ColumnDef::int("k")]).unwrap();
        let mut buf = vec![0u8; encoded_size(&schema)];
        encode_into(&schema, &mut buf).unwrap();

        buf[16..20].copy_from_slice(&[0, 0, 0, 9]);

        assert!(decode(&buf).is_err());
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let schema = sample_schema();
        let mut buf = vec![0u8; encoded_size(&schema)];
        encode_into(&schema, &mut buf).unwrap();

        assert!(decode(&buf[..10]).is_err());
    }

    #[test]
    fn encode_rejects_short_buffer() {
        let schema = sample_schema();
        let mut buf = vec![0u8; 8];

        assert!(encode_into(&schema, &mut buf).is_err());
    }
}
