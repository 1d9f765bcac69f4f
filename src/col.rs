use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::constant::{ColumnFlags, ColumnType};
use crate::error::{Error, Result};
use crate::protocol::primitive::*;

/// Raw payload of a ColumnDefinition41 packet (zero-copy)
#[derive(Debug, Clone, Copy)]
pub struct ColumnDefinitionBytes<'a>(pub &'a [u8]);

impl<'a> ColumnDefinitionBytes<'a> {
    /// Get a reference to the fixed-size tail of the column definition.
    ///
    /// The tail is always the last 12 bytes of the column definition packet.
    pub fn tail(&self) -> Result<&'a ColumnDefinitionTail> {
        if self.0.len() < 12 {
            return Err(Error::Decode("column definition too short"));
        }
        let tail_bytes = &self.0[self.0.len() - 12..];
        ColumnDefinitionTail::ref_from_bytes(tail_bytes)
            .map_err(|_| Error::Decode("column definition tail cast"))
    }
}

/// Fixed-size tail of a ColumnDefinition41 packet (12 bytes)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct ColumnDefinitionTail {
    charset: U16LE,
    column_length: U32LE,
    column_type: u8,
    flags: U16LE,
    decimals: u8,
    reserved: U16LE,
}

impl ColumnDefinitionTail {
    pub fn charset(&self) -> u16 {
        self.charset.get()
    }

    pub fn column_length(&self) -> u32 {
        self.column_length.get()
    }

    pub fn column_type(&self) -> Result<ColumnType> {
        ColumnType::from_u8(self.column_type).ok_or(Error::Decode("unknown column type"))
    }

    pub fn flags(&self) -> ColumnFlags {
        ColumnFlags::from_bits_truncate(self.flags.get())
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }
}

/// Owned column metadata, held by prepared statements and handed to
/// result-set handlers in column order.
#[derive(Debug, Clone)]
pub struct Column {
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub charset: u16,
    pub column_length: u32,
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
    pub decimals: u8,
}

impl Column {
    /// Parse a ColumnDefinition41 payload into owned metadata.
    pub fn parse(bytes: ColumnDefinitionBytes<'_>) -> Result<Self> {
        let data = bytes.0;

        // ─── Variable Length String Fields ───────────────────────────
        let (_catalog, data) = read_string_lenenc(data)?;
        let (schema, data) = read_string_lenenc(data)?;
        let (table, data) = read_string_lenenc(data)?;
        let (org_table, data) = read_string_lenenc(data)?;
        let (name, data) = read_string_lenenc(data)?;
        let (org_name, data) = read_string_lenenc(data)?;

        // ─── Fixed Tail ──────────────────────────────────────────────
        // length of the fixed fields, always 0x0c
        let (_fixed_len, data) = read_int_lenenc(data)?;
        if data.len() < 12 {
            return Err(Error::Decode("column definition too short"));
        }
        let tail = ColumnDefinitionTail::ref_from_bytes(&data[..12])
            .map_err(|_| Error::Decode("column definition tail cast"))?;

        Ok(Column {
            schema: String::from_utf8_lossy(schema).into_owned(),
            table: String::from_utf8_lossy(table).into_owned(),
            org_table: String::from_utf8_lossy(org_table).into_owned(),
            name: String::from_utf8_lossy(name).into_owned(),
            org_name: String::from_utf8_lossy(org_name).into_owned(),
            charset: tail.charset(),
            column_length: tail.column_length(),
            column_type: tail.column_type()?,
            flags: tail.flags(),
            decimals: tail.decimals(),
        })
    }

    pub fn is_unsigned(&self) -> bool {
        self.flags.contains(ColumnFlags::UNSIGNED_FLAG)
    }
}
