//! Row payloads for the text and binary protocols.
//!
//! Both are zero-copy views over a single row packet. Text rows iterate
//! length-encoded column values; binary rows decode against the column
//! definitions into `Value`s with typed positional getters.

use crate::col::Column;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use crate::value::{DateTime, Duration, NullBitmap, Value};

/// One text-protocol row: each column is either the 0xfb NULL marker or a
/// length-encoded string, in column order.
#[derive(Debug, Clone, Copy)]
pub struct TextRowPayload<'a> {
    data: &'a [u8],
    num_columns: usize,
}

impl<'a> TextRowPayload<'a> {
    pub fn new(data: &'a [u8], num_columns: usize) -> Self {
        Self { data, num_columns }
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// Decode all column values; `None` marks a NULL column.
    pub fn decode(&self) -> Result<Vec<Option<&'a [u8]>>> {
        let mut values = Vec::with_capacity(self.num_columns);
        let mut data = self.data;
        for _ in 0..self.num_columns {
            if data.first() == Some(&LENC_NULL) {
                values.push(None);
                data = &data[1..];
            } else {
                let (bytes, rest) = read_string_lenenc(data)?;
                values.push(Some(bytes));
                data = rest;
            }
        }
        if !data.is_empty() {
            return Err(Error::Decode("trailing bytes after text row"));
        }
        Ok(values)
    }
}

/// One binary-protocol row: server null bitmap (2-bit offset) followed by
/// the non-NULL values in column order.
#[derive(Debug, Clone, Copy)]
pub struct BinaryRowPayload<'a> {
    null_bitmap: NullBitmap<'a>,
    values: &'a [u8],
    num_columns: usize,
}

impl<'a> BinaryRowPayload<'a> {
    /// Parse a binary row packet (header byte 0x00).
    pub fn parse(payload: &'a [u8], num_columns: usize) -> Result<Self> {
        let (header, data) = read_int_1(payload)?;
        if header != 0x00 {
            return Err(Error::UnexpectedPacket {
                first_byte: header,
                phase: "reading binary row",
            });
        }

        let bitmap_len = NullBitmap::len_for_result_set(num_columns);
        let (bitmap, values) = read_string_fix(data, bitmap_len)?;

        Ok(Self {
            null_bitmap: NullBitmap::for_result_set(bitmap),
            values,
            num_columns,
        })
    }

    pub fn null_bitmap(&self) -> NullBitmap<'a> {
        self.null_bitmap
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// Decode every column against its definition.
    pub fn decode(&self, columns: &[Column]) -> Result<BinaryRow<'a>> {
        if columns.len() != self.num_columns {
            return Err(Error::Decode("column definition count mismatch"));
        }

        let mut values = Vec::with_capacity(self.num_columns);
        let mut data = self.values;
        for (idx, column) in columns.iter().enumerate() {
            if self.null_bitmap.is_null(idx) {
                values.push(Value::Null);
            } else {
                let (value, rest) = Value::parse(column, data)?;
                values.push(value);
                data = rest;
            }
        }
        if !data.is_empty() {
            return Err(Error::Decode("trailing bytes after binary row"));
        }
        Ok(BinaryRow { values })
    }
}

/// A fully decoded binary row with typed positional getters.
///
/// Getters return `Ok(None)` for NULL and `UnsupportedType` when the
/// stored value does not convert to the requested type.
#[derive(Debug, Clone)]
pub struct BinaryRow<'a> {
    values: Vec<Value<'a>>,
}

impl<'a> BinaryRow<'a> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, idx: usize) -> Result<&Value<'a>> {
        self.values
            .get(idx)
            .ok_or(Error::Decode("column index out of range"))
    }

    pub fn get_i64(&self, idx: usize) -> Result<Option<i64>> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::SignedInt(v) => Ok(Some(*v)),
            Value::UnsignedInt(v) if *v <= i64::MAX as u64 => Ok(Some(*v as i64)),
            _ => Err(Error::UnsupportedType("value is not an i64")),
        }
    }

    pub fn get_u64(&self, idx: usize) -> Result<Option<u64>> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::UnsignedInt(v) => Ok(Some(*v)),
            Value::SignedInt(v) if *v >= 0 => Ok(Some(*v as u64)),
            _ => Err(Error::UnsupportedType("value is not a u64")),
        }
    }

    pub fn get_u32(&self, idx: usize) -> Result<Option<u32>> {
        match self.get_u64(idx)? {
            None => Ok(None),
            Some(v) => u32::try_from(v)
                .map(Some)
                .map_err(|_| Error::UnsupportedType("value does not fit in u32")),
        }
    }

    pub fn get_i32(&self, idx: usize) -> Result<Option<i32>> {
        match self.get_i64(idx)? {
            None => Ok(None),
            Some(v) => i32::try_from(v)
                .map(Some)
                .map_err(|_| Error::UnsupportedType("value does not fit in i32")),
        }
    }

    pub fn get_f32(&self, idx: usize) -> Result<Option<f32>> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::Float(v) => Ok(Some(*v)),
            _ => Err(Error::UnsupportedType("value is not an f32")),
        }
    }

    pub fn get_f64(&self, idx: usize) -> Result<Option<f64>> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::Double(v) => Ok(Some(*v)),
            Value::Float(v) => Ok(Some(*v as f64)),
            _ => Err(Error::UnsupportedType("value is not an f64")),
        }
    }

    pub fn get_bytes(&self, idx: usize) -> Result<Option<&'a [u8]>> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::Byte(bytes) => Ok(Some(bytes)),
            _ => Err(Error::UnsupportedType("value is not a byte string")),
        }
    }

    pub fn get_str(&self, idx: usize) -> Result<Option<&'a str>> {
        match self.get_bytes(idx)? {
            None => Ok(None),
            Some(bytes) => simdutf8::basic::from_utf8(bytes)
                .map(Some)
                .map_err(|_| Error::Decode("invalid utf-8 in string column")),
        }
    }

    pub fn get_datetime(&self, idx: usize) -> Result<Option<DateTime>> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::Datetime0 => Ok(Some(DateTime::default())),
            Value::Datetime4(ts) => Ok(Some(DateTime::from(*ts))),
            Value::Datetime7(ts) => Ok(Some(DateTime::from(*ts))),
            Value::Datetime11(ts) => Ok(Some(DateTime::from(*ts))),
            _ => Err(Error::UnsupportedType("value is not a datetime")),
        }
    }

    pub fn get_duration(&self, idx: usize) -> Result<Option<Duration>> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::Time0 => Ok(Some(Duration::default())),
            Value::Time8(t) => Ok(Some(Duration::from(*t))),
            Value::Time12(t) => Ok(Some(Duration::from(*t))),
            _ => Err(Error::UnsupportedType("value is not a time interval")),
        }
    }
}
