//! Binary-protocol values: the decoded `Value` view over row bytes, the
//! fixed-layout temporal payloads, and the owned `DateTime` / `Duration`
//! types used for parameter binding.

use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::col::Column;
use crate::constant::ColumnType;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;

#[derive(Debug, Clone, Copy)]
pub enum Value<'a> {
    /// NULL value
    Null,
    /// Signed integer (TINYINT, SMALLINT, INT, BIGINT)
    SignedInt(i64),
    /// Unsigned integer (TINYINT UNSIGNED, SMALLINT UNSIGNED, INT UNSIGNED, BIGINT UNSIGNED)
    UnsignedInt(u64),
    /// FLOAT - 4-byte floating point
    Float(f32),
    /// DOUBLE - 8-byte floating point
    Double(f64),
    /// DATE/DATETIME/TIMESTAMP - 0 bytes (0000-00-00 00:00:00)
    Datetime0,
    /// DATE/DATETIME/TIMESTAMP - 4 bytes (ymd)
    Datetime4(&'a Timestamp4),
    /// DATE/DATETIME/TIMESTAMP - 7 bytes (ymd + hms)
    Datetime7(&'a Timestamp7),
    /// DATE/DATETIME/TIMESTAMP - 11 bytes (ymd + hms + microseconds)
    Datetime11(&'a Timestamp11),
    /// TIME - 0 bytes (00:00:00)
    Time0,
    /// TIME - 8 bytes (without microseconds)
    Time8(&'a Time8),
    /// TIME - 12 bytes (with microseconds)
    Time12(&'a Time12),
    /// BLOB, GEOMETRY, STRING, VARCHAR, VAR_STRING, DECIMAL, ..
    Byte(&'a [u8]),
}

impl<'a> Value<'a> {
    /// Parse a single binary protocol value according to the column's
    /// declared type and signedness.
    ///
    /// Returns the parsed value and the remaining bytes.
    pub fn parse(column: &Column, data: &'a [u8]) -> Result<(Self, &'a [u8])> {
        let is_unsigned = column.is_unsigned();

        match column.column_type {
            ColumnType::MYSQL_TYPE_NULL => Ok((Value::Null, data)),

            // Integer types
            ColumnType::MYSQL_TYPE_TINY => {
                let (val, rest) = read_int_1(data)?;
                let value = if is_unsigned {
                    Value::UnsignedInt(val as u64)
                } else {
                    Value::SignedInt(val as i8 as i64)
                };
                Ok((value, rest))
            }

            ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => {
                let (val, rest) = read_int_2(data)?;
                let value = if is_unsigned {
                    Value::UnsignedInt(val as u64)
                } else {
                    Value::SignedInt(val as i16 as i64)
                };
                Ok((value, rest))
            }

            ColumnType::MYSQL_TYPE_INT24 | ColumnType::MYSQL_TYPE_LONG => {
                let (val, rest) = read_int_4(data)?;
                let value = if is_unsigned {
                    Value::UnsignedInt(val as u64)
                } else {
                    Value::SignedInt(val as i32 as i64)
                };
                Ok((value, rest))
            }

            ColumnType::MYSQL_TYPE_LONGLONG => {
                let (val, rest) = read_int_8(data)?;
                let value = if is_unsigned {
                    Value::UnsignedInt(val)
                } else {
                    Value::SignedInt(val as i64)
                };
                Ok((value, rest))
            }

            // Floating point types
            ColumnType::MYSQL_TYPE_FLOAT => {
                let (val, rest) = read_int_4(data)?;
                Ok((Value::Float(f32::from_bits(val)), rest))
            }

            ColumnType::MYSQL_TYPE_DOUBLE => {
                let (val, rest) = read_int_8(data)?;
                Ok((Value::Double(f64::from_bits(val)), rest))
            }

            // Temporal types - length-prefixed compressed form
            ColumnType::MYSQL_TYPE_DATE
            | ColumnType::MYSQL_TYPE_DATETIME
            | ColumnType::MYSQL_TYPE_TIMESTAMP
            | ColumnType::MYSQL_TYPE_DATETIME2
            | ColumnType::MYSQL_TYPE_TIMESTAMP2
            | ColumnType::MYSQL_TYPE_NEWDATE => {
                let (len, rest) = read_int_1(data)?;
                match len {
                    0 => Ok((Value::Datetime0, rest)),
                    4 => {
                        let (bytes, rest) = read_string_fix(rest, 4)?;
                        let ts = Timestamp4::ref_from_bytes(bytes)
                            .map_err(|_| Error::Decode("datetime4 cast"))?;
                        Ok((Value::Datetime4(ts), rest))
                    }
                    7 => {
                        let (bytes, rest) = read_string_fix(rest, 7)?;
                        let ts = Timestamp7::ref_from_bytes(bytes)
                            .map_err(|_| Error::Decode("datetime7 cast"))?;
                        Ok((Value::Datetime7(ts), rest))
                    }
                    11 => {
                        let (bytes, rest) = read_string_fix(rest, 11)?;
                        let ts = Timestamp11::ref_from_bytes(bytes)
                            .map_err(|_| Error::Decode("datetime11 cast"))?;
                        Ok((Value::Datetime11(ts), rest))
                    }
                    _ => Err(Error::Decode("invalid datetime length")),
                }
            }

            // TIME types
            ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => {
                let (len, rest) = read_int_1(data)?;
                match len {
                    0 => Ok((Value::Time0, rest)),
                    8 => {
                        let (bytes, rest) = read_string_fix(rest, 8)?;
                        let time = Time8::ref_from_bytes(bytes)
                            .map_err(|_| Error::Decode("time8 cast"))?;
                        Ok((Value::Time8(time), rest))
                    }
                    12 => {
                        let (bytes, rest) = read_string_fix(rest, 12)?;
                        let time = Time12::ref_from_bytes(bytes)
                            .map_err(|_| Error::Decode("time12 cast"))?;
                        Ok((Value::Time12(time), rest))
                    }
                    _ => Err(Error::Decode("invalid time length")),
                }
            }

            // String and BLOB types - length-encoded
            ColumnType::MYSQL_TYPE_VARCHAR
            | ColumnType::MYSQL_TYPE_VAR_STRING
            | ColumnType::MYSQL_TYPE_STRING
            | ColumnType::MYSQL_TYPE_BLOB
            | ColumnType::MYSQL_TYPE_TINY_BLOB
            | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
            | ColumnType::MYSQL_TYPE_LONG_BLOB
            | ColumnType::MYSQL_TYPE_GEOMETRY
            | ColumnType::MYSQL_TYPE_JSON
            | ColumnType::MYSQL_TYPE_DECIMAL
            | ColumnType::MYSQL_TYPE_NEWDECIMAL
            | ColumnType::MYSQL_TYPE_ENUM
            | ColumnType::MYSQL_TYPE_SET
            | ColumnType::MYSQL_TYPE_BIT => {
                let (bytes, rest) = read_string_lenenc(data)?;
                Ok((Value::Byte(bytes), rest))
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

// ============================================================================
// Temporal Wire Layouts
// ============================================================================

/// DATE/DATETIME/TIMESTAMP - 4 bytes (date only)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp4 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
}

impl Timestamp4 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }
}

/// DATE/DATETIME/TIMESTAMP - 7 bytes (without microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp7 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp7 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }
}

/// DATE/DATETIME/TIMESTAMP - 11 bytes (with microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp11 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: U32LE,
}

impl Timestamp11 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }

    pub fn microsecond(&self) -> u32 {
        self.microsecond.get()
    }
}

/// TIME - 8 bytes (without microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Time8 {
    pub is_negative: u8,
    pub days: U32LE,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Time8 {
    pub fn is_negative(&self) -> bool {
        self.is_negative != 0
    }

    pub fn days(&self) -> u32 {
        self.days.get()
    }
}

/// TIME - 12 bytes (with microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Time12 {
    pub is_negative: u8,
    pub days: U32LE,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: U32LE,
}

impl Time12 {
    pub fn is_negative(&self) -> bool {
        self.is_negative != 0
    }

    pub fn days(&self) -> u32 {
        self.days.get()
    }

    pub fn microsecond(&self) -> u32 {
        self.microsecond.get()
    }
}

// ============================================================================
// Owned Temporal Values
// ============================================================================

/// Calendar timestamp for DATETIME/TIMESTAMP parameters and row values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
}

impl DateTime {
    fn has_date(&self) -> bool {
        self.year != 0 || self.month != 0 || self.day != 0
    }

    fn has_time(&self) -> bool {
        self.hour != 0 || self.minute != 0 || self.second != 0
    }

    /// Write the length-prefixed compressed DATETIME form: 0, 4, 7 or 11
    /// payload bytes depending on which parts are non-zero.
    pub fn write_binary(&self, out: &mut Vec<u8>) {
        if !self.has_date() && !self.has_time() && self.microsecond == 0 {
            write_int_1(out, 0);
        } else if !self.has_time() && self.microsecond == 0 {
            write_int_1(out, 4);
            write_int_2(out, self.year);
            write_int_1(out, self.month);
            write_int_1(out, self.day);
        } else if self.microsecond == 0 {
            write_int_1(out, 7);
            write_int_2(out, self.year);
            write_int_1(out, self.month);
            write_int_1(out, self.day);
            write_int_1(out, self.hour);
            write_int_1(out, self.minute);
            write_int_1(out, self.second);
        } else {
            write_int_1(out, 11);
            write_int_2(out, self.year);
            write_int_1(out, self.month);
            write_int_1(out, self.day);
            write_int_1(out, self.hour);
            write_int_1(out, self.minute);
            write_int_1(out, self.second);
            write_int_4(out, self.microsecond);
        }
    }
}

impl From<&Timestamp4> for DateTime {
    fn from(ts: &Timestamp4) -> Self {
        DateTime {
            year: ts.year(),
            month: ts.month,
            day: ts.day,
            ..DateTime::default()
        }
    }
}

impl From<&Timestamp7> for DateTime {
    fn from(ts: &Timestamp7) -> Self {
        DateTime {
            year: ts.year(),
            month: ts.month,
            day: ts.day,
            hour: ts.hour,
            minute: ts.minute,
            second: ts.second,
            microsecond: 0,
        }
    }
}

impl From<&Timestamp11> for DateTime {
    fn from(ts: &Timestamp11) -> Self {
        DateTime {
            year: ts.year(),
            month: ts.month,
            day: ts.day,
            hour: ts.hour,
            minute: ts.minute,
            second: ts.second,
            microsecond: ts.microsecond(),
        }
    }
}

/// Signed day-resolution interval for TIME parameters and row values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Duration {
    pub is_negative: bool,
    pub days: u32,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub microseconds: u32,
}

impl Duration {
    fn is_zero(&self) -> bool {
        !self.is_negative
            && self.days == 0
            && self.hours == 0
            && self.minutes == 0
            && self.seconds == 0
            && self.microseconds == 0
    }

    /// Write the length-prefixed compressed TIME form: 0, 8 or 12 payload
    /// bytes depending on which parts are non-zero.
    pub fn write_binary(&self, out: &mut Vec<u8>) {
        if self.is_zero() {
            write_int_1(out, 0);
        } else if self.microseconds == 0 {
            write_int_1(out, 8);
            write_int_1(out, self.is_negative as u8);
            write_int_4(out, self.days);
            write_int_1(out, self.hours);
            write_int_1(out, self.minutes);
            write_int_1(out, self.seconds);
        } else {
            write_int_1(out, 12);
            write_int_1(out, self.is_negative as u8);
            write_int_4(out, self.days);
            write_int_1(out, self.hours);
            write_int_1(out, self.minutes);
            write_int_1(out, self.seconds);
            write_int_4(out, self.microseconds);
        }
    }
}

impl From<&Time8> for Duration {
    fn from(t: &Time8) -> Self {
        Duration {
            is_negative: t.is_negative(),
            days: t.days(),
            hours: t.hour,
            minutes: t.minute,
            seconds: t.second,
            microseconds: 0,
        }
    }
}

impl From<&Time12> for Duration {
    fn from(t: &Time12) -> Self {
        Duration {
            is_negative: t.is_negative(),
            days: t.days(),
            hours: t.hour,
            minutes: t.minute,
            seconds: t.second,
            microseconds: t.microsecond(),
        }
    }
}

// ============================================================================
// NULL Bitmap
// ============================================================================

/// NULL bitmap for the binary protocol.
///
/// Bit `i + offset` (little-endian bit order) is set when column `i` is
/// NULL. Result-set rows carry a 2-bit offset, parameter blocks none.
#[derive(Debug, Clone, Copy)]
pub struct NullBitmap<'a> {
    bitmap: &'a [u8],
    offset: usize,
}

impl<'a> NullBitmap<'a> {
    /// NULL bitmap of a result-set row (offset = 2)
    pub fn for_result_set(bitmap: &'a [u8]) -> Self {
        Self { bitmap, offset: 2 }
    }

    /// NULL bitmap of a parameter block (offset = 0)
    pub fn for_parameters(bitmap: &'a [u8]) -> Self {
        Self { bitmap, offset: 0 }
    }

    /// Number of bytes a bitmap for `columns` entries occupies
    pub fn len_for_result_set(columns: usize) -> usize {
        (columns + 2 + 7) / 8
    }

    pub fn is_null(&self, idx: usize) -> bool {
        let bit_pos = idx + self.offset;
        let byte_pos = bit_pos >> 3;
        let bit_offset = bit_pos & 7;

        if byte_pos >= self.bitmap.len() {
            return false;
        }

        (self.bitmap[byte_pos] & (1 << bit_offset)) != 0
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bitmap
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::ColumnFlags;

    fn column(column_type: ColumnType, flags: ColumnFlags) -> Column {
        Column {
            schema: String::new(),
            table: String::new(),
            org_table: String::new(),
            name: String::new(),
            org_name: String::new(),
            charset: 45,
            column_length: 0,
            column_type,
            flags,
            decimals: 0,
        }
    }

    #[test]
    fn parse_signed_integers() {
        let col = column(ColumnType::MYSQL_TYPE_TINY, ColumnFlags::empty());
        let (value, rest) = Value::parse(&col, &[214]).unwrap();
        assert!(matches!(value, Value::SignedInt(-42)));
        assert!(rest.is_empty());

        let col = column(ColumnType::MYSQL_TYPE_SHORT, ColumnFlags::empty());
        let (value, _) = Value::parse(&col, &[0x18, 0xfc]).unwrap();
        assert!(matches!(value, Value::SignedInt(-1000)));

        let col = column(ColumnType::MYSQL_TYPE_LONG, ColumnFlags::empty());
        let (value, _) = Value::parse(&col, &[0x60, 0x79, 0xfe, 0xff]).unwrap();
        assert!(matches!(value, Value::SignedInt(-100000)));
    }

    #[test]
    fn parse_unsigned_integers() {
        let col = column(ColumnType::MYSQL_TYPE_TINY, ColumnFlags::UNSIGNED_FLAG);
        let (value, _) = Value::parse(&col, &[200]).unwrap();
        assert!(matches!(value, Value::UnsignedInt(200)));

        let col = column(ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::UNSIGNED_FLAG);
        let data = u64::MAX.to_le_bytes();
        let (value, _) = Value::parse(&col, &data).unwrap();
        assert!(matches!(value, Value::UnsignedInt(u64::MAX)));
    }

    #[test]
    fn parse_float_double() {
        let col = column(ColumnType::MYSQL_TYPE_FLOAT, ColumnFlags::empty());
        let data = 3.14f32.to_le_bytes();
        let (value, _) = Value::parse(&col, &data).unwrap();
        match value {
            Value::Float(f) => assert!((f - 3.14).abs() < 0.001),
            other => panic!("expected Float, got {other:?}"),
        }

        let col = column(ColumnType::MYSQL_TYPE_DOUBLE, ColumnFlags::empty());
        let data = std::f64::consts::PI.to_le_bytes();
        let (value, _) = Value::parse(&col, &data).unwrap();
        match value {
            Value::Double(d) => assert!((d - std::f64::consts::PI).abs() < 1e-12),
            other => panic!("expected Double, got {other:?}"),
        }
    }

    #[test]
    fn parse_datetime_lengths() {
        let col = column(ColumnType::MYSQL_TYPE_DATETIME, ColumnFlags::empty());

        let (value, _) = Value::parse(&col, &[0]).unwrap();
        assert!(matches!(value, Value::Datetime0));

        let mut data = vec![4u8];
        data.extend_from_slice(&2024u16.to_le_bytes());
        data.extend_from_slice(&[12, 25]);
        let (value, _) = Value::parse(&col, &data).unwrap();
        match value {
            Value::Datetime4(ts) => {
                assert_eq!(ts.year(), 2024);
                assert_eq!(ts.month, 12);
                assert_eq!(ts.day, 25);
            }
            other => panic!("expected Datetime4, got {other:?}"),
        }

        let mut data = vec![11u8];
        data.extend_from_slice(&2024u16.to_le_bytes());
        data.extend_from_slice(&[12, 25, 15, 30, 45]);
        data.extend_from_slice(&123456u32.to_le_bytes());
        let (value, _) = Value::parse(&col, &data).unwrap();
        match value {
            Value::Datetime11(ts) => {
                assert_eq!(ts.year(), 2024);
                assert_eq!(ts.microsecond(), 123456);
            }
            other => panic!("expected Datetime11, got {other:?}"),
        }

        assert!(Value::parse(&col, &[5, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn parse_time_lengths() {
        let col = column(ColumnType::MYSQL_TYPE_TIME, ColumnFlags::empty());

        let (value, _) = Value::parse(&col, &[0]).unwrap();
        assert!(matches!(value, Value::Time0));

        let mut data = vec![8u8, 1];
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&[12, 30, 45]);
        let (value, _) = Value::parse(&col, &data).unwrap();
        match value {
            Value::Time8(t) => {
                assert!(t.is_negative());
                assert_eq!(t.days(), 1);
                assert_eq!(t.hour, 12);
            }
            other => panic!("expected Time8, got {other:?}"),
        }
    }

    #[test]
    fn parse_lenenc_bytes() {
        let col = column(ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty());
        let mut data = vec![5u8];
        data.extend_from_slice(b"Hello");
        let (value, rest) = Value::parse(&col, &data).unwrap();
        match value {
            Value::Byte(bytes) => assert_eq!(bytes, b"Hello"),
            other => panic!("expected Byte, got {other:?}"),
        }
        assert!(rest.is_empty());
    }

    #[test]
    fn datetime_binary_compression() {
        let mut out = Vec::new();
        DateTime::default().write_binary(&mut out);
        assert_eq!(out, [0]);

        out.clear();
        DateTime {
            year: 2024,
            month: 1,
            day: 15,
            ..DateTime::default()
        }
        .write_binary(&mut out);
        assert_eq!(out, [4, 0xe8, 0x07, 1, 15]);

        out.clear();
        DateTime {
            year: 2024,
            month: 1,
            day: 15,
            hour: 12,
            minute: 30,
            second: 45,
            microsecond: 0,
        }
        .write_binary(&mut out);
        assert_eq!(out, [7, 0xe8, 0x07, 1, 15, 12, 30, 45]);

        out.clear();
        DateTime {
            year: 2024,
            month: 1,
            day: 15,
            hour: 12,
            minute: 30,
            second: 45,
            microsecond: 123456,
        }
        .write_binary(&mut out);
        assert_eq!(out[..8], [11, 0xe8, 0x07, 1, 15, 12, 30, 45]);
        assert_eq!(&out[8..], 123456u32.to_le_bytes());
    }

    #[test]
    fn duration_binary_compression() {
        let mut out = Vec::new();
        Duration::default().write_binary(&mut out);
        assert_eq!(out, [0]);

        out.clear();
        Duration {
            is_negative: true,
            days: 2,
            hours: 3,
            minutes: 4,
            seconds: 5,
            microseconds: 0,
        }
        .write_binary(&mut out);
        assert_eq!(out, [8, 1, 2, 0, 0, 0, 3, 4, 5]);

        out.clear();
        Duration {
            is_negative: false,
            days: 0,
            hours: 0,
            minutes: 0,
            seconds: 1,
            microseconds: 500000,
        }
        .write_binary(&mut out);
        assert_eq!(out[..8], [12, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(out[8], 1);
        assert_eq!(&out[9..], 500000u32.to_le_bytes());
    }

    #[test]
    fn null_bitmap_result_set_offset() {
        // With offset=2, bit 2 of byte 0 is column 0.
        let bitmap = [0b0000_0100, 0b0001_0000];
        let null_bitmap = NullBitmap::for_result_set(&bitmap);
        assert!(null_bitmap.is_null(0));
        assert!(!null_bitmap.is_null(1));
        assert!(null_bitmap.is_null(10));
        assert!(!null_bitmap.is_null(100)); // past the bitmap
    }

    #[test]
    fn null_bitmap_parameter_offset() {
        let bitmap = [0b0000_0101];
        let null_bitmap = NullBitmap::for_parameters(&bitmap);
        assert!(null_bitmap.is_null(0));
        assert!(!null_bitmap.is_null(1));
        assert!(null_bitmap.is_null(2));
        assert!(!null_bitmap.is_null(3));
    }

    #[test]
    fn null_bitmap_result_set_length() {
        assert_eq!(NullBitmap::len_for_result_set(0), 1);
        assert_eq!(NullBitmap::len_for_result_set(6), 1);
        assert_eq!(NullBitmap::len_for_result_set(7), 2);
        assert_eq!(NullBitmap::len_for_result_set(14), 2);
    }
}
