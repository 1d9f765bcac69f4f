//! Mapping from native values to MySQL field types for prepared-statement
//! parameters.
//!
//! Every parameter writes a 2-byte type descriptor (`[type, unsigned]`)
//! and, unless NULL, its binary-encoded value. Unsigned integers keep the
//! 0x80 descriptor flag so the server sees the right signedness.

use crate::constant::{ColumnType, TYPE_DESCRIPTOR_UNSIGNED};
use crate::error::Result;
use crate::protocol::primitive::*;
use crate::value::{DateTime, Duration};

/// A single bindable parameter value
pub trait Param {
    fn is_null(&self) -> bool {
        false
    }
    fn write_type(&self, out: &mut Vec<u8>);
    fn write_value(&self, out: &mut Vec<u8>) -> Result<()>;
}

/// An explicitly NULL parameter of no particular type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Null;

impl Param for Null {
    fn is_null(&self) -> bool {
        true
    }

    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_NULL as u8);
        out.push(0x00);
    }

    fn write_value(&self, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }
}

impl Param for i8 {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_TINY as u8);
        out.push(0x00);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_int_1(out, *self as u8);
        Ok(())
    }
}

impl Param for i16 {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_SHORT as u8);
        out.push(0x00);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_int_2(out, *self as u16);
        Ok(())
    }
}

impl Param for i32 {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_LONG as u8);
        out.push(0x00);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_int_4(out, *self as u32);
        Ok(())
    }
}

impl Param for i64 {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_LONGLONG as u8);
        out.push(0x00);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_int_8(out, *self as u64);
        Ok(())
    }
}

impl Param for u8 {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_TINY as u8);
        out.push(TYPE_DESCRIPTOR_UNSIGNED);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_int_1(out, *self);
        Ok(())
    }
}

impl Param for u16 {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_SHORT as u8);
        out.push(TYPE_DESCRIPTOR_UNSIGNED);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_int_2(out, *self);
        Ok(())
    }
}

impl Param for u32 {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_LONG as u8);
        out.push(TYPE_DESCRIPTOR_UNSIGNED);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_int_4(out, *self);
        Ok(())
    }
}

impl Param for u64 {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_LONGLONG as u8);
        out.push(TYPE_DESCRIPTOR_UNSIGNED);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_int_8(out, *self);
        Ok(())
    }
}

impl Param for f32 {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_FLOAT as u8);
        out.push(0x00);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_int_4(out, self.to_bits());
        Ok(())
    }
}

impl Param for f64 {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_DOUBLE as u8);
        out.push(0x00);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_int_8(out, self.to_bits());
        Ok(())
    }
}

impl Param for &str {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_STRING as u8);
        out.push(0x00);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_string_lenenc(out, self);
        Ok(())
    }
}

impl Param for String {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_STRING as u8);
        out.push(0x00);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_string_lenenc(out, self);
        Ok(())
    }
}

impl Param for &String {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_STRING as u8);
        out.push(0x00);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_string_lenenc(out, self);
        Ok(())
    }
}

impl Param for &[u8] {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_STRING as u8);
        out.push(0x00);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_bytes_lenenc(out, self);
        Ok(())
    }
}

impl Param for Vec<u8> {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_STRING as u8);
        out.push(0x00);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_bytes_lenenc(out, self);
        Ok(())
    }
}

impl Param for DateTime {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_DATETIME as u8);
        out.push(0x00);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        self.write_binary(out);
        Ok(())
    }
}

impl Param for Duration {
    fn write_type(&self, out: &mut Vec<u8>) {
        out.push(ColumnType::MYSQL_TYPE_TIME as u8);
        out.push(0x00);
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        self.write_binary(out);
        Ok(())
    }
}

impl<T: Param> Param for Option<T> {
    fn is_null(&self) -> bool {
        self.is_none()
    }

    fn write_type(&self, out: &mut Vec<u8>) {
        match self {
            Some(value) => value.write_type(out),
            // An absent optional has no carrier type to describe
            None => Null.write_type(out),
        }
    }

    fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Some(value) => value.write_value(out),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_i32() {
        let param: i32 = -42;
        let mut types = Vec::new();
        let mut values = Vec::new();

        param.write_type(&mut types);
        param.write_value(&mut values).unwrap();

        assert_eq!(types, vec![ColumnType::MYSQL_TYPE_LONG as u8, 0x00]);
        assert_eq!(values, (-42i32).to_le_bytes());
        assert!(!param.is_null());
    }

    #[test]
    fn param_u64_carries_unsigned_flag() {
        let param: u64 = 12345678901234;
        let mut types = Vec::new();
        let mut values = Vec::new();

        param.write_type(&mut types);
        param.write_value(&mut values).unwrap();

        assert_eq!(types, vec![ColumnType::MYSQL_TYPE_LONGLONG as u8, 0x80]);
        assert_eq!(values, 12345678901234u64.to_le_bytes());
    }

    #[test]
    fn param_f64() {
        let param: f64 = 3.14159;
        let mut types = Vec::new();
        let mut values = Vec::new();

        param.write_type(&mut types);
        param.write_value(&mut values).unwrap();

        assert_eq!(types, vec![ColumnType::MYSQL_TYPE_DOUBLE as u8, 0x00]);
        assert_eq!(values, 3.14159f64.to_bits().to_le_bytes());
    }

    #[test]
    fn param_str() {
        let param = "Hello, MySQL!";
        let mut types = Vec::new();
        let mut values = Vec::new();

        param.write_type(&mut types);
        param.write_value(&mut values).unwrap();

        assert_eq!(types, vec![ColumnType::MYSQL_TYPE_STRING as u8, 0x00]);
        assert_eq!(values[0], 13);
        assert_eq!(&values[1..], b"Hello, MySQL!");
    }

    #[test]
    fn param_bytes() {
        let param: &[u8] = &[0xde, 0xad, 0xbe, 0xef];
        let mut types = Vec::new();
        let mut values = Vec::new();

        param.write_type(&mut types);
        param.write_value(&mut values).unwrap();

        assert_eq!(types, vec![ColumnType::MYSQL_TYPE_STRING as u8, 0x00]);
        assert_eq!(values[0], 4);
        assert_eq!(&values[1..], &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn param_null_marker() {
        let mut types = Vec::new();
        let mut values = Vec::new();

        assert!(Null.is_null());
        Null.write_type(&mut types);
        Null.write_value(&mut values).unwrap();

        assert_eq!(types, vec![ColumnType::MYSQL_TYPE_NULL as u8, 0x00]);
        assert!(values.is_empty());
    }

    #[test]
    fn param_option_some() {
        let param = Some(42i32);
        let mut types = Vec::new();
        let mut values = Vec::new();

        assert!(!param.is_null());
        param.write_type(&mut types);
        param.write_value(&mut values).unwrap();

        assert_eq!(types, vec![ColumnType::MYSQL_TYPE_LONG as u8, 0x00]);
        assert_eq!(values, 42i32.to_le_bytes());
    }

    #[test]
    fn param_option_none_degrades_to_null_type() {
        let param: Option<String> = None;
        let mut types = Vec::new();
        let mut values = Vec::new();

        assert!(param.is_null());
        param.write_type(&mut types);
        param.write_value(&mut values).unwrap();

        assert_eq!(types, vec![ColumnType::MYSQL_TYPE_NULL as u8, 0x00]);
        assert!(values.is_empty());
    }

    #[test]
    fn param_datetime() {
        let param = DateTime {
            year: 2024,
            month: 2,
            day: 29,
            ..DateTime::default()
        };
        let mut types = Vec::new();
        let mut values = Vec::new();

        param.write_type(&mut types);
        param.write_value(&mut values).unwrap();

        assert_eq!(types, vec![ColumnType::MYSQL_TYPE_DATETIME as u8, 0x00]);
        assert_eq!(values, vec![4, 0xe8, 0x07, 2, 29]);
    }

    #[test]
    fn param_duration() {
        let param = Duration {
            is_negative: false,
            days: 0,
            hours: 1,
            minutes: 2,
            seconds: 3,
            microseconds: 0,
        };
        let mut types = Vec::new();
        let mut values = Vec::new();

        param.write_type(&mut types);
        param.write_value(&mut values).unwrap();

        assert_eq!(types, vec![ColumnType::MYSQL_TYPE_TIME as u8, 0x00]);
        assert_eq!(values, vec![8, 0, 0, 0, 0, 0, 1, 2, 3]);
    }
}
