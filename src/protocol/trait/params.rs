use crate::error::Result;
use crate::protocol::r#trait::param::Param;

/// A full parameter list for one COM_STMT_EXECUTE.
///
/// Implemented for tuples (heterogeneous), slices and arrays
/// (homogeneous), and the unit type for statements without placeholders.
pub trait Params {
    /// Number of parameters
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the NULL bitmap: `(len + 7) / 8` bytes, little-endian bit
    /// order, bit `i` set iff parameter `i` is NULL.
    fn write_null_bitmap(&self, out: &mut Vec<u8>);

    /// Write the 2-byte `[type, unsigned]` descriptor per parameter
    fn write_types(&self, out: &mut Vec<u8>);

    /// Write the binary values of all non-NULL parameters in order
    fn write_values(&self, out: &mut Vec<u8>) -> Result<()>;
}

/// No parameters
impl Params for () {
    fn len(&self) -> usize {
        0
    }

    fn write_null_bitmap(&self, _out: &mut Vec<u8>) {}

    fn write_types(&self, _out: &mut Vec<u8>) {}

    fn write_values(&self, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }
}

impl<T: Param> Params for &[T] {
    fn len(&self) -> usize {
        (*self).len()
    }

    fn write_null_bitmap(&self, out: &mut Vec<u8>) {
        let num_bytes = Params::len(self).div_ceil(8);
        let start_len = out.len();
        out.resize(start_len + num_bytes, 0);

        for (i, param) in self.iter().enumerate() {
            if param.is_null() {
                out[start_len + (i >> 3)] |= 1 << (i & 7);
            }
        }
    }

    fn write_types(&self, out: &mut Vec<u8>) {
        for param in self.iter() {
            param.write_type(out);
        }
    }

    fn write_values(&self, out: &mut Vec<u8>) -> Result<()> {
        for param in self.iter() {
            if !param.is_null() {
                param.write_value(out)?;
            }
        }
        Ok(())
    }
}

impl<T: Param, const N: usize> Params for [T; N] {
    fn len(&self) -> usize {
        N
    }

    fn write_null_bitmap(&self, out: &mut Vec<u8>) {
        self.as_slice().write_null_bitmap(out)
    }

    fn write_types(&self, out: &mut Vec<u8>) {
        self.as_slice().write_types(out)
    }

    fn write_values(&self, out: &mut Vec<u8>) -> Result<()> {
        self.as_slice().write_values(out)
    }
}

macro_rules! impl_params_for_tuple {
    ($($T:ident : $idx:tt),+) => {
        impl<$($T: Param),+> Params for ($($T,)+) {
            fn len(&self) -> usize {
                let mut count = 0;
                $(
                    let _ = &self.$idx;
                    count += 1;
                )+
                count
            }

            fn write_null_bitmap(&self, out: &mut Vec<u8>) {
                let num_bytes = Params::len(self).div_ceil(8);
                let start_len = out.len();
                out.resize(start_len + num_bytes, 0);

                $(
                    if self.$idx.is_null() {
                        out[start_len + ($idx >> 3)] |= 1 << ($idx & 7);
                    }
                )+
            }

            fn write_types(&self, out: &mut Vec<u8>) {
                $(
                    self.$idx.write_type(out);
                )+
            }

            fn write_values(&self, out: &mut Vec<u8>) -> Result<()> {
                $(
                    if !self.$idx.is_null() {
                        self.$idx.write_value(out)?;
                    }
                )+
                Ok(())
            }
        }
    };
}

// Implement for tuples of size 1-12
impl_params_for_tuple!(T0: 0);
impl_params_for_tuple!(T0: 0, T1: 1);
impl_params_for_tuple!(T0: 0, T1: 1, T2: 2);
impl_params_for_tuple!(T0: 0, T1: 1, T2: 2, T3: 3);
impl_params_for_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4);
impl_params_for_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5);
impl_params_for_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6);
impl_params_for_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7);
impl_params_for_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8);
impl_params_for_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9);
impl_params_for_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10);
impl_params_for_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::r#trait::param::Null;

    #[test]
    fn params_slice() {
        let params: &[i32] = &[1, 2, 3];
        assert_eq!(Params::len(&params), 3);

        let mut null_bitmap = Vec::new();
        params.write_null_bitmap(&mut null_bitmap);
        assert_eq!(null_bitmap, vec![0]);

        let mut types = Vec::new();
        params.write_types(&mut types);
        assert_eq!(types.len(), 6);

        let mut values = Vec::new();
        params.write_values(&mut values).unwrap();
        assert_eq!(values.len(), 12);
    }

    #[test]
    fn params_array() {
        let params = [1u8, 2, 3, 4, 5];
        assert_eq!(Params::len(&params), 5);

        let mut types = Vec::new();
        params.write_types(&mut types);
        assert_eq!(types.len(), 10);
    }

    #[test]
    fn params_tuple_with_option() {
        let params = (Some(42i32), None::<String>, Some("test"));
        assert_eq!(Params::len(&params), 3);

        let mut null_bitmap = Vec::new();
        params.write_null_bitmap(&mut null_bitmap);
        assert_eq!(null_bitmap, vec![0b0000_0010]);

        let mut values = Vec::new();
        params.write_values(&mut values).unwrap();
        // i32 (4 bytes) + "test" length-encoded (1 + 4 bytes)
        assert_eq!(values.len(), 9);
    }

    #[test]
    fn params_mixed_types() {
        let params = (
            1i8, 2i16, 3i32, 4i64, 5u8, 6u16, 7u32, 8u64, 1.5f32, 2.5f64, "hello",
        );
        assert_eq!(Params::len(&params), 11);

        let mut types = Vec::new();
        params.write_types(&mut types);
        assert_eq!(types.len(), 22);

        let mut values = Vec::new();
        params.write_values(&mut values).unwrap();
        // 1+2+4+8+1+2+4+8+4+8+6 = 48 bytes
        assert_eq!(values.len(), 48);
    }

    #[test]
    fn null_bitmap_law_over_nine_params() {
        // Bit i is set iff parameter i is null; two bytes for 9 params.
        let params = (
            Null,
            1i32,
            Null,
            2i32,
            Null,
            3i32,
            Null,
            4i32,
            None::<i32>,
        );
        assert_eq!(Params::len(&params), 9);

        let mut bitmap = Vec::new();
        params.write_null_bitmap(&mut bitmap);
        assert_eq!(bitmap, vec![0b0101_0101, 0b0000_0001]);
    }

    #[test]
    fn bitmap_sizes_round_up() {
        let seven: &[i32] = &[0; 7];
        let mut bitmap = Vec::new();
        seven.write_null_bitmap(&mut bitmap);
        assert_eq!(bitmap.len(), 1);

        let eight: &[i32] = &[0; 8];
        bitmap.clear();
        eight.write_null_bitmap(&mut bitmap);
        assert_eq!(bitmap.len(), 1);

        let nine: &[i32] = &[0; 9];
        bitmap.clear();
        nine.write_null_bitmap(&mut bitmap);
        assert_eq!(bitmap.len(), 2);
    }
}
