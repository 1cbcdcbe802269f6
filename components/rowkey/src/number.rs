// Copyright 2024 RowKey Project Authors. Licensed under Apache-2.0.

//! Fixed width integer codecs.
//!
//! Signed values are XOR'd with their sign bit and written big-endian, which
//! maps the two's complement range onto the unsigned range while keeping the
//! numeric order. Unsigned values are written big-endian unchanged.
//! Descending order complements every byte. These codecs have no NULL
//! representation; compose the varint codecs when optional integers are
//! needed.

use std::mem;

use bytes_ext::{Buf, SafeBuf, SafeBufMut};
use snafu::ResultExt;

use crate::{Exhausted, Order, Result, RowKey, Truncated};

macro_rules! fixed_row_key {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $uty:ty, $sign_mask:expr, $put:ident, $get:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            order: Order,
        }

        impl $name {
            pub fn new(order: Order) -> Self {
                Self { order }
            }
        }

        impl RowKey for $name {
            type Value = $ty;

            fn order(&self) -> Order {
                self.order
            }

            fn set_order(&mut self, order: Order) {
                self.order = order;
            }

            fn serialized_length(&self, _value: &$ty) -> Result<usize> {
                Ok(mem::size_of::<$ty>())
            }

            fn serialize<B: SafeBufMut>(&self, buf: &mut B, value: &$ty) -> Result<()> {
                let mut u = (*value as $uty) ^ $sign_mask;
                if self.order == Order::Descending {
                    u = !u;
                }
                buf.$put(u).context(Exhausted)
            }

            fn skip<B: Buf>(&self, buf: &mut B) -> Result<usize> {
                buf.try_advance(mem::size_of::<$ty>()).context(Truncated)?;
                Ok(mem::size_of::<$ty>())
            }

            fn deserialize<B: Buf>(&self, buf: &mut B) -> Result<$ty> {
                let mut u = SafeBuf::$get(buf).context(Truncated)?;
                if self.order == Order::Descending {
                    u = !u;
                }
                Ok((u ^ $sign_mask) as $ty)
            }
        }
    };
}

fixed_row_key!(
    /// Codec for `i8` as one sign-flipped byte.
    FixedInt8RowKey, i8, u8, 0x80u8, try_put_u8, try_get_u8
);
fixed_row_key!(
    /// Codec for `i16` as two big-endian sign-flipped bytes.
    FixedInt16RowKey, i16, u16, 0x8000u16, try_put_u16, try_get_u16
);
fixed_row_key!(
    /// Codec for `i32` as four big-endian sign-flipped bytes.
    FixedInt32RowKey, i32, u32, 0x8000_0000u32, try_put_u32, try_get_u32
);
fixed_row_key!(
    /// Codec for `i64` as eight big-endian sign-flipped bytes.
    FixedInt64RowKey, i64, u64, 0x8000_0000_0000_0000u64, try_put_u64, try_get_u64
);
fixed_row_key!(
    /// Codec for `u8` as one byte.
    FixedUInt8RowKey, u8, u8, 0u8, try_put_u8, try_get_u8
);
fixed_row_key!(
    /// Codec for `u16` as two big-endian bytes.
    FixedUInt16RowKey, u16, u16, 0u16, try_put_u16, try_get_u16
);
fixed_row_key!(
    /// Codec for `u32` as four big-endian bytes.
    FixedUInt32RowKey, u32, u32, 0u32, try_put_u32, try_get_u32
);
fixed_row_key!(
    /// Codec for `u64` as eight big-endian bytes.
    FixedUInt64RowKey, u64, u64, 0u64, try_put_u64, try_get_u64
);

#[cfg(test)]
mod tests {
    use core::cmp::Ordering;

    use super::*;
    use crate::Error;

    #[test]
    fn test_fixed_int64_known_bytes() {
        let c = FixedInt64RowKey::new(Order::Ascending);
        let data: Vec<(i64, Vec<u8>)> = vec![
            (0, vec![0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
            (1, vec![0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]),
            (-1, vec![0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]),
            (
                i64::MIN,
                vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            ),
            (
                i64::MAX,
                vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
            ),
        ];
        for (value, expect) in &data {
            assert_eq!(*expect, c.serialize_to_vec(value).unwrap());
            assert_eq!(*value, c.deserialize_from_slice(expect).unwrap());
        }
    }

    struct TblI32 {
        arg1: i32,
        arg2: i32,
        ret: Ordering,
    }

    #[test]
    fn test_fixed_int32_order() {
        let data = vec![
            TblI32 {
                arg1: -1,
                arg2: 1,
                ret: Ordering::Less,
            },
            TblI32 {
                arg1: i32::MAX,
                arg2: i32::MIN,
                ret: Ordering::Greater,
            },
            TblI32 {
                arg1: i32::MIN,
                arg2: i8::MAX as i32,
                ret: Ordering::Less,
            },
            TblI32 {
                arg1: 0,
                arg2: 0,
                ret: Ordering::Equal,
            },
            TblI32 {
                arg1: -1 << 23,
                arg2: (1 << 23) - 1,
                ret: Ordering::Less,
            },
        ];

        let asc = FixedInt32RowKey::new(Order::Ascending);
        let desc = FixedInt32RowKey::new(Order::Descending);
        for x in &data {
            let a1 = asc.serialize_to_vec(&x.arg1).unwrap();
            let a2 = asc.serialize_to_vec(&x.arg2).unwrap();
            assert_eq!(x.ret, a1.cmp(&a2));

            let d1 = desc.serialize_to_vec(&x.arg1).unwrap();
            let d2 = desc.serialize_to_vec(&x.arg2).unwrap();
            assert_eq!(x.ret.reverse(), d1.cmp(&d2));
        }
    }

    #[test]
    fn test_fixed_unsigned_round_trip() {
        let c = FixedUInt16RowKey::new(Order::Descending);
        for value in [0u16, 1, 255, 256, u16::MAX] {
            let buf = c.serialize_to_vec(&value).unwrap();
            assert_eq!(2, buf.len());
            assert_eq!(value, c.deserialize_from_slice(&buf).unwrap());
        }

        // Bigger unsigned values sort higher, inverted for descending.
        let lo = c.serialize_to_vec(&3).unwrap();
        let hi = c.serialize_to_vec(&4).unwrap();
        assert!(lo > hi);
    }

    #[test]
    fn test_fixed_skip_and_truncation() {
        let c = FixedInt32RowKey::new(Order::Ascending);
        let buf = c.serialize_to_vec(&42).unwrap();

        let mut reader = &buf[..];
        assert_eq!(4, c.skip(&mut reader).unwrap());
        assert!(reader.is_empty());

        let mut short = &buf[..3];
        assert!(matches!(c.skip(&mut short), Err(Error::Truncated { .. })));
        assert_eq!(3, short.len());
        assert!(matches!(
            c.deserialize(&mut short),
            Err(Error::Truncated { .. })
        ));
    }
}
