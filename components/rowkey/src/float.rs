// Copyright 2024 RowKey Project Authors. Licensed under Apache-2.0.

//! IEEE-754 float codecs.
//!
//! The raw bit pattern of a positive float already compares correctly when
//! its bytes are compared most significant first. To extend that to the full
//! domain the sign bit is inverted, and for negative values every other bit
//! is inverted too, so negatives sort before positives and among themselves
//! in reverse magnitude order:
//!
//! ```text
//! j ^= (j >> (W - 1)) | SIGN_BIT
//! ```
//!
//! with an arithmetic shift. All NaN payloads are first collapsed to the
//! canonical quiet NaN, which therefore sorts above positive infinity and
//! frees the all-ones pre-transform pattern. NULL is stored as the all-zero
//! word; every non-null transformed word is incremented by one, which cannot
//! overflow because any non-NaN pattern keeps at least one zero bit. The
//! resulting total order is
//!
//! ```text
//! NULL < -inf < -MAX < .. < -0.0 < +0.0 < .. < +MAX < +inf < NaN
//! ```
//!
//! Descending order complements the serialized word.

use bytes_ext::{Buf, SafeBuf, SafeBufMut};
use snafu::ResultExt;

use crate::{Exhausted, Order, Result, RowKey, Truncated};

macro_rules! float_row_key {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $uty:ty, $ity:ty, $canonical_nan:expr, $sign_bit:expr,
     $put:ident, $get:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            order: Order,
        }

        impl $name {
            pub fn new(order: Order) -> Self {
                Self { order }
            }

            fn word_mask(&self) -> $uty {
                match self.order {
                    Order::Ascending => 0,
                    Order::Descending => <$uty>::MAX,
                }
            }
        }

        impl RowKey for $name {
            type Value = Option<$ty>;

            fn order(&self) -> Order {
                self.order
            }

            fn set_order(&mut self, order: Order) {
                self.order = order;
            }

            fn serialized_length(&self, _value: &Option<$ty>) -> Result<usize> {
                Ok(std::mem::size_of::<$uty>())
            }

            fn serialize<B: SafeBufMut>(&self, buf: &mut B, value: &Option<$ty>) -> Result<()> {
                let word = match value {
                    None => 0,
                    Some(v) => {
                        let j = if v.is_nan() { $canonical_nan } else { v.to_bits() };
                        (j ^ ((((j as $ity) >> (<$uty>::BITS - 1)) as $uty) | $sign_bit)) + 1
                    }
                };
                buf.$put(word ^ self.word_mask()).context(Exhausted)
            }

            fn skip<B: Buf>(&self, buf: &mut B) -> Result<usize> {
                let len = std::mem::size_of::<$uty>();
                buf.try_advance(len).context(Truncated)?;
                Ok(len)
            }

            fn deserialize<B: Buf>(&self, buf: &mut B) -> Result<Option<$ty>> {
                let mut j = SafeBuf::$get(buf).context(Truncated)? ^ self.word_mask();
                if j == 0 {
                    return Ok(None);
                }
                j -= 1;
                j ^= (((!j as $ity) >> (<$uty>::BITS - 1)) as $uty) | $sign_bit;
                Ok(Some(<$ty>::from_bits(j)))
            }
        }
    };
}

float_row_key!(
    /// Codec for `f32` as a 4 byte word.
    FloatRowKey, f32, u32, i32, 0x7fc0_0000u32, 0x8000_0000u32, try_put_u32, try_get_u32
);
float_row_key!(
    /// Codec for `f64` as an 8 byte word.
    DoubleRowKey, f64, u64, i64, 0x7ff8_0000_0000_0000u64, 0x8000_0000_0000_0000u64,
    try_put_u64, try_get_u64
);
