// Copyright 2024 RowKey Project Authors. Licensed under Apache-2.0.

//! Sortable variable-length integer codec.
//!
//! Unlike base-128 or zig-zag varints, this format keeps the unsigned
//! byte-wise comparison of two encodings consistent with the numeric
//! comparison of the integers, across signs and encoded lengths. Only the
//! bits differing from the sign bit are stored: a header byte carries the
//! sign, the length class and the most significant data bits, followed by
//! 0-8 big-endian data bytes.
//!
//! Header layout for a signed value x, with `neg_sign = !(x >> 63)`:
//!
//! - bit 7: `neg_sign`
//! - bit 6: single-byte encoded ^ `neg_sign`
//! - bit 5: double-byte encoded ^ `neg_sign`
//! - bits 2-4: (total length - 3) ^ sign, for the 3-9 byte classes
//!
//! A single-byte encoding keeps 6 data bits in the header, a double-byte
//! encoding 5, and the longer classes 2. The XOR'ing of the class flags with
//! the sign keeps more negative values on smaller headers and more positive
//! values on larger ones. The unsigned variant drops the explicit sign bit,
//! widening every class by one data bit, and increments the finished header
//! by one so 0x00 stays free.
//!
//! The header value 0x00 never occurs in a valid encoding and is reserved
//! for NULL; under the descending order mask it becomes 0xff. Up to two
//! (signed) or three (unsigned) most significant header bits may be
//! reserved for an embedder, shifting the whole header right logically; the
//! decimal codec uses two of them to hold its own header bits.

use bytes_ext::{Buf, SafeBuf, SafeBufMut};
use snafu::{ensure, ResultExt};

use crate::{
    consts::{MAX_SIGNED_RESERVED_BITS, MAX_UNSIGNED_RESERVED_BITS, MAX_VARINT_BYTES, NULL_HEADER},
    Corrupt, Exhausted, InvalidConfiguration, Order, Result, RowKey, Truncated,
};

/// Header flags
const HEADER_SIGN: u8 = 0x80;
const HEADER_SINGLE: u8 = 0x40;
const HEADER_DOUBLE: u8 = 0x20;

/// Header data bits for each header type
const SINGLE_DATA_BITS: u32 = 6;
const DOUBLE_DATA_BITS: u32 = 5;
const MULTI_DATA_BITS: u32 = 2;

/// A multi byte encoding is at least 3 bytes, so lengths are stored with a
/// bias of 3 to fit the 3 bit length field.
const LEN_BIAS: usize = 3;
const LEN_BITS: u32 = 3;
const LEN_OFF: u32 = 2;

/// Unsigned encodings omit the leading sign bit
const UNSIGNED_SHIFT: u32 = 1;

fn header_data_bits(num_bytes: usize, signed: bool) -> u32 {
    let base = match num_bytes {
        1 => SINGLE_DATA_BITS,
        2 => DOUBLE_DATA_BITS,
        _ => MULTI_DATA_BITS,
    };
    if signed {
        base
    } else {
        base + UNSIGNED_SHIFT
    }
}

/// Number of bits required to represent x in a minimal-length two's
/// complement representation, excluding the sign bit.
fn bit_size(x: i64, signed: bool) -> u32 {
    let diff_bits = if signed { x ^ (x >> 63) } else { x };
    64 - (diff_bits as u64).leading_zeros()
}

/// Number of bytes the encoding of `x` occupies. For unsigned values `x` is
/// the u64 bit pattern.
pub(crate) fn encoded_len(x: i64, signed: bool, reserved_bits: u8) -> usize {
    let num_bits = bit_size(x, signed) + u32::from(reserved_bits);

    if num_bits <= header_data_bits(1, signed) {
        1
    } else if num_bits <= header_data_bits(2, signed) + 8 {
        2
    } else {
        // One header byte plus the data bits that do not fit the header,
        // rounded up to whole bytes.
        1 + ((num_bits - header_data_bits(3, signed) + 7) >> 3) as usize
    }
}

/// Read one encoded byte out of x. Bits addressed past the top of the value
/// are filled with the sign bit.
fn read_byte(x: i64, offset: i32, mask: u8, signed: bool) -> u8 {
    if offset >= 63 {
        return if signed { ((x >> 63) as u8) & mask } else { 0 };
    }
    let shifted = if signed {
        x >> offset
    } else {
        ((x as u64) >> offset) as i64
    };
    (shifted as u8) & mask
}

/// Merge one encoded byte back into x. `x` must start out as the
/// right-propagated sign (all ones for a negative value, zero otherwise).
fn write_byte(b: u8, offset: i32, mask: u8, x: i64, signed: bool) -> i64 {
    if offset >= 63 {
        return x;
    }
    // Positive values OR the one bits in, negative values clear the zero
    // bits out of the all-ones start value.
    if x >= 0 || !signed {
        x | (i64::from(b & mask) << offset)
    } else {
        x & !(i64::from(!b & mask) << offset)
    }
}

/// Initialized header byte with all data bits clear.
fn header(reserved_bits: u8, neg_sign: u8, num_bytes: usize, signed: bool) -> u8 {
    let mut b = neg_sign & HEADER_SIGN;
    if num_bytes == 1 {
        b |= !neg_sign & HEADER_SINGLE;
    } else if num_bytes == 2 {
        b |= (neg_sign & HEADER_SINGLE) | (!neg_sign & HEADER_DOUBLE);
    } else {
        let encoded_len =
            ((((num_bytes - LEN_BIAS) as u8) ^ !neg_sign) & ((1 << LEN_BITS) - 1)) << LEN_OFF;
        b |= (neg_sign & (HEADER_SINGLE | HEADER_DOUBLE)) | encoded_len;
    }

    if !signed {
        // The shift drops the unused sign flag, widening every class by one
        // data bit.
        b <<= 1;
    }

    b >> reserved_bits
}

/// Whether an (unmasked) header byte denotes NULL. A valid non-null header
/// always keeps at least one low bit set, whatever the reserved bit count,
/// so the comparison is exact.
pub(crate) fn is_null_header(header: u8) -> bool {
    header == NULL_HEADER
}

/// Decode the total encoded length from an (unmasked) header byte.
pub(crate) fn decode_len(header: u8, signed: bool, reserved_bits: u8) -> usize {
    if is_null_header(header) {
        return 1;
    }

    let mut b = header << reserved_bits;
    let neg_sign: u8 = if signed {
        if b & HEADER_SIGN != 0 {
            0xff
        } else {
            0x00
        }
    } else {
        0xff
    };
    if !signed {
        // Undo the +1 NULL bias and the one bit widening.
        b = b.wrapping_sub(1) >> 1;
    }

    if (b ^ neg_sign) & HEADER_SINGLE != 0 {
        1
    } else if (b ^ neg_sign) & HEADER_DOUBLE != 0 {
        2
    } else {
        let len = ((b ^ !neg_sign) >> LEN_OFF) & ((1 << LEN_BITS) - 1);
        usize::from(len) + LEN_BIAS
    }
}

/// Encode a non-null value, XOR'ing every produced byte with `mask`.
pub(crate) fn encode_raw<B: SafeBufMut>(
    buf: &mut B,
    x: i64,
    signed: bool,
    reserved_bits: u8,
    mask: u8,
) -> Result<()> {
    let neg_sign: u8 = if signed && x < 0 { 0x00 } else { 0xff };
    let num_bytes = encoded_len(x, signed, reserved_bits);
    let header_bits = header_data_bits(num_bytes, signed) - u32::from(reserved_bits);
    let mut num_bits = header_bits as i32 + 8 * (num_bytes as i32 - 1);

    let mut first = header(reserved_bits, neg_sign, num_bytes, signed);
    num_bits -= header_bits as i32;
    first |= read_byte(x, num_bits, ((1u16 << header_bits) - 1) as u8, signed);
    if !signed {
        first += 1;
    }
    buf.try_put_u8(first ^ mask).context(Exhausted)?;

    for _ in 1..num_bytes {
        num_bits -= 8;
        buf.try_put_u8(read_byte(x, num_bits, 0xff, signed) ^ mask)
            .context(Exhausted)?;
    }
    Ok(())
}

/// Decode one value, un-XOR'ing every consumed byte with `mask`. Returns
/// `None` for the NULL header. Reserved bits of the header are ignored, so
/// any embedder-set bits decode to the same integer.
pub(crate) fn decode_raw<B: Buf>(
    buf: &mut B,
    signed: bool,
    reserved_bits: u8,
    mask: u8,
) -> Result<Option<i64>> {
    let header_byte = SafeBuf::try_get_u8(buf).context(Truncated)? ^ mask;
    if is_null_header(header_byte) {
        return Ok(None);
    }

    let num_bytes = decode_len(header_byte, signed, reserved_bits);
    ensure!(
        num_bytes <= MAX_VARINT_BYTES,
        Corrupt {
            detail: format!("invalid varint length class, len:{num_bytes}"),
        }
    );
    let header_bits = header_data_bits(num_bytes, signed) - u32::from(reserved_bits);
    let mut num_bits = header_bits as i32 + 8 * (num_bytes as i32 - 1);

    let sign_mask = HEADER_SIGN >> reserved_bits;
    let negative = signed && header_byte & sign_mask == 0;
    let mut x: i64 = if negative { -1 } else { 0 };

    num_bits -= header_bits as i32;
    let first_data = header_byte.wrapping_sub(if signed { 0 } else { 1 });
    x = write_byte(
        first_data,
        num_bits,
        ((1u16 << header_bits) - 1) as u8,
        x,
        signed,
    );
    for _ in 1..num_bytes {
        let b = SafeBuf::try_get_u8(buf).context(Truncated)? ^ mask;
        num_bits -= 8;
        x = write_byte(b, num_bits, 0xff, x, signed);
    }
    Ok(Some(x))
}

fn skip_raw<B: Buf>(buf: &mut B, signed: bool, reserved_bits: u8, mask: u8) -> Result<usize> {
    // Only the header byte is inspected; the class bits alone give the
    // length.
    let header_byte = buf.try_peek_u8().context(Truncated)? ^ mask;
    let len = decode_len(header_byte, signed, reserved_bits);
    ensure!(
        len <= MAX_VARINT_BYTES,
        Corrupt {
            detail: format!("invalid varint length class, len:{len}"),
        }
    );
    buf.try_advance(len).context(Truncated)?;
    Ok(len)
}

fn check_reserved_bits(reserved_bits: u8, signed: bool) -> Result<()> {
    let max = if signed {
        MAX_SIGNED_RESERVED_BITS
    } else {
        MAX_UNSIGNED_RESERVED_BITS
    };
    ensure!(
        reserved_bits <= max,
        InvalidConfiguration {
            detail: format!("cannot reserve more than {max} header bits, given:{reserved_bits}"),
        }
    );
    Ok(())
}

macro_rules! impl_common {
    () => {
        /// Codec with no reserved header bits.
        pub fn new(order: Order) -> Self {
            Self {
                order,
                reserved_bits: 0,
            }
        }

        /// Header bits reserved for an embedder.
        pub fn reserved_bits(&self) -> u8 {
            self.reserved_bits
        }
    };
}

/// Codec for signed 64 bit integers.
#[derive(Debug, Clone)]
pub struct VarLongRowKey {
    order: Order,
    reserved_bits: u8,
}

impl VarLongRowKey {
    impl_common!();

    /// Codec reserving the `reserved_bits` most significant header bits for
    /// the caller.
    pub fn with_reserved_bits(order: Order, reserved_bits: u8) -> Result<Self> {
        check_reserved_bits(reserved_bits, true)?;
        Ok(Self {
            order,
            reserved_bits,
        })
    }
}

impl RowKey for VarLongRowKey {
    type Value = Option<i64>;

    fn order(&self) -> Order {
        self.order
    }

    fn set_order(&mut self, order: Order) {
        self.order = order;
    }

    fn serialized_length(&self, value: &Option<i64>) -> Result<usize> {
        Ok(match value {
            None => 1,
            Some(x) => encoded_len(*x, true, self.reserved_bits),
        })
    }

    fn serialize<B: SafeBufMut>(&self, buf: &mut B, value: &Option<i64>) -> Result<()> {
        match value {
            None => buf
                .try_put_u8(NULL_HEADER ^ self.order.mask())
                .context(Exhausted),
            Some(x) => encode_raw(buf, *x, true, self.reserved_bits, self.order.mask()),
        }
    }

    fn skip<B: Buf>(&self, buf: &mut B) -> Result<usize> {
        skip_raw(buf, true, self.reserved_bits, self.order.mask())
    }

    fn deserialize<B: Buf>(&self, buf: &mut B) -> Result<Option<i64>> {
        decode_raw(buf, true, self.reserved_bits, self.order.mask())
    }
}

/// Codec for unsigned 64 bit integers.
#[derive(Debug, Clone)]
pub struct UnsignedVarLongRowKey {
    order: Order,
    reserved_bits: u8,
}

impl UnsignedVarLongRowKey {
    impl_common!();

    /// Codec reserving the `reserved_bits` most significant header bits for
    /// the caller.
    pub fn with_reserved_bits(order: Order, reserved_bits: u8) -> Result<Self> {
        check_reserved_bits(reserved_bits, false)?;
        Ok(Self {
            order,
            reserved_bits,
        })
    }
}

impl RowKey for UnsignedVarLongRowKey {
    type Value = Option<u64>;

    fn order(&self) -> Order {
        self.order
    }

    fn set_order(&mut self, order: Order) {
        self.order = order;
    }

    fn serialized_length(&self, value: &Option<u64>) -> Result<usize> {
        Ok(match value {
            None => 1,
            Some(x) => encoded_len(*x as i64, false, self.reserved_bits),
        })
    }

    fn serialize<B: SafeBufMut>(&self, buf: &mut B, value: &Option<u64>) -> Result<()> {
        match value {
            None => buf
                .try_put_u8(NULL_HEADER ^ self.order.mask())
                .context(Exhausted),
            Some(x) => encode_raw(buf, *x as i64, false, self.reserved_bits, self.order.mask()),
        }
    }

    fn skip<B: Buf>(&self, buf: &mut B) -> Result<usize> {
        skip_raw(buf, false, self.reserved_bits, self.order.mask())
    }

    fn deserialize<B: Buf>(&self, buf: &mut B) -> Result<Option<u64>> {
        let x = decode_raw(buf, false, self.reserved_bits, self.order.mask())?;
        Ok(x.map(|x| x as u64))
    }
}

/// Codec for signed 32 bit integers, sharing the 64 bit wire format.
#[derive(Debug, Clone)]
pub struct VarIntRowKey {
    inner: VarLongRowKey,
}

impl VarIntRowKey {
    pub fn new(order: Order) -> Self {
        Self {
            inner: VarLongRowKey::new(order),
        }
    }

    /// Codec reserving the `reserved_bits` most significant header bits for
    /// the caller.
    pub fn with_reserved_bits(order: Order, reserved_bits: u8) -> Result<Self> {
        Ok(Self {
            inner: VarLongRowKey::with_reserved_bits(order, reserved_bits)?,
        })
    }
}

impl RowKey for VarIntRowKey {
    type Value = Option<i32>;

    fn order(&self) -> Order {
        self.inner.order()
    }

    fn set_order(&mut self, order: Order) {
        self.inner.set_order(order);
    }

    fn serialized_length(&self, value: &Option<i32>) -> Result<usize> {
        self.inner.serialized_length(&value.map(i64::from))
    }

    fn serialize<B: SafeBufMut>(&self, buf: &mut B, value: &Option<i32>) -> Result<()> {
        self.inner.serialize(buf, &value.map(i64::from))
    }

    fn skip<B: Buf>(&self, buf: &mut B) -> Result<usize> {
        self.inner.skip(buf)
    }

    fn deserialize<B: Buf>(&self, buf: &mut B) -> Result<Option<i32>> {
        match self.inner.deserialize(buf)? {
            None => Ok(None),
            Some(x) => {
                ensure!(
                    i32::try_from(x).is_ok(),
                    Corrupt {
                        detail: format!("value does not fit 32 bits, value:{x}"),
                    }
                );
                Ok(Some(x as i32))
            }
        }
    }
}

/// Codec for unsigned 32 bit integers, sharing the 64 bit wire format.
#[derive(Debug, Clone)]
pub struct UnsignedVarIntRowKey {
    inner: UnsignedVarLongRowKey,
}

impl UnsignedVarIntRowKey {
    pub fn new(order: Order) -> Self {
        Self {
            inner: UnsignedVarLongRowKey::new(order),
        }
    }

    /// Codec reserving the `reserved_bits` most significant header bits for
    /// the caller.
    pub fn with_reserved_bits(order: Order, reserved_bits: u8) -> Result<Self> {
        Ok(Self {
            inner: UnsignedVarLongRowKey::with_reserved_bits(order, reserved_bits)?,
        })
    }
}

impl RowKey for UnsignedVarIntRowKey {
    type Value = Option<u32>;

    fn order(&self) -> Order {
        self.inner.order()
    }

    fn set_order(&mut self, order: Order) {
        self.inner.set_order(order);
    }

    fn serialized_length(&self, value: &Option<u32>) -> Result<usize> {
        self.inner.serialized_length(&value.map(u64::from))
    }

    fn serialize<B: SafeBufMut>(&self, buf: &mut B, value: &Option<u32>) -> Result<()> {
        self.inner.serialize(buf, &value.map(u64::from))
    }

    fn skip<B: Buf>(&self, buf: &mut B) -> Result<usize> {
        self.inner.skip(buf)
    }

    fn deserialize<B: Buf>(&self, buf: &mut B) -> Result<Option<u32>> {
        match self.inner.deserialize(buf)? {
            None => Ok(None),
            Some(x) => {
                ensure!(
                    u32::try_from(x).is_ok(),
                    Corrupt {
                        detail: format!("value does not fit 32 bits, value:{x}"),
                    }
                );
                Ok(Some(x as u32))
            }
        }
    }
}
