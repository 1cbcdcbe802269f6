// Copyright 2024 RowKey Project Authors. Licensed under Apache-2.0.

//! Arbitrary precision decimal codec.
//!
//! A decimal is canonicalized by stripping trailing base-10 zeros, then
//! split into the sign, the decimal digits of the absolute unscaled value
//! and the adjusted exponent `exponent = digits + scale - 1`. Two values of
//! equal sign compare like their (exponent, digits) pairs, so the encoding
//! is the adjusted exponent as a signed varint followed by the digit string
//! as packed BCD, with digits 0-9 stored as nibbles 1-10 and a zero nibble
//! terminating the significand. The null nibble keeps digit strings
//! prefix-safe and costs an extra byte only for even digit counts.
//!
//! Sign and direction handling is folded into one "extended order" byte,
//! the XOR of the order mask and the significand sign byte. The exponent
//! value and every BCD byte are XOR'd with it, inverting the comparison
//! exactly when the value is negative or the key descending. Comparisons
//! across signs are decided by two header bits stored in the exponent
//! varint's two reserved bits: bit 7 holds the negated extended order, bit
//! 6 the is-zero flag XOR'd with it. Zero has no exponent and serializes as
//! the single header byte; NULL uses the varint NULL byte.

use bigdecimal::{
    num_bigint::{BigInt, Sign},
    BigDecimal, Zero,
};
use bytes_ext::{Buf, SafeBuf, SafeBufMut};
use snafu::{ensure, ResultExt};

use crate::{
    consts::{DECIMAL_RESERVED_BITS, MAX_VARINT_BYTES, NULL_HEADER},
    varint, Corrupt, Exhausted, Order, OutOfRange, Result, RowKey, Truncated,
};

/// Negated extended order bit
const HEADER_NEG_ORDER: u8 = 0x80;
/// Zero significand bit
const HEADER_SIGNIFICAND_ZERO: u8 = 0x40;

enum Canonical {
    Zero,
    NonZero {
        negative: bool,
        digits: String,
        exponent: i64,
    },
}

enum HeaderKind {
    Null,
    Zero,
    NonZero { omega: u8 },
}

fn canonicalize(value: &BigDecimal) -> Result<Canonical> {
    let normalized = value.normalized();
    let (unscaled, scale) = normalized.as_bigint_and_exponent();
    if unscaled.is_zero() {
        return Ok(Canonical::Zero);
    }

    let digits = unscaled.magnitude().to_str_radix(10);
    // adjusted exponent = precision + (-scale) - 1
    let exponent = match (digits.len() as i64)
        .checked_sub(scale)
        .and_then(|e| e.checked_sub(1))
    {
        Some(e) => e,
        None => {
            return OutOfRange {
                detail: format!("adjusted exponent overflows, scale:{scale}"),
            }
            .fail()
        }
    };

    Ok(Canonical::NonZero {
        negative: unscaled.sign() == Sign::Minus,
        digits,
        exponent,
    })
}

fn bcd_len(digit_count: usize) -> usize {
    (digit_count + 2) >> 1
}

/// Codec for arbitrary precision decimals.
#[derive(Debug, Clone)]
pub struct DecimalRowKey {
    order: Order,
}

impl DecimalRowKey {
    pub fn new(order: Order) -> Self {
        Self { order }
    }

    /// Extended order byte of a non-null value: order mask XOR significand
    /// sign byte.
    fn omega(&self, negative: bool) -> u8 {
        self.order.mask() ^ if negative { 0xff } else { 0x00 }
    }

    fn classify(&self, header: u8) -> HeaderKind {
        let null_header = NULL_HEADER ^ self.order.mask();
        if header == null_header {
            return HeaderKind::Null;
        }

        let omega: u8 = if header & HEADER_NEG_ORDER != 0 {
            0x00
        } else {
            0xff
        };
        if (header ^ !omega) & HEADER_SIGNIFICAND_ZERO != 0 {
            HeaderKind::Zero
        } else {
            HeaderKind::NonZero { omega }
        }
    }

    fn put_bcd<B: SafeBufMut>(buf: &mut B, digits: &str, omega: u8) -> Result<()> {
        let digits = digits.as_bytes();
        let mut pos = 0;
        for _ in 0..bcd_len(digits.len()) {
            let mut bcd: u8 = 0;
            if pos < digits.len() {
                bcd = (digits[pos] - b'0' + 1) << 4;
            }
            pos += 1;
            if pos < digits.len() {
                bcd |= digits[pos] - b'0' + 1;
            }
            pos += 1;
            buf.try_put_u8(bcd ^ omega).context(Exhausted)?;
        }
        Ok(())
    }

    /// Length of the encoding of an optional decimal.
    pub fn encoded_len(&self, value: Option<&BigDecimal>) -> Result<usize> {
        let Some(value) = value else {
            return Ok(1);
        };
        match canonicalize(value)? {
            Canonical::Zero => Ok(1),
            Canonical::NonZero {
                negative,
                digits,
                exponent,
            } => {
                let omega_ext = if self.omega(negative) == 0xff { -1 } else { 0 };
                let exp_len =
                    varint::encoded_len(exponent ^ omega_ext, true, DECIMAL_RESERVED_BITS);
                Ok(exp_len + bcd_len(digits.len()))
            }
        }
    }

    /// Encode an optional decimal.
    pub fn encode<B: SafeBufMut>(&self, buf: &mut B, value: Option<&BigDecimal>) -> Result<()> {
        let Some(value) = value else {
            // The varint NULL pattern, masked through all eight bits.
            return buf
                .try_put_u8(NULL_HEADER ^ self.order.mask())
                .context(Exhausted);
        };

        let (negative, digits, exponent) = match canonicalize(value)? {
            Canonical::Zero => {
                let omega = self.omega(false);
                let header = (!omega & HEADER_NEG_ORDER) | (omega & HEADER_SIGNIFICAND_ZERO);
                return buf.try_put_u8(header).context(Exhausted);
            }
            Canonical::NonZero {
                negative,
                digits,
                exponent,
            } => (negative, digits, exponent),
        };

        let omega = self.omega(negative);
        let header = (!omega & HEADER_NEG_ORDER) | (!omega & HEADER_SIGNIFICAND_ZERO);
        let omega_ext: i64 = if omega == 0xff { -1 } else { 0 };

        // The exponent varint leaves its top two bits to us; encode it to a
        // scratch buffer and fold the header bits into the first byte.
        let exp_x = exponent ^ omega_ext;
        let exp_len = varint::encoded_len(exp_x, true, DECIMAL_RESERVED_BITS);
        let mut scratch = [0u8; MAX_VARINT_BYTES];
        {
            let mut writer = &mut scratch[..];
            varint::encode_raw(&mut writer, exp_x, true, DECIMAL_RESERVED_BITS, 0x00)?;
        }
        scratch[0] |= header;
        buf.try_put(&scratch[..exp_len]).context(Exhausted)?;

        Self::put_bcd(buf, &digits, omega)
    }

    fn get_bcd<B: Buf>(buf: &mut B, omega: u8) -> Result<String> {
        let mut digits = String::new();
        'bytes: loop {
            let byte = SafeBuf::try_get_u8(buf).context(Truncated)? ^ omega;
            for nibble in [byte >> 4, byte & 0x0f] {
                if nibble == 0 {
                    break 'bytes;
                }
                ensure!(
                    nibble <= 10,
                    Corrupt {
                        detail: format!("invalid BCD nibble:{nibble:#x}"),
                    }
                );
                digits.push(char::from(b'0' + nibble - 1));
            }
        }

        ensure!(
            !digits.is_empty(),
            Corrupt {
                detail: "empty significand",
            }
        );
        Ok(digits)
    }
}

impl RowKey for DecimalRowKey {
    type Value = Option<BigDecimal>;

    fn order(&self) -> Order {
        self.order
    }

    fn set_order(&mut self, order: Order) {
        self.order = order;
    }

    fn serialized_length(&self, value: &Option<BigDecimal>) -> Result<usize> {
        self.encoded_len(value.as_ref())
    }

    fn serialize<B: SafeBufMut>(&self, buf: &mut B, value: &Option<BigDecimal>) -> Result<()> {
        self.encode(buf, value.as_ref())
    }

    fn skip<B: Buf>(&self, buf: &mut B) -> Result<usize> {
        let header = buf.try_peek_u8().context(Truncated)?;
        let omega = match self.classify(header) {
            HeaderKind::Null | HeaderKind::Zero => {
                buf.try_advance(1).context(Truncated)?;
                return Ok(1);
            }
            HeaderKind::NonZero { omega } => omega,
        };

        let exp_len = varint::decode_len(header, true, DECIMAL_RESERVED_BITS);
        buf.try_advance(exp_len).context(Truncated)?;

        let mut len = exp_len;
        loop {
            let byte = SafeBuf::try_get_u8(buf).context(Truncated)? ^ omega;
            len += 1;
            // The terminator nibble always sits in the last significand byte.
            if byte >> 4 == 0 || byte & 0x0f == 0 {
                return Ok(len);
            }
        }
    }

    fn deserialize<B: Buf>(&self, buf: &mut B) -> Result<Option<BigDecimal>> {
        let header = buf.try_peek_u8().context(Truncated)?;
        let omega = match self.classify(header) {
            HeaderKind::Null => {
                buf.try_advance(1).context(Truncated)?;
                return Ok(None);
            }
            HeaderKind::Zero => {
                buf.try_advance(1).context(Truncated)?;
                return Ok(Some(BigDecimal::zero()));
            }
            HeaderKind::NonZero { omega } => omega,
        };
        let omega_ext: i64 = if omega == 0xff { -1 } else { 0 };

        let exponent = match varint::decode_raw(buf, true, DECIMAL_RESERVED_BITS, 0x00)? {
            Some(x) => x ^ omega_ext,
            None => {
                return Corrupt {
                    detail: "null exponent in non-null decimal",
                }
                .fail()
            }
        };

        let digits = Self::get_bcd(buf, omega)?;
        // scale = precision - 1 - adjusted exponent
        let scale = match (digits.len() as i64)
            .checked_sub(1)
            .and_then(|s| s.checked_sub(exponent))
        {
            Some(s) => s,
            None => {
                return Corrupt {
                    detail: format!("exponent overflows, exponent:{exponent}"),
                }
                .fail()
            }
        };

        let magnitude = match BigInt::parse_bytes(digits.as_bytes(), 10) {
            Some(m) => m,
            None => {
                return Corrupt {
                    detail: "unparseable significand",
                }
                .fail()
            }
        };
        let negative = omega != self.order.mask();
        let unscaled = if negative { -magnitude } else { magnitude };

        Ok(Some(BigDecimal::new(unscaled, scale)))
    }
}
