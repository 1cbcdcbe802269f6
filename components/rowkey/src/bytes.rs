// Copyright 2024 RowKey Project Authors. Licensed under Apache-2.0.

//! Null terminated byte sequence codec.
//!
//! Variable length byte sequences must stay comparable even when one
//! encoding is a prefix of another inside a larger key, so every sequence is
//! closed with a terminator byte that compares below any body byte
//! (ascending) or above it (descending). To keep the terminator out of the
//! body, every input byte is shifted by one in the sort direction and the
//! two values that cannot be shifted are escaped behind a continuator byte:
//!
//! ```text
//! ascending:  b in 0x00..=0xfd -> b + 1        terminator 0x00
//!             b in 0xfe..=0xff -> 0xff, b + 3  continuator 0xff
//! ```
//!
//! Descending complements the input byte first and applies the dual table
//! (terminator 0xff, continuator 0x00, bias 1). The encoded length is the
//! input length plus one per escaped byte plus the terminator. A proper
//! prefix always sorts before its extensions ascending, and after them
//! descending.
//!
//! This codec has no whole-value NULL: nothing can sort below the encoding
//! of the empty sequence.

use bytes_ext::{Buf, ByteVec, SafeBuf, SafeBufMut};
use snafu::ResultExt;

use crate::{Exhausted, Order, Result, RowKey, Truncated};

const ASCENDING_TERMINATOR: u8 = 0x00;
const ASCENDING_CONTINUATOR: u8 = 0xff;
const ASCENDING_BIAS: u8 = 0x03;
const DESCENDING_TERMINATOR: u8 = 0xff;
const DESCENDING_CONTINUATOR: u8 = 0x00;
const DESCENDING_BIAS: u8 = 0x01;

/// Codec for raw byte sequences.
#[derive(Debug, Clone)]
pub struct BytesRowKey {
    order: Order,
}

impl BytesRowKey {
    pub fn new(order: Order) -> Self {
        Self { order }
    }

    fn terminator(&self) -> u8 {
        match self.order {
            Order::Ascending => ASCENDING_TERMINATOR,
            Order::Descending => DESCENDING_TERMINATOR,
        }
    }

    fn continuator(&self) -> u8 {
        match self.order {
            Order::Ascending => ASCENDING_CONTINUATOR,
            Order::Descending => DESCENDING_CONTINUATOR,
        }
    }

    fn bias(&self) -> u8 {
        match self.order {
            Order::Ascending => ASCENDING_BIAS,
            Order::Descending => DESCENDING_BIAS,
        }
    }

    /// +1 ascending, -1 descending.
    fn direction(&self) -> u8 {
        match self.order {
            Order::Ascending => 1,
            Order::Descending => 0xff,
        }
    }

    /// Both orders escape the same two input values, 0xfe and 0xff.
    fn is_escaped(raw: u8) -> bool {
        raw >= 0xfe
    }
}

impl RowKey for BytesRowKey {
    type Value = ByteVec;

    fn order(&self) -> Order {
        self.order
    }

    fn set_order(&mut self, order: Order) {
        self.order = order;
    }

    fn serialized_length(&self, value: &ByteVec) -> Result<usize> {
        let escaped = value.iter().filter(|b| Self::is_escaped(**b)).count();
        Ok(value.len() + escaped + 1)
    }

    fn serialize<B: SafeBufMut>(&self, buf: &mut B, value: &ByteVec) -> Result<()> {
        let mask = self.order.mask();
        for &raw in value {
            let b = raw ^ mask;
            if Self::is_escaped(raw) {
                buf.try_put_u8(self.continuator()).context(Exhausted)?;
                buf.try_put_u8(b.wrapping_add(self.bias()))
                    .context(Exhausted)?;
            } else {
                buf.try_put_u8(b.wrapping_add(self.direction()))
                    .context(Exhausted)?;
            }
        }
        buf.try_put_u8(self.terminator()).context(Exhausted)
    }

    fn skip<B: Buf>(&self, buf: &mut B) -> Result<usize> {
        // Escape bytes and body bytes can never equal the terminator, so a
        // plain scan is enough.
        let terminator = self.terminator();
        let mut len = 0;
        loop {
            let b = SafeBuf::try_get_u8(buf).context(Truncated)?;
            len += 1;
            if b == terminator {
                return Ok(len);
            }
        }
    }

    fn deserialize<B: Buf>(&self, buf: &mut B) -> Result<ByteVec> {
        let mask = self.order.mask();
        let terminator = self.terminator();
        let continuator = self.continuator();
        let mut out = ByteVec::new();
        loop {
            let b = SafeBuf::try_get_u8(buf).context(Truncated)?;
            if b == terminator {
                return Ok(out);
            }
            if b == continuator {
                let escaped = SafeBuf::try_get_u8(buf).context(Truncated)?;
                out.push(escaped.wrapping_sub(self.bias()) ^ mask);
            } else {
                out.push(b.wrapping_sub(self.direction()) ^ mask);
            }
        }
    }
}
