// Copyright 2024 RowKey Project Authors. Licensed under Apache-2.0.

//! UTF-8 row key codec.
//!
//! Sorting the raw bytes of UTF-8 text is equivalent to sorting the decoded
//! strings by code point, so the codec only has to make room for a NULL
//! marker and a terminator below every valid body byte: each input byte is
//! shifted up by two, NULL is the single byte 0x00 and the terminator is
//! 0x01. Descending order complements every output byte, including the NULL
//! and terminator bytes.
//!
//! When an ascending instance is the last field of a composite key the
//! terminator may be omitted and the end of the buffer stands in for it. In
//! that mode NULL is a zero length encoding and the empty string is a single
//! terminator byte, which keeps NULL < "" < "a". Descending keys cannot omit
//! the terminator: without it "aa" would sort before "a".

use bytes_ext::{Buf, ByteVec, SafeBuf, SafeBufMut};
use snafu::{ensure, ResultExt};

use crate::{Corrupt, Exhausted, InvalidConfiguration, Order, Result, RowKey, Truncated};

const NULL: u8 = 0x00;
const TERMINATOR: u8 = 0x01;
/// Every body byte is shifted above the NULL and terminator values.
const BYTE_SHIFT: u8 = 2;

/// Codec for UTF-8 strings.
#[derive(Debug, Clone)]
pub struct Utf8RowKey {
    order: Order,
    must_terminate: bool,
}

impl Utf8RowKey {
    pub fn new(order: Order) -> Self {
        Self {
            order,
            must_terminate: true,
        }
    }

    /// Whether encodings carry an explicit terminator byte. Descending
    /// instances always terminate, whatever was configured.
    pub fn must_terminate(&self) -> bool {
        self.must_terminate || self.order == Order::Descending
    }

    /// Allow or require the explicit terminator. Termination can only be
    /// omitted for ascending instances decoding up to the end of the buffer,
    /// which is sound only for the last field of a key.
    pub fn set_must_terminate(&mut self, must_terminate: bool) -> Result<()> {
        ensure!(
            must_terminate || self.order == Order::Ascending,
            InvalidConfiguration {
                detail: "implicit termination requires ascending order",
            }
        );
        self.must_terminate = must_terminate;
        Ok(())
    }

    fn is_null<B: Buf>(&self, buf: &B) -> Result<bool> {
        if !self.must_terminate() {
            return Ok(buf.remaining() == 0);
        }
        Ok(buf.try_peek_u8().context(Truncated)? ^ self.order.mask() == NULL)
    }

    /// Length of the encoding of an optional string slice.
    pub fn encoded_len(&self, value: Option<&str>) -> usize {
        let terminator_len = usize::from(self.must_terminate());
        match value {
            None => terminator_len,
            // The empty string keeps its terminator even in implicit mode, to
            // stay distinguishable from NULL.
            Some(s) => (s.len() + terminator_len).max(1),
        }
    }

    /// Encode an optional string slice.
    pub fn encode<B: SafeBufMut>(&self, buf: &mut B, value: Option<&str>) -> Result<()> {
        let mask = self.order.mask();
        let Some(s) = value else {
            if self.must_terminate() {
                buf.try_put_u8(NULL ^ mask).context(Exhausted)?;
            }
            return Ok(());
        };

        for &b in s.as_bytes() {
            buf.try_put_u8((b + BYTE_SHIFT) ^ mask).context(Exhausted)?;
        }
        if self.must_terminate() || s.is_empty() {
            buf.try_put_u8(TERMINATOR ^ mask).context(Exhausted)?;
        }
        Ok(())
    }
}

impl RowKey for Utf8RowKey {
    type Value = Option<String>;

    fn order(&self) -> Order {
        self.order
    }

    fn set_order(&mut self, order: Order) {
        self.order = order;
    }

    fn serialized_length(&self, value: &Option<String>) -> Result<usize> {
        Ok(self.encoded_len(value.as_deref()))
    }

    fn serialize<B: SafeBufMut>(&self, buf: &mut B, value: &Option<String>) -> Result<()> {
        self.encode(buf, value.as_deref())
    }

    fn skip<B: Buf>(&self, buf: &mut B) -> Result<usize> {
        if !self.must_terminate() {
            let len = buf.remaining();
            buf.try_advance(len).context(Truncated)?;
            return Ok(len);
        }

        let mask = self.order.mask();
        let first = SafeBuf::try_get_u8(buf).context(Truncated)? ^ mask;
        if first == NULL || first == TERMINATOR {
            return Ok(1);
        }
        let mut len = 1;
        loop {
            let b = SafeBuf::try_get_u8(buf).context(Truncated)? ^ mask;
            len += 1;
            if b == TERMINATOR {
                return Ok(len);
            }
        }
    }

    fn deserialize<B: Buf>(&self, buf: &mut B) -> Result<Option<String>> {
        let mask = self.order.mask();
        if self.is_null(buf)? {
            if self.must_terminate() {
                buf.try_advance(1).context(Truncated)?;
            }
            return Ok(None);
        }

        let mut out = ByteVec::new();
        loop {
            if !self.must_terminate() && buf.remaining() == 0 {
                break;
            }
            let b = SafeBuf::try_get_u8(buf).context(Truncated)? ^ mask;
            if b == TERMINATOR {
                break;
            }
            ensure!(
                b >= BYTE_SHIFT,
                Corrupt {
                    detail: format!("invalid string body byte:{b:#x}"),
                }
            );
            out.push(b - BYTE_SHIFT);
        }

        match String::from_utf8(out) {
            Ok(s) => Ok(Some(s)),
            Err(e) => Corrupt {
                detail: format!("decoded bytes are not utf8, err:{e}"),
            }
            .fail(),
        }
    }
}
