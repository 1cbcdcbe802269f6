// Copyright 2024 RowKey Project Authors. Licensed under Apache-2.0.

//! Order preserving row key codecs.
//!
//! Every codec in this crate maps a logical value to a byte sequence such
//! that comparing two encodings with plain unsigned `memcmp` yields the same
//! result as comparing the values themselves, optionally inverted for
//! descending order. Sorting the raw encoded keys in a byte ordered
//! key-value store therefore sorts the rows by value, without decoding.
//!
//! ```
//! use rowkey::{varint::VarLongRowKey, Order, RowKey};
//!
//! let codec = VarLongRowKey::new(Order::Ascending);
//! let k1 = codec.serialize_to_vec(&Some(-3)).unwrap();
//! let k2 = codec.serialize_to_vec(&Some(40)).unwrap();
//! assert!(k1 < k2);
//! assert_eq!(Some(-3), codec.deserialize_from_slice(&k1).unwrap());
//! ```
//!
//! Codecs supporting NULL model the value as an `Option` and encode NULL so
//! that it sorts below every non-null value in ascending order (above, in
//! descending order). Composite keys are built with
//! [`row::StructRowKey`], which concatenates field encodings in declaration
//! order.

pub mod bytes;
mod consts;
pub mod datum;
pub mod decimal;
pub mod float;
pub mod number;
mod order;
pub mod row;
pub mod text;
pub mod varint;

use bytes_ext::{Buf, ByteVec, SafeBufMut};
use macros::define_result;
use snafu::{Backtrace, Snafu};

use crate::datum::DatumKind;
pub use crate::order::Order;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Insufficient bytes to finish decoding, err:{}", source))]
    Truncated { source: bytes_ext::Error },

    #[snafu(display("Insufficient buffer space to finish encoding, err:{}", source))]
    Exhausted { source: bytes_ext::Error },

    #[snafu(display("Bytes violate the encoding, {}.\nBacktrace:\n{}", detail, backtrace))]
    Corrupt { detail: String, backtrace: Backtrace },

    #[snafu(display(
        "Invalid codec configuration, {}.\nBacktrace:\n{}",
        detail,
        backtrace
    ))]
    InvalidConfiguration { detail: String, backtrace: Backtrace },

    #[snafu(display(
        "Expect {} values to compose, got {}.\nBacktrace:\n{}",
        expect,
        actual,
        backtrace
    ))]
    ArityMismatch {
        expect: usize,
        actual: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Value outside the codec domain, {}.\nBacktrace:\n{}", detail, backtrace))]
    OutOfRange { detail: String, backtrace: Backtrace },

    #[snafu(display(
        "Field codec expects {} datum, got {}.\nBacktrace:\n{}",
        expect,
        actual,
        backtrace
    ))]
    MismatchedDatum {
        expect: DatumKind,
        actual: DatumKind,
        backtrace: Backtrace,
    },
}

define_result!(Error);

/// A sort order preserving codec over one logical value type.
///
/// Encodings of two values compare byte-wise (unsigned, lexicographic) the
/// same way the values compare, inverted when the codec order is descending.
/// Implementations are immutable after configuration and freely shareable
/// across threads; the cursors they read from and write to are exclusively
/// borrowed for the duration of one call.
pub trait RowKey {
    /// The logical value this codec serializes. Codecs supporting NULL use an
    /// `Option`.
    type Value;

    /// Current sort order of this codec.
    fn order(&self) -> Order;

    /// Change the sort order of this codec.
    fn set_order(&mut self, order: Order);

    /// Exact number of bytes [`serialize`](RowKey::serialize) will write for
    /// `value`.
    fn serialized_length(&self, value: &Self::Value) -> Result<usize>;

    /// Encode `value` into `buf`, advancing it by exactly
    /// [`serialized_length`](RowKey::serialized_length) bytes.
    fn serialize<B: SafeBufMut>(&self, buf: &mut B, value: &Self::Value) -> Result<()>;

    /// Advance `buf` past one encoded value without materializing it,
    /// returning the number of bytes skipped.
    fn skip<B: Buf>(&self, buf: &mut B) -> Result<usize>;

    /// Decode one value from `buf`, advancing it past the encoding.
    ///
    /// On error the cursor is not advanced past the last successfully read
    /// byte.
    fn deserialize<B: Buf>(&self, buf: &mut B) -> Result<Self::Value>;

    /// Encode `value` into a freshly allocated buffer of exactly the right
    /// size.
    fn serialize_to_vec(&self, value: &Self::Value) -> Result<ByteVec> {
        let mut buf = ByteVec::with_capacity(self.serialized_length(value)?);
        self.serialize(&mut buf, value)?;
        Ok(buf)
    }

    /// Decode one value from the front of `buf`.
    fn deserialize_from_slice(&self, mut buf: &[u8]) -> Result<Self::Value> {
        self.deserialize(&mut buf)
    }
}
