// Copyright 2024 RowKey Project Authors. Licensed under Apache-2.0.

//! Composite row keys.
//!
//! A struct row key is a fixed list of field codecs serialized in
//! declaration order with no separators; the concatenated encodings sort
//! like the tuples themselves because every field encoding is prefix safe.
//! Descending order is pushed into the fields by flipping each field's own
//! order, so a composite never inserts wrapper bytes of its own.

use bytes_ext::{Buf, SafeBufMut};
use snafu::ensure;

use crate::{
    bytes::BytesRowKey,
    datum::{Datum, DatumKind},
    decimal::DecimalRowKey,
    float::{DoubleRowKey, FloatRowKey},
    number::{
        FixedInt16RowKey, FixedInt32RowKey, FixedInt64RowKey, FixedInt8RowKey, FixedUInt16RowKey,
        FixedUInt32RowKey, FixedUInt64RowKey, FixedUInt8RowKey,
    },
    text::Utf8RowKey,
    varint::{UnsignedVarIntRowKey, UnsignedVarLongRowKey, VarIntRowKey, VarLongRowKey},
    ArityMismatch, InvalidConfiguration, MismatchedDatum, Order, OutOfRange, Result, RowKey,
};

/// One field codec of a [`StructRowKey`].
#[derive(Debug, Clone)]
pub enum FieldRowKey {
    VarInt(VarIntRowKey),
    VarLong(VarLongRowKey),
    UnsignedVarInt(UnsignedVarIntRowKey),
    UnsignedVarLong(UnsignedVarLongRowKey),
    FixedInt8(FixedInt8RowKey),
    FixedInt16(FixedInt16RowKey),
    FixedInt32(FixedInt32RowKey),
    FixedInt64(FixedInt64RowKey),
    FixedUInt8(FixedUInt8RowKey),
    FixedUInt16(FixedUInt16RowKey),
    FixedUInt32(FixedUInt32RowKey),
    FixedUInt64(FixedUInt64RowKey),
    Float(FloatRowKey),
    Double(DoubleRowKey),
    Decimal(DecimalRowKey),
    Bytes(BytesRowKey),
    Utf8(Utf8RowKey),
    Struct(StructRowKey),
}

macro_rules! for_each_field {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            FieldRowKey::VarInt($c) => $body,
            FieldRowKey::VarLong($c) => $body,
            FieldRowKey::UnsignedVarInt($c) => $body,
            FieldRowKey::UnsignedVarLong($c) => $body,
            FieldRowKey::FixedInt8($c) => $body,
            FieldRowKey::FixedInt16($c) => $body,
            FieldRowKey::FixedInt32($c) => $body,
            FieldRowKey::FixedInt64($c) => $body,
            FieldRowKey::FixedUInt8($c) => $body,
            FieldRowKey::FixedUInt16($c) => $body,
            FieldRowKey::FixedUInt32($c) => $body,
            FieldRowKey::FixedUInt64($c) => $body,
            FieldRowKey::Float($c) => $body,
            FieldRowKey::Double($c) => $body,
            FieldRowKey::Decimal($c) => $body,
            FieldRowKey::Bytes($c) => $body,
            FieldRowKey::Utf8($c) => $body,
            FieldRowKey::Struct($c) => $body,
        }
    };
}

impl FieldRowKey {
    /// Datum kind this field serializes, besides `Null` where supported.
    pub fn expected_kind(&self) -> DatumKind {
        match self {
            FieldRowKey::VarInt(_) | FieldRowKey::FixedInt32(_) => DatumKind::Int32,
            FieldRowKey::VarLong(_) | FieldRowKey::FixedInt64(_) => DatumKind::Int64,
            FieldRowKey::UnsignedVarInt(_) | FieldRowKey::FixedUInt32(_) => DatumKind::UInt32,
            FieldRowKey::UnsignedVarLong(_) | FieldRowKey::FixedUInt64(_) => DatumKind::UInt64,
            FieldRowKey::FixedInt8(_) => DatumKind::Int8,
            FieldRowKey::FixedInt16(_) => DatumKind::Int16,
            FieldRowKey::FixedUInt8(_) => DatumKind::UInt8,
            FieldRowKey::FixedUInt16(_) => DatumKind::UInt16,
            FieldRowKey::Float(_) => DatumKind::Float,
            FieldRowKey::Double(_) => DatumKind::Double,
            FieldRowKey::Decimal(_) => DatumKind::Decimal,
            FieldRowKey::Bytes(_) => DatumKind::Varbinary,
            FieldRowKey::Utf8(_) => DatumKind::String,
            FieldRowKey::Struct(_) => DatumKind::Struct,
        }
    }

    fn is_fixed_width(&self) -> bool {
        matches!(
            self,
            FieldRowKey::FixedInt8(_)
                | FieldRowKey::FixedInt16(_)
                | FieldRowKey::FixedInt32(_)
                | FieldRowKey::FixedInt64(_)
                | FieldRowKey::FixedUInt8(_)
                | FieldRowKey::FixedUInt16(_)
                | FieldRowKey::FixedUInt32(_)
                | FieldRowKey::FixedUInt64(_)
        )
    }

    fn bad_datum<T>(&self, datum: &Datum) -> Result<T> {
        if self.is_fixed_width() && matches!(datum, Datum::Null) {
            OutOfRange {
                detail: format!(
                    "fixed width codec cannot encode NULL, kind:{}",
                    self.expected_kind()
                ),
            }
            .fail()
        } else {
            MismatchedDatum {
                expect: self.expected_kind(),
                actual: datum.kind(),
            }
            .fail()
        }
    }
}

impl RowKey for FieldRowKey {
    type Value = Datum;

    fn order(&self) -> Order {
        for_each_field!(self, c => c.order())
    }

    fn set_order(&mut self, order: Order) {
        for_each_field!(self, c => c.set_order(order))
    }

    fn serialized_length(&self, value: &Datum) -> Result<usize> {
        match (self, value) {
            (Self::VarInt(c), Datum::Int32(v)) => c.serialized_length(&Some(*v)),
            (Self::VarInt(c), Datum::Null) => c.serialized_length(&None),
            (Self::VarLong(c), Datum::Int64(v)) => c.serialized_length(&Some(*v)),
            (Self::VarLong(c), Datum::Null) => c.serialized_length(&None),
            (Self::UnsignedVarInt(c), Datum::UInt32(v)) => c.serialized_length(&Some(*v)),
            (Self::UnsignedVarInt(c), Datum::Null) => c.serialized_length(&None),
            (Self::UnsignedVarLong(c), Datum::UInt64(v)) => c.serialized_length(&Some(*v)),
            (Self::UnsignedVarLong(c), Datum::Null) => c.serialized_length(&None),
            (Self::FixedInt8(c), Datum::Int8(v)) => c.serialized_length(v),
            (Self::FixedInt16(c), Datum::Int16(v)) => c.serialized_length(v),
            (Self::FixedInt32(c), Datum::Int32(v)) => c.serialized_length(v),
            (Self::FixedInt64(c), Datum::Int64(v)) => c.serialized_length(v),
            (Self::FixedUInt8(c), Datum::UInt8(v)) => c.serialized_length(v),
            (Self::FixedUInt16(c), Datum::UInt16(v)) => c.serialized_length(v),
            (Self::FixedUInt32(c), Datum::UInt32(v)) => c.serialized_length(v),
            (Self::FixedUInt64(c), Datum::UInt64(v)) => c.serialized_length(v),
            (Self::Float(c), Datum::Float(v)) => c.serialized_length(&Some(*v)),
            (Self::Float(c), Datum::Null) => c.serialized_length(&None),
            (Self::Double(c), Datum::Double(v)) => c.serialized_length(&Some(*v)),
            (Self::Double(c), Datum::Null) => c.serialized_length(&None),
            (Self::Decimal(c), Datum::Decimal(v)) => c.encoded_len(Some(v)),
            (Self::Decimal(c), Datum::Null) => c.encoded_len(None),
            (Self::Bytes(c), Datum::Varbinary(v)) => c.serialized_length(v),
            (Self::Utf8(c), Datum::String(v)) => Ok(c.encoded_len(Some(v))),
            (Self::Utf8(c), Datum::Null) => Ok(c.encoded_len(None)),
            (Self::Struct(c), Datum::Struct(v)) => c.serialized_length(v),
            (field, datum) => field.bad_datum(datum),
        }
    }

    fn serialize<B: SafeBufMut>(&self, buf: &mut B, value: &Datum) -> Result<()> {
        match (self, value) {
            (Self::VarInt(c), Datum::Int32(v)) => c.serialize(buf, &Some(*v)),
            (Self::VarInt(c), Datum::Null) => c.serialize(buf, &None),
            (Self::VarLong(c), Datum::Int64(v)) => c.serialize(buf, &Some(*v)),
            (Self::VarLong(c), Datum::Null) => c.serialize(buf, &None),
            (Self::UnsignedVarInt(c), Datum::UInt32(v)) => c.serialize(buf, &Some(*v)),
            (Self::UnsignedVarInt(c), Datum::Null) => c.serialize(buf, &None),
            (Self::UnsignedVarLong(c), Datum::UInt64(v)) => c.serialize(buf, &Some(*v)),
            (Self::UnsignedVarLong(c), Datum::Null) => c.serialize(buf, &None),
            (Self::FixedInt8(c), Datum::Int8(v)) => c.serialize(buf, v),
            (Self::FixedInt16(c), Datum::Int16(v)) => c.serialize(buf, v),
            (Self::FixedInt32(c), Datum::Int32(v)) => c.serialize(buf, v),
            (Self::FixedInt64(c), Datum::Int64(v)) => c.serialize(buf, v),
            (Self::FixedUInt8(c), Datum::UInt8(v)) => c.serialize(buf, v),
            (Self::FixedUInt16(c), Datum::UInt16(v)) => c.serialize(buf, v),
            (Self::FixedUInt32(c), Datum::UInt32(v)) => c.serialize(buf, v),
            (Self::FixedUInt64(c), Datum::UInt64(v)) => c.serialize(buf, v),
            (Self::Float(c), Datum::Float(v)) => c.serialize(buf, &Some(*v)),
            (Self::Float(c), Datum::Null) => c.serialize(buf, &None),
            (Self::Double(c), Datum::Double(v)) => c.serialize(buf, &Some(*v)),
            (Self::Double(c), Datum::Null) => c.serialize(buf, &None),
            (Self::Decimal(c), Datum::Decimal(v)) => c.encode(buf, Some(v)),
            (Self::Decimal(c), Datum::Null) => c.encode(buf, None),
            (Self::Bytes(c), Datum::Varbinary(v)) => c.serialize(buf, v),
            (Self::Utf8(c), Datum::String(v)) => c.encode(buf, Some(v)),
            (Self::Utf8(c), Datum::Null) => c.encode(buf, None),
            (Self::Struct(c), Datum::Struct(v)) => c.serialize(buf, v),
            (field, datum) => field.bad_datum(datum),
        }
    }

    fn skip<B: Buf>(&self, buf: &mut B) -> Result<usize> {
        for_each_field!(self, c => c.skip(buf))
    }

    fn deserialize<B: Buf>(&self, buf: &mut B) -> Result<Datum> {
        match self {
            Self::VarInt(c) => Ok(c.deserialize(buf)?.map_or(Datum::Null, Datum::Int32)),
            Self::VarLong(c) => Ok(c.deserialize(buf)?.map_or(Datum::Null, Datum::Int64)),
            Self::UnsignedVarInt(c) => Ok(c.deserialize(buf)?.map_or(Datum::Null, Datum::UInt32)),
            Self::UnsignedVarLong(c) => Ok(c.deserialize(buf)?.map_or(Datum::Null, Datum::UInt64)),
            Self::FixedInt8(c) => Ok(Datum::Int8(c.deserialize(buf)?)),
            Self::FixedInt16(c) => Ok(Datum::Int16(c.deserialize(buf)?)),
            Self::FixedInt32(c) => Ok(Datum::Int32(c.deserialize(buf)?)),
            Self::FixedInt64(c) => Ok(Datum::Int64(c.deserialize(buf)?)),
            Self::FixedUInt8(c) => Ok(Datum::UInt8(c.deserialize(buf)?)),
            Self::FixedUInt16(c) => Ok(Datum::UInt16(c.deserialize(buf)?)),
            Self::FixedUInt32(c) => Ok(Datum::UInt32(c.deserialize(buf)?)),
            Self::FixedUInt64(c) => Ok(Datum::UInt64(c.deserialize(buf)?)),
            Self::Float(c) => Ok(c.deserialize(buf)?.map_or(Datum::Null, Datum::Float)),
            Self::Double(c) => Ok(c.deserialize(buf)?.map_or(Datum::Null, Datum::Double)),
            Self::Decimal(c) => Ok(c.deserialize(buf)?.map_or(Datum::Null, Datum::Decimal)),
            Self::Bytes(c) => Ok(Datum::Varbinary(c.deserialize(buf)?)),
            Self::Utf8(c) => Ok(c.deserialize(buf)?.map_or(Datum::Null, Datum::String)),
            Self::Struct(c) => Ok(Datum::Struct(c.deserialize(buf)?)),
        }
    }
}

/// A composite row key over a fixed list of fields, compared field by field
/// in declaration order.
///
/// Structs themselves are never NULL; individual fields may be, when their
/// codec supports it.
#[derive(Debug, Clone)]
pub struct StructRowKey {
    order: Order,
    fields: Vec<FieldRowKey>,
}

impl StructRowKey {
    /// Compose `fields` into one ascending key.
    pub fn new(fields: Vec<FieldRowKey>) -> Self {
        Self {
            order: Order::Ascending,
            fields,
        }
    }

    pub fn fields(&self) -> &[FieldRowKey] {
        &self.fields
    }

    /// Let the last field drop its terminator, decoding up to the end of the
    /// buffer instead. Only an ascending UTF-8 field (or recursively the
    /// last field of a nested struct) supports this.
    pub fn allow_implicit_termination(&mut self) -> Result<()> {
        match self.fields.last_mut() {
            Some(FieldRowKey::Utf8(c)) => c.set_must_terminate(false),
            Some(FieldRowKey::Struct(c)) => c.allow_implicit_termination(),
            _ => InvalidConfiguration {
                detail: "last field does not support implicit termination",
            }
            .fail(),
        }
    }

    fn check_arity(&self, values: &[Datum]) -> Result<()> {
        ensure!(
            values.len() == self.fields.len(),
            ArityMismatch {
                expect: self.fields.len(),
                actual: values.len(),
            }
        );
        Ok(())
    }
}

impl RowKey for StructRowKey {
    type Value = Vec<Datum>;

    fn order(&self) -> Order {
        self.order
    }

    /// Flipping the struct order flips every field's own order, so the
    /// whole key inverts without any wrapper bytes.
    fn set_order(&mut self, order: Order) {
        if order == self.order {
            return;
        }
        self.order = order;
        for field in &mut self.fields {
            let inverted = field.order().invert();
            field.set_order(inverted);
        }
    }

    fn serialized_length(&self, values: &Vec<Datum>) -> Result<usize> {
        self.check_arity(values)?;
        let mut len = 0;
        for (field, value) in self.fields.iter().zip(values) {
            len += field.serialized_length(value)?;
        }
        Ok(len)
    }

    fn serialize<B: SafeBufMut>(&self, buf: &mut B, values: &Vec<Datum>) -> Result<()> {
        self.check_arity(values)?;
        for (field, value) in self.fields.iter().zip(values) {
            field.serialize(buf, value)?;
        }
        Ok(())
    }

    fn skip<B: Buf>(&self, buf: &mut B) -> Result<usize> {
        let mut len = 0;
        for field in &self.fields {
            len += field.skip(buf)?;
        }
        Ok(len)
    }

    fn deserialize<B: Buf>(&self, buf: &mut B) -> Result<Vec<Datum>> {
        self.fields
            .iter()
            .map(|field| field.deserialize(buf))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;

    use super::*;
    use crate::Error;

    fn sample_key() -> StructRowKey {
        StructRowKey::new(vec![
            FieldRowKey::VarLong(VarLongRowKey::new(Order::Ascending)),
            FieldRowKey::Utf8(Utf8RowKey::new(Order::Ascending)),
            FieldRowKey::Double(DoubleRowKey::new(Order::Ascending)),
        ])
    }

    fn sample_tuple(id: i64, name: &str, score: f64) -> Vec<Datum> {
        vec![
            Datum::Int64(id),
            Datum::String(name.to_string()),
            Datum::Double(score),
        ]
    }

    #[test]
    fn test_struct_round_trip() {
        let key = sample_key();
        let tuples = vec![
            sample_tuple(1, "a", 0.5),
            sample_tuple(-3, "", f64::NEG_INFINITY),
            vec![Datum::Null, Datum::Null, Datum::Null],
        ];
        for tuple in &tuples {
            let buf = key.serialize_to_vec(tuple).unwrap();
            assert_eq!(buf.len(), key.serialized_length(tuple).unwrap());
            assert_eq!(*tuple, key.deserialize_from_slice(&buf).unwrap());

            let mut reader = &buf[..];
            assert_eq!(buf.len(), key.skip(&mut reader).unwrap());
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn test_struct_tuple_order() {
        let key = sample_key();
        // Tuples listed in their natural lexicographic order; NULL sorts
        // first within each field.
        let sorted = vec![
            vec![Datum::Null, Datum::Null, Datum::Null],
            sample_tuple(-7, "z", 1.0),
            sample_tuple(1, "a", 0.5),
            sample_tuple(1, "a", 2.5),
            sample_tuple(1, "ab", 0.0),
            sample_tuple(1, "b", -1.0),
            sample_tuple(2, "", -100.0),
        ];
        let encoded: Vec<_> = sorted
            .iter()
            .map(|t| key.serialize_to_vec(t).unwrap())
            .collect();
        for window in encoded.windows(2) {
            assert!(window[0] < window[1]);
        }
    }

    #[test]
    fn test_struct_set_order_flips_fields() {
        let mut key = sample_key();
        key.set_order(Order::Descending);
        assert_eq!(Order::Descending, key.order());
        for field in key.fields() {
            assert_eq!(Order::Descending, field.order());
        }

        let lo = key.serialize_to_vec(&sample_tuple(1, "a", 0.0)).unwrap();
        let hi = key.serialize_to_vec(&sample_tuple(2, "a", 0.0)).unwrap();
        assert!(lo > hi);

        // Flipping back restores the original per-field orders.
        key.set_order(Order::Ascending);
        for field in key.fields() {
            assert_eq!(Order::Ascending, field.order());
        }
    }

    #[test]
    fn test_struct_mixed_field_orders() {
        // A key may mix directions; flipping the struct inverts each field
        // relative to its own direction.
        let mut key = StructRowKey::new(vec![
            FieldRowKey::VarLong(VarLongRowKey::new(Order::Ascending)),
            FieldRowKey::VarLong(VarLongRowKey::new(Order::Descending)),
        ]);
        key.set_order(Order::Descending);
        assert_eq!(Order::Descending, key.fields()[0].order());
        assert_eq!(Order::Ascending, key.fields()[1].order());
    }

    #[test]
    fn test_struct_arity_mismatch() {
        let key = sample_key();
        let short = vec![Datum::Int64(1)];
        assert!(matches!(
            key.serialize_to_vec(&short),
            Err(Error::ArityMismatch { .. })
        ));
        assert!(matches!(
            key.serialized_length(&short),
            Err(Error::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_struct_datum_mismatch() {
        let key = sample_key();
        let wrong = vec![
            Datum::String("not a number".to_string()),
            Datum::Null,
            Datum::Null,
        ];
        assert!(matches!(
            key.serialize_to_vec(&wrong),
            Err(Error::MismatchedDatum { .. })
        ));
    }

    #[test]
    fn test_null_into_fixed_width() {
        let key = StructRowKey::new(vec![FieldRowKey::FixedInt32(FixedInt32RowKey::new(
            Order::Ascending,
        ))]);
        assert!(matches!(
            key.serialize_to_vec(&vec![Datum::Null]),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_implicit_termination_in_struct() {
        let mut key = StructRowKey::new(vec![
            FieldRowKey::VarLong(VarLongRowKey::new(Order::Ascending)),
            FieldRowKey::Utf8(Utf8RowKey::new(Order::Ascending)),
        ]);
        key.allow_implicit_termination().unwrap();

        let explicit_key = StructRowKey::new(vec![
            FieldRowKey::VarLong(VarLongRowKey::new(Order::Ascending)),
            FieldRowKey::Utf8(Utf8RowKey::new(Order::Ascending)),
        ]);

        let tuple = vec![Datum::Int64(9), Datum::String("ab".to_string())];
        let implicit = key.serialize_to_vec(&tuple).unwrap();
        let explicit = explicit_key.serialize_to_vec(&tuple).unwrap();
        assert_eq!(explicit.len(), implicit.len() + 1);
        assert_eq!(tuple, key.deserialize_from_slice(&implicit).unwrap());

        // NULL and the empty string stay distinguishable without the
        // terminator.
        let null_tuple = vec![Datum::Int64(9), Datum::Null];
        let empty_tuple = vec![Datum::Int64(9), Datum::String(String::new())];
        let null_buf = key.serialize_to_vec(&null_tuple).unwrap();
        let empty_buf = key.serialize_to_vec(&empty_tuple).unwrap();
        assert!(null_buf < empty_buf);
        assert_eq!(null_tuple, key.deserialize_from_slice(&null_buf).unwrap());
        assert_eq!(empty_tuple, key.deserialize_from_slice(&empty_buf).unwrap());
    }

    #[test]
    fn test_implicit_termination_rejected() {
        // Last field is not a terminating codec.
        let mut key = StructRowKey::new(vec![FieldRowKey::VarLong(VarLongRowKey::new(
            Order::Ascending,
        ))]);
        assert!(matches!(
            key.allow_implicit_termination(),
            Err(Error::InvalidConfiguration { .. })
        ));

        // Descending last field cannot drop its terminator.
        let mut key = StructRowKey::new(vec![FieldRowKey::Utf8(Utf8RowKey::new(
            Order::Descending,
        ))]);
        assert!(matches!(
            key.allow_implicit_termination(),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_nested_struct() {
        let inner = StructRowKey::new(vec![
            FieldRowKey::Utf8(Utf8RowKey::new(Order::Ascending)),
            FieldRowKey::Decimal(DecimalRowKey::new(Order::Ascending)),
        ]);
        let key = StructRowKey::new(vec![
            FieldRowKey::VarLong(VarLongRowKey::new(Order::Ascending)),
            FieldRowKey::Struct(inner),
        ]);

        let tuple = vec![
            Datum::Int64(7),
            Datum::Struct(vec![
                Datum::String("x".to_string()),
                Datum::Decimal(BigDecimal::from_str("-0.5").unwrap()),
            ]),
        ];
        let buf = key.serialize_to_vec(&tuple).unwrap();
        assert_eq!(buf.len(), key.serialized_length(&tuple).unwrap());
        assert_eq!(tuple, key.deserialize_from_slice(&buf).unwrap());
    }

    #[test]
    fn test_struct_prefix_composability() {
        // A two field key and the same fields decoded sequentially from one
        // stream agree.
        let id = VarLongRowKey::new(Order::Ascending);
        let name = Utf8RowKey::new(Order::Ascending);
        let key = StructRowKey::new(vec![
            FieldRowKey::VarLong(id.clone()),
            FieldRowKey::Utf8(name.clone()),
        ]);

        let tuple = vec![Datum::Int64(42), Datum::String("hi".to_string())];
        let buf = key.serialize_to_vec(&tuple).unwrap();

        let mut reader = &buf[..];
        assert_eq!(Some(42), id.deserialize(&mut reader).unwrap());
        assert_eq!(
            Some("hi".to_string()),
            name.deserialize(&mut reader).unwrap()
        );
        assert!(reader.is_empty());
    }
}
