// Copyright 2024 RowKey Project Authors. Licensed under Apache-2.0.

//! Field values of composite row keys

use std::fmt;

use bigdecimal::BigDecimal;
use bytes_ext::ByteVec;

/// One field value of a composite row key.
///
/// `Null` stands in for any field whose codec supports NULL; routing it to a
/// fixed width integer field is rejected during serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Decimal(BigDecimal),
    Varbinary(ByteVec),
    String(String),
    Struct(Vec<Datum>),
}

/// Kind of a [`Datum`], used in dispatch error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatumKind {
    Null,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    Decimal,
    Varbinary,
    String,
    Struct,
}

impl Datum {
    pub fn kind(&self) -> DatumKind {
        match self {
            Datum::Null => DatumKind::Null,
            Datum::Int8(_) => DatumKind::Int8,
            Datum::Int16(_) => DatumKind::Int16,
            Datum::Int32(_) => DatumKind::Int32,
            Datum::Int64(_) => DatumKind::Int64,
            Datum::UInt8(_) => DatumKind::UInt8,
            Datum::UInt16(_) => DatumKind::UInt16,
            Datum::UInt32(_) => DatumKind::UInt32,
            Datum::UInt64(_) => DatumKind::UInt64,
            Datum::Float(_) => DatumKind::Float,
            Datum::Double(_) => DatumKind::Double,
            Datum::Decimal(_) => DatumKind::Decimal,
            Datum::Varbinary(_) => DatumKind::Varbinary,
            Datum::String(_) => DatumKind::String,
            Datum::Struct(_) => DatumKind::Struct,
        }
    }
}

impl fmt::Display for DatumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DatumKind::Null => "Null",
            DatumKind::Int8 => "Int8",
            DatumKind::Int16 => "Int16",
            DatumKind::Int32 => "Int32",
            DatumKind::Int64 => "Int64",
            DatumKind::UInt8 => "UInt8",
            DatumKind::UInt16 => "UInt16",
            DatumKind::UInt32 => "UInt32",
            DatumKind::UInt64 => "UInt64",
            DatumKind::Float => "Float",
            DatumKind::Double => "Double",
            DatumKind::Decimal => "Decimal",
            DatumKind::Varbinary => "Varbinary",
            DatumKind::String => "String",
            DatumKind::Struct => "Struct",
        };
        f.write_str(s)
    }
}
