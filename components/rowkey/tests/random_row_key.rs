// Copyright 2024 RowKey Project Authors. Licensed under Apache-2.0.

//! Randomized cross-codec invariants: round-trip, length agreement, skip
//! distance and order preservation, for single codecs and composed keys.

use std::cmp::Ordering;

use bigdecimal::{num_bigint::BigInt, BigDecimal};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rowkey::{
    bytes::BytesRowKey,
    datum::Datum,
    decimal::DecimalRowKey,
    row::{FieldRowKey, StructRowKey},
    text::Utf8RowKey,
    varint::{UnsignedVarLongRowKey, VarLongRowKey},
    Order, RowKey,
};

const ROUNDS: usize = 2000;

fn check_invariants<C>(codec: &C, v1: &C::Value, v2: &C::Value, expect: Ordering)
where
    C: RowKey,
    C::Value: PartialEq + std::fmt::Debug,
{
    let b1 = codec.serialize_to_vec(v1).unwrap();
    let b2 = codec.serialize_to_vec(v2).unwrap();

    assert_eq!(b1.len(), codec.serialized_length(v1).unwrap());
    assert_eq!(*v1, codec.deserialize_from_slice(&b1).unwrap());

    let mut reader = &b1[..];
    assert_eq!(b1.len(), codec.skip(&mut reader).unwrap());
    assert!(reader.is_empty());

    let expect = match codec.order() {
        Order::Ascending => expect,
        Order::Descending => expect.reverse(),
    };
    assert_eq!(expect, b1.cmp(&b2), "{v1:?} vs {v2:?}");
}

fn gen_opt_i64(rng: &mut StdRng) -> Option<i64> {
    if rng.gen_ratio(1, 10) {
        return None;
    }
    Some(rng.gen::<i64>() >> rng.gen_range(0..64))
}

fn gen_opt_string(rng: &mut StdRng) -> Option<String> {
    if rng.gen_ratio(1, 10) {
        return None;
    }
    let len = rng.gen_range(0..6);
    Some((0..len).map(|_| rng.gen_range('a'..='c')).collect())
}

fn gen_decimal(rng: &mut StdRng) -> Option<BigDecimal> {
    if rng.gen_ratio(1, 10) {
        return None;
    }
    Some(BigDecimal::new(
        BigInt::from(rng.gen::<i64>()),
        rng.gen_range(-20..20),
    ))
}

#[test]
fn test_var_long_invariants() {
    let mut rng = StdRng::seed_from_u64(1);
    for order in [Order::Ascending, Order::Descending] {
        let codec = VarLongRowKey::new(order);
        for _ in 0..ROUNDS {
            let v1 = gen_opt_i64(&mut rng);
            let v2 = gen_opt_i64(&mut rng);
            check_invariants(&codec, &v1, &v2, v1.cmp(&v2));
        }
    }
}

#[test]
fn test_unsigned_var_long_invariants() {
    let mut rng = StdRng::seed_from_u64(2);
    for order in [Order::Ascending, Order::Descending] {
        let codec = UnsignedVarLongRowKey::new(order);
        for _ in 0..ROUNDS {
            let v1 = gen_opt_i64(&mut rng).map(|x| x as u64);
            let v2 = gen_opt_i64(&mut rng).map(|x| x as u64);
            check_invariants(&codec, &v1, &v2, v1.cmp(&v2));
        }
    }
}

#[test]
fn test_utf8_invariants() {
    let mut rng = StdRng::seed_from_u64(3);
    for order in [Order::Ascending, Order::Descending] {
        let codec = Utf8RowKey::new(order);
        for _ in 0..ROUNDS {
            let v1 = gen_opt_string(&mut rng);
            let v2 = gen_opt_string(&mut rng);
            check_invariants(&codec, &v1, &v2, v1.cmp(&v2));
        }
    }
}

#[test]
fn test_bytes_invariants() {
    let mut rng = StdRng::seed_from_u64(4);
    for order in [Order::Ascending, Order::Descending] {
        let codec = BytesRowKey::new(order);
        for _ in 0..ROUNDS {
            let len1 = rng.gen_range(0..6);
            let len2 = rng.gen_range(0..6);
            let v1: Vec<u8> = (0..len1).map(|_| rng.gen()).collect();
            let v2: Vec<u8> = (0..len2).map(|_| rng.gen()).collect();
            let expect = v1.cmp(&v2);
            check_invariants(&codec, &v1, &v2, expect);
        }
    }
}

#[test]
fn test_decimal_invariants() {
    let mut rng = StdRng::seed_from_u64(5);
    for order in [Order::Ascending, Order::Descending] {
        let codec = DecimalRowKey::new(order);
        for _ in 0..ROUNDS {
            let v1 = gen_decimal(&mut rng);
            let v2 = gen_decimal(&mut rng);
            let expect = match (&v1, &v2) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            };
            check_invariants(&codec, &v1, &v2, expect);
        }
    }
}

#[test]
fn test_composite_key_invariants() {
    let mut rng = StdRng::seed_from_u64(6);
    let key = StructRowKey::new(vec![
        FieldRowKey::VarLong(VarLongRowKey::new(Order::Ascending)),
        FieldRowKey::Utf8(Utf8RowKey::new(Order::Ascending)),
    ]);

    for _ in 0..ROUNDS {
        // Native tuples carry the expected ordering, None sorting first.
        let t1 = (gen_opt_i64(&mut rng), gen_opt_string(&mut rng));
        let t2 = (gen_opt_i64(&mut rng), gen_opt_string(&mut rng));

        let to_datums = |t: &(Option<i64>, Option<String>)| {
            vec![
                t.0.map_or(Datum::Null, Datum::Int64),
                t.1.clone().map_or(Datum::Null, Datum::String),
            ]
        };
        let d1 = to_datums(&t1);
        let d2 = to_datums(&t2);

        let b1 = key.serialize_to_vec(&d1).unwrap();
        let b2 = key.serialize_to_vec(&d2).unwrap();
        assert_eq!(b1.len(), key.serialized_length(&d1).unwrap());
        assert_eq!(d1, key.deserialize_from_slice(&b1).unwrap());
        assert_eq!(t1.cmp(&t2), b1.cmp(&b2), "{t1:?} vs {t2:?}");

        let mut reader = &b1[..];
        assert_eq!(b1.len(), key.skip(&mut reader).unwrap());
        assert!(reader.is_empty());
    }
}

#[test]
fn test_composite_key_descending_invariants() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut key = StructRowKey::new(vec![
        FieldRowKey::VarLong(VarLongRowKey::new(Order::Ascending)),
        FieldRowKey::Utf8(Utf8RowKey::new(Order::Ascending)),
    ]);
    key.set_order(Order::Descending);

    for _ in 0..ROUNDS {
        let t1 = (gen_opt_i64(&mut rng), gen_opt_string(&mut rng));
        let t2 = (gen_opt_i64(&mut rng), gen_opt_string(&mut rng));

        let to_datums = |t: &(Option<i64>, Option<String>)| {
            vec![
                t.0.map_or(Datum::Null, Datum::Int64),
                t.1.clone().map_or(Datum::Null, Datum::String),
            ]
        };
        let b1 = key.serialize_to_vec(&to_datums(&t1)).unwrap();
        let b2 = key.serialize_to_vec(&to_datums(&t2)).unwrap();
        assert_eq!(t1.cmp(&t2).reverse(), b1.cmp(&b2), "{t1:?} vs {t2:?}");
    }
}
