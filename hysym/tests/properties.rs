use std::collections::HashSet;

use hysym::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

fn random<T: IntegralType>(rng: &mut impl Rng) -> T {
    T::from_bits(rng.random::<u64>() as u128)
}

fn width_round_trip<T: IntegralType>(ctx: &Context, rng: &mut impl Rng) {
    for value in [T::from_bits(0), T::from_bits(u128::MAX)] {
        assert_eq!(Integral::new(ctx, value).evaluate().unwrap(), value);
    }
    for _ in 0..64 {
        let value: T = random(rng);
        let literal = Integral::new(ctx, value);
        assert_eq!(literal.evaluate().unwrap(), value);
        assert_eq!(literal.as_expression().evaluate::<T>().unwrap(), value);
        assert!(literal.is_concrete());
    }
}

#[test]
fn literals_evaluate_to_their_value() {
    let ctx = Context::new();
    let mut rng = ChaCha20Rng::seed_from_u64(0x5eed);
    width_round_trip::<u8>(&ctx, &mut rng);
    width_round_trip::<u16>(&ctx, &mut rng);
    width_round_trip::<u32>(&ctx, &mut rng);
    width_round_trip::<u64>(&ctx, &mut rng);
    width_round_trip::<i8>(&ctx, &mut rng);
    width_round_trip::<i16>(&ctx, &mut rng);
    width_round_trip::<i32>(&ctx, &mut rng);
    width_round_trip::<i64>(&ctx, &mut rng);
}

#[test]
fn boolean_survives_a_round_trip_through_integers() {
    let ctx = Context::new();
    for value in [true, false] {
        let b = Boolean::new(&ctx, value);
        let byte = Integral::<u8>::from_boolean(&b);
        assert_eq!(byte.evaluate().unwrap(), value as u8);
        assert_eq!(Boolean::from_integral(&byte).evaluate().unwrap(), value);

        let word = Integral::<i64>::from_boolean(&b);
        assert_eq!(Boolean::from_integral(&word), b);
    }
}

/// `cast` keeps the bit pattern: equal widths reinterpret, narrowing keeps the low bits
/// and widening zero-extends.
fn check_cast<T: IntegralType, U: IntegralType>(ctx: &Context, rng: &mut impl Rng) {
    for _ in 0..32 {
        let value: T = random(rng);
        let cast = Integral::<U>::cast(&Integral::new(ctx, value));
        assert_eq!(cast.evaluate().unwrap(), U::from_bits(value.to_bits()));
    }
}

#[test]
fn casts_preserve_bit_patterns() {
    let ctx = Context::new();
    let mut rng = ChaCha20Rng::seed_from_u64(7);

    check_cast::<u8, i8>(&ctx, &mut rng);
    check_cast::<i32, u32>(&ctx, &mut rng);
    check_cast::<u64, i64>(&ctx, &mut rng);

    check_cast::<u64, u8>(&ctx, &mut rng);
    check_cast::<i32, i16>(&ctx, &mut rng);
    check_cast::<u16, i8>(&ctx, &mut rng);

    check_cast::<u8, u64>(&ctx, &mut rng);
    check_cast::<i8, i32>(&ctx, &mut rng);
    check_cast::<i16, u64>(&ctx, &mut rng);
}

#[test]
fn widening_a_negative_value_zero_extends() {
    let ctx = Context::new();
    let minus_two = Integral::new(&ctx, -2i8);
    assert_eq!(Integral::<i32>::cast(&minus_two).evaluate().unwrap(), 0xfe);
    assert_eq!(Integral::<i32>::cast_signed(&minus_two).evaluate().unwrap(), -2);
    assert_eq!(Integral::<u16>::cast_signed(&minus_two).evaluate().unwrap(), 0xfffe);

    let byte = Integral::new(&ctx, 0x80u8);
    assert_eq!(Integral::<i16>::cast_signed(&byte).evaluate().unwrap(), 0x80);
}

#[test]
fn join_inverts_byte_extraction() {
    let ctx = Context::new();
    let mut rng = ChaCha20Rng::seed_from_u64(11);

    for _ in 0..32 {
        let value = Integral::new(&ctx, random::<u32>(&mut rng));
        let bytes = [
            value.extract::<u8, 0>(),
            value.extract::<u8, 1>(),
            value.extract::<u8, 2>(),
            value.extract::<u8, 3>(),
        ];
        assert_eq!(Integral::<u32>::join(&bytes), value);

        let wide = Integral::new(&ctx, random::<i64>(&mut rng));
        let halves = [wide.extract::<i32, 0>(), wide.extract::<i32, 1>()];
        assert_eq!(Integral::<i64>::join(&halves).evaluate(), wide.evaluate());
    }

    let x = Integral::<u16>::symbol(&ctx, "x").unwrap();
    let single = [x.clone()];
    assert_eq!(Integral::<i16>::join(&single).raw(), x.raw());
}

#[test]
fn dereference_concatenates_consecutive_bytes() {
    let ctx = Context::new();
    let a = Integral::<u64>::symbol(&ctx, "a").unwrap();

    let bytes: Vec<Integral<u8>> = (0..4u64)
        .map(|i| (&a + &Integral::new(&ctx, i)).dereference::<u8>())
        .collect();
    let parts = [
        bytes[0].clone(),
        bytes[1].clone(),
        bytes[2].clone(),
        bytes[3].clone(),
    ];
    assert_eq!(a.dereference::<u32>(), Integral::<u32>::join(&parts));
    assert_eq!(a.dereference::<u8>(), bytes[0]);
}

#[test]
fn substituted_symbols_evaluate() {
    let ctx = Context::new();
    let mut x = Integral::<u16>::symbol(&ctx, "x").unwrap();
    x.substitute("x", &Integral::new(&ctx, 0xbeefu16));
    assert_eq!(x.evaluate().unwrap(), 0xbeef);

    let y = Integral::<u16>::symbol(&ctx, "y").unwrap();
    let z = Integral::<u16>::symbol(&ctx, "z").unwrap();
    let mut f = &(&y * &Integral::new(&ctx, 3)) + &z;
    f.substitute("y", &Integral::new(&ctx, 2u16));
    assert!(f.evaluate().unwrap_err().is_inconclusive_evaluation());
    f.substitute("z", &Integral::new(&ctx, 5u16));
    assert_eq!(f.evaluate().unwrap(), 11);

    // A constant of another sort with the same name is a different constant.
    let mut b = Boolean::symbol(&ctx, "y").unwrap();
    b.substitute("y", &Integral::new(&ctx, 1u16));
    assert_eq!(b.text(), "y");
}

#[test]
fn free_symbols_are_collected() {
    let ctx = Context::new();
    let x = Integral::<u32>::symbol(&ctx, "x").unwrap();
    let y = Integral::<u32>::symbol(&ctx, "y").unwrap();
    let expected: HashSet<String> = ["x", "y"].into_iter().map(String::from).collect();
    assert_eq!((&x + &y).free_symbols(), expected);

    let closed = Integral::new(&ctx, 1u32) + Integral::new(&ctx, 2u32);
    assert!(closed.free_symbols().is_empty());
    assert!(Boolean::new(&ctx, true).free_symbols().is_empty());

    let loaded = x.dereference::<u8>();
    assert_eq!(loaded.free_symbols(), HashSet::from(["x".to_string()]));
}

#[test]
fn indirect_dependencies_stop_at_addresses() {
    let ctx = Context::new();
    let a = Integral::<u64>::symbol(&ctx, "a").unwrap();
    let byte = a.dereference::<u8>();
    assert_eq!(
        byte.indirect_dependencies(),
        HashSet::from([a.as_expression().clone()])
    );

    let pointer = a.dereference::<u64>();
    let through = pointer.dereference::<u8>();
    assert_eq!(
        through.indirect_dependencies(),
        HashSet::from([pointer.as_expression().clone()])
    );
    assert!(a.indirect_dependencies().is_empty());
}

#[test]
fn boolean_evaluation_is_tri_state() {
    let ctx = Context::new();
    let x = Boolean::symbol(&ctx, "x").unwrap();
    let err = x.evaluate().unwrap_err();
    assert!(err.is_inconclusive_evaluation());
    assert!(err.to_string().contains('x'));
    assert!(Boolean::new(&ctx, true).evaluate().unwrap());
    assert!(!Boolean::new(&ctx, false).evaluate().unwrap());
}

#[test]
fn symbols_are_validated() {
    let ctx = Context::new();
    for name in ["", "1x", "a b", "tab\there", "caf\u{e9}"] {
        assert!(
            Boolean::symbol(&ctx, name).unwrap_err().is_invalid_symbol(),
            "{name:?} should be rejected"
        );
        assert!(Integral::<u8>::symbol(&ctx, name).unwrap_err().is_invalid_symbol());
    }
    assert!(Boolean::symbol(&ctx, "x1").is_ok());
    assert!(Integral::<i64>::symbol(&ctx, "rax.0").is_ok());
}

#[test]
fn reinterpretation_checks_the_width() {
    let ctx = Context::new();
    let value = Integral::new(&ctx, 0x1234u16);
    let expr = value.as_expression();

    assert!(expr.evaluate::<u8>().unwrap_err().is_invalid_width());
    assert!(expr.to_boolean().unwrap_err().is_invalid_width());
    assert!(expr.to_integral::<u32>().unwrap_err().is_invalid_width());
    assert_eq!(expr.to_integral::<i16>().unwrap().evaluate().unwrap(), 0x1234);
    assert_eq!(expr.byte_width(), 2);
    assert_eq!(expr.bit_width(), 16);

    let b = Boolean::new(&ctx, true).into_expression();
    assert_eq!(b.sort(), Sort::Bool);
    assert_eq!(b.byte_width(), 0);
    assert!(b.clone().into_integral::<u8>().unwrap_err().is_invalid_width());
    assert!(b.into_boolean().unwrap().evaluate().unwrap());
}
