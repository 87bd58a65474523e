use std::{any::type_name, fmt, hash::Hash, marker::PhantomData, ops::Deref};

use smallvec::SmallVec;

use super::{Boolean, Expression};
use crate::{
    engine::{AstKey, Context, Decl, Managed, Op, Sort, Store, simplify::rewrite},
    error::{Error, Result, validate_symbol},
};

/// Native machine integers usable as the type parameter of [`Integral`].
///
/// Values are exchanged with the engine as unsigned bit patterns: signed types are
/// reinterpreted in two's complement.
pub trait IntegralType: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Size in bytes.
    const BYTES: usize;
    /// Size in bits.
    const BITS: u32 = (Self::BYTES * 8) as u32;
    /// Whether division, remainder and comparison are signed.
    const SIGNED: bool;

    fn to_bits(self) -> u128;

    /// Reinterpret the low [`Self::BITS`] bits of `bits`.
    fn from_bits(bits: u128) -> Self;
}

macro_rules! integral_type {
    ($($ty:ty => $unsigned:ty, $signed:literal);* $(;)?) => {
        $(
            impl IntegralType for $ty {
                const BYTES: usize = std::mem::size_of::<$ty>();
                const SIGNED: bool = $signed;

                #[inline]
                fn to_bits(self) -> u128 {
                    self as $unsigned as u128
                }

                #[inline]
                fn from_bits(bits: u128) -> Self {
                    bits as $unsigned as $ty
                }
            }
        )*
    };
}

integral_type! {
    u8 => u8, false;
    u16 => u16, false;
    u32 => u32, false;
    u64 => u64, false;
    i8 => u8, true;
    i16 => u16, true;
    i32 => u32, true;
    i64 => u64, true;
}

/// A symbolic bit-vector with the width and signedness of `T`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Integral<T: IntegralType> {
    pub(super) expr: Expression,
    _marker: PhantomData<T>,
}

/// Bring `raw` from `from` to `to` bits: truncate, or extend with zeros or the sign bit.
fn resize(store: &mut Store, raw: AstKey, from: u32, to: u32, sign_extend: bool) -> AstKey {
    if to < from {
        rewrite(store, Op::Extract { hi: to - 1, lo: 0 }, &[raw])
    } else if to > from && sign_extend {
        rewrite(store, Op::SignExt { by: to - from }, &[raw])
    } else if to > from {
        rewrite(store, Op::ZeroExt { by: to - from }, &[raw])
    } else {
        raw
    }
}

impl<T: IntegralType> Integral<T> {
    #[inline]
    pub(super) fn wrap(expr: Expression) -> Self {
        debug_assert_eq!(expr.sort(), Sort::BitVec(T::BITS));
        Self {
            expr,
            _marker: PhantomData,
        }
    }

    /// The literal `value`.
    pub fn new(ctx: &Context, value: T) -> Self {
        Self::wrap(Expression::build(ctx, |store| {
            store.mk_numeral(T::BITS, value.to_bits())
        }))
    }

    /// A free constant named `name`.
    pub fn symbol(ctx: &Context, name: &str) -> Result<Self> {
        validate_symbol(name)?;
        Ok(Self::wrap(Expression::build(ctx, |store| {
            store.mk_const(name, Sort::BitVec(T::BITS))
        })))
    }

    /// `1` if `value` holds, `0` otherwise.
    pub fn from_boolean(value: &Boolean) -> Self {
        let raw = value.raw();
        Self::wrap(Expression::build(value.context(), |store| {
            let one = store.mk_numeral(T::BITS, 1);
            let zero = store.mk_numeral(T::BITS, 0);
            rewrite(store, Op::Ite, &[raw, one, zero])
        }))
    }

    /// Parse SMT-LIB text holding exactly one bit-vector term of the width of `T`.
    pub fn parse(ctx: &Context, text: &str) -> Result<Self> {
        let expr = Expression::parse(ctx, text)?;
        if expr.sort() != Sort::BitVec(T::BITS) {
            return Err(Error::parsing(format!(
                "expected a term of sort {}, found {}",
                Sort::BitVec(T::BITS),
                expr.sort()
            )));
        }
        Ok(Self::wrap(expr))
    }

    /// Numeric value of a concrete expression.
    pub fn evaluate(&self) -> Result<T> {
        self.expr
            .handle()
            .apply(|store, raw| store.numeral(raw))
            .map(T::from_bits)
            .ok_or_else(|| self.expr.inconclusive())
    }

    /// Convert `value` to the width of `T`.
    ///
    /// Equal widths reinterpret the same term, narrower targets keep the low bits and
    /// wider targets are zero-extended.
    pub fn cast<U: IntegralType>(value: &Integral<U>) -> Self {
        let raw = value.raw();
        Self::wrap(Expression::build(value.context(), |store| {
            resize(store, raw, U::BITS, T::BITS, false)
        }))
    }

    /// Like [`Integral::cast`], but widening sign-extends when `U` is signed.
    pub fn cast_signed<U: IntegralType>(value: &Integral<U>) -> Self {
        let raw = value.raw();
        Self::wrap(Expression::build(value.context(), |store| {
            resize(store, raw, U::BITS, T::BITS, U::SIGNED)
        }))
    }

    /// Concatenate `parts` into one value, `parts[0]` being the least significant.
    ///
    /// # Panics
    /// If the parts belong to different contexts.
    pub fn join<U: IntegralType, const N: usize>(parts: &[Integral<U>; N]) -> Self {
        const {
            assert!(
                N > 0 && N * U::BYTES == T::BYTES,
                "the parts must add up to the size of the result"
            )
        };

        let first = &parts[0];
        for part in &parts[1..] {
            first.assert_same_context(part);
        }
        let raws: SmallVec<[AstKey; 8]> = parts.iter().map(|part| part.raw()).collect();
        Self::wrap(Expression::build(first.context(), |store| {
            raws[1..]
                .iter()
                .fold(raws[0], |low, &high| rewrite(store, Op::Concat, &[high, low]))
        }))
    }

    /// The `POSITION`-th `U`-sized slice of `self`, counting from the least significant.
    pub fn extract<U: IntegralType, const POSITION: usize>(&self) -> Integral<U> {
        const {
            assert!(
                (POSITION + 1) * U::BYTES <= T::BYTES,
                "the slice must lie inside the value"
            )
        };

        let lo = POSITION as u32 * U::BITS;
        let hi = lo + U::BITS - 1;
        Integral::wrap(self.expr.unary(Op::Extract { hi, lo }))
    }

    /// Little-endian symbolic load of a `U` at address `self`.
    ///
    /// Byte `i` is the indirection function applied to `self + i`.
    pub fn dereference<U: IntegralType>(&self) -> Integral<U> {
        let ctx = self.context();
        let name = ctx.config().indirection_symbol.as_str();
        let address_sort = self.sort();
        let decl = Managed::<Decl>::new(ctx, |store| {
            store.mk_func_decl(name, &[address_sort], Sort::BitVec(8))
        });

        let (address, decl) = (self.raw(), decl.raw());
        Integral::wrap(Expression::build(ctx, |store| {
            let mut value = store.mk_app(decl, &[address]);
            for i in 1..U::BYTES {
                let offset = store.mk_numeral(T::BITS, i as u128);
                let at = rewrite(store, Op::BvAdd, &[address, offset]);
                let byte = store.mk_app(decl, &[at]);
                value = rewrite(store, Op::Concat, &[byte, value]);
            }
            value
        }))
    }

    /// `self = other`
    pub fn equals(&self, other: &Self) -> Boolean {
        Boolean(self.expr.binary(Op::Eq, &other.expr))
    }

    /// `self < other`, signed when `T` is.
    pub fn less_than(&self, other: &Self) -> Boolean {
        let op = if T::SIGNED { Op::BvSLt } else { Op::BvULt };
        Boolean(self.expr.binary(op, &other.expr))
    }

    /// `self += 1`
    pub fn increment(&mut self) {
        self.expr.ast.update(|store, raw| {
            let one = store.mk_numeral(T::BITS, 1);
            rewrite(store, Op::BvAdd, &[raw, one])
        });
    }

    /// `self -= 1`
    pub fn decrement(&mut self) {
        self.expr.ast.update(|store, raw| {
            let one = store.mk_numeral(T::BITS, 1);
            rewrite(store, Op::BvSub, &[raw, one])
        });
    }

    /// See [`Expression::substitute`].
    pub fn substitute(&mut self, name: &str, value: &Expression) {
        self.expr.substitute(name, value);
    }

    /// See [`Expression::substitute_indirect`].
    pub fn substitute_indirect(&mut self, address: &Expression, byte: &Integral<u8>) {
        self.expr.substitute_indirect(address, byte);
    }

    #[inline]
    pub fn as_expression(&self) -> &Expression {
        &self.expr
    }

    #[inline]
    pub fn into_expression(self) -> Expression {
        self.expr
    }
}

impl<T: IntegralType> Deref for Integral<T> {
    type Target = Expression;

    fn deref(&self) -> &Expression {
        &self.expr
    }
}

impl<T: IntegralType> TryFrom<Expression> for Integral<T> {
    type Error = Error;

    fn try_from(expr: Expression) -> Result<Self> {
        expr.expect_sort(Sort::BitVec(T::BITS))?;
        Ok(Self::wrap(expr))
    }
}

impl<T: IntegralType> From<Integral<T>> for Expression {
    fn from(value: Integral<T>) -> Self {
        value.expr
    }
}

impl<T: IntegralType> fmt::Display for Integral<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.expr, f)
    }
}

impl<T: IntegralType> fmt::Debug for Integral<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Integral<{}>({})", type_name::<T>(), self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_patterns() {
        assert_eq!((-1i8).to_bits(), 0xff);
        assert_eq!(i16::from_bits(0x8000), i16::MIN);
        assert_eq!(u32::from_bits(0x1_0000_0002), 2);
        assert_eq!(<i64 as IntegralType>::BITS, 64);
    }

    #[test]
    fn casts() {
        let ctx = Context::new();
        let wide = Integral::<u16>::new(&ctx, 0x1234);
        assert_eq!(Integral::<u8>::cast(&wide).evaluate().unwrap(), 0x34);

        let minus_one = Integral::<i8>::new(&ctx, -1);
        assert_eq!(Integral::<u32>::cast(&minus_one).evaluate().unwrap(), 0xff);
        assert_eq!(Integral::<i32>::cast_signed(&minus_one).evaluate().unwrap(), -1);
        assert_eq!(Integral::<u8>::cast(&minus_one).evaluate().unwrap(), 0xff);

        let x = Integral::<u16>::symbol(&ctx, "x").unwrap();
        let same = Integral::<i16>::cast(&x);
        assert_eq!(same.raw(), x.raw());
    }

    #[test]
    fn join_and_extract() {
        let ctx = Context::new();
        let bytes = [Integral::new(&ctx, 0x34u8), Integral::new(&ctx, 0x12u8)];
        assert_eq!(Integral::<u16>::join(&bytes).evaluate().unwrap(), 0x1234);

        let word = Integral::<u32>::new(&ctx, 0xaabbccdd);
        assert_eq!(word.extract::<u8, 2>().evaluate().unwrap(), 0xbb);
        assert_eq!(word.extract::<u16, 1>().evaluate().unwrap(), 0xaabb);

        let x = Integral::<u32>::symbol(&ctx, "x").unwrap();
        let parts = [
            x.extract::<u8, 0>(),
            x.extract::<u8, 1>(),
            x.extract::<u8, 2>(),
            x.extract::<u8, 3>(),
        ];
        assert_eq!(Integral::<u32>::join(&parts), x);
    }

    #[test]
    fn dereference_is_little_endian() {
        let ctx = Context::new();
        let p = Integral::<u64>::symbol(&ctx, "p").unwrap();
        let mut value = p.dereference::<u16>();
        assert_eq!(
            value.text(),
            "(concat (deref (bvadd #x0000000000000001 p)) (deref p))"
        );
        assert_eq!(value.indirect_dependencies().len(), 2);

        let next = &p + &Integral::new(&ctx, 1u64);
        value.substitute_indirect(&p, &Integral::new(&ctx, 0x34));
        value.substitute_indirect(&next, &Integral::new(&ctx, 0x12));
        assert_eq!(value.evaluate().unwrap(), 0x1234);
    }

    #[test]
    fn comparisons_follow_signedness() {
        let ctx = Context::new();
        let minus_one = Integral::<i8>::new(&ctx, -1);
        let zero = Integral::<i8>::new(&ctx, 0);
        assert!(minus_one.less_than(&zero).evaluate().unwrap());

        let max = Integral::<u8>::new(&ctx, 0xff);
        let zero = Integral::<u8>::new(&ctx, 0);
        assert!(!max.less_than(&zero).evaluate().unwrap());
        assert!(!max.equals(&zero).evaluate().unwrap());
    }

    #[test]
    fn increments_wrap() {
        let ctx = Context::new();
        let mut x = Integral::<u8>::new(&ctx, 0xff);
        x.increment();
        assert_eq!(x.evaluate().unwrap(), 0);
        x.decrement();
        assert_eq!(x.evaluate().unwrap(), 0xff);
    }

    #[test]
    fn boolean_round_trip() {
        let ctx = Context::new();
        for value in [true, false] {
            let b = Boolean::new(&ctx, value);
            let i = Integral::<u32>::from_boolean(&b);
            assert_eq!(i.evaluate().unwrap(), value as u32);
            assert_eq!(Boolean::from_integral(&i).evaluate().unwrap(), value);
        }

        let p = Boolean::symbol(&ctx, "p").unwrap();
        assert_eq!(Boolean::from_integral(&Integral::<u8>::from_boolean(&p)), p);
    }

    #[test]
    fn parse_checks_the_width() {
        let ctx = Context::new();
        let x = Integral::<u16>::parse(&ctx, "(bvmul #x0002 #x0003)").unwrap();
        assert_eq!(x.evaluate().unwrap(), 6);
        assert!(Integral::<u8>::parse(&ctx, "#x0001").unwrap_err().is_parsing());
    }
}
