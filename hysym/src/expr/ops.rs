//! Operator overloads for [`Boolean`] and [`Integral`].
//!
//! Every binary operator is defined in terms of its assigning form: `a + b` clones `a`
//! (sharing its term) and applies `+=` to the copy.
use std::ops::{
    Add, AddAssign, BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Div,
    DivAssign, Mul, MulAssign, Neg, Not, Rem, RemAssign, Shl, ShlAssign, Shr, ShrAssign, Sub,
    SubAssign,
};

use super::{Boolean, Integral, IntegralType};
use crate::engine::Op;

/// Derive the four by-value/by-reference binary forms of `$trait` from `$assign`.
macro_rules! binary_from_assign {
    ($ty:ty, [$($generics:tt)*], $trait:ident::$method:ident, $assign:ident::$assign_method:ident) => {
        impl<$($generics)*> $assign<$ty> for $ty {
            #[inline]
            fn $assign_method(&mut self, rhs: $ty) {
                self.$assign_method(&rhs);
            }
        }

        impl<$($generics)*> $trait<&$ty> for &$ty {
            type Output = $ty;

            fn $method(self, rhs: &$ty) -> $ty {
                let mut result = self.clone();
                result.$assign_method(rhs);
                result
            }
        }

        impl<$($generics)*> $trait<$ty> for &$ty {
            type Output = $ty;

            #[inline]
            fn $method(self, rhs: $ty) -> $ty {
                self.$method(&rhs)
            }
        }

        impl<$($generics)*> $trait<&$ty> for $ty {
            type Output = $ty;

            #[inline]
            fn $method(mut self, rhs: &$ty) -> $ty {
                self.$assign_method(rhs);
                self
            }
        }

        impl<$($generics)*> $trait<$ty> for $ty {
            type Output = $ty;

            #[inline]
            fn $method(mut self, rhs: $ty) -> $ty {
                self.$assign_method(&rhs);
                self
            }
        }
    };
}

macro_rules! integral_binary {
    ($($trait:ident::$method:ident, $assign:ident::$assign_method:ident => $op:expr;)*) => {
        $(
            impl<T: IntegralType> $assign<&Integral<T>> for Integral<T> {
                fn $assign_method(&mut self, rhs: &Integral<T>) {
                    let op: fn(bool) -> Op = $op;
                    self.expr.assign_binary(op(T::SIGNED), &rhs.expr);
                }
            }

            binary_from_assign!(Integral<T>, [T: IntegralType], $trait::$method, $assign::$assign_method);
        )*
    };
}

integral_binary! {
    Add::add, AddAssign::add_assign => |_| Op::BvAdd;
    Sub::sub, SubAssign::sub_assign => |_| Op::BvSub;
    Mul::mul, MulAssign::mul_assign => |_| Op::BvMul;
    Div::div, DivAssign::div_assign => |signed| if signed { Op::BvSDiv } else { Op::BvUDiv };
    Rem::rem, RemAssign::rem_assign => |signed| if signed { Op::BvSRem } else { Op::BvURem };
    BitAnd::bitand, BitAndAssign::bitand_assign => |_| Op::BvAnd;
    BitOr::bitor, BitOrAssign::bitor_assign => |_| Op::BvOr;
    BitXor::bitxor, BitXorAssign::bitxor_assign => |_| Op::BvXor;
    Shl::shl, ShlAssign::shl_assign => |_| Op::BvShl;
    // Logical for signed types too.
    Shr::shr, ShrAssign::shr_assign => |_| Op::BvLShr;
}

macro_rules! boolean_binary {
    ($($trait:ident::$method:ident, $assign:ident::$assign_method:ident => $op:expr;)*) => {
        $(
            impl $assign<&Boolean> for Boolean {
                fn $assign_method(&mut self, rhs: &Boolean) {
                    self.0.assign_binary($op, &rhs.0);
                }
            }

            binary_from_assign!(Boolean, [], $trait::$method, $assign::$assign_method);
        )*
    };
}

boolean_binary! {
    BitAnd::bitand, BitAndAssign::bitand_assign => Op::And;
    BitOr::bitor, BitOrAssign::bitor_assign => Op::Or;
    BitXor::bitxor, BitXorAssign::bitxor_assign => Op::Xor;
}

macro_rules! integral_unary {
    ($($trait:ident::$method:ident => $op:expr;)*) => {
        $(
            impl<T: IntegralType> $trait for &Integral<T> {
                type Output = Integral<T>;

                fn $method(self) -> Integral<T> {
                    Integral::wrap(self.expr.unary($op))
                }
            }

            impl<T: IntegralType> $trait for Integral<T> {
                type Output = Integral<T>;

                fn $method(mut self) -> Integral<T> {
                    self.expr.assign_unary($op);
                    self
                }
            }
        )*
    };
}

integral_unary! {
    Neg::neg => Op::BvNeg;
    Not::not => Op::BvNot;
}

impl Not for &Boolean {
    type Output = Boolean;

    fn not(self) -> Boolean {
        Boolean(self.0.unary(Op::Not))
    }
}

impl Not for Boolean {
    type Output = Boolean;

    fn not(mut self) -> Boolean {
        self.0.assign_unary(Op::Not);
        self
    }
}
