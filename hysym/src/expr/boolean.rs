use std::{fmt, ops::Deref};

use super::{Expression, Integral, IntegralType};
use crate::{
    engine::{
        AstKey, Context, Op, Sort,
        simplify::{rewrite, simplify},
        tactic::{CtxSimplify, Goal, Tactic},
    },
    error::{Error, Result, validate_symbol},
};

/// A symbolic boolean.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Boolean(pub(super) Expression);

impl Boolean {
    /// The literal `value`.
    pub fn new(ctx: &Context, value: bool) -> Self {
        Self(Expression::build(ctx, |store| store.mk_bool(value)))
    }

    /// A free boolean constant named `name`.
    pub fn symbol(ctx: &Context, name: &str) -> Result<Self> {
        validate_symbol(name)?;
        Ok(Self(Expression::build(ctx, |store| {
            store.mk_const(name, Sort::Bool)
        })))
    }

    /// `value != 0`
    pub fn from_integral<T: IntegralType>(value: &Integral<T>) -> Self {
        let raw = value.raw();
        Self(Expression::build(value.context(), |store| {
            let zero = store.mk_numeral(T::BITS, 0);
            let is_zero = rewrite(store, Op::Eq, &[raw, zero]);
            rewrite(store, Op::Not, &[is_zero])
        }))
    }

    /// Parse SMT-LIB text holding exactly one boolean term.
    pub fn parse(ctx: &Context, text: &str) -> Result<Self> {
        let expr = Expression::parse(ctx, text)?;
        if expr.sort() != Sort::Bool {
            return Err(Error::parsing(format!(
                "expected a term of sort Bool, found {}",
                expr.sort()
            )));
        }
        Ok(Self(expr))
    }

    /// Value of the expression if it is `true` or `false`.
    pub fn evaluate(&self) -> Result<bool> {
        self.0
            .handle()
            .apply(|store, raw| store.bool_value(raw))
            .ok_or_else(|| self.0.inconclusive())
    }

    /// Simplify the formula using its own sub-formulas as context.
    ///
    /// Conjuncts implied by the others disappear and a contradictory conjunction becomes
    /// `false`.
    pub fn reduce(&mut self) {
        let ctx = self.context().clone();
        let mut goal = Goal::new(&ctx);
        goal.assert(self.0.handle());
        let result = CtxSimplify::new(ctx.config().reduce_depth).apply(&goal);

        let formulas: Vec<AstKey> = result.formulas().map(|f| f.raw()).collect();
        self.0.ast.update_from_factory(|store| {
            let conjunction = match formulas.as_slice() {
                [] => store.mk_true(),
                [formula] => *formula,
                formulas => store.mk_and(formulas),
            };
            simplify(store, conjunction)
        });
    }

    /// `self = other`
    pub fn equals(&self, other: &Boolean) -> Boolean {
        Self(self.0.binary(Op::Eq, &other.0))
    }

    /// `self => other`
    pub fn implies(&self, other: &Boolean) -> Boolean {
        Self(self.0.binary(Op::Implies, &other.0))
    }

    /// See [`Expression::substitute`].
    pub fn substitute(&mut self, name: &str, value: &Expression) {
        self.0.substitute(name, value);
    }

    /// See [`Expression::substitute_indirect`].
    pub fn substitute_indirect(&mut self, address: &Expression, byte: &Integral<u8>) {
        self.0.substitute_indirect(address, byte);
    }

    #[inline]
    pub fn as_expression(&self) -> &Expression {
        &self.0
    }

    #[inline]
    pub fn into_expression(self) -> Expression {
        self.0
    }
}

impl Deref for Boolean {
    type Target = Expression;

    fn deref(&self) -> &Expression {
        &self.0
    }
}

impl TryFrom<Expression> for Boolean {
    type Error = Error;

    fn try_from(expr: Expression) -> Result<Self> {
        expr.expect_sort(Sort::Bool)?;
        Ok(Self(expr))
    }
}

impl From<Boolean> for Expression {
    fn from(value: Boolean) -> Self {
        value.0
    }
}

impl fmt::Display for Boolean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Boolean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Boolean").field(&self.text()).finish()
    }
}
