//! Symbolic expressions.
//!
//! [`Expression`] is the sort-erased form: it owns one term of a [`Context`] together with
//! its runtime [`Sort`]. The typed views [`Boolean`] and [`Integral<T>`] wrap an expression
//! whose sort was checked once, at construction, and expose the operators valid for it.
//!
//! Every expression produced by an operator is in simplified form; two expressions are
//! equal when they refer to the same term of the same context.
use std::{
    collections::HashSet,
    fmt,
    hash::{Hash, Hasher},
    io,
};

use crate::{
    engine::{
        Ast, AstKey, Context, Managed, Node, Op, Sort, Store, Symbol,
        parser::parse_terms,
        pretty,
        simplify::{rewrite, simplify},
    },
    error::{Error, Result},
};

pub mod boolean;
pub mod integral;
mod ops;

pub use boolean::Boolean;
pub use integral::{Integral, IntegralType};

/// A sort-erased symbolic expression.
#[derive(Clone)]
pub struct Expression {
    ast: Managed<Ast>,
    sort: Sort,
}

impl Expression {
    /// Build an expression from the term returned by `factory`.
    pub(crate) fn build(ctx: &Context, factory: impl FnOnce(&mut Store) -> AstKey) -> Self {
        let mut sort = Sort::Bool;
        let ast = Managed::new(ctx, |store| {
            let raw = factory(store);
            sort = store.sort(raw);
            raw
        });
        Self { ast, sort }
    }

    /// Parse SMT-LIB text holding exactly one asserted formula or bare term.
    ///
    /// The term is simplified. Fails with [`Error::Parsing`] when the text is malformed or
    /// holds zero or several terms.
    pub fn parse(ctx: &Context, text: &str) -> Result<Self> {
        let (raw, sort) = ctx.with_store(|store| {
            let terms = parse_terms(store, text)?;
            let &[term] = terms.as_slice() else {
                return Err(Error::parsing(format!(
                    "expected exactly one term, found {}",
                    terms.len()
                )));
            };
            let term = simplify(store, term);
            store.inc_ast(term);
            Ok((term, store.sort(term)))
        })?;
        Ok(Self {
            ast: Managed::adopt(ctx, raw),
            sort,
        })
    }

    #[inline]
    pub fn context(&self) -> &Context {
        self.ast.context()
    }

    /// Handle on the underlying term.
    #[inline]
    pub fn handle(&self) -> &Managed<Ast> {
        &self.ast
    }

    #[inline]
    pub fn raw(&self) -> AstKey {
        self.ast.raw()
    }

    #[inline]
    pub fn sort(&self) -> Sort {
        self.sort
    }

    /// Width in whole bytes, zero for booleans.
    #[inline]
    pub fn byte_width(&self) -> usize {
        self.sort.bytes()
    }

    /// Width in bits, zero for booleans.
    #[inline]
    pub fn bit_width(&self) -> u32 {
        self.sort.bits()
    }

    /// Whether both expressions are the same term.
    #[inline]
    pub fn equals(&self, other: &Expression) -> bool {
        self == other
    }

    /// Whether the expression is a literal (a numeral, `true` or `false`).
    pub fn is_concrete(&self) -> bool {
        self.ast.apply(|store, raw| store.is_literal(raw))
    }

    /// SMT-LIB rendering of the expression on a single line.
    pub fn text(&self) -> String {
        let width = self.context().config().text_width;
        let rendered = self
            .ast
            .apply(|store, raw| pretty::to_plain_string(store, raw, width));
        rendered
            .lines()
            .map(str::trim_start)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Print the expression to stdout, colored when the terminal supports it.
    pub fn pretty_print(&self) -> io::Result<()> {
        let doc = self.ast.apply(pretty::doc);
        pretty::print_colored(&doc)
    }

    /// Value of a concrete expression of the width of `T`.
    pub fn evaluate<T: IntegralType>(&self) -> Result<T> {
        let expected = Sort::BitVec(T::BITS);
        if self.sort != expected {
            return Err(Error::InvalidWidth {
                expected,
                found: self.sort,
            });
        }
        match self.ast.apply(|store, raw| store.numeral(raw)) {
            Some(bits) => Ok(T::from_bits(bits)),
            None => Err(self.inconclusive()),
        }
    }

    pub(crate) fn inconclusive(&self) -> Error {
        Error::InconclusiveEvaluation {
            expression: self.ast.apply(pretty::summary),
        }
    }

    /// Names of the free constants the expression depends on.
    pub fn free_symbols(&self) -> HashSet<String> {
        self.ast.apply(|store, root| {
            let mut names = HashSet::new();
            let mut visited = HashSet::new();
            let mut stack = vec![root];
            while let Some(key) = stack.pop() {
                if !visited.insert(key) {
                    continue;
                }
                match store.leaf_name(key) {
                    Some(name) => {
                        names.insert(name.to_string());
                    }
                    None => stack.extend_from_slice(store.args(key)),
                }
            }
            names
        })
    }

    /// Addresses the expression reads through the indirection function.
    ///
    /// Addresses are not searched for further reads.
    pub fn indirect_dependencies(&self) -> HashSet<Expression> {
        let indirection = self.context().config().indirection_symbol.as_str();
        let addresses: Vec<AstKey> = self.ast.apply(|store, root| {
            let mut addresses = Vec::new();
            let mut visited = HashSet::new();
            let mut stack = vec![root];
            while let Some(key) = stack.pop() {
                if !visited.insert(key) {
                    continue;
                }
                match store.node(key) {
                    Node::App { decl, args }
                        if args.len() == 1 && store.decl_name(*decl) == indirection =>
                    {
                        addresses.push(args[0]);
                    }
                    node => stack.extend_from_slice(node.args()),
                }
            }
            addresses
        });

        // Every address is a sub-term of `self`, which keeps it alive.
        addresses
            .into_iter()
            .map(|address| Expression::build(self.context(), |_| address))
            .collect()
    }

    /// Replace the free constant `name` of the sort of `value` by `value`, then simplify.
    pub fn substitute(&mut self, name: &str, value: &Expression) {
        self.assert_same_context(value);
        let symbol = Managed::<Symbol>::new(self.context(), |store| store.mk_symbol(name));
        let (to, sort) = (value.raw(), value.sort);
        self.ast.update(|store, raw| {
            let from = store.mk_const_with(symbol.raw(), sort);
            let replaced = store.substitute(raw, from, to);
            simplify(store, replaced)
        });
    }

    /// Replace the one-byte read at `address` by `byte`, then simplify.
    pub fn substitute_indirect(&mut self, address: &Expression, byte: &Integral<u8>) {
        self.assert_same_context(address);
        self.assert_same_context(byte);
        let indirection = self.context().config().indirection_symbol.clone();
        let (address, address_sort, to) = (address.raw(), address.sort, byte.raw());
        self.ast.update(|store, raw| {
            let decl = store.mk_func_decl(&indirection, &[address_sort], Sort::BitVec(8));
            let from = store.mk_app(decl, &[address]);
            let replaced = store.substitute(raw, from, to);
            simplify(store, replaced)
        });
    }

    /// View the expression as a [`Boolean`].
    pub fn to_boolean(&self) -> Result<Boolean> {
        self.clone().into_boolean()
    }

    pub fn into_boolean(self) -> Result<Boolean> {
        Boolean::try_from(self)
    }

    /// View the expression as an [`Integral<T>`].
    pub fn to_integral<T: IntegralType>(&self) -> Result<Integral<T>> {
        self.clone().into_integral()
    }

    pub fn into_integral<T: IntegralType>(self) -> Result<Integral<T>> {
        Integral::try_from(self)
    }

    pub(crate) fn expect_sort(&self, expected: Sort) -> Result<()> {
        if self.sort != expected {
            return Err(Error::InvalidWidth {
                expected,
                found: self.sort,
            });
        }
        Ok(())
    }

    /// # Panics
    /// If `other` belongs to another context.
    pub(crate) fn assert_same_context(&self, other: &Expression) {
        assert!(
            self.context().same(other.context()),
            "expressions of different contexts cannot be combined"
        );
    }

    /// `op(self)` as a new expression.
    pub(crate) fn unary(&self, op: Op) -> Expression {
        let raw = self.raw();
        Expression::build(self.context(), |store| rewrite(store, op, &[raw]))
    }

    /// `op(self, rhs)` as a new expression.
    pub(crate) fn binary(&self, op: Op, rhs: &Expression) -> Expression {
        self.assert_same_context(rhs);
        let (lhs, rhs) = (self.raw(), rhs.raw());
        Expression::build(self.context(), |store| rewrite(store, op, &[lhs, rhs]))
    }

    /// Replace `self` by `op(self)`. `op` must preserve the sort.
    pub(crate) fn assign_unary(&mut self, op: Op) {
        self.ast.update(|store, raw| rewrite(store, op, &[raw]));
    }

    /// Replace `self` by `op(self, rhs)`. `op` must preserve the sort.
    pub(crate) fn assign_binary(&mut self, op: Op, rhs: &Expression) {
        self.assert_same_context(rhs);
        let rhs = rhs.raw();
        self.ast.update(|store, raw| rewrite(store, op, &[raw, rhs]));
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.ast == other.ast
    }
}

impl Eq for Expression {}

impl Hash for Expression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ast
            .apply(|store, raw| store.ast_hash(raw))
            .hash(state);
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("sort", &self.sort)
            .field("text", &self.text())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_terms_are_simplified() {
        let ctx = Context::new();
        let parsed = Expression::parse(
            &ctx,
            "(declare-const x (_ BitVec 8)) (bvadd x (bvadd #x01 #x02))",
        )
        .unwrap();
        let built = Integral::<u8>::symbol(&ctx, "x").unwrap() + Integral::new(&ctx, 3u8);
        assert!(parsed.equals(&built));
        assert_eq!(parsed.text(), "(bvadd #x03 x)");
    }

    #[test]
    fn parse_requires_a_single_term() {
        let ctx = Context::new();
        let err = Expression::parse(&ctx, "(set-logic QF_BV)").unwrap_err();
        assert!(err.is_parsing());
        let err = Expression::parse(&ctx, "true false").unwrap_err();
        assert!(err.is_parsing());
    }

    #[test]
    fn text_is_single_line() {
        let config = crate::config::ContextConfig {
            text_width: 10,
            ..Default::default()
        };
        let ctx = Context::with_config(config).unwrap();
        let a = Integral::<u32>::symbol(&ctx, "alpha").unwrap();
        let b = Integral::<u32>::symbol(&ctx, "beta").unwrap();
        let text = (a * b).text();
        assert!(!text.contains('\n'));
        assert!(text.starts_with("(bvmul "));
    }
}
