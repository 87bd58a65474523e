//! Ingestion of SMT-LIB 2 text using chumsky.
//!
//! Two stages:
//! 1) Reading the text into spanned s-expressions.
//! 2) Elaborating commands and terms against a [`Store`], checking sorts on the way.
//!
//! Supported commands are `declare-const`, `declare-fun`, nullary `define-fun` and `assert`.
//! `set-logic`, `set-option`, `set-info`, `check-sat`, `get-model` and `exit` are accepted
//! and ignored; any other top-level s-expression is read as a bare term. The result is the
//! list of asserted formulas and bare terms, in order.
//!
//! Terms use the core operators plus `distinct` and the derived comparisons `bvule`,
//! `bvsle`, `bvugt`, `bvsgt`, `bvuge` and `bvsge`. Numerals are written `#x..`, `#b..` or
//! `(_ bvN w)`; indexed operators as `((_ extract i j) t)`, `((_ zero_extend k) t)` and
//! `((_ sign_extend k) t)`.
use std::{collections::HashMap, str::FromStr};

use chumsky::prelude::*;
use log::debug;

use super::{AstKey, DeclKey, MAX_WIDTH, Op, Sort, Store};
use crate::error::{Error, Result};

type Spanned<T> = (T, SimpleSpan);

#[derive(Debug, Clone, PartialEq, Eq)]
enum SExpr {
    Atom(String),
    /// `|...|` symbol.
    Quoted(String),
    /// `"..."` string, only meaningful as a command attribute.
    Literal(String),
    List(Vec<Spanned<SExpr>>),
}

// ---------------- Reader ----------------

fn reader<'a>() -> impl Parser<'a, &'a str, Vec<Spanned<SExpr>>, extra::Err<Rich<'a, char>>> {
    // Comments are single-line starting with ';'
    let comment = just(';')
        .then(any().and_is(just("\n").not()).repeated())
        .padded()
        .to(());

    let sexpr = recursive(|sexpr| {
        let quoted = any()
            .and_is(just('|').not())
            .repeated()
            .to_slice()
            .delimited_by(just('|'), just('|'))
            .map(|s: &str| SExpr::Quoted(s.to_string()));

        let literal = any()
            .and_is(just('"').not())
            .repeated()
            .to_slice()
            .delimited_by(just('"'), just('"'))
            .map(|s: &str| SExpr::Literal(s.to_string()));

        let atom = any()
            .filter(|c: &char| !c.is_whitespace() && !"();|\"".contains(*c))
            .repeated()
            .at_least(1)
            .to_slice()
            .map(|s: &str| SExpr::Atom(s.to_string()));

        let list = sexpr
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just('('), just(')'))
            .map(SExpr::List);

        choice((list, quoted, literal, atom))
            .map_with(|e, extra| (e, extra.span()))
            .padded_by(comment.clone().repeated())
            .padded()
    });

    sexpr
        .repeated()
        .collect()
        .padded_by(comment.repeated())
        .padded()
        .then_ignore(end())
}

// ---------------- Elaboration ----------------

fn error_at(span: SimpleSpan, message: impl std::fmt::Display) -> Error {
    Error::parsing(format!("{message} at {}..{}", span.start, span.end))
}

fn parse_width(text: &str, span: SimpleSpan) -> Result<u32> {
    match text.parse::<u32>() {
        Ok(width) if (1..=MAX_WIDTH).contains(&width) => Ok(width),
        _ => Err(error_at(
            span,
            format!("invalid bit-vector width `{text}` (expected 1 to {MAX_WIDTH})"),
        )),
    }
}

fn parse_index(text: &str, span: SimpleSpan) -> Result<u32> {
    text.parse::<u32>()
        .map_err(|_| error_at(span, format!("invalid index `{text}`")))
}

fn name_of((expr, span): &Spanned<SExpr>) -> Result<&str> {
    match expr {
        SExpr::Atom(name) | SExpr::Quoted(name) if !name.is_empty() => Ok(name.as_str()),
        _ => Err(error_at(*span, "expected a symbol")),
    }
}

struct Elaborator<'s> {
    store: &'s mut Store,
    consts: HashMap<String, Sort>,
    funs: HashMap<String, DeclKey>,
    defs: HashMap<String, AstKey>,
    terms: Vec<AstKey>,
}

impl<'s> Elaborator<'s> {
    fn new(store: &'s mut Store) -> Self {
        Self {
            store,
            consts: HashMap::new(),
            funs: HashMap::new(),
            defs: HashMap::new(),
            terms: Vec::new(),
        }
    }

    fn declare(&self, name: &str, span: SimpleSpan) -> Result<()> {
        if self.consts.contains_key(name)
            || self.funs.contains_key(name)
            || self.defs.contains_key(name)
        {
            return Err(error_at(span, format!("`{name}` is already declared")));
        }
        Ok(())
    }

    fn command(&mut self, item: &Spanned<SExpr>) -> Result<()> {
        let (expr, span) = item;
        if let SExpr::List(items) = expr {
            if let Some((SExpr::Atom(head), _)) = items.first() {
                match head.as_str() {
                    "declare-const" => return self.declare_const(&items[1..], *span),
                    "declare-fun" => return self.declare_fun(&items[1..], *span),
                    "define-fun" => return self.define_fun(&items[1..], *span),
                    "assert" => return self.assert(&items[1..], *span),
                    "set-logic" | "set-option" | "set-info" | "check-sat" | "get-model"
                    | "exit" => return Ok(()),
                    _ => {}
                }
            }
        }

        let term = self.term(item)?;
        self.terms.push(term);
        Ok(())
    }

    fn declare_const(&mut self, items: &[Spanned<SExpr>], span: SimpleSpan) -> Result<()> {
        let [name, sort] = items else {
            return Err(error_at(span, "expected `(declare-const name sort)`"));
        };
        let name = name_of(name)?;
        self.declare(name, span)?;
        let sort = self.sort(sort)?;
        self.consts.insert(name.to_string(), sort);
        Ok(())
    }

    fn declare_fun(&mut self, items: &[Spanned<SExpr>], span: SimpleSpan) -> Result<()> {
        let [name, (SExpr::List(domain), _), range] = items else {
            return Err(error_at(span, "expected `(declare-fun name (sorts) sort)`"));
        };
        let name = name_of(name)?;
        self.declare(name, span)?;
        let domain = domain
            .iter()
            .map(|sort| self.sort(sort))
            .collect::<Result<Vec<_>>>()?;
        let range = self.sort(range)?;

        if domain.is_empty() {
            self.consts.insert(name.to_string(), range);
        } else {
            let decl = self.store.mk_func_decl(name, &domain, range);
            self.funs.insert(name.to_string(), decl);
        }
        Ok(())
    }

    fn define_fun(&mut self, items: &[Spanned<SExpr>], span: SimpleSpan) -> Result<()> {
        let [name, (SExpr::List(params), params_span), sort, body] = items else {
            return Err(error_at(span, "expected `(define-fun name () sort term)`"));
        };
        if !params.is_empty() {
            return Err(error_at(*params_span, "only nullary definitions are supported"));
        }
        let name = name_of(name)?;
        self.declare(name, span)?;
        let sort = self.sort(sort)?;
        let body_span = body.1;
        let body = self.term(body)?;
        self.expect_sort(body, sort, body_span)?;
        self.defs.insert(name.to_string(), body);
        Ok(())
    }

    fn assert(&mut self, items: &[Spanned<SExpr>], span: SimpleSpan) -> Result<()> {
        let [formula] = items else {
            return Err(error_at(span, "expected `(assert formula)`"));
        };
        let formula_span = formula.1;
        let formula = self.term(formula)?;
        self.expect_sort(formula, Sort::Bool, formula_span)?;
        self.terms.push(formula);
        Ok(())
    }

    fn expect_sort(&self, term: AstKey, expected: Sort, span: SimpleSpan) -> Result<()> {
        let found = self.store.sort(term);
        if found != expected {
            return Err(error_at(
                span,
                format!("expected a term of sort {expected}, found {found}"),
            ));
        }
        Ok(())
    }

    fn sort(&self, (expr, span): &Spanned<SExpr>) -> Result<Sort> {
        match expr {
            SExpr::Atom(name) if name == "Bool" => Ok(Sort::Bool),
            SExpr::List(items) => match items.as_slice() {
                [
                    (SExpr::Atom(underscore), _),
                    (SExpr::Atom(bitvec), _),
                    (SExpr::Atom(width), width_span),
                ] if underscore == "_" && bitvec == "BitVec" => {
                    Ok(Sort::BitVec(parse_width(width, *width_span)?))
                }
                _ => Err(error_at(*span, "expected a sort")),
            },
            _ => Err(error_at(*span, "expected a sort")),
        }
    }

    fn term(&mut self, (expr, span): &Spanned<SExpr>) -> Result<AstKey> {
        match expr {
            SExpr::Atom(atom) => self.atom(atom, *span),
            SExpr::Quoted(name) => self.symbol(name, *span),
            SExpr::Literal(_) => Err(error_at(*span, "string literals are not terms")),
            SExpr::List(items) => self.application(items, *span),
        }
    }

    fn atom(&mut self, atom: &str, span: SimpleSpan) -> Result<AstKey> {
        if atom == "true" {
            Ok(self.store.mk_true())
        } else if atom == "false" {
            Ok(self.store.mk_false())
        } else if let Some(digits) = atom.strip_prefix("#x") {
            self.numeral(digits, 16, 4, span)
        } else if let Some(digits) = atom.strip_prefix("#b") {
            self.numeral(digits, 2, 1, span)
        } else {
            self.symbol(atom, span)
        }
    }

    fn numeral(
        &mut self,
        digits: &str,
        radix: u32,
        bits_per_digit: u32,
        span: SimpleSpan,
    ) -> Result<AstKey> {
        let width = digits.len() as u32 * bits_per_digit;
        if digits.is_empty() || width > MAX_WIDTH {
            return Err(error_at(span, format!("invalid numeral width {width}")));
        }
        let value = u128::from_str_radix(digits, radix)
            .map_err(|e| error_at(span, format!("invalid numeral: {e}")))?;
        Ok(self.store.mk_numeral(width, value))
    }

    fn symbol(&mut self, name: &str, span: SimpleSpan) -> Result<AstKey> {
        if let Some(&definition) = self.defs.get(name) {
            return Ok(definition);
        }
        if let Some(&sort) = self.consts.get(name) {
            return Ok(self.store.mk_const(name, sort));
        }
        Err(error_at(span, format!("unknown symbol `{name}`")))
    }

    fn terms(&mut self, items: &[Spanned<SExpr>]) -> Result<Vec<AstKey>> {
        items.iter().map(|item| self.term(item)).collect()
    }

    fn application(&mut self, items: &[Spanned<SExpr>], span: SimpleSpan) -> Result<AstKey> {
        let Some(((head, head_span), rest)) = items.split_first() else {
            return Err(error_at(span, "empty application"));
        };

        match head {
            SExpr::Atom(underscore) if underscore == "_" => self.indexed_numeral(rest, span),
            SExpr::List(index) => {
                let op = self.indexed_op(index, *head_span)?;
                let args = self.terms(rest)?;
                self.build(op, &args, span)
            }
            SExpr::Atom(name) | SExpr::Quoted(name) => {
                if let Some(&decl) = self.funs.get(name.as_str()) {
                    let args = self.terms(rest)?;
                    let expected = &self.store.decl(decl).domain;
                    let well_sorted = expected.len() == args.len()
                        && expected.iter().zip(&args).all(|(s, a)| *s == self.store.sort(*a));
                    if !well_sorted {
                        return Err(error_at(span, format!("ill-sorted application of `{name}`")));
                    }
                    return Ok(self.store.mk_app(decl, &args));
                }
                let args = self.terms(rest)?;
                self.builtin(name, &args, span)
            }
            SExpr::Literal(_) => Err(error_at(*head_span, "expected a function name")),
        }
    }

    /// `(_ bvN w)`
    fn indexed_numeral(&mut self, rest: &[Spanned<SExpr>], span: SimpleSpan) -> Result<AstKey> {
        let [(SExpr::Atom(value), value_span), (SExpr::Atom(width), width_span)] = rest else {
            return Err(error_at(span, "expected `(_ bvN width)`"));
        };
        let value = value
            .strip_prefix("bv")
            .and_then(|digits| digits.parse::<u128>().ok())
            .ok_or_else(|| error_at(*value_span, format!("invalid numeral `{value}`")))?;
        let width = parse_width(width, *width_span)?;
        Ok(self.store.mk_numeral(width, value))
    }

    /// `(_ extract i j)`, `(_ zero_extend k)`, `(_ sign_extend k)`
    fn indexed_op(&self, index: &[Spanned<SExpr>], span: SimpleSpan) -> Result<Op> {
        match index {
            [(SExpr::Atom(underscore), _), (SExpr::Atom(name), _), indices @ ..]
                if underscore == "_" =>
            {
                let indices = indices
                    .iter()
                    .map(|(expr, span)| match expr {
                        SExpr::Atom(text) => parse_index(text, *span),
                        _ => Err(error_at(*span, "expected an index")),
                    })
                    .collect::<Result<Vec<_>>>()?;
                match (name.as_str(), indices.as_slice()) {
                    ("extract", &[hi, lo]) => Ok(Op::Extract { hi, lo }),
                    ("zero_extend", &[by]) => Ok(Op::ZeroExt { by }),
                    ("sign_extend", &[by]) => Ok(Op::SignExt { by }),
                    _ => Err(error_at(span, format!("unknown indexed operator `{name}`"))),
                }
            }
            _ => Err(error_at(span, "expected an indexed operator")),
        }
    }

    fn build(&mut self, op: Op, args: &[AstKey], span: SimpleSpan) -> Result<AstKey> {
        self.store
            .try_mk_op(op, args)
            .ok_or_else(|| error_at(span, format!("ill-sorted application of `{}`", op.name())))
    }

    fn builtin(&mut self, name: &str, args: &[AstKey], span: SimpleSpan) -> Result<AstKey> {
        // Derived comparisons: (operator, swap operands, negate)
        let derived = match name {
            "bvule" => Some((Op::BvULt, true, true)),
            "bvsle" => Some((Op::BvSLt, true, true)),
            "bvugt" => Some((Op::BvULt, true, false)),
            "bvsgt" => Some((Op::BvSLt, true, false)),
            "bvuge" => Some((Op::BvULt, false, true)),
            "bvsge" => Some((Op::BvSLt, false, true)),
            _ => None,
        };
        if let Some((op, swap, negate)) = derived {
            let &[a, b] = args else {
                return Err(error_at(span, format!("`{name}` expects two arguments")));
            };
            let comparison = if swap {
                self.build(op, &[b, a], span)?
            } else {
                self.build(op, &[a, b], span)?
            };
            return if negate {
                self.build(Op::Not, &[comparison], span)
            } else {
                Ok(comparison)
            };
        }

        if name == "distinct" {
            if args.len() < 2 {
                return Err(error_at(span, "`distinct` expects at least two arguments"));
            }
            let mut pairs = Vec::new();
            for (i, &a) in args.iter().enumerate() {
                for &b in &args[i + 1..] {
                    let equal = self.build(Op::Eq, &[a, b], span)?;
                    pairs.push(self.build(Op::Not, &[equal], span)?);
                }
            }
            return self.chain(Op::And, &pairs, span);
        }

        match Op::from_str(name) {
            Ok(op) if op.indices().is_empty() => self.chain(op, args, span),
            _ => Err(error_at(span, format!("unknown function `{name}`"))),
        }
    }

    /// Apply `op` to `args`, expanding the n-ary forms SMT-LIB allows for binary operators.
    fn chain(&mut self, op: Op, args: &[AstKey], span: SimpleSpan) -> Result<AstKey> {
        match op {
            Op::And | Op::Or if args.len() == 1 => {
                self.expect_sort(args[0], Sort::Bool, span)?;
                Ok(args[0])
            }
            Op::And | Op::Or if args.is_empty() => {
                Err(error_at(span, format!("`{}` expects arguments", op.name())))
            }
            Op::Eq if args.len() > 2 => {
                let links = args
                    .windows(2)
                    .map(|pair| self.build(Op::Eq, pair, span))
                    .collect::<Result<Vec<_>>>()?;
                self.build(Op::And, &links, span)
            }
            Op::Implies if args.len() > 2 => {
                let (init, last) = args.split_at(args.len() - 1);
                init.iter()
                    .rev()
                    .try_fold(last[0], |acc, &premise| {
                        self.build(Op::Implies, &[premise, acc], span)
                    })
            }
            Op::Xor | Op::BvSub | Op::Concat if args.len() > 2 => args[1..]
                .iter()
                .try_fold(args[0], |acc, &arg| self.build(op, &[acc, arg], span)),
            op if op.is_associative_commutative() && args.len() < 2 => {
                Err(error_at(span, format!("`{}` expects at least two arguments", op.name())))
            }
            _ => self.build(op, args, span),
        }
    }
}

/// Parse `text` into the asserted formulas and bare terms it contains.
///
/// The returned keys are not acquired: they must be wrapped before the engine call ends.
pub fn parse_terms(store: &mut Store, text: &str) -> Result<Vec<AstKey>> {
    let (items, errors) = reader().parse(text).into_output_errors();
    if !errors.is_empty() {
        let reason = errors
            .iter()
            .map(|e| format!("{e} at {}..{}", e.span().start, e.span().end))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::parsing(reason));
    }
    let items = items.unwrap_or_default();

    let mut elaborator = Elaborator::new(store);
    for item in &items {
        elaborator.command(item)?;
    }
    debug!(
        "Parsed {} term(s) from {} top-level s-expression(s).",
        elaborator.terms.len(),
        items.len()
    );
    Ok(elaborator.terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Node;

    #[test]
    fn reads_declarations_and_assertions() {
        let mut store = Store::new();
        let terms = parse_terms(
            &mut store,
            r#"
            ; a comment
            (set-logic QF_BV)
            (set-info :source "hand written")
            (declare-const x (_ BitVec 8))
            (declare-fun |mem| ((_ BitVec 32)) (_ BitVec 8))
            (define-fun one () (_ BitVec 8) #x01)
            (assert (bvult x (bvadd one (mem #x00000010))))
            (check-sat)
            "#,
        )
        .unwrap();
        assert_eq!(terms.len(), 1);
        assert_eq!(store.sort(terms[0]), Sort::Bool);
        assert!(matches!(store.node(terms[0]), Node::Op { op: Op::BvULt, .. }));
    }

    #[test]
    fn numerals_and_indexed_operators() {
        let mut store = Store::new();
        let terms = parse_terms(
            &mut store,
            "#b101 (_ bv300 16) ((_ extract 7 4) #xab) ((_ zero_extend 8) #xff)",
        )
        .unwrap();
        let sorts: Vec<Sort> = terms.iter().map(|t| store.sort(*t)).collect();
        assert_eq!(
            sorts,
            vec![Sort::BitVec(3), Sort::BitVec(16), Sort::BitVec(4), Sort::BitVec(16)]
        );
        assert_eq!(store.numeral(terms[0]), Some(5));
        assert_eq!(store.numeral(terms[1]), Some(300));
    }

    #[test]
    fn derived_operators() {
        let mut store = Store::new();
        let terms = parse_terms(
            &mut store,
            "(declare-const a (_ BitVec 4)) (declare-const b (_ BitVec 4))
             (bvule a b) (distinct a b #x0) (= a b #x1)",
        )
        .unwrap();
        assert_eq!(terms.len(), 3);
        assert!(matches!(store.node(terms[0]), Node::Op { op: Op::Not, .. }));
        assert!(matches!(store.node(terms[1]), Node::Op { op: Op::And, args } if args.len() == 3));
        assert!(matches!(store.node(terms[2]), Node::Op { op: Op::And, args } if args.len() == 2));
    }

    #[test]
    fn rejects_malformed_text() {
        let mut store = Store::new();
        for text in [
            "(bvadd x",
            "(declare-const x (_ BitVec 8)) (bvadd x true)",
            "(declare-const x (_ BitVec 0))",
            "(declare-const x (_ BitVec 8)) (assert x)",
            "unknown",
            "(frobnicate #x00)",
            "(declare-const x Bool) (declare-const x Bool)",
            "((_ zero_extend 4294967295) #xff)",
            "((_ sign_extend 4294967295) #xff)",
            "((_ zero_extend 121) #xff)",
        ] {
            let err = parse_terms(&mut store, text).unwrap_err();
            assert!(err.is_parsing(), "{text}: {err}");
        }
    }
}
