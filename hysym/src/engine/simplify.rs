//! Routine simplifier.
//!
//! [`simplify`] rewrites a term bottom-up into a canonical form: constants are folded,
//! associative-commutative operators are flattened with their arguments sorted (literals
//! first, then by structural hash), neutral and absorbing elements are removed, and slices
//! of concatenations or extensions are resolved. Two terms that are equal modulo these
//! rules simplify to the same node.
use std::collections::{HashMap, HashSet};

use log::trace;
use smallvec::SmallVec;

use super::{
    AstKey, Node, Op, Store,
    bits::{self, mask},
};

/// Simplify `root` and every sub-term of it.
pub fn simplify(store: &mut Store, root: AstKey) -> AstKey {
    enum Frame {
        Enter(AstKey),
        Exit(AstKey),
    }

    let mut cache: HashMap<AstKey, AstKey> = HashMap::new();
    let mut stack = vec![Frame::Enter(root)];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(key) => {
                if cache.contains_key(&key) {
                    continue;
                }
                stack.push(Frame::Exit(key));
                for &child in store.args(key).iter().rev() {
                    if !cache.contains_key(&child) {
                        stack.push(Frame::Enter(child));
                    }
                }
            }
            Frame::Exit(key) => {
                if cache.contains_key(&key) {
                    continue;
                }
                let node = store.node(key).clone();
                let args: SmallVec<[AstKey; 3]> = node.args().iter().map(|c| cache[c]).collect();
                let simplified = match node {
                    Node::Op { op, .. } => rewrite(store, op, &args),
                    Node::App { decl, .. } => store.mk_app(decl, &args),
                    Node::Bool(_) | Node::Numeral { .. } | Node::Const { .. } => key,
                };
                cache.insert(key, simplified);
            }
        }
    }

    let result = cache[&root];
    if result != root {
        trace!("Simplified {root:?} into {result:?}.");
    }
    result
}

/// Build `op(args)` in canonical form, assuming every argument is already simplified.
pub fn rewrite(store: &mut Store, op: Op, args: &[AstKey]) -> AstKey {
    let rewritten = match op {
        Op::Not => rewrite_not(store, args[0]),
        Op::And => Some(rewrite_junction(store, Op::And, args)),
        Op::Or => Some(rewrite_junction(store, Op::Or, args)),
        Op::Xor => Some(rewrite_xor(store, args[0], args[1])),
        Op::Implies => {
            let premise = rewrite(store, Op::Not, &[args[0]]);
            Some(rewrite(store, Op::Or, &[premise, args[1]]))
        }
        Op::Eq => Some(rewrite_eq(store, args[0], args[1])),
        Op::Ite => rewrite_ite(store, args[0], args[1], args[2]),
        Op::BvNeg => rewrite_involution(store, op, args[0], bits::neg),
        Op::BvNot => rewrite_involution(store, op, args[0], bits::not),
        Op::BvAdd => Some(rewrite_add(store, args)),
        Op::BvSub => Some(rewrite_sub(store, args[0], args[1])),
        Op::BvMul => Some(rewrite_mul(store, args)),
        Op::BvAnd | Op::BvOr | Op::BvXor => Some(rewrite_bitwise(store, op, args)),
        Op::BvUDiv | Op::BvSDiv | Op::BvURem | Op::BvSRem => {
            rewrite_division(store, op, args[0], args[1])
        }
        Op::BvShl | Op::BvLShr => rewrite_shift(store, op, args[0], args[1]),
        Op::BvULt | Op::BvSLt => rewrite_comparison(store, op, args[0], args[1]),
        Op::Concat => rewrite_concat(store, args[0], args[1]),
        Op::Extract { hi, lo } => rewrite_extract(store, hi, lo, args[0]),
        Op::ZeroExt { by } => rewrite_zero_ext(store, by, args[0]),
        Op::SignExt { by } => rewrite_sign_ext(store, by, args[0]),
    };
    rewritten.unwrap_or_else(|| store.mk_op(op, args))
}

#[inline]
fn width(store: &Store, key: AstKey) -> u32 {
    store.sort(key).bits()
}

/// Order arguments of a commutative operator: literals first, then by structural hash.
fn sort_args(store: &Store, args: &mut [AstKey]) {
    args.sort_by_key(|&k| (!store.is_literal(k), store.ast_hash(k), k));
}

/// Operand of `op(operand)` if `key` is such an application.
fn unary_operand(store: &Store, key: AstKey, op: Op) -> Option<AstKey> {
    match store.node(key) {
        Node::Op { op: inner, args } if *inner == op => Some(args[0]),
        _ => None,
    }
}

/// Arguments of `op(args)` flattened through nested applications of the same operator.
fn flatten(store: &Store, op: Op, args: &[AstKey]) -> Vec<AstKey> {
    let mut flat = Vec::with_capacity(args.len());
    let mut stack: Vec<AstKey> = args.iter().rev().copied().collect();
    while let Some(arg) = stack.pop() {
        match store.node(arg) {
            Node::Op { op: inner, args } if *inner == op => {
                stack.extend(args.iter().rev().copied());
            }
            _ => flat.push(arg),
        }
    }
    flat
}

fn finish_commutative(store: &mut Store, op: Op, mut args: Vec<AstKey>) -> AstKey {
    if args.len() == 1 {
        return args[0];
    }
    sort_args(store, &mut args);
    store.mk_op(op, &args)
}

fn rewrite_not(store: &mut Store, a: AstKey) -> Option<AstKey> {
    if let Some(value) = store.bool_value(a) {
        return Some(store.mk_bool(!value));
    }
    unary_operand(store, a, Op::Not)
}

fn rewrite_junction(store: &mut Store, op: Op, args: &[AstKey]) -> AstKey {
    // `and` drops `true` and collapses on `false`, `or` the other way around.
    let unit = op == Op::And;

    let mut seen = HashSet::new();
    let mut terms = Vec::new();
    for arg in flatten(store, op, args) {
        match store.bool_value(arg) {
            Some(value) if value == unit => {}
            Some(_) => return store.mk_bool(!unit),
            None => {
                if seen.insert(arg) {
                    terms.push(arg);
                }
            }
        }
    }

    let complementary = terms
        .iter()
        .any(|&t| unary_operand(store, t, Op::Not).is_some_and(|inner| seen.contains(&inner)));
    if complementary {
        return store.mk_bool(!unit);
    }

    if terms.is_empty() {
        return store.mk_bool(unit);
    }
    finish_commutative(store, op, terms)
}

fn rewrite_xor(store: &mut Store, a: AstKey, b: AstKey) -> AstKey {
    if a == b {
        return store.mk_false();
    }
    match (store.bool_value(a), store.bool_value(b)) {
        (Some(x), Some(y)) => store.mk_bool(x != y),
        (Some(false), None) => b,
        (None, Some(false)) => a,
        (Some(true), None) => rewrite(store, Op::Not, &[b]),
        (None, Some(true)) => rewrite(store, Op::Not, &[a]),
        (None, None) => finish_commutative(store, Op::Xor, vec![a, b]),
    }
}

fn rewrite_eq(store: &mut Store, a: AstKey, b: AstKey) -> AstKey {
    if a == b {
        return store.mk_true();
    }
    if store.is_literal(a) && store.is_literal(b) {
        return store.mk_false();
    }
    if let Some(folded) = fold_ite_eq(store, a, b).or_else(|| fold_ite_eq(store, b, a)) {
        return folded;
    }
    match (store.bool_value(a), store.bool_value(b)) {
        (Some(true), _) => b,
        (_, Some(true)) => a,
        (Some(false), _) => rewrite(store, Op::Not, &[b]),
        (_, Some(false)) => rewrite(store, Op::Not, &[a]),
        (None, None) => finish_commutative(store, Op::Eq, vec![a, b]),
    }
}

/// `ite(c, x, y) = k` with literal `x`, `y` and `k` becomes `ite(c, x = k, y = k)`.
fn fold_ite_eq(store: &mut Store, ite: AstKey, k: AstKey) -> Option<AstKey> {
    if !store.is_literal(k) {
        return None;
    }
    let &[c, x, y] = store.args(ite) else {
        return None;
    };
    if !matches!(store.node(ite), Node::Op { op: Op::Ite, .. })
        || !store.is_literal(x)
        || !store.is_literal(y)
    {
        return None;
    }
    let then = store.mk_bool(x == k);
    let otherwise = store.mk_bool(y == k);
    Some(rewrite(store, Op::Ite, &[c, then, otherwise]))
}

fn rewrite_ite(store: &mut Store, c: AstKey, t: AstKey, e: AstKey) -> Option<AstKey> {
    if let Some(condition) = store.bool_value(c) {
        return Some(if condition { t } else { e });
    }
    if t == e {
        return Some(t);
    }
    match (store.bool_value(t), store.bool_value(e)) {
        (Some(true), Some(false)) => return Some(c),
        (Some(false), Some(true)) => return Some(rewrite(store, Op::Not, &[c])),
        _ => {}
    }
    unary_operand(store, c, Op::Not).map(|inner| store.mk_ite(inner, e, t))
}

/// `neg` and `bvnot`: fold numerals and cancel double application.
fn rewrite_involution(
    store: &mut Store,
    op: Op,
    a: AstKey,
    fold: fn(u128, u32) -> u128,
) -> Option<AstKey> {
    let w = width(store, a);
    if let Some(value) = store.numeral(a) {
        return Some(store.mk_numeral(w, fold(value, w)));
    }
    unary_operand(store, a, op)
}

fn rewrite_add(store: &mut Store, args: &[AstKey]) -> AstKey {
    let w = width(store, args[0]);
    let mut constant = 0;
    let mut terms = Vec::new();
    for arg in flatten(store, Op::BvAdd, args) {
        match store.numeral(arg) {
            Some(value) => constant = bits::add(constant, value, w),
            None => terms.push(arg),
        }
    }

    // x + (-x)
    let mut i = 0;
    while i < terms.len() {
        let cancelled = unary_operand(store, terms[i], Op::BvNeg)
            .and_then(|inner| terms.iter().position(|&t| t == inner));
        match cancelled {
            Some(j) => {
                let (first, second) = if i < j { (i, j) } else { (j, i) };
                terms.remove(second);
                terms.remove(first);
                i = 0;
            }
            None => i += 1,
        }
    }

    if constant != 0 || terms.is_empty() {
        terms.push(store.mk_numeral(w, constant));
    }
    finish_commutative(store, Op::BvAdd, terms)
}

fn rewrite_sub(store: &mut Store, a: AstKey, b: AstKey) -> AstKey {
    let w = width(store, a);
    if a == b {
        return store.mk_numeral(w, 0);
    }
    let negated = rewrite(store, Op::BvNeg, &[b]);
    rewrite(store, Op::BvAdd, &[a, negated])
}

fn rewrite_mul(store: &mut Store, args: &[AstKey]) -> AstKey {
    let w = width(store, args[0]);
    let mut constant = 1;
    let mut terms = Vec::new();
    for arg in flatten(store, Op::BvMul, args) {
        match store.numeral(arg) {
            Some(value) => constant = bits::mul(constant, value, w),
            None => terms.push(arg),
        }
    }

    if constant == 0 {
        return store.mk_numeral(w, 0);
    }
    if constant != 1 || terms.is_empty() {
        terms.push(store.mk_numeral(w, constant));
    }
    finish_commutative(store, Op::BvMul, terms)
}

fn rewrite_bitwise(store: &mut Store, op: Op, args: &[AstKey]) -> AstKey {
    let w = width(store, args[0]);
    let ones = mask(w);
    let mut constant = if op == Op::BvAnd { ones } else { 0 };

    let mut terms: Vec<AstKey> = Vec::new();
    for arg in flatten(store, op, args) {
        if let Some(value) = store.numeral(arg) {
            constant = match op {
                Op::BvAnd => constant & value,
                Op::BvOr => constant | value,
                _ => constant ^ value,
            };
        } else if let Some(position) = terms.iter().position(|&t| t == arg) {
            // x & x = x, x | x = x, x ^ x = 0
            if op == Op::BvXor {
                terms.remove(position);
            }
        } else {
            terms.push(arg);
        }
    }

    if op != Op::BvXor {
        let complementary = terms.iter().any(|&t| {
            unary_operand(store, t, Op::BvNot).is_some_and(|inner| terms.contains(&inner))
        });
        // x & ~x = 0, x | ~x = ~0
        if complementary {
            constant = if op == Op::BvAnd { 0 } else { ones };
        }
        let absorbing = if op == Op::BvAnd { 0 } else { ones };
        if constant == absorbing {
            return store.mk_numeral(w, absorbing);
        }
    }

    let neutral = if op == Op::BvAnd { ones } else { 0 };
    if constant != neutral || terms.is_empty() {
        terms.push(store.mk_numeral(w, constant));
    }
    finish_commutative(store, op, terms)
}

fn rewrite_division(store: &mut Store, op: Op, a: AstKey, b: AstKey) -> Option<AstKey> {
    let w = width(store, a);
    match (store.numeral(a), store.numeral(b)) {
        (Some(x), Some(y)) => {
            let fold = match op {
                Op::BvUDiv => bits::udiv,
                Op::BvSDiv => bits::sdiv,
                Op::BvURem => bits::urem,
                _ => bits::srem,
            };
            Some(store.mk_numeral(w, fold(x, y, w)))
        }
        (_, Some(1)) => Some(match op {
            Op::BvUDiv | Op::BvSDiv => a,
            _ => store.mk_numeral(w, 0),
        }),
        _ => None,
    }
}

fn rewrite_shift(store: &mut Store, op: Op, a: AstKey, b: AstKey) -> Option<AstKey> {
    let w = width(store, a);
    let fold = if op == Op::BvShl { bits::shl } else { bits::lshr };
    match (store.numeral(a), store.numeral(b)) {
        (Some(x), Some(y)) => Some(store.mk_numeral(w, fold(x, y, w))),
        (_, Some(0)) | (Some(0), _) => Some(a),
        (_, Some(y)) if y >= w as u128 => Some(store.mk_numeral(w, 0)),
        _ => None,
    }
}

fn rewrite_comparison(store: &mut Store, op: Op, a: AstKey, b: AstKey) -> Option<AstKey> {
    let w = width(store, a);
    if a == b {
        return Some(store.mk_false());
    }
    match (store.numeral(a), store.numeral(b)) {
        (Some(x), Some(y)) => {
            let holds = if op == Op::BvULt {
                bits::ult(x, y, w)
            } else {
                bits::slt(x, y, w)
            };
            Some(store.mk_bool(holds))
        }
        (_, Some(0)) if op == Op::BvULt => Some(store.mk_false()),
        _ => None,
    }
}

fn rewrite_extract(store: &mut Store, hi: u32, lo: u32, a: AstKey) -> Option<AstKey> {
    let w = width(store, a);
    if lo == 0 && hi + 1 == w {
        return Some(a);
    }

    match store.node(a).clone() {
        Node::Numeral { value, .. } => Some(store.mk_numeral(hi - lo + 1, bits::extract(value, hi, lo))),
        Node::Op {
            op: Op::Extract { lo: inner_lo, .. },
            args,
        } => Some(rewrite(
            store,
            Op::Extract {
                hi: hi + inner_lo,
                lo: lo + inner_lo,
            },
            &[args[0]],
        )),
        Node::Op {
            op: Op::Concat,
            args,
        } => {
            let low_width = width(store, args[1]);
            if hi < low_width {
                Some(rewrite(store, Op::Extract { hi, lo }, &[args[1]]))
            } else if lo >= low_width {
                Some(rewrite(
                    store,
                    Op::Extract {
                        hi: hi - low_width,
                        lo: lo - low_width,
                    },
                    &[args[0]],
                ))
            } else {
                None
            }
        }
        Node::Op {
            op: Op::ZeroExt { .. },
            args,
        } => {
            let inner_width = width(store, args[0]);
            if hi < inner_width {
                Some(rewrite(store, Op::Extract { hi, lo }, &[args[0]]))
            } else if lo >= inner_width {
                Some(store.mk_numeral(hi - lo + 1, 0))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn rewrite_concat(store: &mut Store, high: AstKey, low: AstKey) -> Option<AstKey> {
    if let (Some(x), Some(y)) = (store.numeral(high), store.numeral(low)) {
        let low_width = width(store, low);
        let w = width(store, high) + low_width;
        return Some(store.mk_numeral(w, bits::concat(x, y, low_width)));
    }

    // Adjacent slices of the same term.
    match (store.node(high), store.node(low)) {
        (
            Node::Op {
                op: Op::Extract { hi, lo: mid_hi },
                args: high_args,
            },
            Node::Op {
                op: Op::Extract { hi: mid_lo, lo },
                args: low_args,
            },
        ) if high_args[0] == low_args[0] && *mid_hi == *mid_lo + 1 => {
            let (hi, lo, source) = (*hi, *lo, high_args[0]);
            Some(rewrite(store, Op::Extract { hi, lo }, &[source]))
        }
        _ => None,
    }
}

/// Width of `a` extended by `by` bits, if it stays representable.
fn extended_width(store: &Store, by: u32, a: AstKey) -> Option<u32> {
    width(store, a)
        .checked_add(by)
        .filter(|&w| w <= super::MAX_WIDTH)
}

fn rewrite_zero_ext(store: &mut Store, by: u32, a: AstKey) -> Option<AstKey> {
    if by == 0 {
        return Some(a);
    }
    let w = extended_width(store, by, a)?;
    if let Some(value) = store.numeral(a) {
        return Some(store.mk_numeral(w, value));
    }
    match store.node(a) {
        Node::Op {
            op: Op::ZeroExt { by: inner },
            args,
        } => {
            let (total, source) = (by.checked_add(*inner)?, args[0]);
            Some(store.mk_zero_ext(total, source))
        }
        _ => None,
    }
}

fn rewrite_sign_ext(store: &mut Store, by: u32, a: AstKey) -> Option<AstKey> {
    if by == 0 {
        return Some(a);
    }
    let w = extended_width(store, by, a)?;
    if let Some(value) = store.numeral(a) {
        return Some(store.mk_numeral(w, bits::sign_extend(value, w - by, by)));
    }
    match store.node(a) {
        Node::Op {
            op: Op::SignExt { by: inner },
            args,
        } => {
            let (total, source) = (by.checked_add(*inner)?, args[0]);
            Some(store.mk_sign_ext(total, source))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Sort;

    fn bv(store: &mut Store, name: &str) -> AstKey {
        store.mk_const(name, Sort::BitVec(8))
    }

    #[test]
    fn constants_are_folded() {
        let mut store = Store::new();
        let x = bv(&mut store, "x");
        let three = store.mk_numeral(8, 3);
        let five = store.mk_numeral(8, 5);
        let sum = store.mk_op(Op::BvAdd, &[three, x, five]);
        let simplified = simplify(&mut store, sum);
        let eight = store.mk_numeral(8, 8);
        assert_eq!(store.args(simplified), &[eight, x]);

        let product = store.mk_op(Op::BvMul, &[three, five]);
        assert_eq!(simplify(&mut store, product), store.mk_numeral(8, 15));
    }

    #[test]
    fn commutative_arguments_are_canonical() {
        let mut store = Store::new();
        let x = bv(&mut store, "x");
        let y = bv(&mut store, "y");
        let a = store.mk_op(Op::BvAnd, &[x, y]);
        let b = store.mk_op(Op::BvAnd, &[y, x]);
        assert_eq!(simplify(&mut store, a), simplify(&mut store, b));
    }

    #[test]
    fn subtraction_cancels() {
        let mut store = Store::new();
        let x = bv(&mut store, "x");
        let y = bv(&mut store, "y");
        let sum = store.mk_op(Op::BvAdd, &[x, y]);
        let difference = store.mk_op(Op::BvSub, &[sum, y]);
        assert_eq!(simplify(&mut store, difference), x);
    }

    #[test]
    fn boolean_rules() {
        let mut store = Store::new();
        let p = store.mk_const("p", Sort::Bool);
        let q = store.mk_const("q", Sort::Bool);
        let not_p = store.mk_not(p);
        let contradiction = store.mk_and(&[p, q, not_p]);
        assert_eq!(simplify(&mut store, contradiction), store.mk_false());

        let t = store.mk_true();
        let conj = store.mk_and(&[t, p, p]);
        assert_eq!(simplify(&mut store, conj), p);

        let implication = store.mk_op(Op::Implies, &[p, p]);
        assert_eq!(simplify(&mut store, implication), store.mk_true());

        let f = store.mk_false();
        let ite = store.mk_ite(p, t, f);
        assert_eq!(simplify(&mut store, ite), p);

        let one = store.mk_numeral(8, 1);
        let zero = store.mk_numeral(8, 0);
        let selected = store.mk_ite(p, one, zero);
        let is_zero = store.mk_eq(selected, zero);
        let nonzero = store.mk_not(is_zero);
        assert_eq!(simplify(&mut store, nonzero), p);
    }

    #[test]
    fn slices_of_concatenations() {
        let mut store = Store::new();
        let x = store.mk_const("x", Sort::BitVec(16));
        let high = store.mk_extract(15, 8, x);
        let low = store.mk_extract(7, 0, x);
        let joined = store.mk_concat(high, low);
        assert_eq!(simplify(&mut store, joined), x);

        let y = bv(&mut store, "y");
        let z = bv(&mut store, "z");
        let pair = store.mk_concat(y, z);
        let top = store.mk_extract(15, 8, pair);
        assert_eq!(simplify(&mut store, top), y);

        let widened = store.mk_zero_ext(8, y);
        let back = store.mk_extract(7, 0, widened);
        assert_eq!(simplify(&mut store, back), y);
        let upper = store.mk_extract(15, 8, widened);
        assert_eq!(simplify(&mut store, upper), store.mk_numeral(8, 0));
    }

    #[test]
    fn division_and_shifts() {
        let mut store = Store::new();
        let x = bv(&mut store, "x");
        let one = store.mk_numeral(8, 1);
        let zero = store.mk_numeral(8, 0);
        let nine = store.mk_numeral(8, 9);

        let div = store.mk_op(Op::BvUDiv, &[x, one]);
        assert_eq!(simplify(&mut store, div), x);
        let rem = store.mk_op(Op::BvSRem, &[x, one]);
        assert_eq!(simplify(&mut store, rem), zero);
        let by_zero = store.mk_op(Op::BvUDiv, &[nine, zero]);
        assert_eq!(simplify(&mut store, by_zero), store.mk_numeral(8, 0xff));
        let shifted = store.mk_op(Op::BvShl, &[x, nine]);
        assert_eq!(simplify(&mut store, shifted), zero);
        let below_zero = store.mk_op(Op::BvULt, &[x, zero]);
        assert_eq!(simplify(&mut store, below_zero), store.mk_false());
    }
}
