//! Goals and tactics.
//!
//! A [`Goal`] is a conjunction of formulas. A [`Tactic`] turns a goal into the subgoals of
//! an [`ApplyResult`]; the conjunction of all subgoals is equivalent to the original goal.
use std::collections::HashMap;

use log::debug;

use super::{
    Ast, AstKey, Context, Managed, Node, Op, Sort, Store,
    simplify::{rewrite, simplify},
};

/// A conjunction of boolean formulas.
#[derive(Debug, Clone)]
pub struct Goal {
    ctx: Context,
    formulas: Vec<Managed<Ast>>,
}

impl Goal {
    /// An empty (trivially true) goal.
    pub fn new(ctx: &Context) -> Self {
        Self {
            ctx: ctx.clone(),
            formulas: Vec::new(),
        }
    }

    /// Add `formula` to the conjunction.
    ///
    /// # Panics
    /// If `formula` belongs to another context or is not of sort `Bool`.
    pub fn assert(&mut self, formula: &Managed<Ast>) {
        assert!(
            self.ctx.same(formula.context()),
            "formula asserted into a goal of another context"
        );
        assert_eq!(
            formula.apply(|store, raw| store.sort(raw)),
            Sort::Bool,
            "only formulas can be asserted"
        );
        self.formulas.push(formula.clone());
    }

    #[inline]
    pub fn formulas(&self) -> &[Managed<Ast>] {
        &self.formulas
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    #[inline]
    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

/// Subgoals produced by a [`Tactic`].
#[derive(Debug, Clone)]
pub struct ApplyResult {
    subgoals: Vec<Goal>,
}

impl ApplyResult {
    #[inline]
    pub fn subgoals(&self) -> &[Goal] {
        &self.subgoals
    }

    /// Formulas of every subgoal, in order.
    pub fn formulas(&self) -> impl Iterator<Item = &Managed<Ast>> {
        self.subgoals.iter().flat_map(|goal| goal.formulas())
    }
}

pub trait Tactic {
    fn name(&self) -> &'static str;

    fn apply(&self, goal: &Goal) -> ApplyResult;
}

/// Look up a tactic by name.
pub fn tactic_by_name(name: &str, ctx: &Context) -> Option<Box<dyn Tactic>> {
    match name {
        "simplify" => Some(Box::new(Simplify)),
        "ctx-simplify" => Some(Box::new(CtxSimplify::new(ctx.config().reduce_depth))),
        _ => None,
    }
}

/// Simplify every formula of the goal independently.
#[derive(Debug, Clone, Copy)]
pub struct Simplify;

impl Tactic for Simplify {
    fn name(&self) -> &'static str {
        "simplify"
    }

    fn apply(&self, goal: &Goal) -> ApplyResult {
        let formulas: Vec<AstKey> = goal.formulas.iter().map(|f| f.raw()).collect();
        let mut subgoal = Goal::new(&goal.ctx);
        for formula in formulas {
            subgoal
                .formulas
                .push(Managed::new(&goal.ctx, |store| simplify(store, formula)));
        }
        ApplyResult {
            subgoals: vec![subgoal],
        }
    }
}

/// Contextual simplification.
///
/// The goal is split into its top-level conjuncts and each conjunct is simplified under
/// the assumption that all the others hold. Inside a formula, the arguments of `and`
/// (resp. `or`) are simplified assuming the previous ones true (resp. false), and the
/// branches of `ite` under the condition or its negation. Conjuncts reduced to `true`
/// disappear; a conjunct reduced to `false` replaces the whole goal.
#[derive(Debug, Clone, Copy)]
pub struct CtxSimplify {
    depth: usize,
}

impl CtxSimplify {
    /// Sub-terms nested deeper than `depth` are left untouched.
    pub fn new(depth: usize) -> Self {
        Self { depth }
    }
}

impl Tactic for CtxSimplify {
    fn name(&self) -> &'static str {
        "ctx-simplify"
    }

    fn apply(&self, goal: &Goal) -> ApplyResult {
        let formulas: Vec<AstKey> = goal.formulas.iter().map(|f| f.raw()).collect();
        let reduced = goal.ctx.with_store(|store| {
            let reduced = reduce_conjunction(store, &formulas, self.depth);
            for &formula in &reduced {
                store.inc_ast(formula);
            }
            reduced
        });

        let mut subgoal = Goal::new(&goal.ctx);
        subgoal.formulas.extend(
            reduced
                .into_iter()
                .map(|formula| Managed::adopt(&goal.ctx, formula)),
        );
        debug!(
            "Applied `{}`: {} formula(s) reduced to {}.",
            self.name(),
            formulas.len(),
            subgoal.len()
        );
        ApplyResult {
            subgoals: vec![subgoal],
        }
    }
}

/// Facts assumed while rewriting a formula.
#[derive(Default, Clone)]
struct Assumptions {
    truth: HashMap<AstKey, bool>,
    values: HashMap<AstKey, AstKey>,
}

impl Assumptions {
    /// Record that `formula` evaluates to `polarity`.
    fn learn(&mut self, store: &Store, formula: AstKey, polarity: bool) {
        if store.bool_value(formula).is_some() {
            return;
        }
        match store.node(formula) {
            Node::Op { op: Op::Not, args } => self.learn(store, args[0], !polarity),
            Node::Op { op: Op::And, args } if polarity => {
                for &arg in args {
                    self.learn(store, arg, true);
                }
            }
            Node::Op { op: Op::Or, args } if !polarity => {
                for &arg in args {
                    self.learn(store, arg, false);
                }
            }
            Node::Op { op: Op::Eq, args } => {
                if polarity {
                    let (a, b) = (args[0], args[1]);
                    if store.is_literal(a) && !store.is_literal(b) {
                        self.values.insert(b, a);
                    } else if store.is_literal(b) && !store.is_literal(a) {
                        self.values.insert(a, b);
                    }
                }
                self.truth.insert(formula, polarity);
            }
            _ => {
                self.truth.insert(formula, polarity);
            }
        }
    }

    fn lookup(&self, store: &mut Store, key: AstKey) -> Option<AstKey> {
        if let Some(&value) = self.truth.get(&key) {
            return Some(store.mk_bool(value));
        }
        self.values.get(&key).copied()
    }
}

/// Split `formulas` into conjuncts and simplify each one assuming the others.
fn reduce_conjunction(store: &mut Store, formulas: &[AstKey], depth: usize) -> Vec<AstKey> {
    let mut conjuncts = Vec::new();
    for &formula in formulas {
        let simplified = simplify(store, formula);
        split_conjuncts(store, simplified, &mut conjuncts);
    }

    // Two passes let facts learned late in the first pass reach earlier conjuncts.
    for _ in 0..2 {
        let mut i = 0;
        while i < conjuncts.len() {
            let mut assumptions = Assumptions::default();
            for (j, &other) in conjuncts.iter().enumerate() {
                if j != i {
                    assumptions.learn(store, other, true);
                }
            }

            let reduced = contextual(store, conjuncts[i], &assumptions, depth);
            match store.bool_value(reduced) {
                Some(false) => return vec![reduced],
                Some(true) => {
                    conjuncts.remove(i);
                }
                None => {
                    let mut parts = Vec::new();
                    split_conjuncts(store, reduced, &mut parts);
                    let count = parts.len();
                    conjuncts.splice(i..=i, parts);
                    i += count;
                }
            }
        }
    }
    conjuncts
}

fn split_conjuncts(store: &Store, formula: AstKey, out: &mut Vec<AstKey>) {
    match store.node(formula) {
        Node::Op { op: Op::And, args } => {
            for &arg in args {
                split_conjuncts(store, arg, out);
            }
        }
        Node::Bool(true) => {}
        _ => out.push(formula),
    }
}

/// Rewrite `key` under `assumptions`, descending at most `depth` levels.
fn contextual(store: &mut Store, key: AstKey, assumptions: &Assumptions, depth: usize) -> AstKey {
    if let Some(known) = assumptions.lookup(store, key) {
        return known;
    }
    if depth == 0 {
        return key;
    }

    let node = store.node(key).clone();
    let rebuilt = match node {
        Node::Bool(_) | Node::Numeral { .. } | Node::Const { .. } => return key,
        Node::Op {
            op: op @ (Op::And | Op::Or),
            args,
        } => {
            let polarity = op == Op::And;
            let mut local = assumptions.clone();
            let mut rewritten = Vec::with_capacity(args.len());
            for &arg in &args {
                let arg = contextual(store, arg, &local, depth - 1);
                local.learn(store, arg, polarity);
                rewritten.push(arg);
            }
            rewrite(store, op, &rewritten)
        }
        Node::Op { op: Op::Ite, args } => {
            let condition = contextual(store, args[0], assumptions, depth - 1);
            let mut then_facts = assumptions.clone();
            then_facts.learn(store, condition, true);
            let then = contextual(store, args[1], &then_facts, depth - 1);
            let mut else_facts = assumptions.clone();
            else_facts.learn(store, condition, false);
            let otherwise = contextual(store, args[2], &else_facts, depth - 1);
            rewrite(store, Op::Ite, &[condition, then, otherwise])
        }
        Node::Op { op, args } => {
            let rewritten: Vec<AstKey> = args
                .iter()
                .map(|&arg| contextual(store, arg, assumptions, depth - 1))
                .collect();
            rewrite(store, op, &rewritten)
        }
        Node::App { decl, args } => {
            let rewritten: Vec<AstKey> = args
                .iter()
                .map(|&arg| contextual(store, arg, assumptions, depth - 1))
                .collect();
            store.mk_app(decl, &rewritten)
        }
    };

    assumptions.lookup(store, rebuilt).unwrap_or(rebuilt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula(ctx: &Context, build: impl FnOnce(&mut Store) -> AstKey) -> Managed<Ast> {
        Managed::new(ctx, build)
    }

    fn reduce(ctx: &Context, goal: &Goal) -> Vec<Managed<Ast>> {
        let tactic = tactic_by_name("ctx-simplify", ctx).unwrap();
        tactic.apply(goal).formulas().cloned().collect()
    }

    #[test]
    fn absorbed_disjunction_disappears() {
        let ctx = Context::new();
        let mut goal = Goal::new(&ctx);
        let f = formula(&ctx, |store| {
            let x = store.mk_const("x", Sort::Bool);
            let y = store.mk_const("y", Sort::Bool);
            let either = store.mk_or(&[x, y]);
            store.mk_and(&[x, either])
        });
        goal.assert(&f);

        let reduced = reduce(&ctx, &goal);
        assert_eq!(reduced.len(), 1);
        assert!(reduced[0].apply(|store, raw| store.leaf_name(raw) == Some("x")));
    }

    #[test]
    fn contradiction_collapses_the_goal() {
        let ctx = Context::new();
        let mut goal = Goal::new(&ctx);
        let p = formula(&ctx, |store| store.mk_const("p", Sort::Bool));
        let not_p = formula(&ctx, |store| {
            let p = store.mk_const("p", Sort::Bool);
            store.mk_not(p)
        });
        goal.assert(&p);
        goal.assert(&not_p);

        let reduced = reduce(&ctx, &goal);
        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced[0].apply(|store, raw| store.bool_value(raw)), Some(false));
    }

    #[test]
    fn equalities_propagate_values() {
        let ctx = Context::new();
        let mut goal = Goal::new(&ctx);
        let f = formula(&ctx, |store| {
            let a = store.mk_const("a", Sort::BitVec(8));
            let b = store.mk_const("b", Sort::BitVec(8));
            let five = store.mk_numeral(8, 5);
            let one = store.mk_numeral(8, 1);
            let pinned = store.mk_eq(a, five);
            let sum = store.mk_op(Op::BvAdd, &[a, one]);
            let related = store.mk_eq(sum, b);
            store.mk_and(&[pinned, related])
        });
        goal.assert(&f);

        let reduced = reduce(&ctx, &goal);
        assert_eq!(reduced.len(), 2);
        let folded = reduced
            .iter()
            .filter(|f| {
                f.apply(|store, raw| {
                    store
                        .args(raw)
                        .iter()
                        .any(|&arg| store.numeral(arg) == Some(6))
                })
            })
            .count();
        assert_eq!(folded, 1);
    }

    #[test]
    fn empty_goal_has_no_formula() {
        let ctx = Context::new();
        let goal = Goal::new(&ctx);
        assert!(reduce(&ctx, &goal).is_empty());
        assert!(tactic_by_name("smt", &ctx).is_none());
    }
}
