//! Reference-owning handles on store values.
use std::{
    fmt,
    hash::{Hash, Hasher},
};

use slotmap::Key;

use super::{AstKey, Context, DeclKey, Store, SymbolKey};

mod sealed {
    pub trait Sealed {}
}

/// Kind of store value a [`Managed`] handle can own.
pub trait Resource: sealed::Sealed + 'static {
    type Key: Key;

    #[doc(hidden)]
    fn acquire(store: &mut Store, key: Self::Key);
    #[doc(hidden)]
    fn release(store: &mut Store, key: Self::Key);
}

/// Term nodes.
#[derive(Debug)]
pub enum Ast {}

/// Uninterpreted function declarations.
#[derive(Debug)]
pub enum Decl {}

/// Interned symbol names.
#[derive(Debug)]
pub enum Symbol {}

impl sealed::Sealed for Ast {}
impl sealed::Sealed for Decl {}
impl sealed::Sealed for Symbol {}

impl Resource for Ast {
    type Key = AstKey;

    fn acquire(store: &mut Store, key: AstKey) {
        store.inc_ast(key);
    }

    fn release(store: &mut Store, key: AstKey) {
        store.dec_ast(key);
    }
}

impl Resource for Decl {
    type Key = DeclKey;

    fn acquire(store: &mut Store, key: DeclKey) {
        store.inc_decl(key);
    }

    fn release(store: &mut Store, key: DeclKey) {
        store.dec_decl(key);
    }
}

impl Resource for Symbol {
    type Key = SymbolKey;

    fn acquire(store: &mut Store, key: SymbolKey) {
        store.inc_symbol(key);
    }

    fn release(store: &mut Store, key: SymbolKey) {
        store.dec_symbol(key);
    }
}

/// Owns one reference on a store value of kind `K`.
///
/// While the handle exists the value stays alive. Cloning acquires a new reference on the
/// same value, dropping releases it. The closures given to [`Managed::new`],
/// [`Managed::apply`] and [`Managed::update`] run under the store lock and must not clone
/// or drop other handles.
pub struct Managed<K: Resource> {
    ctx: Context,
    raw: K::Key,
}

impl<K: Resource> Managed<K> {
    /// Build a value with `factory` and take ownership of it.
    pub fn new(ctx: &Context, factory: impl FnOnce(&mut Store) -> K::Key) -> Self {
        let raw = ctx.with_store(|store| {
            let raw = factory(store);
            K::acquire(store, raw);
            raw
        });
        Self {
            ctx: ctx.clone(),
            raw,
        }
    }

    /// Take ownership of a reference already acquired on `raw`.
    pub(crate) fn adopt(ctx: &Context, raw: K::Key) -> Self {
        Self {
            ctx: ctx.clone(),
            raw,
        }
    }

    /// Run a read-only query against the held value.
    pub fn apply<R>(&self, query: impl FnOnce(&Store, K::Key) -> R) -> R {
        self.ctx.with_store(|store| query(store, self.raw))
    }

    /// Replace the held value by the one `mutator` derives from it.
    pub fn update(&mut self, mutator: impl FnOnce(&mut Store, K::Key) -> K::Key) {
        let old = self.raw;
        self.raw = self.ctx.with_store(|store| {
            let new = mutator(store, old);
            K::acquire(store, new);
            K::release(store, old);
            new
        });
    }

    /// Replace the held value by one built from scratch.
    pub fn update_from_factory(&mut self, factory: impl FnOnce(&mut Store) -> K::Key) {
        self.update(|store, _| factory(store));
    }

    /// Raw key of the held value. Only valid while `self` is alive.
    #[inline]
    pub fn raw(&self) -> K::Key {
        self.raw
    }

    #[inline]
    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

impl<K: Resource> Clone for Managed<K> {
    fn clone(&self) -> Self {
        self.ctx.with_store(|store| K::acquire(store, self.raw));
        Self {
            ctx: self.ctx.clone(),
            raw: self.raw,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if self.ctx.same(&source.ctx) {
            let old = self.raw;
            self.ctx.with_store(|store| {
                K::acquire(store, source.raw);
                K::release(store, old);
            });
            self.raw = source.raw;
        } else {
            *self = source.clone();
        }
    }
}

impl<K: Resource> Drop for Managed<K> {
    fn drop(&mut self) {
        self.ctx.with_store(|store| K::release(store, self.raw));
    }
}

impl<K: Resource> PartialEq for Managed<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw && self.ctx.same(&other.ctx)
    }
}

impl<K: Resource> Eq for Managed<K> {}

impl<K: Resource> Hash for Managed<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<K: Resource> fmt::Debug for Managed<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Managed").field(&self.raw).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Op, Sort};

    #[test]
    fn clones_share_the_node() {
        let ctx = Context::new();
        let x = Managed::<Ast>::new(&ctx, |store| store.mk_const("x", Sort::BitVec(16)));
        let y = x.clone();
        assert_eq!(x, y);
        drop(x);
        assert_eq!(ctx.live_nodes(), 1);
        assert!(y.apply(|store, raw| store.leaf_name(raw) == Some("x")));
        drop(y);
        assert_eq!(ctx.live_nodes(), 0);
    }

    #[test]
    fn update_releases_the_previous_node() {
        let ctx = Context::new();
        let mut h = Managed::<Ast>::new(&ctx, |store| {
            let a = store.mk_const("a", Sort::BitVec(8));
            let b = store.mk_const("b", Sort::BitVec(8));
            store.mk_op(Op::BvAdd, &[a, b])
        });
        assert_eq!(ctx.live_nodes(), 3);

        h.update(|store, raw| store.args(raw)[0]);
        assert_eq!(ctx.live_nodes(), 1);

        h.update_from_factory(|store| store.mk_numeral(8, 3));
        assert_eq!(ctx.live_nodes(), 1);
        assert_eq!(h.apply(|store, raw| store.numeral(raw)), Some(3));
    }

    #[test]
    fn clone_from_adopts_the_source() {
        let ctx = Context::new();
        let mut a = Managed::<Ast>::new(&ctx, |store| store.mk_true());
        let b = Managed::<Ast>::new(&ctx, |store| store.mk_false());
        a.clone_from(&b);
        assert_eq!(a, b);
        assert_eq!(ctx.live_nodes(), 1);
    }

    #[test]
    fn declarations_and_symbols() {
        let ctx = Context::new();
        let symbol = Managed::<Symbol>::new(&ctx, |store| store.mk_symbol("deref"));
        let decl = Managed::<Decl>::new(&ctx, |store| {
            store.mk_func_decl("deref", &[Sort::BitVec(32)], Sort::BitVec(8))
        });
        assert_eq!(decl.apply(|store, raw| store.decl_name(raw).to_string()), "deref");
        assert_eq!(symbol.apply(|store, raw| store.symbol_str(raw).len()), 5);

        let load = Managed::<Ast>::new(&ctx, |store| {
            let p = store.mk_const("p", Sort::BitVec(32));
            store.mk_app(decl.raw(), &[p])
        });
        drop(decl);
        assert_eq!(load.apply(|store, raw| store.sort(raw)), Sort::BitVec(8));
    }
}
