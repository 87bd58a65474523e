//! Term engine.
//!
//! A [`Context`] owns a [`Store`] of hash-consed, reference-counted terms. Terms are built
//! through the store factories, kept alive by [`Managed`] handles and rewritten by the
//! [`simplify`] routine and the [`tactic`] pipeline.
use std::{fmt, sync::Arc};

use log::debug;
use parking_lot::Mutex;

use crate::{config::ContextConfig, error::Result};

pub mod bits;
pub mod handle;
mod node;
pub mod parser;
pub mod pretty;
pub mod simplify;
mod store;
pub mod tactic;

pub use handle::{Ast, Decl, Managed, Resource, Symbol};
pub use node::{AstKey, DeclKey, FuncDecl, MAX_WIDTH, Node, Op, Sort, SymbolKey};
pub use store::Store;

struct ContextInner {
    config: ContextConfig,
    store: Mutex<Store>,
}

/// Shared handle on a term store.
///
/// Cloning a context is cheap and yields a handle on the same store. Terms of two
/// different contexts never mix.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Create a context with the default configuration.
    pub fn new() -> Self {
        Self::from_valid_config(ContextConfig::default())
    }

    /// Create a context from `config`, validating it first.
    pub fn with_config(config: ContextConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: ContextConfig) -> Self {
        debug!(
            "Creating context (indirection symbol `{}`, text width {}, reduce depth {}).",
            config.indirection_symbol, config.text_width, config.reduce_depth
        );
        Self {
            inner: Arc::new(ContextInner {
                config,
                store: Mutex::new(Store::new()),
            }),
        }
    }

    #[inline]
    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    /// Whether both handles refer to the same store.
    #[inline]
    pub fn same(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` with exclusive access to the store.
    ///
    /// Terms built by `f` that are not acquired by the time it returns are collected.
    /// `f` must not clone or drop a [`Managed`] handle: the store lock is not reentrant.
    pub(crate) fn with_store<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        let mut store = self.inner.store.lock();
        let result = f(&mut store);
        store.collect_floating();
        result
    }

    /// Number of live term nodes in the store.
    pub fn live_nodes(&self) -> usize {
        self.inner.store.lock().live_nodes()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("store", &Arc::as_ptr(&self.inner))
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_are_independent() {
        let a = Context::new();
        let b = Context::new();
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));

        let x = Managed::<Ast>::new(&a, |store| store.mk_const("x", Sort::BitVec(8)));
        assert_eq!(a.live_nodes(), 1);
        assert_eq!(b.live_nodes(), 0);
        drop(x);
        assert_eq!(a.live_nodes(), 0);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = ContextConfig {
            indirection_symbol: "has space".to_string(),
            ..ContextConfig::default()
        };
        assert!(Context::with_config(config).unwrap_err().is_invalid_config());
    }
}
