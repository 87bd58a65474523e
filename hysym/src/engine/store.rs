use std::{
    collections::HashMap,
    hash::{DefaultHasher, Hash, Hasher},
};

use log::trace;
use slotmap::{Key, SecondaryMap, SlotMap};
use smallvec::SmallVec;

use super::{
    bits,
    node::{AstKey, DeclKey, FuncDecl, Node, Op, Sort, SymbolKey},
};

struct Entry<V> {
    value: V,
    refs: u32,
}

/// A reference-counted, deduplicating table.
///
/// Values inserted by [`Table::insert`] start with a zero count and are recorded as fresh;
/// the store collects fresh values nobody acquired at the end of each engine call.
struct Table<K: Key, V: Hash + Eq + Clone> {
    entries: SlotMap<K, Entry<V>>,
    lookup: HashMap<V, K>,
    fresh: Vec<K>,
}

impl<K: Key, V: Hash + Eq + Clone> Table<K, V> {
    fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
            lookup: HashMap::new(),
            fresh: Vec::new(),
        }
    }

    #[inline]
    fn find(&self, value: &V) -> Option<K> {
        self.lookup.get(value).copied()
    }

    fn insert(&mut self, value: V) -> K {
        let key = self.entries.insert(Entry {
            value: value.clone(),
            refs: 0,
        });
        self.lookup.insert(value, key);
        self.fresh.push(key);
        key
    }

    #[inline]
    fn get(&self, key: K) -> &V {
        &self.entries[key].value
    }

    #[inline]
    fn inc(&mut self, key: K) {
        self.entries[key].refs += 1;
    }

    /// Drop one reference. Returns the value if it was the last one.
    fn dec(&mut self, key: K) -> Option<V> {
        let entry = self.entries.get_mut(key)?;
        debug_assert!(entry.refs > 0, "released an entry nobody holds");
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 { self.remove(key) } else { None }
    }

    /// Remove `key` if it is still present and nobody refers to it.
    fn remove_unreferenced(&mut self, key: K) -> Option<V> {
        let unreferenced = self.entries.get(key).is_some_and(|entry| entry.refs == 0);
        if unreferenced { self.remove(key) } else { None }
    }

    fn remove(&mut self, key: K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.lookup.remove(&entry.value);
        Some(entry.value)
    }

    #[inline]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct AstMeta {
    sort: Sort,
    hash: u64,
}

/// Node store of a [`Context`](super::Context).
///
/// The store hash-conses terms, function declarations and symbol names, and keeps a
/// reference count for each of them. A term holds one reference on each of its children,
/// on its declaration and on its symbol; [`Managed`](super::Managed) handles hold the
/// remaining ones.
///
/// Builders return raw keys that nobody owns yet: a key must be acquired (typically by
/// returning it from a [`Managed`](super::Managed) factory) before the engine call ends,
/// otherwise it is collected.
pub struct Store {
    asts: Table<AstKey, Node>,
    meta: SecondaryMap<AstKey, AstMeta>,
    decls: Table<DeclKey, FuncDecl>,
    symbols: Table<SymbolKey, Box<str>>,
}

impl Store {
    pub(crate) fn new() -> Self {
        Self {
            asts: Table::new(),
            meta: SecondaryMap::new(),
            decls: Table::new(),
            symbols: Table::new(),
        }
    }

    // ------------------------------------------------------------------
    // Reference counting
    // ------------------------------------------------------------------

    pub(crate) fn inc_ast(&mut self, key: AstKey) {
        self.asts.inc(key);
    }

    pub(crate) fn dec_ast(&mut self, key: AstKey) {
        let mut pending = vec![key];
        self.release_asts(&mut pending);
    }

    pub(crate) fn inc_decl(&mut self, key: DeclKey) {
        self.decls.inc(key);
    }

    pub(crate) fn dec_decl(&mut self, key: DeclKey) {
        if let Some(decl) = self.decls.dec(key) {
            self.dec_symbol(decl.name);
        }
    }

    pub(crate) fn inc_symbol(&mut self, key: SymbolKey) {
        self.symbols.inc(key);
    }

    pub(crate) fn dec_symbol(&mut self, key: SymbolKey) {
        if let Some(name) = self.symbols.dec(key) {
            trace!("Released symbol `{name}`.");
        }
    }

    /// Drop one reference on each key of `pending`, cascading to released children.
    fn release_asts(&mut self, pending: &mut Vec<AstKey>) {
        while let Some(key) = pending.pop() {
            if let Some(node) = self.asts.dec(key) {
                self.forget_ast(key, node, pending);
            }
        }
    }

    fn forget_ast(&mut self, key: AstKey, node: Node, pending: &mut Vec<AstKey>) {
        self.meta.remove(key);
        trace!("Released node {key:?}.");
        pending.extend(node.args().iter().copied());
        match node {
            Node::Const { name, .. } => self.dec_symbol(name),
            Node::App { decl, .. } => self.dec_decl(decl),
            Node::Bool(_) | Node::Numeral { .. } | Node::Op { .. } => {}
        }
    }

    /// Release every value created since the last collection that nobody acquired.
    pub(crate) fn collect_floating(&mut self) {
        let mut pending = Vec::new();

        // Newest first, so parents go before the children they keep alive.
        let fresh = std::mem::take(&mut self.asts.fresh);
        for key in fresh.into_iter().rev() {
            if let Some(node) = self.asts.remove_unreferenced(key) {
                self.forget_ast(key, node, &mut pending);
                self.release_asts(&mut pending);
            }
        }

        let fresh = std::mem::take(&mut self.decls.fresh);
        for key in fresh.into_iter().rev() {
            if let Some(decl) = self.decls.remove_unreferenced(key) {
                self.dec_symbol(decl.name);
            }
        }

        let fresh = std::mem::take(&mut self.symbols.fresh);
        for key in fresh {
            self.symbols.remove_unreferenced(key);
        }
    }

    /// Number of live term nodes.
    pub fn live_nodes(&self) -> usize {
        self.asts.len()
    }

    /// Number of live function declarations.
    pub fn live_decls(&self) -> usize {
        self.decls.len()
    }

    /// Number of live symbol names.
    pub fn live_symbols(&self) -> usize {
        self.symbols.len()
    }

    // ------------------------------------------------------------------
    // Factories
    // ------------------------------------------------------------------

    pub fn mk_symbol(&mut self, name: &str) -> SymbolKey {
        let name: Box<str> = name.into();
        match self.symbols.find(&name) {
            Some(key) => key,
            None => self.symbols.insert(name),
        }
    }

    pub fn mk_func_decl(&mut self, name: &str, domain: &[Sort], range: Sort) -> DeclKey {
        let decl = FuncDecl {
            name: self.mk_symbol(name),
            domain: SmallVec::from_slice(domain),
            range,
        };
        if let Some(key) = self.decls.find(&decl) {
            return key;
        }
        let name = decl.name;
        let key = self.decls.insert(decl);
        self.inc_symbol(name);
        key
    }

    fn intern(&mut self, node: Node, sort: Sort) -> AstKey {
        if let Some(key) = self.asts.find(&node) {
            return key;
        }

        let hash = self.structural_hash(&node);
        for &child in node.args() {
            self.asts.inc(child);
        }
        match &node {
            Node::Const { name, .. } => self.symbols.inc(*name),
            Node::App { decl, .. } => self.decls.inc(*decl),
            Node::Bool(_) | Node::Numeral { .. } | Node::Op { .. } => {}
        }

        let key = self.asts.insert(node);
        self.meta.insert(key, AstMeta { sort, hash });
        trace!("New node {key:?} of sort {sort} (hash 0x{hash:016x}).");
        key
    }

    fn structural_hash(&self, node: &Node) -> u64 {
        let mut hasher = DefaultHasher::new();
        match node {
            Node::Bool(value) => (0u8, value).hash(&mut hasher),
            Node::Numeral { width, value } => (1u8, width, value).hash(&mut hasher),
            Node::Const { name, sort } => (2u8, self.symbols.get(*name), sort).hash(&mut hasher),
            Node::App { decl, args } => {
                let decl = self.decls.get(*decl);
                (3u8, self.symbols.get(decl.name), &decl.domain, decl.range).hash(&mut hasher);
                for &arg in args {
                    self.meta[arg].hash.hash(&mut hasher);
                }
            }
            Node::Op { op, args } => {
                (4u8, op).hash(&mut hasher);
                for &arg in args {
                    self.meta[arg].hash.hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }

    pub fn mk_bool(&mut self, value: bool) -> AstKey {
        self.intern(Node::Bool(value), Sort::Bool)
    }

    pub fn mk_true(&mut self) -> AstKey {
        self.mk_bool(true)
    }

    pub fn mk_false(&mut self) -> AstKey {
        self.mk_bool(false)
    }

    /// Build a `width`-bit numeral. Bits of `value` above `width` are discarded.
    pub fn mk_numeral(&mut self, width: u32, value: u128) -> AstKey {
        debug_assert!(width >= 1 && width <= super::MAX_WIDTH);
        let value = value & bits::mask(width);
        self.intern(Node::Numeral { width, value }, Sort::BitVec(width))
    }

    pub fn mk_const(&mut self, name: &str, sort: Sort) -> AstKey {
        let name = self.mk_symbol(name);
        self.mk_const_with(name, sort)
    }

    /// Build a constant named by an interned symbol.
    pub fn mk_const_with(&mut self, name: SymbolKey, sort: Sort) -> AstKey {
        self.intern(Node::Const { name, sort }, sort)
    }

    pub fn mk_app(&mut self, decl: DeclKey, args: &[AstKey]) -> AstKey {
        let range = {
            let decl = self.decls.get(decl);
            debug_assert!(
                decl.domain.len() == args.len()
                    && decl.domain.iter().zip(args).all(|(s, a)| *s == self.sort(*a)),
                "ill-sorted application of `{}`",
                self.symbols.get(decl.name)
            );
            decl.range
        };
        self.intern(
            Node::App {
                decl,
                args: SmallVec::from_slice(args),
            },
            range,
        )
    }

    /// Build `op(args)`, or `None` if the application is ill-sorted.
    pub fn try_mk_op(&mut self, op: Op, args: &[AstKey]) -> Option<AstKey> {
        let sorts: SmallVec<[Sort; 3]> = args.iter().map(|a| self.sort(*a)).collect();
        let sort = op.result_sort(&sorts)?;
        Some(self.intern(
            Node::Op {
                op,
                args: SmallVec::from_slice(args),
            },
            sort,
        ))
    }

    /// Build `op(args)`.
    ///
    /// # Panics
    /// If the application is ill-sorted. Typed expressions never build such terms.
    pub fn mk_op(&mut self, op: Op, args: &[AstKey]) -> AstKey {
        match self.try_mk_op(op, args) {
            Some(key) => key,
            None => panic!("ill-sorted application of `{}`", op.name()),
        }
    }

    pub fn mk_not(&mut self, a: AstKey) -> AstKey {
        self.mk_op(Op::Not, &[a])
    }

    pub fn mk_and(&mut self, args: &[AstKey]) -> AstKey {
        self.mk_op(Op::And, args)
    }

    pub fn mk_or(&mut self, args: &[AstKey]) -> AstKey {
        self.mk_op(Op::Or, args)
    }

    pub fn mk_eq(&mut self, a: AstKey, b: AstKey) -> AstKey {
        self.mk_op(Op::Eq, &[a, b])
    }

    pub fn mk_ite(&mut self, condition: AstKey, then: AstKey, otherwise: AstKey) -> AstKey {
        self.mk_op(Op::Ite, &[condition, then, otherwise])
    }

    pub fn mk_extract(&mut self, hi: u32, lo: u32, a: AstKey) -> AstKey {
        self.mk_op(Op::Extract { hi, lo }, &[a])
    }

    pub fn mk_concat(&mut self, high: AstKey, low: AstKey) -> AstKey {
        self.mk_op(Op::Concat, &[high, low])
    }

    pub fn mk_zero_ext(&mut self, by: u32, a: AstKey) -> AstKey {
        self.mk_op(Op::ZeroExt { by }, &[a])
    }

    pub fn mk_sign_ext(&mut self, by: u32, a: AstKey) -> AstKey {
        self.mk_op(Op::SignExt { by }, &[a])
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    #[inline]
    pub fn node(&self, key: AstKey) -> &Node {
        self.asts.get(key)
    }

    #[inline]
    pub fn sort(&self, key: AstKey) -> Sort {
        self.meta[key].sort
    }

    /// Structural hash of the node, stable across contexts.
    #[inline]
    pub fn ast_hash(&self, key: AstKey) -> u64 {
        self.meta[key].hash
    }

    #[inline]
    pub fn args(&self, key: AstKey) -> &[AstKey] {
        self.node(key).args()
    }

    pub fn is_numeral(&self, key: AstKey) -> bool {
        self.node(key).is_numeral()
    }

    pub fn is_literal(&self, key: AstKey) -> bool {
        self.node(key).is_literal()
    }

    pub fn numeral(&self, key: AstKey) -> Option<u128> {
        match self.node(key) {
            Node::Numeral { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Tri-state boolean value: `None` unless the node is `true` or `false`.
    pub fn bool_value(&self, key: AstKey) -> Option<bool> {
        match self.node(key) {
            Node::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn app_decl(&self, key: AstKey) -> Option<DeclKey> {
        match self.node(key) {
            Node::App { decl, .. } => Some(*decl),
            _ => None,
        }
    }

    pub fn decl(&self, key: DeclKey) -> &FuncDecl {
        self.decls.get(key)
    }

    pub fn decl_name(&self, key: DeclKey) -> &str {
        self.symbol_str(self.decls.get(key).name)
    }

    pub fn symbol_str(&self, key: SymbolKey) -> &str {
        self.symbols.get(key)
    }

    /// Name declared by a leaf: a free constant or a nullary application.
    pub fn leaf_name(&self, key: AstKey) -> Option<&str> {
        match self.node(key) {
            Node::Const { name, .. } => Some(self.symbol_str(*name)),
            Node::App { decl, args } if args.is_empty() => Some(self.decl_name(*decl)),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Rewriting
    // ------------------------------------------------------------------

    /// Replace every occurrence of `from` in `root` by `to`. The result is not simplified.
    pub fn substitute(&mut self, root: AstKey, from: AstKey, to: AstKey) -> AstKey {
        enum Frame {
            Enter(AstKey),
            Exit(AstKey),
        }

        debug_assert_eq!(self.sort(from), self.sort(to));
        let mut rebuilt: HashMap<AstKey, AstKey> = HashMap::new();
        rebuilt.insert(from, to);

        let mut stack = vec![Frame::Enter(root)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(key) => {
                    if rebuilt.contains_key(&key) {
                        continue;
                    }
                    stack.push(Frame::Exit(key));
                    for &child in self.args(key).iter().rev() {
                        if !rebuilt.contains_key(&child) {
                            stack.push(Frame::Enter(child));
                        }
                    }
                }
                Frame::Exit(key) => {
                    if rebuilt.contains_key(&key) {
                        continue;
                    }
                    let node = self.node(key).clone();
                    let args: SmallVec<[AstKey; 3]> =
                        node.args().iter().map(|c| rebuilt[c]).collect();
                    let new = if args.as_slice() == node.args() {
                        key
                    } else {
                        match node {
                            Node::App { decl, .. } => self.mk_app(decl, &args),
                            Node::Op { op, .. } => self.mk_op(op, &args),
                            Node::Bool(_) | Node::Numeral { .. } | Node::Const { .. } => key,
                        }
                    };
                    rebuilt.insert(key, new);
                }
            }
        }
        rebuilt[&root]
    }
}
