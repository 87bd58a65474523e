//! Node representation of the engine store.
//!
//! Every term is a [`Node`] interned in a [`Store`](super::Store). Children are referenced by
//! [`AstKey`], so two structurally identical terms built in the same context share one key.
use smallvec::SmallVec;
use strum::{EnumIs, EnumString, IntoStaticStr};

slotmap::new_key_type! {
    /// Raw key of a term node.
    pub struct AstKey;
    /// Raw key of a function declaration.
    pub struct DeclKey;
    /// Raw key of an interned symbol name.
    pub struct SymbolKey;
}

/// Largest bit-vector width supported by the store. Numerals are held in a `u128`.
pub const MAX_WIDTH: u32 = 128;

/// Sort of a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIs)]
pub enum Sort {
    Bool,
    BitVec(u32),
}

impl Sort {
    /// Number of bits of a bit-vector sort, zero for booleans.
    #[inline]
    pub const fn bits(&self) -> u32 {
        match self {
            Sort::Bool => 0,
            Sort::BitVec(width) => *width,
        }
    }

    /// Number of whole bytes of a bit-vector sort, zero for booleans.
    #[inline]
    pub const fn bytes(&self) -> usize {
        (self.bits() / 8) as usize
    }
}

impl std::fmt::Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::BitVec(width) => write!(f, "(_ BitVec {width})"),
        }
    }
}

/// Built-in operators. The string form is the SMT-LIB name of the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, EnumString, IntoStaticStr)]
pub enum Op {
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "xor")]
    Xor,
    #[strum(serialize = "=>")]
    Implies,
    #[strum(serialize = "=")]
    Eq,
    #[strum(serialize = "ite")]
    Ite,

    #[strum(serialize = "bvneg")]
    BvNeg,
    #[strum(serialize = "bvnot")]
    BvNot,
    #[strum(serialize = "bvadd")]
    BvAdd,
    #[strum(serialize = "bvsub")]
    BvSub,
    #[strum(serialize = "bvmul")]
    BvMul,
    #[strum(serialize = "bvudiv")]
    BvUDiv,
    #[strum(serialize = "bvsdiv")]
    BvSDiv,
    #[strum(serialize = "bvurem")]
    BvURem,
    #[strum(serialize = "bvsrem")]
    BvSRem,
    #[strum(serialize = "bvand")]
    BvAnd,
    #[strum(serialize = "bvor")]
    BvOr,
    #[strum(serialize = "bvxor")]
    BvXor,
    #[strum(serialize = "bvshl")]
    BvShl,
    #[strum(serialize = "bvlshr")]
    BvLShr,
    #[strum(serialize = "bvult")]
    BvULt,
    #[strum(serialize = "bvslt")]
    BvSLt,
    #[strum(serialize = "concat")]
    Concat,

    #[strum(serialize = "extract")]
    Extract { hi: u32, lo: u32 },
    #[strum(serialize = "zero_extend")]
    ZeroExt { by: u32 },
    #[strum(serialize = "sign_extend")]
    SignExt { by: u32 },
}

impl Op {
    /// SMT-LIB name of the operator.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Whether arguments may be flattened and reordered freely.
    #[inline]
    pub fn is_associative_commutative(&self) -> bool {
        matches!(
            self,
            Op::And | Op::Or | Op::BvAdd | Op::BvMul | Op::BvAnd | Op::BvOr | Op::BvXor
        )
    }

    /// Indices printed after the operator name, as in `(_ extract 7 0)`.
    pub fn indices(&self) -> SmallVec<[u32; 2]> {
        match *self {
            Op::Extract { hi, lo } => SmallVec::from_slice(&[hi, lo]),
            Op::ZeroExt { by } | Op::SignExt { by } => SmallVec::from_slice(&[by]),
            _ => SmallVec::new(),
        }
    }

    /// Result sort of the operator applied to arguments of sorts `args`, or `None` if the
    /// application is ill-sorted.
    pub fn result_sort(&self, args: &[Sort]) -> Option<Sort> {
        use Sort::*;

        let all_bool = || args.iter().all(|s| s.is_bool());
        let same_bv = || match args.first() {
            Some(BitVec(w)) => args.iter().all(|s| *s == BitVec(*w)).then_some(BitVec(*w)),
            _ => None,
        };

        match *self {
            Op::Not => (args.len() == 1 && all_bool()).then_some(Bool),
            Op::And | Op::Or => all_bool().then_some(Bool),
            Op::Xor | Op::Implies => (args.len() == 2 && all_bool()).then_some(Bool),
            Op::Eq => (args.len() == 2 && args[0] == args[1]).then_some(Bool),
            Op::Ite => match args {
                [Bool, t, e] if t == e => Some(*t),
                _ => None,
            },
            Op::BvNeg | Op::BvNot => (args.len() == 1).then(same_bv).flatten(),
            Op::BvAdd | Op::BvMul | Op::BvAnd | Op::BvOr | Op::BvXor => {
                (!args.is_empty()).then(same_bv).flatten()
            }
            Op::BvSub
            | Op::BvUDiv
            | Op::BvSDiv
            | Op::BvURem
            | Op::BvSRem
            | Op::BvShl
            | Op::BvLShr => (args.len() == 2).then(same_bv).flatten(),
            Op::BvULt | Op::BvSLt => (args.len() == 2).then(same_bv).flatten().map(|_| Bool),
            Op::Concat => match args {
                [BitVec(a), BitVec(b)] if a + b <= MAX_WIDTH => Some(BitVec(a + b)),
                _ => None,
            },
            Op::Extract { hi, lo } => match args {
                [BitVec(w)] if lo <= hi && hi < *w => Some(BitVec(hi - lo + 1)),
                _ => None,
            },
            Op::ZeroExt { by } | Op::SignExt { by } => match args {
                [BitVec(w)] => w
                    .checked_add(by)
                    .filter(|&width| width <= MAX_WIDTH)
                    .map(BitVec),
                _ => None,
            },
        }
    }
}

/// An uninterpreted function declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncDecl {
    pub name: SymbolKey,
    pub domain: SmallVec<[Sort; 1]>,
    pub range: Sort,
}

/// An immutable term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
pub enum Node {
    /// `true` or `false`.
    Bool(bool),
    /// A bit-vector literal. `value` never has bits set above `width`.
    Numeral { width: u32, value: u128 },
    /// A free constant.
    Const { name: SymbolKey, sort: Sort },
    /// Application of an uninterpreted function.
    App {
        decl: DeclKey,
        args: SmallVec<[AstKey; 2]>,
    },
    /// Application of a built-in operator.
    Op {
        op: Op,
        args: SmallVec<[AstKey; 3]>,
    },
}

impl Node {
    /// Children of the node, in argument order.
    #[inline]
    pub fn args(&self) -> &[AstKey] {
        match self {
            Node::App { args, .. } => args,
            Node::Op { args, .. } => args,
            Node::Bool(_) | Node::Numeral { .. } | Node::Const { .. } => &[],
        }
    }

    /// Whether the node is a literal.
    #[inline]
    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Bool(_) | Node::Numeral { .. })
    }
}
