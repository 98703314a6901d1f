//! Graph nodes and the handles used to refer to them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use super::op::Op;

slotmap::new_key_type! {
    /// Arena slot of a node inside one [`Context`](super::Context).
    pub(crate) struct NodeKey;
}

/// Handle to a node owned by a [`Context`](super::Context).
///
/// A `NodeId` is a non-owning lookup: the context keeps the node alive until
/// the next [`clear_cache`](super::Context::clear_cache). Every id is tagged
/// with the epoch and the context that created it, so handles that outlive a
/// clear (or wander into another context) are rejected instead of resolving
/// to an unrelated node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) key: NodeKey,
    pub(crate) epoch: u32,
    pub(crate) context: u32,
}

impl NodeId {
    /// Cache epoch this node was created in.
    #[must_use]
    pub const fn epoch(self) -> u32 {
        self.epoch
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:?}@{}.{})", self.key, self.context, self.epoch)
    }
}

static VAR_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a declared variable. Never reused, not even
/// across contexts or cache clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u64);

impl VarId {
    pub(crate) fn fresh() -> Self {
        VarId(VAR_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Operand list of an operation node. No operator takes more than three.
pub type Operands = SmallVec<[NodeId; 3]>;

/// An immutable element of the expression graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A declared symbolic input.
    Variable {
        /// Unique identity.
        id: VarId,
        /// Display name; not required to be unique.
        name: Box<str>,
    },
    /// A numeric literal.
    Constant(f64),
    /// An operator applied to earlier nodes.
    Operation {
        /// Operator tag.
        op: Op,
        /// Operands in order.
        args: Operands,
    },
}

impl Node {
    #[must_use]
    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Node::Constant(c) => Some(*c),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_variable(&self) -> bool {
        matches!(self, Node::Variable { .. })
    }

    #[must_use]
    pub const fn is_constant(&self) -> bool {
        matches!(self, Node::Constant(_))
    }

    /// Exactly the constant `0.0` (either sign).
    #[must_use]
    pub fn is_zero(&self) -> bool {
        matches!(self, Node::Constant(c) if *c == 0.0)
    }

    /// Exactly the constant `1.0`.
    #[must_use]
    pub fn is_one(&self) -> bool {
        matches!(self, Node::Constant(c) if *c == 1.0)
    }

    /// Operands of an operation; empty for leaves.
    #[must_use]
    pub fn args(&self) -> &[NodeId] {
        match self {
            Node::Operation { args, .. } => args,
            _ => &[],
        }
    }

    #[must_use]
    pub fn op(&self) -> Option<Op> {
        match self {
            Node::Operation { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// Short human-readable description used in error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Node::Variable { name, .. } => format!("variable '{}'", name),
            Node::Constant(c) => format!("constant {}", c),
            Node::Operation { op, .. } => format!("{} operation", op),
        }
    }
}
