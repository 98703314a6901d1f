//! The graph-building context: node arena plus common-subexpression cache.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────┐
//! │          Context          │
//! │  nodes:      SlotMap      │  arena, addressed by generational NodeKey
//! │  operations: (op, args)→k │  hash-consing table
//! │  constants:  bits → k     │  interned literals
//! │  epoch:      u32          │  bumped by clear_cache
//! └───────────────────────────┘
//! ```
//!
//! All graph construction goes through `&mut Context`, so the "one builder at
//! a time" rule is enforced by ordinary exclusive borrows rather than by
//! documentation. Compilation only needs `&Context` and may run concurrently.

use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, trace};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;

use super::node::{Node, NodeId, NodeKey, Operands, VarId};
use super::op::Op;
use crate::DiffError;
use crate::builder::ContextBuilder;

static CONTEXT_ID_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Canonical key of an operation node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OpKey {
    op: Op,
    args: SmallVec<[NodeKey; 3]>,
}

/// Owner of every node and of the canonicalization tables.
///
/// Nodes live until [`clear_cache`](Self::clear_cache) or until the context is
/// dropped. Nothing is reclaimed automatically.
#[derive(Debug)]
pub struct Context {
    id: u32,
    epoch: u32,
    fold_constants: bool,
    nodes: SlotMap<NodeKey, Node>,
    operations: FxHashMap<OpKey, NodeKey>,
    constants: FxHashMap<u64, NodeKey>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create an empty context with default settings.
    #[must_use]
    pub fn new() -> Self {
        ContextBuilder::new().build()
    }

    /// Fluent configuration, see [`ContextBuilder`].
    #[must_use]
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    pub(crate) fn with_settings(fold_constants: bool, capacity: usize) -> Self {
        Self {
            id: CONTEXT_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            epoch: 0,
            fold_constants,
            nodes: SlotMap::with_capacity_and_key(capacity),
            operations: FxHashMap::default(),
            constants: FxHashMap::default(),
        }
    }

    /// Current cache epoch. Starts at 0 and increases with every clear.
    #[must_use]
    pub const fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `(context id, epoch)`: identifies the node population that derived
    /// caches were built against.
    pub(crate) const fn generation(&self) -> (u32, u32) {
        (self.id, self.epoch)
    }

    /// Whether operations on constant operands are evaluated at build time.
    #[must_use]
    pub const fn folds_constants(&self) -> bool {
        self.fold_constants
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    #[inline]
    fn id_of(&self, key: NodeKey) -> NodeId {
        NodeId {
            key,
            epoch: self.epoch,
            context: self.id,
        }
    }

    /// Resolve a handle, rejecting handles from another context or epoch.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode`.
    #[inline]
    pub fn node(&self, id: NodeId) -> Result<&Node, DiffError> {
        if id.context != self.id {
            return Err(DiffError::ForeignNode);
        }
        if id.epoch != self.epoch {
            return Err(DiffError::StaleNode {
                node_epoch: id.epoch,
                current_epoch: self.epoch,
            });
        }
        // A valid epoch always finds its node: nodes are only removed by clear_cache.
        self.nodes.get(id.key).ok_or(DiffError::StaleNode {
            node_epoch: id.epoch,
            current_epoch: self.epoch,
        })
    }

    /// Check that every handle is usable in this context.
    ///
    /// # Errors
    /// The first `ForeignNode` / `StaleNode` encountered.
    pub fn validate(&self, ids: &[NodeId]) -> Result<(), DiffError> {
        ids.iter().try_for_each(|&id| self.node(id).map(|_| ()))
    }

    /// Display name of a variable node.
    ///
    /// # Errors
    /// `InvalidDifferentiationTarget` if the node is not a variable.
    pub fn variable_name(&self, id: NodeId) -> Result<&str, DiffError> {
        match self.node(id)? {
            Node::Variable { name, .. } => Ok(name),
            other => Err(DiffError::InvalidDifferentiationTarget {
                node: other.describe(),
            }),
        }
    }

    /// Identity of a variable node.
    ///
    /// # Errors
    /// `InvalidDifferentiationTarget` if the node is not a variable.
    pub fn variable_id(&self, id: NodeId) -> Result<VarId, DiffError> {
        match self.node(id)? {
            Node::Variable { id, .. } => Ok(*id),
            other => Err(DiffError::InvalidDifferentiationTarget {
                node: other.describe(),
            }),
        }
    }

    /// Ensure `id` is a variable, as required of differentiation targets.
    pub(crate) fn expect_variable(&self, id: NodeId) -> Result<(), DiffError> {
        self.variable_id(id).map(|_| ())
    }

    /// Value of a constant node, `None` for anything else.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode`.
    pub fn constant_value(&self, id: NodeId) -> Result<Option<f64>, DiffError> {
        Ok(self.node(id)?.as_constant())
    }

    pub(crate) fn is_zero(&self, id: NodeId) -> bool {
        self.nodes.get(id.key).is_some_and(Node::is_zero)
    }

    pub(crate) fn is_one(&self, id: NodeId) -> bool {
        self.nodes.get(id.key).is_some_and(Node::is_one)
    }

    // =========================================================================
    // Leaves
    // =========================================================================

    /// Declare a fresh variable. Two calls never return the same node, even
    /// with the same name.
    pub fn make_variable(&mut self, name: &str) -> NodeId {
        let key = self.nodes.insert(Node::Variable {
            id: VarId::fresh(),
            name: name.into(),
        });
        self.id_of(key)
    }

    /// Declare `n` fresh variables named `{prefix}1 .. {prefix}n`.
    pub fn make_variables(&mut self, prefix: &str, n: usize) -> Vec<NodeId> {
        (1..=n)
            .map(|i| self.make_variable(&format!("{}{}", prefix, i)))
            .collect()
    }

    /// The interned node for `value`. Literals are keyed by bit pattern, so
    /// `0.0` and `-0.0` are distinct and every NaN maps to one node.
    pub fn make_constant(&mut self, value: f64) -> NodeId {
        let bits = if value.is_nan() {
            f64::NAN.to_bits()
        } else {
            value.to_bits()
        };
        if let Some(&key) = self.constants.get(&bits) {
            return self.id_of(key);
        }
        let key = self.nodes.insert(Node::Constant(f64::from_bits(bits)));
        self.constants.insert(bits, key);
        self.id_of(key)
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// The canonical node for `op(args)`.
    ///
    /// Applies the incidental identity rules (`x + 0 → x`, `x * 1 → x`, …) and,
    /// when enabled, constant folding, then hash-conses the result.
    ///
    /// # Errors
    /// `ArityMismatch`, `ForeignNode` or `StaleNode`.
    pub fn make_operation(&mut self, op: Op, args: &[NodeId]) -> Result<NodeId, DiffError> {
        if args.len() != op.arity() {
            return Err(DiffError::ArityMismatch {
                op,
                expected: op.arity(),
                got: args.len(),
            });
        }
        self.validate(args)?;
        Ok(self.build(op, args))
    }

    /// Rewrite, fold and intern `op(args)`. Operands must already be valid.
    pub(crate) fn build(&mut self, op: Op, args: &[NodeId]) -> NodeId {
        if let Some(rewritten) = self.rewrite(op, args) {
            return rewritten;
        }

        if self.fold_constants {
            let mut values: SmallVec<[f64; 3]> = SmallVec::new();
            for &a in args {
                match self.nodes[a.key].as_constant() {
                    Some(v) => values.push(v),
                    None => break,
                }
            }
            if values.len() == args.len() {
                return self.make_constant(op.eval(&values));
            }
        }

        let mut operands: Operands = args.iter().copied().collect();
        if op.is_commutative() {
            operands.sort_unstable();
        }
        self.intern(op, operands)
    }

    /// Hash-cons an already validated, already canonical operation.
    fn intern(&mut self, op: Op, args: Operands) -> NodeId {
        let key = OpKey {
            op,
            args: args.iter().map(|a| a.key).collect(),
        };
        if let Some(&existing) = self.operations.get(&key) {
            return self.id_of(existing);
        }
        let new_key = self.nodes.insert(Node::Operation { op, args });
        trace!("interned {} as {:?}", op, new_key);
        self.operations.insert(key, new_key);
        self.id_of(new_key)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Drop every node and cache entry.
    ///
    /// Afterwards the context behaves like a fresh one, except that all node
    /// ids handed out before the clear are stale: passing one back in fails
    /// with [`DiffError::StaleNode`]. Idempotent and infallible.
    pub fn clear_cache(&mut self) {
        debug!(
            "clearing graph cache: epoch {} -> {}, dropping {} nodes",
            self.epoch,
            self.epoch.wrapping_add(1),
            self.nodes.len()
        );
        self.nodes.clear();
        self.operations.clear();
        self.constants.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }
}
