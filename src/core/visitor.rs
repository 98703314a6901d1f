//! Graph traversal.
//!
//! Walks are iterative, so graphs thousands of levels deep (long chains of
//! derivative terms are common) do not overflow the call stack.

use rustc_hash::FxHashSet;

use super::context::Context;
use super::node::{Node, NodeId};
use super::op::Op;
use crate::DiffError;

/// Trait for visiting graph nodes.
///
/// Nodes are presented in topological order: a node is visited only after all
/// of its operands. Shared nodes are visited once.
///
/// # Example
/// ```
/// use symb_graph::{Context, GraphVisitor, NodeId, Op, walk_graph};
///
/// struct OpCounter(usize);
///
/// impl GraphVisitor for OpCounter {
///     fn visit_variable(&mut self, _id: NodeId, _name: &str) {}
///     fn visit_constant(&mut self, _id: NodeId, _value: f64) {}
///     fn visit_operation(&mut self, _id: NodeId, _op: Op, _args: &[NodeId]) {
///         self.0 += 1;
///     }
/// }
///
/// let mut ctx = Context::new();
/// let x = ctx.make_variable("x");
/// let s = ctx.sin(x).unwrap();
/// let f = ctx.mul(s, s).unwrap();
///
/// let mut counter = OpCounter(0);
/// walk_graph(&ctx, &[f], &mut counter).unwrap();
/// assert_eq!(counter.0, 2);
/// ```
pub trait GraphVisitor {
    /// Visit a variable leaf.
    fn visit_variable(&mut self, id: NodeId, name: &str);

    /// Visit a constant leaf.
    fn visit_constant(&mut self, id: NodeId, value: f64);

    /// Visit an operation; its operands have already been visited.
    fn visit_operation(&mut self, id: NodeId, op: Op, args: &[NodeId]);
}

/// Walk every ancestor of `roots` (inclusive) in topological order.
///
/// # Errors
/// `ForeignNode` or `StaleNode` if any root is unusable.
pub fn walk_graph<V: GraphVisitor>(
    ctx: &Context,
    roots: &[NodeId],
    visitor: &mut V,
) -> Result<(), DiffError> {
    for id in topological_order(ctx, roots)? {
        match ctx.node(id)? {
            Node::Variable { name, .. } => visitor.visit_variable(id, name),
            Node::Constant(c) => visitor.visit_constant(id, *c),
            Node::Operation { op, args } => visitor.visit_operation(id, *op, args),
        }
    }
    Ok(())
}

/// Post-order of the ancestors of `roots`: every node appears after its
/// operands, each node exactly once, unreachable nodes not at all.
///
/// # Errors
/// `ForeignNode` or `StaleNode` if any root is unusable.
pub(crate) fn topological_order(ctx: &Context, roots: &[NodeId]) -> Result<Vec<NodeId>, DiffError> {
    ctx.validate(roots)?;

    let mut order = Vec::new();
    let mut visited: FxHashSet<NodeId> = FxHashSet::default();
    // (node, operands already pushed)
    let mut stack: Vec<(NodeId, bool)> = Vec::new();

    for &root in roots {
        if visited.contains(&root) {
            continue;
        }
        stack.push((root, false));
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            // reversed so the first operand is emitted first
            for &arg in ctx.node(id)?.args().iter().rev() {
                if !visited.contains(&arg) {
                    stack.push((arg, false));
                }
            }
        }
    }
    Ok(order)
}

struct VariableCollector(Vec<NodeId>);

impl GraphVisitor for VariableCollector {
    fn visit_variable(&mut self, id: NodeId, _name: &str) {
        self.0.push(id);
    }

    fn visit_constant(&mut self, _id: NodeId, _value: f64) {}

    fn visit_operation(&mut self, _id: NodeId, _op: Op, _args: &[NodeId]) {}
}

impl Context {
    /// Variables reachable from `roots`, in first-use order.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` if any root is unusable.
    pub fn variables(&self, roots: &[NodeId]) -> Result<Vec<NodeId>, DiffError> {
        let mut collector = VariableCollector(Vec::new());
        walk_graph(self, roots, &mut collector)?;
        Ok(collector.0)
    }

    /// Number of distinct operation nodes reachable from `roots`.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` if any root is unusable.
    pub fn operation_count(&self, roots: &[NodeId]) -> Result<usize, DiffError> {
        let order = topological_order(self, roots)?;
        Ok(order
            .iter()
            .filter(|&&id| matches!(self.node(id), Ok(Node::Operation { .. })))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operands_precede_users() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let y = ctx.make_variable("y");
        let xy = ctx.mul(x, y).unwrap();
        let s = ctx.sin(xy).unwrap();
        let f = ctx.add(s, xy).unwrap();

        let order = topological_order(&ctx, &[f]).unwrap();
        let pos = |id| order.iter().position(|&n| n == id).unwrap();
        assert_eq!(order.len(), 5);
        assert!(pos(x) < pos(xy));
        assert!(pos(y) < pos(xy));
        assert!(pos(xy) < pos(s));
        assert!(pos(s) < pos(f));
        assert_eq!(*order.last().unwrap(), f);
    }

    #[test]
    fn test_unreachable_nodes_are_skipped() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let y = ctx.make_variable("y");
        let _unused = ctx.cos(y).unwrap();
        let f = ctx.sin(x).unwrap();
        assert_eq!(ctx.variables(&[f]).unwrap(), vec![x]);
        assert_eq!(ctx.operation_count(&[f]).unwrap(), 1);
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let mut acc = x;
        for _ in 0..100_000 {
            acc = ctx.sin(acc).unwrap();
        }
        assert_eq!(ctx.operation_count(&[acc]).unwrap(), 100_000);
    }
}
