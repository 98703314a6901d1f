//! Differentiation engine: chain-rule propagation over the node graph.
//!
//! Derivatives are graphs too. Every derivative node is built through the
//! same [`Context`] constructors as user code, so derivative subgraphs are
//! hash-consed against the primal graph and against each other.
//!
//! Two propagation directions are provided:
//!
//! - **forward**: for each node, `ṅ = Σₖ ∂n/∂aₖ · ȧₖ`, visiting operands first.
//!   Used for single derivatives (seed `1` on one variable, memoised per
//!   `(node, variable)`) and for Jacobian-vector products (arbitrary seeds).
//! - **reverse**: adjoints `n̄` flow from outputs to variables,
//!   `āₖ += ∂n/∂aₖ · n̄`. Used for transposed Jacobian-vector products.
//!
//! Local partials are only requested for operands whose tangent (forward) or
//! whose dependence on a requested variable (reverse) is non-zero.

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::rules::local_partial;
use crate::core::visitor::topological_order;
use crate::{Context, DiffError, Node, NodeId, Op};

/// Reusable differentiation state.
///
/// Holds the memo of already computed derivatives and local partials, so
/// repeated requests against one context (the columns of a Jacobian, the
/// second pass of a Hessian, …) share work. The memo is tied to the
/// context and epoch it was filled from and is dropped automatically when
/// used with a different context or after [`Context::clear_cache`].
#[derive(Debug, Default)]
pub struct Differentiator {
    generation: Option<(u32, u32)>,
    /// `(node, variable) → ∂node/∂variable`
    derivatives: FxHashMap<(NodeId, NodeId), NodeId>,
    /// `(node, operand index) → ∂node/∂operand`
    partials: FxHashMap<(NodeId, usize), NodeId>,
}

impl Differentiator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memoised `(node, variable)` derivatives.
    #[must_use]
    pub fn cached_derivatives(&self) -> usize {
        self.derivatives.len()
    }

    /// Forget everything. Never required for correctness.
    pub fn reset(&mut self) {
        self.generation = None;
        self.derivatives.clear();
        self.partials.clear();
    }

    pub(crate) fn sync(&mut self, ctx: &Context) {
        let current = Some(ctx.generation());
        if self.generation != current {
            if self.generation.is_some() {
                debug!(
                    "differentiator memo invalidated ({} derivatives, {} partials)",
                    self.derivatives.len(),
                    self.partials.len()
                );
            }
            self.derivatives.clear();
            self.partials.clear();
            self.generation = current;
        }
    }

    /// `∂node/∂var` as a graph node.
    ///
    /// The result only depends on the nodes reachable from `node`; if `var`
    /// is not among them the result is the constant `0`.
    ///
    /// # Errors
    /// `InvalidDifferentiationTarget` if `var` is not a variable node,
    /// `ForeignNode` / `StaleNode` for unusable handles.
    ///
    /// # Example
    /// ```
    /// use symb_graph::{Context, Differentiator};
    ///
    /// let mut ctx = Context::new();
    /// let x = ctx.make_variable("x");
    /// let y = ctx.make_variable("y");
    /// let f = ctx.mul(x, y).unwrap();
    ///
    /// let mut diff = Differentiator::new();
    /// assert_eq!(diff.derivative(&mut ctx, f, x).unwrap(), y);
    /// ```
    pub fn derivative(
        &mut self,
        ctx: &mut Context,
        node: NodeId,
        var: NodeId,
    ) -> Result<NodeId, DiffError> {
        ctx.validate(&[node, var])?;
        ctx.expect_variable(var)?;
        self.sync(ctx);

        if let Some(&known) = self.derivatives.get(&(node, var)) {
            return Ok(known);
        }

        let pending = self.pending_for(ctx, node, var)?;
        trace!("differentiating {} nodes with respect to {:?}", pending.len(), var);

        for id in pending {
            let (op, args) = match ctx.node(id)? {
                Node::Variable { .. } => {
                    let seed = ctx.make_constant(if id == var { 1.0 } else { 0.0 });
                    self.derivatives.insert((id, var), seed);
                    continue;
                }
                Node::Constant(_) => {
                    let zero = ctx.make_constant(0.0);
                    self.derivatives.insert((id, var), zero);
                    continue;
                }
                Node::Operation { op, args } => (*op, args.clone()),
            };
            // operands precede their users in the pending order
            let tangents: SmallVec<[NodeId; 3]> =
                args.iter().map(|a| self.derivatives[&(*a, var)]).collect();
            let d = self.chain(ctx, id, op, &args, &tangents)?;
            self.derivatives.insert((id, var), d);
        }

        Ok(self.derivatives[&(node, var)])
    }

    /// Repeated differentiation: `∂ⁿ node / ∂vars[0] … ∂vars[n-1]`, applied
    /// left to right. An empty `vars` returns `node` unchanged.
    ///
    /// # Errors
    /// As [`derivative`](Self::derivative), for any entry of `vars`.
    pub fn derivative_wrt(
        &mut self,
        ctx: &mut Context,
        node: NodeId,
        vars: &[NodeId],
    ) -> Result<NodeId, DiffError> {
        ctx.validate(&[node])?;
        vars.iter()
            .try_fold(node, |acc, &var| self.derivative(ctx, acc, var))
    }

    /// Post-order of the ancestors of `root` whose derivative with respect to
    /// `var` is not memoised yet. Memoised nodes cut the walk.
    fn pending_for(
        &self,
        ctx: &Context,
        root: NodeId,
        var: NodeId,
    ) -> Result<Vec<NodeId>, DiffError> {
        let mut order = Vec::new();
        let mut entered: FxHashSet<NodeId> = FxHashSet::default();
        let mut stack: Vec<(NodeId, bool)> = vec![(root, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !entered.insert(id) {
                continue;
            }
            stack.push((id, true));
            for &arg in ctx.node(id)?.args().iter().rev() {
                if !entered.contains(&arg) && !self.derivatives.contains_key(&(arg, var)) {
                    stack.push((arg, false));
                }
            }
        }
        Ok(order)
    }

    /// `Σₖ ∂id/∂argsₖ · tangentsₖ`, skipping structurally zero terms.
    fn chain(
        &mut self,
        ctx: &mut Context,
        id: NodeId,
        op: Op,
        args: &[NodeId],
        tangents: &[NodeId],
    ) -> Result<NodeId, DiffError> {
        let mut total: Option<NodeId> = None;
        for (k, &t) in tangents.iter().enumerate() {
            if ctx.is_zero(t) {
                continue;
            }
            let p = self.partial(ctx, id, op, args, k)?;
            if ctx.is_zero(p) {
                continue;
            }
            let term = ctx.mul(p, t)?;
            total = Some(match total {
                Some(acc) => ctx.add(acc, term)?,
                None => term,
            });
        }
        Ok(total.unwrap_or_else(|| ctx.make_constant(0.0)))
    }

    /// Memoised local partial `∂id/∂args[k]`.
    fn partial(
        &mut self,
        ctx: &mut Context,
        id: NodeId,
        op: Op,
        args: &[NodeId],
        k: usize,
    ) -> Result<NodeId, DiffError> {
        if let Some(&p) = self.partials.get(&(id, k)) {
            return Ok(p);
        }
        let p = local_partial(ctx, id, op, args, k)?;
        self.partials.insert((id, k), p);
        Ok(p)
    }

    /// Forward propagation with arbitrary seeds.
    ///
    /// `seeds` maps variable nodes to their tangent; every other variable has
    /// tangent `0`. Returns the tangent of each root.
    pub(crate) fn forward(
        &mut self,
        ctx: &mut Context,
        roots: &[NodeId],
        seeds: &FxHashMap<NodeId, NodeId>,
    ) -> Result<Vec<NodeId>, DiffError> {
        self.sync(ctx);
        let order = topological_order(ctx, roots)?;
        let zero = ctx.make_constant(0.0);
        let mut tangents: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        tangents.reserve(order.len());

        for id in order {
            let (op, args) = match ctx.node(id)? {
                Node::Variable { .. } => {
                    tangents.insert(id, seeds.get(&id).copied().unwrap_or(zero));
                    continue;
                }
                Node::Constant(_) => {
                    tangents.insert(id, zero);
                    continue;
                }
                Node::Operation { op, args } => (*op, args.clone()),
            };
            let ts: SmallVec<[NodeId; 3]> = args.iter().map(|a| tangents[a]).collect();
            let t = self.chain(ctx, id, op, &args, &ts)?;
            tangents.insert(id, t);
        }

        Ok(roots.iter().map(|r| tangents[r]).collect())
    }

    /// Reverse accumulation.
    ///
    /// Seeds the adjoint of `roots[i]` with `cotangents[i]` and returns the
    /// accumulated adjoint of each entry of `variables` (`0` for variables
    /// the roots do not depend on). Lengths must already agree.
    pub(crate) fn reverse(
        &mut self,
        ctx: &mut Context,
        roots: &[NodeId],
        cotangents: &[NodeId],
        variables: &[NodeId],
    ) -> Result<Vec<NodeId>, DiffError> {
        self.sync(ctx);
        let order = topological_order(ctx, roots)?;
        let wanted: FxHashSet<NodeId> = variables.iter().copied().collect();

        // nodes that depend on at least one requested variable
        let mut active: FxHashSet<NodeId> = FxHashSet::default();
        for &id in &order {
            let is_active = match ctx.node(id)? {
                Node::Variable { .. } => wanted.contains(&id),
                Node::Constant(_) => false,
                Node::Operation { args, .. } => args.iter().any(|a| active.contains(a)),
            };
            if is_active {
                active.insert(id);
            }
        }

        let mut contributions: FxHashMap<NodeId, SmallVec<[NodeId; 2]>> = FxHashMap::default();
        for (&root, &seed) in roots.iter().zip(cotangents) {
            if active.contains(&root) && !ctx.is_zero(seed) {
                contributions.entry(root).or_default().push(seed);
            }
        }

        let mut adjoints: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        for &id in order.iter().rev() {
            let Some(terms) = contributions.remove(&id) else {
                continue;
            };
            let adjoint = ctx.sum(&terms)?;
            let (op, args) = match ctx.node(id)? {
                Node::Variable { .. } => {
                    adjoints.insert(id, adjoint);
                    continue;
                }
                Node::Constant(_) => continue,
                Node::Operation { op, args } => (*op, args.clone()),
            };
            for (k, &arg) in args.iter().enumerate() {
                if !active.contains(&arg) {
                    continue;
                }
                let p = self.partial(ctx, id, op, &args, k)?;
                if ctx.is_zero(p) {
                    continue;
                }
                let term = ctx.mul(p, adjoint)?;
                contributions.entry(arg).or_default().push(term);
            }
        }

        let zero = ctx.make_constant(0.0);
        Ok(variables
            .iter()
            .map(|v| adjoints.get(v).copied().unwrap_or(zero))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_rule_shares_operands() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let y = ctx.make_variable("y");
        let f = ctx.mul(x, y).unwrap();
        let mut diff = Differentiator::new();
        assert_eq!(diff.derivative(&mut ctx, f, x).unwrap(), y);
        assert_eq!(diff.derivative(&mut ctx, f, y).unwrap(), x);
    }

    #[test]
    fn test_independent_expression_has_zero_derivative() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let y = ctx.make_variable("y");
        let f = ctx.sin(y).unwrap();
        let d = Differentiator::new().derivative(&mut ctx, f, x).unwrap();
        assert_eq!(ctx.constant_value(d).unwrap(), Some(0.0));
    }

    #[test]
    fn test_non_variable_target_is_rejected() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let two = ctx.make_constant(2.0);
        let f = ctx.mul(x, x).unwrap();
        let mut diff = Differentiator::new();
        assert!(matches!(
            diff.derivative(&mut ctx, f, two),
            Err(DiffError::InvalidDifferentiationTarget { .. })
        ));
        assert!(matches!(
            diff.derivative(&mut ctx, f, f),
            Err(DiffError::InvalidDifferentiationTarget { .. })
        ));
    }

    #[test]
    fn test_constant_exponent_does_not_build_logarithm() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let f = ctx.powf(x, 3.0).unwrap();
        let d = Differentiator::new().derivative(&mut ctx, f, x).unwrap();
        let order = topological_order(&ctx, &[d]).unwrap();
        assert!(
            order
                .iter()
                .all(|&n| ctx.node(n).unwrap().op() != Some(Op::Ln))
        );
    }

    #[test]
    fn test_memo_is_shared_and_reset_on_clear() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let s = ctx.sin(x).unwrap();
        let f = ctx.exp(s).unwrap();
        let mut diff = Differentiator::new();

        let first = diff.derivative(&mut ctx, f, x).unwrap();
        assert_eq!(diff.cached_derivatives(), 3);
        assert_eq!(diff.derivative(&mut ctx, f, x).unwrap(), first);
        assert_eq!(diff.cached_derivatives(), 3);

        ctx.clear_cache();
        let x = ctx.make_variable("x");
        let g = ctx.cos(x).unwrap();
        diff.derivative(&mut ctx, g, x).unwrap();
        assert_eq!(diff.cached_derivatives(), 2);
    }

    #[test]
    fn test_reverse_matches_forward_structurally() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let f = ctx.exp(x).unwrap();
        let one = ctx.make_constant(1.0);
        let mut diff = Differentiator::new();
        let adj = diff.reverse(&mut ctx, &[f], &[one], &[x]).unwrap();
        assert_eq!(adj, vec![f]);
        assert_eq!(diff.derivative(&mut ctx, f, x).unwrap(), f);
    }

    #[test]
    fn test_repeated_derivative() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let f = ctx.exp(x).unwrap();
        let mut diff = Differentiator::new();
        assert_eq!(diff.derivative_wrt(&mut ctx, f, &[x, x, x]).unwrap(), f);
        assert_eq!(diff.derivative_wrt(&mut ctx, f, &[]).unwrap(), f);
    }
}
