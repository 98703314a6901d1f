//! Typed graph builders and the incidental identity rules applied on
//! construction.
//!
//! The rules are O(1) pattern matches on the immediate operands. They keep
//! derivative graphs from filling up with `0 * x` and `1 * x` terms; they are
//! not a simplifier and never look deeper than one level.

use super::context::Context;
use super::node::{Node, NodeId};
use super::op::Op;
use crate::DiffError;

impl Context {
    /// Identity rewrites for `op(args)`. Operands must be valid.
    pub(crate) fn rewrite(&mut self, op: Op, args: &[NodeId]) -> Option<NodeId> {
        match (op, args) {
            (Op::Add, &[a, b]) => {
                if self.is_zero(a) {
                    Some(b)
                } else if self.is_zero(b) {
                    Some(a)
                } else {
                    None
                }
            }
            (Op::Sub, &[a, b]) => {
                if self.is_zero(b) {
                    Some(a)
                } else if a == b {
                    Some(self.make_constant(0.0))
                } else if self.is_zero(a) {
                    Some(self.build(Op::Neg, &[b]))
                } else {
                    None
                }
            }
            (Op::Mul, &[a, b]) => {
                if self.is_zero(a) || self.is_zero(b) {
                    Some(self.make_constant(0.0))
                } else if self.is_one(a) {
                    Some(b)
                } else if self.is_one(b) {
                    Some(a)
                } else if self.is_neg_one(a) {
                    Some(self.build(Op::Neg, &[b]))
                } else if self.is_neg_one(b) {
                    Some(self.build(Op::Neg, &[a]))
                } else {
                    None
                }
            }
            (Op::Div, &[a, b]) => {
                if self.is_one(b) {
                    Some(a)
                } else if self.is_neg_one(b) {
                    Some(self.build(Op::Neg, &[a]))
                } else if self.is_zero(a) && !self.is_zero(b) {
                    Some(a)
                } else {
                    None
                }
            }
            (Op::Pow, &[a, b]) => {
                if self.is_zero(b) {
                    Some(self.make_constant(1.0))
                } else if self.is_one(b) {
                    Some(a)
                } else {
                    None
                }
            }
            (Op::Neg, &[a]) => match self.node(a).ok()? {
                Node::Operation { op: Op::Neg, args } => Some(args[0]),
                _ => None,
            },
            (Op::IfElse, &[c, a, b]) => {
                if a == b {
                    return Some(a);
                }
                let cond = self.node(c).ok()?.as_constant()?;
                Some(if cond == 0.0 { b } else { a })
            }
            _ => None,
        }
    }

    fn is_neg_one(&self, id: NodeId) -> bool {
        matches!(self.node(id), Ok(Node::Constant(c)) if *c == -1.0)
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    /// `a + b`
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    #[allow(
        clippy::should_implement_trait,
        reason = "Builders need &mut Context, operator traits cannot provide it"
    )]
    pub fn add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Add, &[a, b])
    }

    /// `a - b`
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    #[allow(
        clippy::should_implement_trait,
        reason = "Builders need &mut Context, operator traits cannot provide it"
    )]
    pub fn sub(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Sub, &[a, b])
    }

    /// `a * b`
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    #[allow(
        clippy::should_implement_trait,
        reason = "Builders need &mut Context, operator traits cannot provide it"
    )]
    pub fn mul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Mul, &[a, b])
    }

    /// `a / b`
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    #[allow(
        clippy::should_implement_trait,
        reason = "Builders need &mut Context, operator traits cannot provide it"
    )]
    pub fn div(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Div, &[a, b])
    }

    /// `a ^ b`
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    pub fn pow(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Pow, &[a, b])
    }

    /// `a ^ n` with a literal exponent.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn powf(&mut self, a: NodeId, n: f64) -> Result<NodeId, DiffError> {
        let n = self.make_constant(n);
        self.pow(a, n)
    }

    /// `a ^ n` with an integer exponent.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn powi(&mut self, a: NodeId, n: i32) -> Result<NodeId, DiffError> {
        self.powf(a, f64::from(n))
    }

    /// `a * a`
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn square(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.mul(a, a)
    }

    /// `-a`
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    #[allow(
        clippy::should_implement_trait,
        reason = "Builders need &mut Context, operator traits cannot provide it"
    )]
    pub fn neg(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Neg, &[a])
    }

    /// `c * a` for a literal `c`.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn scale(&mut self, c: f64, a: NodeId) -> Result<NodeId, DiffError> {
        let c = self.make_constant(c);
        self.mul(c, a)
    }

    /// Left-to-right sum of `terms`; the empty sum is `0`.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable term.
    pub fn sum(&mut self, terms: &[NodeId]) -> Result<NodeId, DiffError> {
        let Some((&first, rest)) = terms.split_first() else {
            return Ok(self.make_constant(0.0));
        };
        self.validate(&[first])?;
        rest.iter().try_fold(first, |acc, &t| self.add(acc, t))
    }

    /// Left-to-right product of `factors`; the empty product is `1`.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable factor.
    pub fn product(&mut self, factors: &[NodeId]) -> Result<NodeId, DiffError> {
        let Some((&first, rest)) = factors.split_first() else {
            return Ok(self.make_constant(1.0));
        };
        self.validate(&[first])?;
        rest.iter().try_fold(first, |acc, &f| self.mul(acc, f))
    }

    /// Dot product `Σ a[i] * b[i]`.
    ///
    /// # Errors
    /// `DimensionMismatch` when lengths differ, or an unusable node.
    pub fn dot(&mut self, a: &[NodeId], b: &[NodeId]) -> Result<NodeId, DiffError> {
        if a.len() != b.len() {
            return Err(DiffError::DimensionMismatch {
                expected: a.len(),
                got: b.len(),
            });
        }
        let terms = a
            .iter()
            .zip(b)
            .map(|(&x, &y)| self.mul(x, y))
            .collect::<Result<Vec<_>, _>>()?;
        self.sum(&terms)
    }

    // =========================================================================
    // Elementary functions
    // =========================================================================

    /// `|a|`
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn abs(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Abs, &[a])
    }

    /// `sign(a)`, zero at zero.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn sign(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Sign, &[a])
    }

    /// `√a`
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn sqrt(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Sqrt, &[a])
    }

    /// `∛a`
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn cbrt(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Cbrt, &[a])
    }

    /// `e^a`
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn exp(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Exp, &[a])
    }

    /// Natural logarithm.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn ln(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Ln, &[a])
    }

    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn sin(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Sin, &[a])
    }

    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn cos(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Cos, &[a])
    }

    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn tan(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Tan, &[a])
    }

    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn asin(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Asin, &[a])
    }

    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn acos(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Acos, &[a])
    }

    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn atan(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Atan, &[a])
    }

    /// Four-quadrant arctangent of `y / x`.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    pub fn atan2(&mut self, y: NodeId, x: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Atan2, &[y, x])
    }

    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn sinh(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Sinh, &[a])
    }

    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn cosh(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Cosh, &[a])
    }

    /// # Errors
    /// `ForeignNode` or `StaleNode` for an unusable operand.
    pub fn tanh(&mut self, a: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Tanh, &[a])
    }

    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    #[allow(
        clippy::should_implement_trait,
        reason = "Builders need &mut Context, Ord cannot provide it"
    )]
    pub fn min(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Min, &[a, b])
    }

    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    #[allow(
        clippy::should_implement_trait,
        reason = "Builders need &mut Context, Ord cannot provide it"
    )]
    pub fn max(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Max, &[a, b])
    }

    // =========================================================================
    // Comparisons and selection
    // =========================================================================

    /// `a < b` as 1.0 / 0.0.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    pub fn less(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Lt, &[a, b])
    }

    /// `a <= b` as 1.0 / 0.0.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    pub fn less_equal(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Le, &[a, b])
    }

    /// `a > b` as 1.0 / 0.0.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    pub fn greater(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Gt, &[a, b])
    }

    /// `a >= b` as 1.0 / 0.0.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    pub fn greater_equal(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Ge, &[a, b])
    }

    /// `a == b` as 1.0 / 0.0.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    pub fn equal(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Eq, &[a, b])
    }

    /// `a != b` as 1.0 / 0.0.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    pub fn not_equal(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, DiffError> {
        self.make_operation(Op::Ne, &[a, b])
    }

    /// `then` where `cond != 0`, otherwise `otherwise`.
    ///
    /// # Errors
    /// `ForeignNode` or `StaleNode` for unusable operands.
    pub fn if_else(
        &mut self,
        cond: NodeId,
        then: NodeId,
        otherwise: NodeId,
    ) -> Result<NodeId, DiffError> {
        self.make_operation(Op::IfElse, &[cond, then, otherwise])
    }
}
