//! Local partial derivative rules.
//!
//! For an operation node `n = op(a₀, a₁, …)` this table gives `∂n/∂aₖ` as a
//! graph node. The engine combines them with the chain rule; total
//! derivatives such as `d(a*b) = da*b + a*db` fall out as
//! `Σₖ ∂n/∂aₖ · daₖ`. Rules may reuse `n` itself (`d exp(a) = exp(a)`,
//! `d tan(a) = 1 + tan²(a)`), which keeps derivative graphs sharing
//! structure with the primal graph.
//!
//! # Non-smooth conventions
//!
//! - `abs`: `∂|a| = sign(a)`, so the subgradient 0 is used at `a = 0`.
//! - `sign` and the comparisons: derivative 0 everywhere.
//! - `max(a, b)`: `∂a = [a ≥ b]`, `∂b = [a < b]` (ties go to the first operand).
//! - `min(a, b)`: `∂a = [a ≤ b]`, `∂b = [a > b]` (ties go to the first operand).
//!
//! "First" is the operand order at construction; `min` and `max` are not
//! reordered by hash-consing.
//! - `if_else(c, a, b)`: `∂c = 0`, `∂a = [c ≠ 0]`, `∂b = [c = 0]`.
//!
//! # References
//! Elementary derivatives follow DLMF §4 (<https://dlmf.nist.gov/4>).

use crate::{Context, DiffError, NodeId, Op};

/// `∂node/∂args[k]` where `node = op(args)`.
///
/// Only called for operands whose own derivative is non-zero, so rules with
/// domain restrictions (the `ln(a)` in `∂(a^b)/∂b`) are never built for
/// constant exponents.
pub(crate) fn local_partial(
    ctx: &mut Context,
    node: NodeId,
    op: Op,
    args: &[NodeId],
    k: usize,
) -> Result<NodeId, DiffError> {
    match op {
        Op::Add => Ok(ctx.make_constant(1.0)),
        Op::Sub => Ok(ctx.make_constant(if k == 0 { 1.0 } else { -1.0 })),
        Op::Mul => Ok(args[1 - k]),
        Op::Div => {
            let b = args[1];
            if k == 0 {
                // 1 / b
                let one = ctx.make_constant(1.0);
                ctx.div(one, b)
            } else {
                // -a / b² = -(a/b) / b
                let q = ctx.div(node, b)?;
                ctx.neg(q)
            }
        }
        Op::Pow => {
            let (a, b) = (args[0], args[1]);
            if k == 0 {
                // b * a^(b - 1)
                let one = ctx.make_constant(1.0);
                let b_minus_one = ctx.sub(b, one)?;
                let p = ctx.pow(a, b_minus_one)?;
                ctx.mul(b, p)
            } else {
                // a^b * ln(a)
                let ln_a = ctx.ln(a)?;
                ctx.mul(node, ln_a)
            }
        }
        Op::Neg => Ok(ctx.make_constant(-1.0)),

        Op::Abs => ctx.sign(args[0]),
        Op::Sign | Op::Lt | Op::Le | Op::Gt | Op::Ge | Op::Eq | Op::Ne => {
            Ok(ctx.make_constant(0.0))
        }
        Op::Max => {
            let (a, b) = (args[0], args[1]);
            if k == 0 {
                ctx.greater_equal(a, b)
            } else {
                ctx.less(a, b)
            }
        }
        Op::Min => {
            let (a, b) = (args[0], args[1]);
            if k == 0 {
                ctx.less_equal(a, b)
            } else {
                ctx.greater(a, b)
            }
        }

        Op::Sqrt => {
            // 1 / (2 √a)
            let half = ctx.make_constant(0.5);
            ctx.div(half, node)
        }
        Op::Cbrt => {
            // 1 / (3 ∛a²)
            let third = ctx.make_constant(1.0 / 3.0);
            let sq = ctx.square(node)?;
            ctx.div(third, sq)
        }
        Op::Exp => Ok(node),
        Op::Ln => {
            let one = ctx.make_constant(1.0);
            ctx.div(one, args[0])
        }

        Op::Sin => ctx.cos(args[0]),
        Op::Cos => {
            let s = ctx.sin(args[0])?;
            ctx.neg(s)
        }
        Op::Tan => {
            // 1 + tan²(a)
            let one = ctx.make_constant(1.0);
            let sq = ctx.square(node)?;
            ctx.add(one, sq)
        }
        Op::Asin => {
            let r = one_minus_square_root(ctx, args[0])?;
            let one = ctx.make_constant(1.0);
            ctx.div(one, r)
        }
        Op::Acos => {
            let r = one_minus_square_root(ctx, args[0])?;
            let minus_one = ctx.make_constant(-1.0);
            ctx.div(minus_one, r)
        }
        Op::Atan => {
            let one = ctx.make_constant(1.0);
            let sq = ctx.square(args[0])?;
            let den = ctx.add(one, sq)?;
            ctx.div(one, den)
        }
        Op::Atan2 => {
            // atan2(y, x): ∂y = x / (x² + y²), ∂x = -y / (x² + y²)
            let (y, x) = (args[0], args[1]);
            let xx = ctx.square(x)?;
            let yy = ctx.square(y)?;
            let den = ctx.add(xx, yy)?;
            if k == 0 {
                ctx.div(x, den)
            } else {
                let q = ctx.div(y, den)?;
                ctx.neg(q)
            }
        }

        Op::Sinh => ctx.cosh(args[0]),
        Op::Cosh => ctx.sinh(args[0]),
        Op::Tanh => {
            // 1 - tanh²(a)
            let one = ctx.make_constant(1.0);
            let sq = ctx.square(node)?;
            ctx.sub(one, sq)
        }

        Op::IfElse => {
            let (c, one, zero) = (args[0], ctx.make_constant(1.0), ctx.make_constant(0.0));
            match k {
                0 => Ok(zero),
                1 => ctx.if_else(c, one, zero),
                _ => ctx.if_else(c, zero, one),
            }
        }
    }
}

/// `√(1 - a²)`
fn one_minus_square_root(ctx: &mut Context, a: NodeId) -> Result<NodeId, DiffError> {
    let one = ctx.make_constant(1.0);
    let sq = ctx.square(a)?;
    let d = ctx.sub(one, sq)?;
    ctx.sqrt(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_partials_are_the_other_operand() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let y = ctx.make_variable("y");
        let n = ctx.mul(x, y).unwrap();
        let args = ctx.node(n).unwrap().args().to_vec();
        let p0 = local_partial(&mut ctx, n, Op::Mul, &args, 0).unwrap();
        let p1 = local_partial(&mut ctx, n, Op::Mul, &args, 1).unwrap();
        assert_eq!(p0, args[1]);
        assert_eq!(p1, args[0]);
    }

    #[test]
    fn test_exp_partial_reuses_node() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let e = ctx.exp(x).unwrap();
        assert_eq!(local_partial(&mut ctx, e, Op::Exp, &[x], 0).unwrap(), e);
    }

    #[test]
    fn test_comparison_partials_are_zero() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let y = ctx.make_variable("y");
        let c = ctx.less(x, y).unwrap();
        let p = local_partial(&mut ctx, c, Op::Lt, &[x, y], 0).unwrap();
        assert_eq!(ctx.constant_value(p).unwrap(), Some(0.0));
    }
}
