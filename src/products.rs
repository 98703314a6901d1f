//! Matrix-free Jacobian products.
//!
//! `J·v` and `Jᵀ·w` are built as graphs in their own right, with the vector
//! operand carried by fresh *seed* variables. No Jacobian matrix is formed:
//! `J·v` is one forward sweep with the seeds as variable tangents, `Jᵀ·w`
//! one reverse sweep with the seeds as output adjoints. Local partials come
//! from the same memo as [`Differentiator::jacobian`], so products built
//! after (or before) a Jacobian on the same `Differentiator` share its work.
//!
//! # Example
//! ```
//! use symb_graph::{CompileOptions, Context, Differentiator, compile};
//!
//! let mut ctx = Context::new();
//! let x = ctx.make_variable("x");
//! let y = ctx.make_variable("y");
//! let f = ctx.mul(x, y).unwrap();
//!
//! let jv = Differentiator::new().jacobian_times_v(&mut ctx, &[f], &[x, y]).unwrap();
//! let mut inputs = vec![x, y];
//! inputs.extend(&jv.seeds);
//!
//! let eval = compile::<[f64], Vec<f64>>(&ctx, &jv.product, &inputs, &CompileOptions::new()).unwrap();
//! // d(xy)·(v1, v2) = y v1 + x v2
//! assert_eq!(eval.evaluate(&[2.0, 3.0, 1.0, 10.0]).unwrap(), vec![23.0]);
//! ```

use log::debug;
use rustc_hash::FxHashMap;

use crate::{Context, DiffError, Differentiator, NodeId};

/// A product graph together with the seed variables carrying its vector
/// operand.
///
/// The seeds are ordinary variables: append them to the compiler's input
/// list (after the primal variables, or anywhere else) and supply the vector
/// at those positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorProduct {
    /// One node per product entry.
    pub product: Vec<NodeId>,
    /// Fresh seed variables, one per vector entry, in vector order.
    pub seeds: Vec<NodeId>,
}

impl Differentiator {
    /// `J·v` where `J = ∂outputs/∂variables`.
    ///
    /// Introduces one seed per entry of `variables` (named `v1, v2, …`);
    /// `product[i] = Σⱼ ∂outputs[i]/∂variables[j] · seeds[j]`.
    ///
    /// # Errors
    /// `InvalidDifferentiationTarget` if an entry of `variables` is not a
    /// variable, `ForeignNode` / `StaleNode` for unusable handles.
    pub fn jacobian_times_v(
        &mut self,
        ctx: &mut Context,
        outputs: &[NodeId],
        variables: &[NodeId],
    ) -> Result<VectorProduct, DiffError> {
        check_arguments(ctx, outputs, variables)?;
        let seeds = ctx.make_variables("v", variables.len());

        // a variable listed twice gets the sum of its seeds
        let mut tangents: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        for (&var, &seed) in variables.iter().zip(&seeds) {
            let tangent = match tangents.get(&var) {
                Some(&previous) => ctx.add(previous, seed)?,
                None => seed,
            };
            tangents.insert(var, tangent);
        }

        let product = self.forward(ctx, outputs, &tangents)?;
        debug!(
            "built J·v for {} outputs over {} variables ({} graph nodes)",
            outputs.len(),
            variables.len(),
            ctx.len()
        );
        Ok(VectorProduct { product, seeds })
    }

    /// `Jᵀ·w` where `J = ∂outputs/∂variables`.
    ///
    /// Introduces one seed per output (named `w1, w2, …`);
    /// `product[j] = Σᵢ ∂outputs[i]/∂variables[j] · seeds[i]`.
    ///
    /// # Errors
    /// As [`jacobian_times_v`](Self::jacobian_times_v).
    pub fn jacobian_transpose_v(
        &mut self,
        ctx: &mut Context,
        outputs: &[NodeId],
        variables: &[NodeId],
    ) -> Result<VectorProduct, DiffError> {
        check_arguments(ctx, outputs, variables)?;
        let seeds = ctx.make_variables("w", outputs.len());
        let product = self.reverse(ctx, outputs, &seeds, variables)?;
        debug!(
            "built Jᵀ·w for {} outputs over {} variables ({} graph nodes)",
            outputs.len(),
            variables.len(),
            ctx.len()
        );
        Ok(VectorProduct { product, seeds })
    }

    /// `H·v` for the scalar `f`: the `J·v` of its gradient.
    ///
    /// # Errors
    /// As [`jacobian_times_v`](Self::jacobian_times_v).
    pub fn hessian_times_v(
        &mut self,
        ctx: &mut Context,
        f: NodeId,
        variables: &[NodeId],
    ) -> Result<VectorProduct, DiffError> {
        let grad = self.gradient(ctx, f, variables)?;
        self.jacobian_times_v(ctx, &grad, variables)
    }
}

fn check_arguments(ctx: &Context, outputs: &[NodeId], variables: &[NodeId]) -> Result<(), DiffError> {
    ctx.validate(outputs)?;
    variables
        .iter()
        .try_for_each(|&var| ctx.expect_variable(var))
}

/// `J·v` with a throwaway [`Differentiator`].
///
/// # Errors
/// See [`Differentiator::jacobian_times_v`].
pub fn jacobian_times_v(
    ctx: &mut Context,
    outputs: &[NodeId],
    variables: &[NodeId],
) -> Result<VectorProduct, DiffError> {
    Differentiator::new().jacobian_times_v(ctx, outputs, variables)
}

/// `Jᵀ·w` with a throwaway [`Differentiator`].
///
/// # Errors
/// See [`Differentiator::jacobian_transpose_v`].
pub fn jacobian_transpose_v(
    ctx: &mut Context,
    outputs: &[NodeId],
    variables: &[NodeId],
) -> Result<VectorProduct, DiffError> {
    Differentiator::new().jacobian_transpose_v(ctx, outputs, variables)
}

/// `H·v` with a throwaway [`Differentiator`].
///
/// # Errors
/// See [`Differentiator::hessian_times_v`].
pub fn hessian_times_v(
    ctx: &mut Context,
    f: NodeId,
    variables: &[NodeId],
) -> Result<VectorProduct, DiffError> {
    Differentiator::new().hessian_times_v(ctx, f, variables)
}
