//! Gradient, Jacobian and Hessian assembly.
//!
//! Every entry is produced by [`Differentiator::derivative`], so entries that
//! share subexpressions share derivative work, and a `Differentiator` reused
//! across calls carries that work over (a full Jacobian followed by a column
//! subset of it costs nothing extra).

use log::debug;

use crate::matrix::{Matrix, SparseMatrix};
use crate::{Context, DiffError, Differentiator, NodeId};

impl Differentiator {
    /// Jacobian matrix `∂outputs[i]/∂columns[j]`.
    ///
    /// Rows follow `outputs`. Columns follow `columns` when given (any
    /// subset or reordering of `variables`, repeats allowed), otherwise
    /// `variables`.
    ///
    /// # Errors
    /// - `InvalidDifferentiationTarget` if an entry of `variables` is not a variable
    /// - `UnknownColumn` if a column is not one of `variables`
    /// - `ForeignNode` / `StaleNode` for unusable handles
    ///
    /// # Example
    /// ```
    /// use symb_graph::{Context, Differentiator};
    ///
    /// let mut ctx = Context::new();
    /// let x = ctx.make_variable("x");
    /// let y = ctx.make_variable("y");
    /// let f = ctx.mul(x, y).unwrap();
    /// let g = ctx.add(x, y).unwrap();
    ///
    /// let mut diff = Differentiator::new();
    /// let j = diff.jacobian(&mut ctx, &[f, g], &[x, y], Some(&[y])).unwrap();
    /// assert_eq!((j.rows(), j.cols()), (2, 1));
    /// assert_eq!(j[(0, 0)], x);
    /// ```
    pub fn jacobian(
        &mut self,
        ctx: &mut Context,
        outputs: &[NodeId],
        variables: &[NodeId],
        columns: Option<&[NodeId]>,
    ) -> Result<Matrix<NodeId>, DiffError> {
        let selected = resolve_columns(ctx, outputs, variables, columns)?;

        let mut data = Vec::with_capacity(outputs.len() * selected.len());
        for &out in outputs {
            for &var in &selected {
                data.push(self.derivative(ctx, out, var)?);
            }
        }
        debug!(
            "assembled {}x{} jacobian ({} memoised derivatives, {} graph nodes)",
            outputs.len(),
            selected.len(),
            self.cached_derivatives(),
            ctx.len()
        );
        Ok(Matrix::from_raw(outputs.len(), selected.len(), data))
    }

    /// `[∂f/∂v for v in variables]`, row 0 of `jacobian([f], variables)`.
    ///
    /// # Errors
    /// As [`jacobian`](Self::jacobian).
    pub fn gradient(
        &mut self,
        ctx: &mut Context,
        f: NodeId,
        variables: &[NodeId],
    ) -> Result<Vec<NodeId>, DiffError> {
        Ok(self.jacobian(ctx, &[f], variables, None)?.into_vec())
    }

    /// Matrix of second derivatives: the Jacobian of the gradient.
    ///
    /// Symmetric up to floating point for functions with continuous second
    /// derivatives; both triangles are built and nothing is mirrored.
    ///
    /// # Errors
    /// As [`jacobian`](Self::jacobian).
    pub fn hessian(
        &mut self,
        ctx: &mut Context,
        f: NodeId,
        variables: &[NodeId],
    ) -> Result<Matrix<NodeId>, DiffError> {
        let grad = self.gradient(ctx, f, variables)?;
        self.jacobian(ctx, &grad, variables, None)
    }

    /// Jacobian without its structurally zero entries.
    ///
    /// An entry is dropped when its derivative node is the constant `0`,
    /// which is the case whenever the output does not depend on the variable.
    ///
    /// # Errors
    /// As [`jacobian`](Self::jacobian).
    pub fn sparse_jacobian(
        &mut self,
        ctx: &mut Context,
        outputs: &[NodeId],
        variables: &[NodeId],
    ) -> Result<SparseMatrix, DiffError> {
        let selected = resolve_columns(ctx, outputs, variables, None)?;
        let mut entries = Vec::new();
        for (row, &out) in outputs.iter().enumerate() {
            for (col, &var) in selected.iter().enumerate() {
                let d = self.derivative(ctx, out, var)?;
                if !ctx.is_zero(d) {
                    entries.push((row, col, d));
                }
            }
        }
        debug!(
            "assembled sparse {}x{} jacobian with {} entries",
            outputs.len(),
            selected.len(),
            entries.len()
        );
        Ok(SparseMatrix {
            rows: outputs.len(),
            cols: selected.len(),
            entries,
        })
    }
}

/// Validate the arguments of a Jacobian request and resolve its columns.
fn resolve_columns(
    ctx: &Context,
    outputs: &[NodeId],
    variables: &[NodeId],
    columns: Option<&[NodeId]>,
) -> Result<Vec<NodeId>, DiffError> {
    ctx.validate(outputs)?;
    for &var in variables {
        ctx.expect_variable(var)?;
    }
    let Some(columns) = columns else {
        return Ok(variables.to_vec());
    };
    columns
        .iter()
        .enumerate()
        .map(|(position, col)| {
            if variables.contains(col) {
                Ok(*col)
            } else {
                Err(DiffError::UnknownColumn { position })
            }
        })
        .collect()
}

// ===== One-shot helpers =====

/// `∂node/∂var` with a throwaway [`Differentiator`].
///
/// # Errors
/// See [`Differentiator::derivative`].
pub fn derivative(ctx: &mut Context, node: NodeId, var: NodeId) -> Result<NodeId, DiffError> {
    Differentiator::new().derivative(ctx, node, var)
}

/// Successive partials with a throwaway [`Differentiator`].
///
/// # Errors
/// See [`Differentiator::derivative_wrt`].
pub fn derivative_wrt(
    ctx: &mut Context,
    node: NodeId,
    vars: &[NodeId],
) -> Result<NodeId, DiffError> {
    Differentiator::new().derivative_wrt(ctx, node, vars)
}

/// Gradient with a throwaway [`Differentiator`].
///
/// # Errors
/// See [`Differentiator::gradient`].
pub fn gradient(
    ctx: &mut Context,
    f: NodeId,
    variables: &[NodeId],
) -> Result<Vec<NodeId>, DiffError> {
    Differentiator::new().gradient(ctx, f, variables)
}

/// Jacobian with a throwaway [`Differentiator`].
///
/// # Errors
/// See [`Differentiator::jacobian`].
pub fn jacobian(
    ctx: &mut Context,
    outputs: &[NodeId],
    variables: &[NodeId],
    columns: Option<&[NodeId]>,
) -> Result<Matrix<NodeId>, DiffError> {
    Differentiator::new().jacobian(ctx, outputs, variables, columns)
}

/// Hessian with a throwaway [`Differentiator`].
///
/// # Errors
/// See [`Differentiator::hessian`].
pub fn hessian(
    ctx: &mut Context,
    f: NodeId,
    variables: &[NodeId],
) -> Result<Matrix<NodeId>, DiffError> {
    Differentiator::new().hessian(ctx, f, variables)
}

/// Sparse Jacobian with a throwaway [`Differentiator`].
///
/// # Errors
/// See [`Differentiator::sparse_jacobian`].
pub fn sparse_jacobian(
    ctx: &mut Context,
    outputs: &[NodeId],
    variables: &[NodeId],
) -> Result<SparseMatrix, DiffError> {
    Differentiator::new().sparse_jacobian(ctx, outputs, variables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_column_is_rejected() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let y = ctx.make_variable("y");
        let f = ctx.sin(x).unwrap();
        let err = jacobian(&mut ctx, &[f], &[x], Some(&[x, y])).unwrap_err();
        assert_eq!(err, DiffError::UnknownColumn { position: 1 });
    }

    #[test]
    fn test_column_subset_reuses_memo() {
        let mut ctx = Context::new();
        let vars = ctx.make_variables("x", 3);
        let xy = ctx.mul(vars[0], vars[1]).unwrap();
        let f = ctx.sin(xy).unwrap();
        let g = ctx.mul(xy, vars[2]).unwrap();

        let mut diff = Differentiator::new();
        let full = diff.jacobian(&mut ctx, &[f, g], &vars, None).unwrap();
        let cached = diff.cached_derivatives();
        let nodes = ctx.len();

        let sub = diff
            .jacobian(&mut ctx, &[f, g], &vars, Some(&[vars[2], vars[1]]))
            .unwrap();
        assert_eq!(diff.cached_derivatives(), cached);
        assert_eq!(ctx.len(), nodes);
        assert_eq!(sub, full.select_columns(&[2, 1]));
    }

    #[test]
    fn test_sparse_jacobian_skips_independent_entries() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let y = ctx.make_variable("y");
        let f = ctx.exp(x).unwrap();
        let g = ctx.mul(x, y).unwrap();
        let sparse = sparse_jacobian(&mut ctx, &[f, g], &[x, y]).unwrap();
        assert_eq!((sparse.rows, sparse.cols), (2, 2));
        assert_eq!(sparse.pattern().collect::<Vec<_>>(), vec![(0, 0), (1, 0), (1, 1)]);
        assert_eq!(sparse.get(0, 0), Some(f));
        assert_eq!(sparse.get(0, 1), None);
    }

    #[test]
    fn test_hessian_of_product_is_symmetric_structurally() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let y = ctx.make_variable("y");
        let f = ctx.mul(x, y).unwrap();
        let h = hessian(&mut ctx, f, &[x, y]).unwrap();
        assert_eq!(ctx.constant_value(h[(0, 1)]).unwrap(), Some(1.0));
        assert_eq!(h[(0, 1)], h[(1, 0)]);
        assert_eq!(ctx.constant_value(h[(0, 0)]).unwrap(), Some(0.0));
    }

    #[test]
    fn test_non_variable_in_variables_is_rejected() {
        let mut ctx = Context::new();
        let x = ctx.make_variable("x");
        let s = ctx.sin(x).unwrap();
        assert!(matches!(
            gradient(&mut ctx, s, &[s]),
            Err(DiffError::InvalidDifferentiationTarget { .. })
        ));
    }
}
