//! Parallel evaluation using Rayon
//!
//! Out-of-place evaluators hold no mutable state, so one evaluator can be
//! shared by every worker thread.
//!
//! Enable with the `parallel` feature:
//! ```toml
//! symb_graph = { version = "0.1", features = ["parallel"] }
//! ```

use std::borrow::Borrow;

use rayon::prelude::*;

use crate::DiffError;
use crate::evaluator::{Evaluator, InputBuffer, OwnedOutput};

/// Points per work item for batch evaluation.
///
/// 256 * 8 bytes = 2KB per column, which keeps a chunk in L1 cache.
const CHUNK_POINTS: usize = 256;

/// Evaluate at every point of `points` in parallel.
///
/// Results are returned in point order. The first failing point (in point
/// order) determines the error.
///
/// # Errors
/// `ShapeMismatch` if any point has the wrong number of inputs.
///
/// # Example
/// ```
/// use symb_graph::{CompileOptions, Context, compile, evaluate_parallel};
///
/// let mut ctx = Context::new();
/// let x = ctx.make_variable("x");
/// let y = ctx.make_variable("y");
/// let f = ctx.mul(x, y).unwrap();
/// let eval = compile::<[f64], [f64; 1]>(&ctx, &[f], &[x, y], &CompileOptions::new()).unwrap();
///
/// let points = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
/// let values = evaluate_parallel(&eval, &points).unwrap();
/// assert_eq!(values, vec![[2.0], [12.0]]);
/// ```
pub fn evaluate_parallel<I, O, P>(evaluator: &Evaluator<I, O>, points: &[P]) -> Result<Vec<O>, DiffError>
where
    I: InputBuffer + ?Sized,
    O: OwnedOutput<Scalar = I::Scalar> + Send,
    P: Borrow<I> + Sync,
{
    // rayon's own Result collection reports whichever error it meets first
    let results: Vec<Result<O, DiffError>> = points
        .par_iter()
        .map(|point| evaluator.evaluate(point.borrow()))
        .collect();
    results.into_iter().collect()
}

impl<I: ?Sized, O> Evaluator<I, O> {
    /// [`evaluate_batch`](Self::evaluate_batch) split across threads.
    ///
    /// Returns one column per output entry. Small batches run on the calling
    /// thread.
    ///
    /// # Errors
    /// As [`evaluate_batch`](Self::evaluate_batch).
    pub fn evaluate_batch_parallel(&self, columns: &[&[f64]]) -> Result<Vec<Vec<f64>>, DiffError> {
        let program = self.program();
        let width = program.output_shape().len();
        let points = match columns.first() {
            Some(first) => first.len(),
            None => 1,
        };
        let mut outputs = vec![vec![0.0; points]; width];
        let sequential = points < CHUNK_POINTS;
        {
            let mut views: Vec<&mut [f64]> = outputs.iter_mut().map(Vec::as_mut_slice).collect();
            program.check_batch(columns, &views)?;
            if sequential {
                program.run_batch(columns, &mut views)?;
            }
        }
        if sequential {
            return Ok(outputs);
        }

        let chunks: Vec<(usize, Vec<Vec<f64>>)> = (0..points)
            .step_by(CHUNK_POINTS)
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|start| {
                let end = (start + CHUNK_POINTS).min(points);
                let slices: Vec<&[f64]> = columns.iter().map(|c| &c[start..end]).collect();
                let mut chunk = vec![vec![0.0; end - start]; width];
                let mut views: Vec<&mut [f64]> = chunk.iter_mut().map(Vec::as_mut_slice).collect();
                program.run_batch(&slices, &mut views).map(|()| (start, chunk))
            })
            .collect::<Result<_, _>>()?;

        for (start, chunk) in chunks {
            for (column, part) in outputs.iter_mut().zip(chunk) {
                column[start..start + part.len()].copy_from_slice(&part);
            }
        }
        Ok(outputs)
    }
}
