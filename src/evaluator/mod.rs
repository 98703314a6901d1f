//! Graph compiler and compiled evaluators.
//!
//! Compilation turns the part of a graph reachable from a set of outputs into
//! a flat register program that runs without touching the [`Context`] again.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐    ┌────────────┐    ┌───────────────────────┐
//! │  NodeId DAG │ -> │  Compiler  │ -> │        Program        │
//! │  (Context)  │    │ topo sort, │    │ (register machine,    │
//! └─────────────┘    │ slot reuse │    │  Send + Sync)         │
//!                    └────────────┘    └───────────────────────┘
//!                                              │
//!                          ┌───────────────────┼───────────────────┐
//!                          ▼                   ▼                   ▼
//!                    ┌──────────┐      ┌──────────────┐     ┌──────────┐
//!                    │ evaluate │      │evaluate_batch│     │ parallel │
//!                    │ (scalar) │      │    (SIMD)    │     │  (Rayon) │
//!                    └──────────┘      └──────────────┘     └──────────┘
//! ```
//!
//! # Calling conventions
//!
//! [`compile`] produces an [`Evaluator`] that allocates and returns its
//! output container. [`compile_in_place`] produces an [`InPlaceEvaluator`]
//! that writes into a container supplied by the caller and allocates no
//! output. Both are parameterised by their input and output container types
//! (see [`buffers`](self::buffers)), which selects dynamically sized or fixed
//! size containers.
//!
//! # Example
//!
//! ```
//! use symb_graph::{CompileOptions, Context, compile, compile_in_place};
//!
//! let mut ctx = Context::new();
//! let x = ctx.make_variable("x");
//! let y = ctx.make_variable("y");
//! let xy = ctx.mul(x, y).unwrap();
//! let f = ctx.square(xy).unwrap();
//! let g = ctx.sqrt(xy).unwrap();
//!
//! let options = CompileOptions::new();
//! let eval = compile::<[f64; 2], [f64; 2]>(&ctx, &[f, g], &[x, y], &options).unwrap();
//! let [a, b] = eval.evaluate(&[1.0, 2.0]).unwrap();
//! assert_eq!(a, 4.0);
//! assert!((b - 2.0_f64.sqrt()).abs() < 1e-15);
//!
//! let in_place = compile_in_place::<[f64], [f64]>(&ctx, &[f, g], &[x, y], &options).unwrap();
//! let mut out = [0.0; 2];
//! in_place.evaluate_into(&[1.0, 2.0], &mut out).unwrap();
//! assert_eq!(out, [a, b]);
//! ```

pub mod buffers;
mod compiler;
mod execution;
mod instruction;
mod simd;

#[cfg(test)]
mod tests;

pub use buffers::{InputBuffer, OutputBuffer, OwnedOutput};
pub use instruction::Instruction;

use std::fmt;
use std::marker::PhantomData;

use crate::matrix::{Matrix, Shape};
use crate::{CompileOptions, Context, DiffError, NodeId};

// =============================================================================
// Outputs - the nodes to compute and the shape to present them in
// =============================================================================

/// Output nodes of a compilation, with their shape.
///
/// Built from a node, a slice or `Vec` of nodes (a vector) or a
/// [`Matrix`] of nodes (a matrix, rows first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outputs {
    nodes: Vec<NodeId>,
    shape: Shape,
}

impl Outputs {
    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    #[must_use]
    pub const fn shape(&self) -> Shape {
        self.shape
    }
}

impl From<NodeId> for Outputs {
    fn from(node: NodeId) -> Self {
        Self {
            nodes: vec![node],
            shape: Shape::Vector(1),
        }
    }
}

impl From<&[NodeId]> for Outputs {
    fn from(nodes: &[NodeId]) -> Self {
        Self {
            shape: Shape::Vector(nodes.len()),
            nodes: nodes.to_vec(),
        }
    }
}

impl<const N: usize> From<&[NodeId; N]> for Outputs {
    fn from(nodes: &[NodeId; N]) -> Self {
        Self::from(nodes.as_slice())
    }
}

impl From<&Vec<NodeId>> for Outputs {
    fn from(nodes: &Vec<NodeId>) -> Self {
        Self::from(nodes.as_slice())
    }
}

impl From<Vec<NodeId>> for Outputs {
    fn from(nodes: Vec<NodeId>) -> Self {
        Self {
            shape: Shape::Vector(nodes.len()),
            nodes,
        }
    }
}

impl From<&Matrix<NodeId>> for Outputs {
    fn from(matrix: &Matrix<NodeId>) -> Self {
        Self {
            shape: matrix.shape(),
            nodes: matrix.as_slice().to_vec(),
        }
    }
}

impl From<Matrix<NodeId>> for Outputs {
    fn from(matrix: Matrix<NodeId>) -> Self {
        Self {
            shape: matrix.shape(),
            nodes: matrix.into_vec(),
        }
    }
}

// =============================================================================
// Program - the compiled form shared by both evaluator kinds
// =============================================================================

/// A compiled register program.
///
/// Immutable after compilation and independent of the [`Context`] it was
/// compiled from: clearing the context does not affect it.
#[derive(Debug, Clone)]
pub struct Program {
    instructions: Box<[Instruction]>,
    /// Output slot of each output entry, row-major
    outputs: Box<[u32]>,
    slot_count: usize,
    input_count: usize,
    shape: Shape,
}

impl Program {
    /// Number of evaluation steps.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Number of value slots a single evaluation needs.
    #[must_use]
    pub const fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Expected input length.
    #[must_use]
    pub const fn input_count(&self) -> usize {
        self.input_count
    }

    /// Shape of the outputs.
    #[must_use]
    pub const fn output_shape(&self) -> Shape {
        self.shape
    }

    /// The instructions, in execution order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    fn check_inputs(&self, len: usize) -> Result<(), DiffError> {
        if len == self.input_count {
            Ok(())
        } else {
            Err(DiffError::ShapeMismatch {
                expected: Shape::Vector(self.input_count),
                got: Shape::Vector(len),
            })
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{}", instruction)?;
        }
        let outs: Vec<String> = self.outputs.iter().map(|s| format!("r{}", s)).collect();
        write!(f, "out {} = [{}]", self.shape, outs.join(", "))
    }
}

/// Check the container types of an evaluator against the compilation request.
fn check_containers<I, O>(inputs: usize, shape: Shape) -> Result<(), DiffError>
where
    I: InputBuffer + ?Sized,
    O: OutputBuffer + ?Sized,
{
    if let Some(fixed) = I::fixed_len()
        && fixed != inputs
    {
        return Err(DiffError::ShapeMismatch {
            expected: Shape::Vector(inputs),
            got: Shape::Vector(fixed),
        });
    }
    if !O::accepts(shape) {
        return Err(DiffError::ShapeMismatch {
            expected: shape,
            got: O::fixed_shape().unwrap_or(shape),
        });
    }
    Ok(())
}

// =============================================================================
// Evaluators
// =============================================================================

/// Allocating evaluator: `evaluate(inputs) -> outputs`.
///
/// Stateless, so one instance may be called from many threads at once.
pub struct Evaluator<I: ?Sized, O> {
    program: Program,
    containers: PhantomData<fn(&I) -> O>,
}

/// In-place evaluator: `evaluate_into(inputs, &mut outputs)`.
///
/// Performs no output allocation. Concurrent callers must each supply their
/// own output container, which the borrow checker already requires.
pub struct InPlaceEvaluator<I: ?Sized, O: ?Sized> {
    program: Program,
    containers: PhantomData<fn(&I, &mut O)>,
}

impl<I: ?Sized, O> Clone for Evaluator<I, O> {
    fn clone(&self) -> Self {
        Self {
            program: self.program.clone(),
            containers: PhantomData,
        }
    }
}

impl<I: ?Sized, O: ?Sized> Clone for InPlaceEvaluator<I, O> {
    fn clone(&self) -> Self {
        Self {
            program: self.program.clone(),
            containers: PhantomData,
        }
    }
}

impl<I: ?Sized, O> fmt::Debug for Evaluator<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("program", &self.program)
            .finish()
    }
}

impl<I: ?Sized, O: ?Sized> fmt::Debug for InPlaceEvaluator<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InPlaceEvaluator")
            .field("program", &self.program)
            .finish()
    }
}

impl<I: ?Sized, O> Evaluator<I, O> {
    /// The compiled program.
    #[must_use]
    pub const fn program(&self) -> &Program {
        &self.program
    }
}

impl<I: ?Sized, O: ?Sized> InPlaceEvaluator<I, O> {
    /// The compiled program.
    #[must_use]
    pub const fn program(&self) -> &Program {
        &self.program
    }
}

impl<I, O> Evaluator<I, O>
where
    I: InputBuffer + ?Sized,
    O: OwnedOutput<Scalar = I::Scalar>,
{
    /// Evaluate at one point.
    ///
    /// # Errors
    /// `ShapeMismatch` if `inputs` does not have one entry per compiled input.
    pub fn evaluate(&self, inputs: &I) -> Result<O, DiffError> {
        let values = inputs.values();
        self.program.check_inputs(values.len())?;
        let mut out = O::allocate(self.program.shape);
        self.program.run(values, out.values_mut());
        Ok(out)
    }
}

impl<I, O> InPlaceEvaluator<I, O>
where
    I: InputBuffer + ?Sized,
    O: OutputBuffer<Scalar = I::Scalar> + ?Sized,
{
    /// Evaluate at one point, writing into `outputs`.
    ///
    /// # Errors
    /// `ShapeMismatch` if `inputs` has the wrong length or `outputs` the
    /// wrong shape. `outputs` is left untouched on error.
    pub fn evaluate_into(&self, inputs: &I, outputs: &mut O) -> Result<(), DiffError> {
        let values = inputs.values();
        self.program.check_inputs(values.len())?;
        if !outputs.fits(self.program.shape) {
            return Err(DiffError::ShapeMismatch {
                expected: self.program.shape,
                got: outputs.shape(),
            });
        }
        self.program.run(values, outputs.values_mut());
        Ok(())
    }
}

/// Compile `outputs` into an allocating evaluator.
///
/// `inputs` lists the variables in the order the evaluator reads them. Every
/// variable reachable from `outputs` must be listed; listed variables that
/// the outputs do not use are simply ignored.
///
/// # Errors
/// - `MissingInputVariable` if a reachable variable is not in `inputs`
/// - `InvalidInput` if an entry of `inputs` is not a variable or is repeated
/// - `ShapeMismatch` if the container types cannot hold the inputs or outputs
/// - `ForeignNode` / `StaleNode` for unusable handles
pub fn compile<I, O>(
    ctx: &Context,
    outputs: impl Into<Outputs>,
    inputs: &[NodeId],
    options: &CompileOptions,
) -> Result<Evaluator<I, O>, DiffError>
where
    I: InputBuffer + ?Sized,
    O: OwnedOutput<Scalar = I::Scalar>,
{
    let outputs = outputs.into();
    check_containers::<I, O>(inputs.len(), outputs.shape)?;
    Ok(Evaluator {
        program: compiler::compile_program(ctx, &outputs, inputs, options)?,
        containers: PhantomData,
    })
}

/// Compile `outputs` into an in-place evaluator.
///
/// # Errors
/// As [`compile`].
pub fn compile_in_place<I, O>(
    ctx: &Context,
    outputs: impl Into<Outputs>,
    inputs: &[NodeId],
    options: &CompileOptions,
) -> Result<InPlaceEvaluator<I, O>, DiffError>
where
    I: InputBuffer + ?Sized,
    O: OutputBuffer<Scalar = I::Scalar> + ?Sized,
{
    let outputs = outputs.into();
    check_containers::<I, O>(inputs.len(), outputs.shape)?;
    Ok(InPlaceEvaluator {
        program: compiler::compile_program(ctx, &outputs, inputs, options)?,
        containers: PhantomData,
    })
}
