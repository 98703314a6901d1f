//! Symbolic Expression Graphs
//!
//! A focused Rust library for building scalar expression graphs,
//! differentiating them symbolically and compiling them into fast evaluators.
//!
//! # Features
//! - Hash-consed node graph: structurally equal expressions share one node
//! - Exact derivatives, gradients, Jacobians, Hessians and sparse Jacobians,
//!   all expressed as nodes of the same graph
//! - Matrix-free `J·v`, `Jᵀ·w` and `H·v` products
//! - Compiled evaluators over `f64`, `f32` or any [`MathScalar`], with
//!   allocating and in-place calling conventions and fixed or dynamic
//!   containers
//! - SIMD batch evaluation and (with the `parallel` feature) Rayon-based
//!   parallel evaluation
//!
//! # Usage Example
//! ```
//! use symb_graph::{CompileOptions, Context, compile, jacobian};
//!
//! let mut ctx = Context::new();
//! let x = ctx.make_variable("x");
//! let y = ctx.make_variable("y");
//! let cx = ctx.cos(x).unwrap();
//! let sy = ctx.sin(y).unwrap();
//! let f = ctx.mul(cx, y).unwrap();
//! let g = ctx.mul(sy, x).unwrap();
//!
//! let j = jacobian(&mut ctx, &[f, g], &[x, y], None).unwrap();
//! let eval = compile::<[f64], Vec<f64>>(&ctx, &j, &[x, y], &CompileOptions::new()).unwrap();
//! let values = eval.evaluate(&[1.0, 2.0]).unwrap();
//! // [[-y sin x, cos x], [sin y, x cos y]] at (1, 2)
//! assert!((values[0] - (-2.0 * 1.0_f64.sin())).abs() < 1e-12);
//! assert!((values[3] - 2.0_f64.cos()).abs() < 1e-12);
//! ```
//!
//! # Logging
//! Diagnostics go through the [`log`] facade at `debug` and `trace` level.
//! Install any logger (e.g. `env_logger`) to see them.

mod builder;
pub mod core;
mod diff;
mod error;
pub mod evaluator;
mod jacobian;
pub mod matrix;
mod products;
pub mod traits;

#[cfg(feature = "parallel")]
pub mod parallel;

#[cfg(test)]
mod tests;

// Re-export key types for easier usage
pub use builder::{CompileOptions, ContextBuilder};
pub use crate::core::{Context, GraphVisitor, Node, NodeId, Op, Operands, VarId, walk_graph};
pub use diff::Differentiator;
pub use error::DiffError;
pub use evaluator::{
    Evaluator, InPlaceEvaluator, InputBuffer, Instruction, OutputBuffer, Outputs, OwnedOutput,
    Program, compile, compile_in_place,
};
pub use jacobian::{derivative, derivative_wrt, gradient, hessian, jacobian, sparse_jacobian};
pub use matrix::{Matrix, Shape, SparseMatrix};
pub use products::{VectorProduct, hessian_times_v, jacobian_times_v, jacobian_transpose_v};
pub use traits::MathScalar;

#[cfg(feature = "parallel")]
pub use parallel::evaluate_parallel;
