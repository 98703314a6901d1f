//! Builder pattern API for contexts and compilation
//!
//! Provides a fluent interface for configuring graph construction and the
//! graph compiler.
//!
//! # Example
//! ```
//! use symb_graph::{CompileOptions, Context};
//!
//! let mut ctx = Context::builder()
//!     .fold_constants(true)
//!     .capacity(1024)
//!     .build();
//! let x = ctx.make_variable("x");
//! let f = ctx.sin(x).unwrap();
//!
//! let options = CompileOptions::new().reuse_slots(false);
//! let eval = symb_graph::compile::<[f64], Vec<f64>>(&ctx, &[f], &[x], &options).unwrap();
//! assert_eq!(eval.evaluate(&[0.0]).unwrap(), vec![0.0]);
//! ```

use crate::Context;

/// Builder for a [`Context`].
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    fold_constants: bool,
    capacity: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            fold_constants: true,
            capacity: 0,
        }
    }
}

impl ContextBuilder {
    /// Create a builder with default settings (folding on, no preallocation).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate operations whose operands are all constants at build time.
    ///
    /// With folding off such operations are still hash-consed, just not
    /// evaluated. Identity rules (`x * 1 → x`, …) apply either way.
    #[must_use]
    pub const fn fold_constants(mut self, fold: bool) -> Self {
        self.fold_constants = fold;
        self
    }

    /// Preallocate room for this many nodes.
    #[must_use]
    pub const fn capacity(mut self, nodes: usize) -> Self {
        self.capacity = nodes;
        self
    }

    #[must_use]
    pub fn build(self) -> Context {
        Context::with_settings(self.fold_constants, self.capacity)
    }
}

/// Options for the graph compiler.
///
/// The calling convention is not an option here: it is chosen by calling
/// [`compile`](crate::compile) (allocating) or
/// [`compile_in_place`](crate::compile_in_place). Fixed versus dynamic
/// containers are chosen by the evaluator's type parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub(crate) reuse_slots: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { reuse_slots: true }
    }
}

impl CompileOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recycle evaluation slots once their value is dead. Outputs are never
    /// recycled. Turning this off gives one slot per graph node, which is
    /// occasionally useful when inspecting programs.
    #[must_use]
    pub const fn reuse_slots(mut self, reuse: bool) -> Self {
        self.reuse_slots = reuse;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_configuration() {
        let ctx = ContextBuilder::new().fold_constants(false).capacity(16).build();
        assert!(!ctx.folds_constants());
        assert!(ctx.is_empty());
        assert!(Context::new().folds_constants());

        let opts = CompileOptions::new();
        assert!(opts.reuse_slots);
        assert!(!opts.reuse_slots(false).reuse_slots);
    }
}
