//! Symbolic differentiation over the node graph
//!
//! - `rules` - local partial derivative of every operator
//! - `engine` - memoised forward and reverse chain-rule propagation

mod engine;
mod rules;

pub use engine::Differentiator;
