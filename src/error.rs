use std::fmt;

use crate::core::Op;
use crate::matrix::Shape;

/// Errors that can occur while building, differentiating, compiling or
/// evaluating expression graphs.
///
/// Every variant is reported synchronously to the immediate caller. A failed
/// call never leaves the [`Context`](crate::Context) or an already compiled
/// evaluator in an unusable state.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffError {
    // Differentiation errors
    /// Differentiation was requested with respect to a node that is not a Variable.
    InvalidDifferentiationTarget {
        /// Short description of the offending node (e.g. `"constant 2"`).
        node: String,
    },
    /// A Jacobian column is not one of the differentiation variables.
    UnknownColumn {
        /// Position of the column in the requested column list.
        position: usize,
    },

    // Compilation errors
    /// The graph references a Variable that is not listed in the compiler inputs.
    MissingInputVariable {
        /// Display name of the variable.
        name: String,
        /// Process-unique variable id.
        id: u64,
    },
    /// An entry of the compiler input list is unusable (not a Variable, or repeated).
    InvalidInput {
        /// Position in the input list.
        position: usize,
        /// What is wrong with it.
        reason: &'static str,
    },

    // Evaluation errors
    /// An input or output container does not have the shape the evaluator was compiled for.
    ShapeMismatch {
        /// Shape the evaluator expects.
        expected: Shape,
        /// Shape that was supplied.
        got: Shape,
    },
    /// Two sizes that must agree do not (e.g. batch column counts).
    DimensionMismatch {
        /// Required size.
        expected: usize,
        /// Supplied size.
        got: usize,
    },

    // Graph construction errors
    /// An operator was applied to the wrong number of operands.
    ArityMismatch {
        /// The operator.
        op: Op,
        /// Operand count the operator takes.
        expected: usize,
        /// Operand count supplied.
        got: usize,
    },
    /// A node id obtained before the last `clear_cache` was passed back in.
    StaleNode {
        /// Epoch the node was created in.
        node_epoch: u32,
        /// Current epoch of the context.
        current_epoch: u32,
    },
    /// A node id created by a different [`Context`](crate::Context).
    ForeignNode,
}

impl fmt::Display for DiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffError::InvalidDifferentiationTarget { node } => {
                write!(
                    f,
                    "Cannot differentiate with respect to {}: target must be a variable",
                    node
                )
            }
            DiffError::UnknownColumn { position } => {
                write!(
                    f,
                    "Jacobian column {} is not one of the differentiation variables",
                    position
                )
            }
            DiffError::MissingInputVariable { name, id } => {
                write!(
                    f,
                    "Variable '{}' (id {}) is used by the graph but missing from the inputs",
                    name, id
                )
            }
            DiffError::InvalidInput { position, reason } => {
                write!(f, "Invalid input at position {}: {}", position, reason)
            }
            DiffError::ShapeMismatch { expected, got } => {
                write!(f, "Shape mismatch: expected {}, got {}", expected, got)
            }
            DiffError::DimensionMismatch { expected, got } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, got)
            }
            DiffError::ArityMismatch { op, expected, got } => {
                write!(
                    f,
                    "Operator '{}' takes {} operand(s), got {}",
                    op.name(),
                    expected,
                    got
                )
            }
            DiffError::StaleNode {
                node_epoch,
                current_epoch,
            } => {
                write!(
                    f,
                    "Stale node from cache epoch {} used after clear_cache (current epoch {})",
                    node_epoch, current_epoch
                )
            }
            DiffError::ForeignNode => {
                write!(f, "Node belongs to a different context")
            }
        }
    }
}

impl std::error::Error for DiffError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = DiffError::MissingInputVariable {
            name: "y".to_owned(),
            id: 7,
        };
        assert_eq!(
            err.to_string(),
            "Variable 'y' (id 7) is used by the graph but missing from the inputs"
        );

        let err = DiffError::ShapeMismatch {
            expected: Shape::Vector(2),
            got: Shape::Matrix { rows: 1, cols: 2 },
        };
        assert_eq!(err.to_string(), "Shape mismatch: expected [2], got [1x2]");

        let err = DiffError::ArityMismatch {
            op: Op::Sin,
            expected: 1,
            got: 2,
        };
        assert!(err.to_string().contains("'sin'"));
    }
}
