//! The closed operator set.
//!
//! Every operation node carries one [`Op`]. Evaluation semantics live here;
//! derivative rules live in [`crate::diff`]. Both are exhaustive matches over
//! this enum, so adding an operator is a compile error until every rule table
//! handles it.

use std::fmt;

use num_traits::Float;

use crate::traits::MathScalar;

/// Operator tag of an operation node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Op {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,

    // Non-smooth
    Abs,
    Sign,
    Min,
    Max,

    // Roots, exponentials, logarithms
    Sqrt,
    Cbrt,
    Exp,
    Ln,

    // Trigonometric
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,

    // Hyperbolic
    Sinh,
    Cosh,
    Tanh,

    // Comparisons (evaluate to 1.0 / 0.0)
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,

    /// `IfElse(cond, then, otherwise)`: `then` when `cond != 0`.
    IfElse,
}

impl Op {
    /// Every operator, in declaration order.
    pub const ALL: [Op; 31] = [
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Div,
        Op::Pow,
        Op::Neg,
        Op::Abs,
        Op::Sign,
        Op::Min,
        Op::Max,
        Op::Sqrt,
        Op::Cbrt,
        Op::Exp,
        Op::Ln,
        Op::Sin,
        Op::Cos,
        Op::Tan,
        Op::Asin,
        Op::Acos,
        Op::Atan,
        Op::Atan2,
        Op::Sinh,
        Op::Cosh,
        Op::Tanh,
        Op::Lt,
        Op::Le,
        Op::Gt,
        Op::Ge,
        Op::Eq,
        Op::Ne,
        Op::IfElse,
    ];

    /// Number of operands the operator takes.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Op::Neg
            | Op::Abs
            | Op::Sign
            | Op::Sqrt
            | Op::Cbrt
            | Op::Exp
            | Op::Ln
            | Op::Sin
            | Op::Cos
            | Op::Tan
            | Op::Asin
            | Op::Acos
            | Op::Atan
            | Op::Sinh
            | Op::Cosh
            | Op::Tanh => 1,
            Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Pow
            | Op::Min
            | Op::Max
            | Op::Atan2
            | Op::Lt
            | Op::Le
            | Op::Gt
            | Op::Ge
            | Op::Eq
            | Op::Ne => 2,
            Op::IfElse => 3,
        }
    }

    /// Whether operand order is irrelevant. Operands of commutative operators
    /// are sorted before hash-consing.
    ///
    /// `Min` and `Max` are excluded: their derivatives break ties in favour of
    /// the first operand, so `max(a, b)` and `max(b, a)` are different nodes.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(self, Op::Add | Op::Mul | Op::Eq | Op::Ne)
    }

    /// Whether the result is a 0/1 truth value.
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(self, Op::Lt | Op::Le | Op::Gt | Op::Ge | Op::Eq | Op::Ne)
    }

    /// Lowercase operator name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Pow => "pow",
            Op::Neg => "neg",
            Op::Abs => "abs",
            Op::Sign => "sign",
            Op::Min => "min",
            Op::Max => "max",
            Op::Sqrt => "sqrt",
            Op::Cbrt => "cbrt",
            Op::Exp => "exp",
            Op::Ln => "ln",
            Op::Sin => "sin",
            Op::Cos => "cos",
            Op::Tan => "tan",
            Op::Asin => "asin",
            Op::Acos => "acos",
            Op::Atan => "atan",
            Op::Atan2 => "atan2",
            Op::Sinh => "sinh",
            Op::Cosh => "cosh",
            Op::Tanh => "tanh",
            Op::Lt => "lt",
            Op::Le => "le",
            Op::Gt => "gt",
            Op::Ge => "ge",
            Op::Eq => "eq",
            Op::Ne => "ne",
            Op::IfElse => "if_else",
        }
    }

    /// Apply a unary operator. Non-unary operators yield NaN.
    #[inline]
    pub fn eval_unary<T: MathScalar>(self, a: T) -> T {
        match self {
            Op::Neg => -a,
            Op::Abs => Float::abs(a),
            Op::Sign => sign(a),
            Op::Sqrt => a.sqrt(),
            Op::Cbrt => a.cbrt(),
            Op::Exp => a.exp(),
            Op::Ln => a.ln(),
            Op::Sin => a.sin(),
            Op::Cos => a.cos(),
            Op::Tan => a.tan(),
            Op::Asin => a.asin(),
            Op::Acos => a.acos(),
            Op::Atan => a.atan(),
            Op::Sinh => a.sinh(),
            Op::Cosh => a.cosh(),
            Op::Tanh => a.tanh(),
            Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Pow
            | Op::Min
            | Op::Max
            | Op::Atan2
            | Op::Lt
            | Op::Le
            | Op::Gt
            | Op::Ge
            | Op::Eq
            | Op::Ne
            | Op::IfElse => T::nan(),
        }
    }

    /// Apply a binary operator. Non-binary operators yield NaN.
    #[inline]
    pub fn eval_binary<T: MathScalar>(self, a: T, b: T) -> T {
        match self {
            Op::Add => a + b,
            Op::Sub => a - b,
            Op::Mul => a * b,
            Op::Div => a / b,
            Op::Pow => a.powf(b),
            Op::Min => a.min(b),
            Op::Max => a.max(b),
            Op::Atan2 => a.atan2(b),
            Op::Lt => truth(a < b),
            Op::Le => truth(a <= b),
            Op::Gt => truth(a > b),
            Op::Ge => truth(a >= b),
            Op::Eq => truth(a == b),
            Op::Ne => truth(a != b),
            Op::Neg
            | Op::Abs
            | Op::Sign
            | Op::Sqrt
            | Op::Cbrt
            | Op::Exp
            | Op::Ln
            | Op::Sin
            | Op::Cos
            | Op::Tan
            | Op::Asin
            | Op::Acos
            | Op::Atan
            | Op::Sinh
            | Op::Cosh
            | Op::Tanh
            | Op::IfElse => T::nan(),
        }
    }

    /// Apply a ternary operator. Only `IfElse` is ternary.
    #[inline]
    pub fn eval_ternary<T: MathScalar>(self, c: T, a: T, b: T) -> T {
        match self {
            Op::IfElse => {
                if c == T::zero() {
                    b
                } else {
                    a
                }
            }
            _ => T::nan(),
        }
    }

    /// Apply the operator to an operand slice of the right length.
    #[inline]
    pub fn eval<T: MathScalar>(self, args: &[T]) -> T {
        match *args {
            [a] => self.eval_unary(a),
            [a, b] => self.eval_binary(a, b),
            [c, a, b] => self.eval_ternary(c, a, b),
            _ => T::nan(),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sign with `sign(±0) = 0`, unlike `Float::signum`.
#[inline]
fn sign<T: MathScalar>(a: T) -> T {
    if a > T::zero() {
        T::one()
    } else if a < T::zero() {
        -T::one()
    } else if a == T::zero() {
        T::zero()
    } else {
        a
    }
}

#[inline]
fn truth<T: MathScalar>(b: bool) -> T {
    if b { T::one() } else { T::zero() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_matches_eval_shape() {
        for op in Op::ALL {
            let args = vec![0.5_f64; op.arity()];
            let v = op.eval(&args);
            // every operator is defined at 0.5 for each of its operands
            assert!(!v.is_nan(), "{} produced NaN at 0.5", op);
        }
    }

    #[test]
    fn test_sign_at_zero() {
        assert_eq!(Op::Sign.eval_unary(0.0_f64), 0.0);
        assert_eq!(Op::Sign.eval_unary(-0.0_f64), 0.0);
        assert_eq!(Op::Sign.eval_unary(-3.0_f64), -1.0);
        assert!(Op::Sign.eval_unary(f64::NAN).is_nan());
    }

    #[test]
    fn test_comparisons_and_select() {
        assert_eq!(Op::Lt.eval_binary(1.0_f64, 2.0), 1.0);
        assert_eq!(Op::Ge.eval_binary(1.0_f64, 2.0), 0.0);
        assert_eq!(Op::IfElse.eval_ternary(1.0_f64, 3.0, 4.0), 3.0);
        assert_eq!(Op::IfElse.eval_ternary(0.0_f64, 3.0, 4.0), 4.0);
    }

    #[test]
    fn test_generic_over_f32() {
        let v: f32 = Op::Atan2.eval_binary(1.0_f32, 1.0);
        assert!((v - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
    }

    #[test]
    fn test_commutative_set() {
        assert!(Op::Add.is_commutative());
        assert!(!Op::Sub.is_commutative());
        assert!(!Op::Pow.is_commutative());
        assert!(Op::Ne.is_commutative());
        assert!(!Op::Max.is_commutative());
        assert!(!Op::Min.is_commutative());
    }
}
