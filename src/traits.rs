use num_traits::{Float, FloatConst, FromPrimitive, Signed, ToPrimitive};
use std::fmt::{Debug, Display};

/// A trait comprising all operations required of the scalars a compiled
/// evaluator computes with.
///
/// This aggregates `num_traits::Float` (providing sin, cos, exp, etc.),
/// `FloatConst` and the conversions needed to load graph constants, which are
/// always stored as `f64`.
pub trait MathScalar:
    Float + FloatConst + FromPrimitive + ToPrimitive + Signed + Debug + Display + Send + Sync + 'static
{
    /// Convert a graph constant into this scalar type.
    #[inline]
    fn from_constant(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(Self::nan)
    }
}

// Blanket implementation for any type that satisfies the bounds
impl<T> MathScalar for T where
    T: Float
        + FloatConst
        + FromPrimitive
        + ToPrimitive
        + Signed
        + Debug
        + Display
        + Send
        + Sync
        + 'static
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_constant() {
        assert_eq!(f64::from_constant(1.5), 1.5);
        assert_eq!(f32::from_constant(0.25), 0.25_f32);
        assert!(f64::from_constant(f64::NAN).is_nan());
    }
}
