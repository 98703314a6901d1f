//! Input and output container capabilities.
//!
//! The container types an evaluator is instantiated with decide whether it is
//! dynamically sized (`[T]`, `Vec<T>`, [`Matrix<T>`]) or fixed size
//! (`[T; N]`, `[[T; C]; R]`). Fixed sizes are checked against the graph when
//! compiling, so a fixed-size evaluator cannot fail a shape check on its
//! output at call time. Fixed-size outputs exist for `f32` and `f64`.
//!
//! | Container      | Inputs | Outputs | Accepted output shapes            |
//! |----------------|--------|---------|-----------------------------------|
//! | `[T]`          | yes    | in place| any, flattened row-major          |
//! | `Vec<T>`       | yes    | yes     | any, flattened row-major          |
//! | `[T; N]`       | yes    | yes     | any with `N` entries              |
//! | `Matrix<T>`    |        | yes     | any (`[n]` becomes an `n×1` column)|
//! | `[[T; C]; R]`  |        | yes     | exactly `[R×C]`                   |

use crate::matrix::{Matrix, Shape};
use crate::traits::MathScalar;

/// A container evaluator inputs are read from.
pub trait InputBuffer {
    type Scalar: MathScalar;

    /// Input values in compiler input order.
    fn values(&self) -> &[Self::Scalar];

    /// Length fixed by the type, if any.
    fn fixed_len() -> Option<usize>;
}

/// A container evaluator outputs are written to.
pub trait OutputBuffer {
    type Scalar: MathScalar;

    /// Shape fixed by the type, if any.
    fn fixed_shape() -> Option<Shape>;

    /// Whether containers of this type can hold outputs of `shape`.
    fn accepts(shape: Shape) -> bool {
        Self::fixed_shape().is_none_or(|fixed| fixed == shape)
    }

    /// Shape of this particular container.
    fn shape(&self) -> Shape;

    /// Whether this particular container can receive outputs of `shape`.
    fn fits(&self, shape: Shape) -> bool {
        self.shape() == shape
    }

    /// Row-major output storage.
    fn values_mut(&mut self) -> &mut [Self::Scalar];
}

/// An output container the allocating evaluator can create itself.
pub trait OwnedOutput: OutputBuffer + Sized {
    /// A zeroed container for outputs of an accepted `shape`.
    fn allocate(shape: Shape) -> Self;
}

// ===== Inputs =====

impl<T: MathScalar> InputBuffer for [T] {
    type Scalar = T;

    #[inline]
    fn values(&self) -> &[T] {
        self
    }

    fn fixed_len() -> Option<usize> {
        None
    }
}

impl<T: MathScalar> InputBuffer for Vec<T> {
    type Scalar = T;

    #[inline]
    fn values(&self) -> &[T] {
        self
    }

    fn fixed_len() -> Option<usize> {
        None
    }
}

impl<T: MathScalar, const N: usize> InputBuffer for [T; N] {
    type Scalar = T;

    #[inline]
    fn values(&self) -> &[T] {
        self
    }

    fn fixed_len() -> Option<usize> {
        Some(N)
    }
}

// ===== Outputs =====

impl<T: MathScalar> OutputBuffer for [T] {
    type Scalar = T;

    fn fixed_shape() -> Option<Shape> {
        None
    }

    fn shape(&self) -> Shape {
        Shape::Vector(self.len())
    }

    fn fits(&self, shape: Shape) -> bool {
        self.len() == shape.len()
    }

    #[inline]
    fn values_mut(&mut self) -> &mut [T] {
        self
    }
}

impl<T: MathScalar> OutputBuffer for Vec<T> {
    type Scalar = T;

    fn fixed_shape() -> Option<Shape> {
        None
    }

    fn shape(&self) -> Shape {
        Shape::Vector(self.len())
    }

    fn fits(&self, shape: Shape) -> bool {
        self.len() == shape.len()
    }

    #[inline]
    fn values_mut(&mut self) -> &mut [T] {
        self
    }
}

impl<T: MathScalar> OutputBuffer for Matrix<T> {
    type Scalar = T;

    fn fixed_shape() -> Option<Shape> {
        None
    }

    fn shape(&self) -> Shape {
        Matrix::shape(self)
    }

    fn fits(&self, shape: Shape) -> bool {
        (self.rows(), self.cols()) == as_rows_cols(shape)
    }

    #[inline]
    fn values_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: MathScalar> OwnedOutput for Vec<T> {
    fn allocate(shape: Shape) -> Self {
        vec![T::zero(); shape.len()]
    }
}

impl<T: MathScalar> OwnedOutput for Matrix<T> {
    fn allocate(shape: Shape) -> Self {
        let (rows, cols) = as_rows_cols(shape);
        Matrix::filled(rows, cols, T::zero())
    }
}

// Fixed-size outputs are implemented per scalar type: generic `[T; N]` and
// `[[T; C]; R]` impls would overlap, since `T` could itself be an array.
macro_rules! impl_fixed_outputs {
    ($($t:ty),*) => {$(
        impl<const N: usize> OutputBuffer for [$t; N] {
            type Scalar = $t;

            fn fixed_shape() -> Option<Shape> {
                Some(Shape::Vector(N))
            }

            fn accepts(shape: Shape) -> bool {
                shape.len() == N
            }

            fn shape(&self) -> Shape {
                Shape::Vector(N)
            }

            fn fits(&self, shape: Shape) -> bool {
                shape.len() == N
            }

            #[inline]
            fn values_mut(&mut self) -> &mut [$t] {
                self
            }
        }

        impl<const N: usize> OwnedOutput for [$t; N] {
            fn allocate(_shape: Shape) -> Self {
                [0.0; N]
            }
        }

        impl<const R: usize, const C: usize> OutputBuffer for [[$t; C]; R] {
            type Scalar = $t;

            fn fixed_shape() -> Option<Shape> {
                Some(Shape::Matrix { rows: R, cols: C })
            }

            fn shape(&self) -> Shape {
                Shape::Matrix { rows: R, cols: C }
            }

            #[inline]
            fn values_mut(&mut self) -> &mut [$t] {
                self.as_flattened_mut()
            }
        }

        impl<const R: usize, const C: usize> OwnedOutput for [[$t; C]; R] {
            fn allocate(_shape: Shape) -> Self {
                [[0.0; C]; R]
            }
        }
    )*};
}

impl_fixed_outputs!(f32, f64);

/// Vectors are laid out as a single column.
const fn as_rows_cols(shape: Shape) -> (usize, usize) {
    match shape {
        Shape::Vector(n) => (n, 1),
        Shape::Matrix { rows, cols } => (rows, cols),
    }
}
