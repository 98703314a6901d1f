//! Dense and sparse row-major containers.
//!
//! [`Matrix`] holds derivative nodes produced by the Jacobian assembler and
//! also serves as the dynamically-sized matrix output container of compiled
//! evaluators.

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::NodeId;

/// Shape of an input or output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// One-dimensional, `len` entries.
    Vector(usize),
    /// Two-dimensional, row-major.
    Matrix { rows: usize, cols: usize },
}

impl Shape {
    /// Total number of scalar entries.
    #[must_use]
    pub const fn len(self) -> usize {
        match self {
            Shape::Vector(n) => n,
            Shape::Matrix { rows, cols } => rows * cols,
        }
    }

    /// Whether the shape holds no entries.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Vector(n) => write!(f, "[{}]", n),
            Shape::Matrix { rows, cols } => write!(f, "[{}x{}]", rows, cols),
        }
    }
}

/// Dense row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T> Matrix<T> {
    /// Build from row-major data.
    ///
    /// Returns `None` when `data.len() != rows * cols`.
    #[must_use]
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Option<Self> {
        (data.len() == rows * cols).then_some(Self { rows, cols, data })
    }

    /// Row-major data whose length is known to be `rows * cols`.
    pub(crate) fn from_raw(rows: usize, cols: usize, data: Vec<T>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { rows, cols, data }
    }

    /// Build from a list of equally long rows.
    ///
    /// Returns `None` when the rows are ragged.
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<T>>) -> Option<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != n_cols) {
            return None;
        }
        let data = rows.into_iter().flatten().collect();
        Some(Self {
            rows: n_rows,
            cols: n_cols,
            data,
        })
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub const fn shape(&self) -> Shape {
        Shape::Matrix {
            rows: self.rows,
            cols: self.cols,
        }
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// One row as a slice.
    ///
    /// # Panics
    /// Panics if `row >= self.rows()`.
    #[must_use]
    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Iterate over rows. Yields `rows()` slices, empty ones when there are
    /// no columns.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> {
        (0..self.rows).map(move |r| self.row(r))
    }

    /// Row-major entries.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Row-major entries, mutable.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: Clone> Matrix<T> {
    /// A `rows x cols` matrix filled with `value`.
    #[must_use]
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Copy out one column.
    ///
    /// # Panics
    /// Panics if `col >= self.cols()`.
    #[must_use]
    pub fn column(&self, col: usize) -> Vec<T> {
        assert!(col < self.cols, "column {} out of range", col);
        (0..self.rows)
            .map(|r| self.data[r * self.cols + col].clone())
            .collect()
    }

    /// Build a new matrix from the given columns, in the given order.
    ///
    /// # Panics
    /// Panics if any index is out of range.
    #[must_use]
    pub fn select_columns(&self, cols: &[usize]) -> Self {
        let mut data = Vec::with_capacity(self.rows * cols.len());
        for r in 0..self.rows {
            for &c in cols {
                assert!(c < self.cols, "column {} out of range", c);
                data.push(self.data[r * self.cols + c].clone());
            }
        }
        Self {
            rows: self.rows,
            cols: cols.len(),
            data,
        }
    }

    /// Transposed copy.
    #[must_use]
    pub fn transpose(&self) -> Self {
        let mut data = Vec::with_capacity(self.data.len());
        for c in 0..self.cols {
            for r in 0..self.rows {
                data.push(self.data[r * self.cols + c].clone());
            }
        }
        Self {
            rows: self.cols,
            cols: self.rows,
            data,
        }
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(
            row < self.rows && col < self.cols,
            "index ({}, {}) out of range for {}x{} matrix",
            row,
            col,
            self.rows,
            self.cols
        );
        &self.data[row * self.cols + col]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        assert!(
            row < self.rows && col < self.cols,
            "index ({}, {}) out of range for {}x{} matrix",
            row,
            col,
            self.rows,
            self.cols
        );
        &mut self.data[row * self.cols + col]
    }
}

/// Structurally non-zero entries of a Jacobian.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    /// Number of rows of the dense equivalent.
    pub rows: usize,
    /// Number of columns of the dense equivalent.
    pub cols: usize,
    /// `(row, col, node)` triplets in row-major order.
    pub entries: Vec<(usize, usize, NodeId)>,
}

impl SparseMatrix {
    /// Number of stored entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// The `(row, col)` positions of the stored entries.
    pub fn pattern(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.entries.iter().map(|&(r, c, _)| (r, c))
    }

    /// Node at `(row, col)`, or `None` when the entry is structurally zero.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<NodeId> {
        self.entries
            .binary_search_by(|&(r, c, _)| (r, c).cmp(&(row, col)))
            .ok()
            .map(|i| self.entries[i].2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_and_index() {
        let m = Matrix::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 3);
        assert_eq!(m[(1, 2)], 6);
        assert_eq!(m.row(0), &[1, 2, 3]);
        assert!(Matrix::from_rows(vec![vec![1], vec![2, 3]]).is_none());
    }

    #[test]
    fn test_select_columns_reorders() {
        let m = Matrix::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        let s = m.select_columns(&[2, 1]);
        assert_eq!(s.as_slice(), &[3, 2, 6, 5]);
        assert_eq!(s.shape(), Shape::Matrix { rows: 2, cols: 2 });
    }

    #[test]
    fn test_transpose_and_rows() {
        let m = Matrix::from_vec(2, 2, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(m.transpose().as_slice(), &[1, 3, 2, 4]);
        let rows: Vec<&[i32]> = m.iter_rows().collect();
        assert_eq!(rows, vec![&[1, 2][..], &[3, 4][..]]);
    }

    #[test]
    fn test_empty_matrix_rows() {
        let m: Matrix<i32> = Matrix::from_vec(3, 0, vec![]).unwrap();
        assert_eq!(m.iter_rows().count(), 3);
        assert!(m.iter_rows().all(<[i32]>::is_empty));

        let m: Matrix<i32> = Matrix::from_vec(0, 3, vec![]).unwrap();
        assert_eq!(m.iter_rows().count(), 0);
    }
}
