use ndarray::{Array2, ArrayView1};

use crate::error::ModelError;

/// A batch of `rows` samples with `cols` features each.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix(Array2<f32>);

impl Matrix {
  /// Builds a matrix from row-major data.
  pub fn new(data: Vec<f32>, rows: usize, cols: usize) -> Result<Self, ModelError> {
    let len = data.len();
    Array2::from_shape_vec((rows, cols), data)
      .map(Self)
      .map_err(|_| ModelError::MatrixLength { len, rows, cols })
  }

  pub fn zeros(rows: usize, cols: usize) -> Self {
    Self(Array2::zeros((rows, cols)))
  }

  pub fn from_rows<const N: usize>(rows: &[[f32; N]]) -> Self {
    Self(Array2::from_shape_fn((rows.len(), N), |(r, c)| rows[r][c]))
  }

  pub fn rows(&self) -> usize {
    self.0.nrows()
  }

  pub fn cols(&self) -> usize {
    self.0.ncols()
  }

  pub fn row(&self, row: usize) -> ArrayView1<'_, f32> {
    self.0.row(row)
  }

  /// Row-major copy of every value.
  pub fn values(&self) -> Vec<f32> {
    self.0.iter().copied().collect()
  }

  pub fn as_array(&self) -> &Array2<f32> {
    &self.0
  }

  pub fn is_finite(&self) -> bool {
    self.0.iter().all(|x| x.is_finite())
  }

  /// Splits the matrix back into fixed-width rows. Fails if the width is not `N`.
  pub fn to_rows<const N: usize>(&self) -> Result<Vec<[f32; N]>, ModelError> {
    if self.cols() != N {
      return Err(ModelError::ShapeMismatch {
        expected: N,
        actual: self.cols(),
      });
    }
    Ok(
      self
        .0
        .rows()
        .into_iter()
        .map(|row| {
          let mut out = [0.0; N];
          out.iter_mut().zip(row).for_each(|(o, x)| *o = *x);
          out
        })
        .collect(),
    )
  }
}

impl From<Array2<f32>> for Matrix {
  fn from(array: Array2<f32>) -> Self {
    Self(array)
  }
}
