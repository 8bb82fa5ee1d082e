use ndarray::{Array1, Array2};

use super::{LayerParams, Matrix};
use crate::error::ModelError;

/// A stage of the network: a pure map from a batch to a batch.
pub trait Module: std::fmt::Debug {
  fn forward(&self, input: &Matrix) -> Result<Matrix, ModelError>;

  fn parameter_count(&self) -> usize {
    0
  }
}

/// Affine map `x W^T + b` from `IN` to `OUT` features.
#[derive(Debug, Clone, PartialEq)]
pub struct Linear<const IN: usize, const OUT: usize> {
  // [out, in], the torch layout
  weight: Array2<f32>,
  bias: Array1<f32>,
}

impl<const IN: usize, const OUT: usize> Linear<IN, OUT> {
  pub fn from_params(name: &str, params: &LayerParams) -> Result<Self, ModelError> {
    params.check(name, OUT, IN)?;
    Ok(Self {
      weight: Array2::from_shape_fn((OUT, IN), |(o, i)| params.weight[o][i]),
      bias: Array1::from(params.bias.clone()),
    })
  }
}

impl<const IN: usize, const OUT: usize> Module for Linear<IN, OUT> {
  fn forward(&self, input: &Matrix) -> Result<Matrix, ModelError> {
    if input.cols() != IN {
      return Err(ModelError::ShapeMismatch {
        expected: IN,
        actual: input.cols(),
      });
    }
    Ok((input.as_array().dot(&self.weight.t()) + &self.bias).into())
  }

  fn parameter_count(&self) -> usize {
    self.weight.len() + self.bias.len()
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReLU;

impl Module for ReLU {
  fn forward(&self, input: &Matrix) -> Result<Matrix, ModelError> {
    // NaN passes through so that a broken computation stays visible downstream
    Ok(input.as_array().mapv(|x| if x < 0.0 { 0.0 } else { x }).into())
  }
}

/// Tuples of modules run in sequence, left to right.
macro_rules! sequential {
  ($first:ident $(, $rest:ident)*) => {
    impl<$first: Module $(, $rest: Module)*> Module for ($first, $($rest,)*) {
      #[allow(non_snake_case)]
      fn forward(&self, input: &Matrix) -> Result<Matrix, ModelError> {
        let ($first, $($rest,)*) = self;
        let x = $first.forward(input)?;
        $(let x = $rest.forward(&x)?;)*
        Ok(x)
      }

      #[allow(non_snake_case)]
      fn parameter_count(&self) -> usize {
        let ($first, $($rest,)*) = self;
        $first.parameter_count() $(+ $rest.parameter_count())*
      }
    }
  };
}

sequential!(A);
sequential!(A, B);
sequential!(A, B, C);
sequential!(A, B, C, D);
sequential!(A, B, C, D, E);
