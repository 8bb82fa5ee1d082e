pub mod layers;
pub mod matrix;
pub mod params;
pub mod types;

use std::path::Path;

pub use layers::*;
pub use matrix::Matrix;
pub use params::*;
pub use types::*;

use crate::error::ModelError;

/// stage1: linear(5->64) -> relu, stage2: linear(64->64) -> relu, stage3: linear(64->2).
pub type Model = (
  Linear<INPUT_DIMENSION, HIDDEN_DIMENSION>,
  ReLU,
  Linear<HIDDEN_DIMENSION, HIDDEN_DIMENSION>,
  ReLU,
  Linear<HIDDEN_DIMENSION, OUTPUT_DIMENSION>,
);

/// The loaded regression model. Immutable once built, so it is shared between
/// request handlers behind an `Arc` without locking.
#[derive(Debug, Clone)]
pub struct PcbModel {
  network: Model,
}

impl PcbModel {
  pub fn from_parameters(params: &ModelParameters) -> Result<Self, ModelError> {
    let network: Model = (
      Linear::from_params("fc1", &params.fc1)?,
      ReLU,
      Linear::from_params("fc2", &params.fc2)?,
      ReLU,
      Linear::from_params("fc3", &params.fc3)?,
    );
    Ok(Self { network })
  }

  pub fn load(path: &Path) -> Result<Self, ModelError> {
    Self::from_parameters(&ModelParameters::load(path)?)
  }

  /// Maps an `N x 5` batch to an `N x 2` batch of predictions, row order preserved.
  pub fn infer(&self, batch: &Matrix) -> Result<Matrix, ModelError> {
    self.network.forward(batch)
  }

  pub fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<PredictionRow>, ModelError> {
    self.infer(&Matrix::from_rows(rows))?.to_rows()
  }

  pub fn parameter_count(&self) -> usize {
    self.network.parameter_count()
  }
}

impl Module for PcbModel {
  fn forward(&self, input: &Matrix) -> Result<Matrix, ModelError> {
    self.infer(input)
  }

  fn parameter_count(&self) -> usize {
    self.network.parameter_count()
  }
}
