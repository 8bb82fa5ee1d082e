use std::path::Path;

use crate::{
  error::CommandError,
  model::PcbModel,
  pipeline::{self, PredictResponse},
  utils::read_input,
};

/// Runs one payload file through the inference pipeline without a server.
pub struct Predict {
  model: PcbModel,
  payload: Vec<u8>,
}

impl Predict {
  pub fn new(params_path: &Path, input_path: &Path) -> Result<Self, CommandError> {
    Ok(Self {
      model: PcbModel::load(params_path)?,
      payload: read_input(input_path)?,
    })
  }

  pub fn run(&self) -> PredictResponse {
    pipeline::respond(&self.model, &self.payload)
  }
}
