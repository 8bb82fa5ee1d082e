use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
  error::{ErrorKind, InferenceError},
  model::{Matrix, Module, PredictionRow, INPUT_DIMENSION, OUTPUT_DIMENSION},
  payload,
};

/// Where a request is in the pipeline. `Failed` can follow any of the first four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Received,
  Decoded,
  Coerced,
  Validated,
  Inferred,
  Responded,
  Failed(ErrorKind),
}

/// Body of every `/predict` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictResponse {
  Predictions { predictions: Vec<PredictionRow> },
  Error { error: String },
}

impl From<Result<Vec<PredictionRow>, InferenceError>> for PredictResponse {
  fn from(outcome: Result<Vec<PredictionRow>, InferenceError>) -> Self {
    match outcome {
      Ok(predictions) => PredictResponse::Predictions { predictions },
      Err(err) => PredictResponse::Error {
        error: err.to_string(),
      },
    }
  }
}

/// Decodes a raw request body, runs the model and returns one prediction per input row.
/// Never panics on bad input; every failure comes back as an `InferenceError`.
#[instrument(level = "debug", skip_all, fields(bytes = body.len()))]
pub fn run<M: Module>(model: &M, body: &[u8]) -> Result<Vec<PredictionRow>, InferenceError> {
  run_observed(model, body, |stage| debug!(?stage))
}

/// [`run`], reporting every stage reached to `observe`, the terminal `Failed` included.
pub fn run_observed<M: Module>(
  model: &M,
  body: &[u8],
  mut observe: impl FnMut(Stage),
) -> Result<Vec<PredictionRow>, InferenceError> {
  stages(model, body, &mut observe).inspect_err(|err| observe(Stage::Failed(err.kind())))
}

fn stages<M: Module>(
  model: &M,
  body: &[u8],
  observe: &mut impl FnMut(Stage),
) -> Result<Vec<PredictionRow>, InferenceError> {
  observe(Stage::Received);
  let table = payload::decode(body)?;
  debug!(rows = table.n_rows(), cols = table.n_cols(), "decoded table");
  observe(Stage::Decoded);
  let batch = table.coerce()?;
  observe(Stage::Coerced);
  let batch = validate(batch)?;
  observe(Stage::Validated);
  let predictions = infer(model, &batch)?;
  observe(Stage::Inferred);
  Ok(predictions)
}

/// Offline variant of a request: same pipeline, reply body instead of a `Result`.
pub fn respond<M: Module>(model: &M, body: &[u8]) -> PredictResponse {
  let response: PredictResponse = run(model, body).into();
  debug!(stage = ?Stage::Responded);
  response
}

/// Only batches with exactly `INPUT_DIMENSION` columns reach the model.
/// A table with neither rows nor columns (`[]`, `{}`) is the empty batch.
pub fn validate(batch: Matrix) -> Result<Matrix, InferenceError> {
  if batch.rows() == 0 && batch.cols() == 0 {
    return Ok(Matrix::zeros(0, INPUT_DIMENSION));
  }
  if batch.cols() != INPUT_DIMENSION {
    return Err(InferenceError::ShapeMismatch {
      expected: INPUT_DIMENSION,
      actual: batch.cols(),
    });
  }
  Ok(batch)
}

/// Runs the model, turning a panic or a non-finite output into `RuntimeFault`.
pub fn infer<M: Module>(model: &M, batch: &Matrix) -> Result<Vec<PredictionRow>, InferenceError> {
  let output = panic::catch_unwind(AssertUnwindSafe(|| model.forward(batch)))
    .map_err(|cause| InferenceError::RuntimeFault(panic_message(cause.as_ref())))??;
  if !output.is_finite() {
    return Err(InferenceError::RuntimeFault(
      "model produced a non-finite prediction".to_string(),
    ));
  }
  Ok(output.to_rows::<OUTPUT_DIMENSION>()?)
}

pub(crate) fn panic_message(cause: &(dyn std::any::Any + Send)) -> String {
  if let Some(message) = cause.downcast_ref::<&str>() {
    format!("inference panicked: {message}")
  } else if let Some(message) = cause.downcast_ref::<String>() {
    format!("inference panicked: {message}")
  } else {
    "inference panicked".to_string()
  }
}
