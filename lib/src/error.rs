use std::path::PathBuf;

use thiserror::Error;

/// Category of a failed request, independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  Decode,
  TypeCoercion,
  ShapeMismatch,
  RuntimeFault,
}

impl ErrorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ErrorKind::Decode => "DecodeError",
      ErrorKind::TypeCoercion => "TypeCoercionError",
      ErrorKind::ShapeMismatch => "ShapeMismatch",
      ErrorKind::RuntimeFault => "RuntimeFault",
    }
  }
}

impl std::fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Everything that can go wrong between receiving a payload and returning predictions.
/// Each variant ends the request in `Failed(kind)`; none are retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
  #[error("decode error: {0}")]
  Decode(String),

  #[error("type coercion error: row {row}, column {column:?}: {reason}")]
  TypeCoercion {
    row: usize,
    column: String,
    reason: String,
  },

  #[error("shape mismatch: expected {expected} feature columns, got {actual}")]
  ShapeMismatch { expected: usize, actual: usize },

  #[error("runtime fault: {0}")]
  RuntimeFault(String),
}

impl InferenceError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      InferenceError::Decode(_) => ErrorKind::Decode,
      InferenceError::TypeCoercion { .. } => ErrorKind::TypeCoercion,
      InferenceError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
      InferenceError::RuntimeFault(_) => ErrorKind::RuntimeFault,
    }
  }
}

impl From<ModelError> for InferenceError {
  fn from(err: ModelError) -> Self {
    match err {
      ModelError::ShapeMismatch { expected, actual } => {
        InferenceError::ShapeMismatch { expected, actual }
      }
      other => InferenceError::RuntimeFault(other.to_string()),
    }
  }
}

/// Failures of the model runtime and of the parameter artifact codec.
#[derive(Debug, Error)]
pub enum ModelError {
  #[error("cannot access parameter artifact {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("malformed parameter artifact: {0}")]
  Json(#[from] serde_json::Error),

  #[error("tensor `{name}` has shape {actual}, expected {expected}")]
  TensorShape {
    name: String,
    expected: String,
    actual: String,
  },

  #[error("tensor `{name}` holds a non-finite value at flat index {index}")]
  NonFinite { name: String, index: usize },

  #[error("layer expects {expected} input columns, got {actual}")]
  ShapeMismatch { expected: usize, actual: usize },

  #[error("{len} values do not fill a {rows}x{cols} matrix")]
  MatrixLength { len: usize, rows: usize, cols: usize },
}

/// Errors of the command line surfaces: serving, the HTTP client and offline prediction.
#[derive(Debug, Error)]
pub enum CommandError {
  #[error(transparent)]
  Model(#[from] ModelError),

  #[error("cannot read {}: {source}", .path.display())]
  Input {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("cannot bind {address}: {source}")]
  Bind {
    address: String,
    #[source]
    source: std::io::Error,
  },

  #[error("server stopped unexpectedly: {0}")]
  Serve(#[source] std::io::Error),

  #[error("request to the model server failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("model server sent an unexpected reply: {0}")]
  Reply(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn model_shape_errors_keep_their_kind() {
    let err: InferenceError = ModelError::ShapeMismatch {
      expected: 5,
      actual: 4,
    }
    .into();
    assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    assert_eq!(
      err.to_string(),
      "shape mismatch: expected 5 feature columns, got 4"
    );
  }

  #[test]
  fn other_model_errors_are_runtime_faults() {
    let err: InferenceError = ModelError::MatrixLength {
      len: 3,
      rows: 2,
      cols: 2,
    }
    .into();
    assert_eq!(err.kind(), ErrorKind::RuntimeFault);
  }

  #[test]
  fn coercion_message_names_the_cell() {
    let err = InferenceError::TypeCoercion {
      row: 0,
      column: "2".to_string(),
      reason: "\"x\" is not a number".to_string(),
    };
    assert_eq!(
      err.to_string(),
      "type coercion error: row 0, column \"2\": \"x\" is not a number"
    );
  }
}
