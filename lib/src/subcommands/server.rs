use std::sync::Arc;

use axum::{
  body::Bytes,
  extract::{rejection::BytesRejection, DefaultBodyLimit, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::{get, post},
  Json, Router,
};
use tokio::net::TcpListener;
use tracing::{error, info, instrument, warn};

use crate::{
  error::{CommandError, ErrorKind, InferenceError},
  model::{PcbModel, PredictionRow},
  pipeline::{self, PredictResponse, Stage},
  ServerConfig,
};

pub const LIVENESS_MESSAGE: &str = "PCB model server is running!";

/// Shared by every request. The model is read-only, so no lock.
#[derive(Debug, Clone)]
pub struct AppState {
  model: Arc<PcbModel>,
  uniform_error_status: bool,
}

impl AppState {
  pub fn new(model: Arc<PcbModel>, uniform_error_status: bool) -> Self {
    Self {
      model,
      uniform_error_status,
    }
  }

  fn reply(&self, outcome: Result<Vec<PredictionRow>, InferenceError>) -> Response {
    let status = match &outcome {
      Ok(predictions) => {
        info!(rows = predictions.len(), "served predictions");
        StatusCode::OK
      }
      Err(err) => {
        match err.kind() {
          ErrorKind::RuntimeFault => error!(kind = %err.kind(), "{err}"),
          _ => warn!(kind = %err.kind(), "{err}"),
        }
        if self.uniform_error_status {
          StatusCode::OK
        } else {
          status_for(err.kind())
        }
      }
    };
    let body = Json(PredictResponse::from(outcome));
    tracing::debug!(stage = ?Stage::Responded, %status);
    (status, body).into_response()
  }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::Decode | ErrorKind::TypeCoercion => StatusCode::BAD_REQUEST,
    ErrorKind::ShapeMismatch => StatusCode::UNPROCESSABLE_ENTITY,
    ErrorKind::RuntimeFault => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

pub struct Server {
  config: ServerConfig,
  model: Arc<PcbModel>,
}

impl Server {
  pub fn new(config: ServerConfig, model: PcbModel) -> Self {
    Self {
      config,
      model: Arc::new(model),
    }
  }

  pub fn router(&self) -> Router {
    let state = AppState::new(Arc::clone(&self.model), self.config.uniform_error_status);
    Router::new()
      .route("/", get(Self::home))
      .route("/predict", post(Self::predict))
      .layer(DefaultBodyLimit::max(self.config.body_limit))
      .with_state(state)
  }

  pub async fn run(self) -> Result<(), CommandError> {
    let address = self.config.address();
    let listener = TcpListener::bind(&address)
      .await
      .map_err(|source| CommandError::Bind { address, source })?;
    self.serve(listener).await
  }

  /// Serves on an already bound listener until ctrl-c.
  pub async fn serve(self, listener: TcpListener) -> Result<(), CommandError> {
    if let Ok(address) = listener.local_addr() {
      info!(%address, parameters = self.model.parameter_count(), "listening");
    }
    axum::serve(listener, self.router())
      .with_graceful_shutdown(shutdown_signal())
      .await
      .map_err(CommandError::Serve)
  }

  async fn home() -> &'static str {
    LIVENESS_MESSAGE
  }

  #[instrument(skip_all)]
  async fn predict(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
  ) -> Response {
    let body = match body {
      Ok(body) => body,
      Err(rejection) => {
        return state.reply(Err(InferenceError::Decode(rejection.body_text())));
      }
    };
    let model = Arc::clone(&state.model);
    let outcome = tokio::task::spawn_blocking(move || pipeline::run(model.as_ref(), &body))
      .await
      .unwrap_or_else(|join_error| {
        let reason = if join_error.is_panic() {
          pipeline::panic_message(join_error.into_panic().as_ref())
        } else {
          join_error.to_string()
        };
        Err(InferenceError::RuntimeFault(reason))
      });
    state.reply(outcome)
  }
}

async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => info!("shutting down"),
    Err(err) => error!("cannot listen for ctrl-c, shutting down: {err}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn statuses_per_kind() {
    assert_eq!(status_for(ErrorKind::Decode), StatusCode::BAD_REQUEST);
    assert_eq!(status_for(ErrorKind::TypeCoercion), StatusCode::BAD_REQUEST);
    assert_eq!(
      status_for(ErrorKind::ShapeMismatch),
      StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
      status_for(ErrorKind::RuntimeFault),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }
}
