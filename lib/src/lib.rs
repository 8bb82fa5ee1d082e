pub mod error;
pub mod model;
pub mod payload;
pub mod pipeline;
pub mod subcommands;
pub mod utils;

pub use error::{CommandError, ErrorKind, InferenceError, ModelError};
pub use model::{ModelParameters, PcbModel};
pub use pipeline::PredictResponse;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Fully resolved settings of the HTTP server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
  pub host: String,
  pub port: u16,
  /// Largest accepted request body, in bytes.
  pub body_limit: usize,
  /// Send every error reply with 200, telling errors apart only by the body.
  pub uniform_error_status: bool,
}

impl ServerConfig {
  pub fn address(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host: DEFAULT_HOST.to_string(),
      port: DEFAULT_PORT,
      body_limit: DEFAULT_BODY_LIMIT,
      uniform_error_status: false,
    }
  }
}
