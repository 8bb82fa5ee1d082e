use std::{error::Error, path::Path, path::PathBuf};

use pcb_inference::ServerConfig;
use serde::Deserialize;
use tracing::Level;

/// Settings from the config file or the command line. Also defines the config
/// file format (every field can be omitted).
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
  /// Address to bind
  pub host: Option<String>,
  pub port: Option<u16>,
  /// Parameter artifact to load at startup
  pub params: Option<PathBuf>,
  /// trace, debug, info, warn or error
  pub log_level: Option<String>,
  /// Largest accepted request body, in bytes
  pub body_limit: Option<usize>,
  /// Reply 200 to failed requests too; clients tell errors apart by the body
  pub uniform_error_status: Option<bool>,
}

impl AppConfig {
  pub fn from_file(path: &Path) -> Result<Self, Box<dyn Error>> {
    let content = std::fs::read_to_string(path)
      .map_err(|err| format!("cannot read config file {}: {err}", path.display()))?;
    Self::from_yaml(&content)
  }

  pub fn from_yaml(content: &str) -> Result<Self, Box<dyn Error>> {
    // an empty file is an empty config
    if content.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(content)?)
  }

  // merge configs where the second overwrites the first
  pub fn merge(self, other: Self) -> Self {
    Self {
      host: other.host.or(self.host),
      port: other.port.or(self.port),
      params: other.params.or(self.params),
      log_level: other.log_level.or(self.log_level),
      body_limit: other.body_limit.or(self.body_limit),
      uniform_error_status: other.uniform_error_status.or(self.uniform_error_status),
    }
  }

  pub fn log_level(&self) -> Result<Level, Box<dyn Error>> {
    match &self.log_level {
      None => Ok(Level::INFO),
      Some(level) => level
        .parse()
        .map_err(|_| format!("unknown log level {level:?}").into()),
    }
  }

  pub fn server_config(&self) -> ServerConfig {
    let defaults = ServerConfig::default();
    ServerConfig {
      host: self.host.clone().unwrap_or(defaults.host),
      port: self.port.unwrap_or(defaults.port),
      body_limit: self.body_limit.unwrap_or(defaults.body_limit),
      uniform_error_status: self
        .uniform_error_status
        .unwrap_or(defaults.uniform_error_status),
    }
  }
}
