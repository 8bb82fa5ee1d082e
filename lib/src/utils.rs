use std::path::Path;

use serde::Serialize;
use tracing::{
  error,
  subscriber::{DefaultGuard, SetGlobalDefaultError},
  Level,
};

#[cfg(not(debug_assertions))]
use human_panic::setup_panic;

#[cfg(debug_assertions)]
extern crate better_panic;

use crate::error::CommandError;

pub fn install_logger(level: Level) -> Result<(), SetGlobalDefaultError> {
  let subscriber = tracing_subscriber::fmt()
    .compact()
    .with_max_level(level)
    .finish();
  tracing::subscriber::set_global_default(subscriber)
}

/// Installs the global subscriber and a panic hook. With `crash_reports` a panic
/// is treated as the end of the process: human-panic in release builds,
/// better-panic in debug builds. Without it, panics are logged as errors and left
/// to whoever catches them.
pub fn init_logging(level: Level, crash_reports: bool) -> Result<(), SetGlobalDefaultError> {
  if crash_reports {
    install_crash_reporter();
  } else {
    install_panic_logger();
  }

  install_logger(level)?;

  Ok(())
}

fn install_crash_reporter() {
  // Human Panic. Only enabled when *not* debugging.
  #[cfg(not(debug_assertions))]
  {
    setup_panic!();
  }

  // Better Panic. Only enabled *when* debugging.
  #[cfg(debug_assertions)]
  {
    better_panic::Settings::debug()
      .most_recent_first(false)
      .lineno_suffix(true)
      .verbosity(better_panic::Verbosity::Full)
      .install();
  }
}

/// For long-running servers, where a panic inside a request is caught and answered.
pub fn install_panic_logger() {
  std::panic::set_hook(Box::new(|info| error!("{info}")));
}

/// Logging for tests: scoped to the current thread, captured by the test harness.
pub fn init_logging_tests() -> DefaultGuard {
  let subscriber = tracing_subscriber::fmt()
    .compact()
    .with_test_writer()
    .with_max_level(Level::DEBUG)
    .finish();
  tracing::subscriber::set_default(subscriber)
}

pub fn serialize_to_file<T: Serialize>(path: &Path, obj: &T) -> std::io::Result<()> {
  let buff = serde_json::to_string(obj)?;
  std::fs::write(path, buff)
}

pub fn read_input(path: &Path) -> Result<Vec<u8>, CommandError> {
  std::fs::read(path).map_err(|source| CommandError::Input {
    path: path.to_path_buf(),
    source,
  })
}
