use std::path::{Path, PathBuf};

use tracing::info;

use crate::{error::CommandError, model::ModelParameters};

/// Writes a freshly initialised parameter artifact. Useful as a smoke-test
/// fixture; the values are untrained.
pub struct Setup {
  seed: u64,
  output_path: PathBuf,
}

impl Setup {
  pub fn new(output_path: &Path, seed: u64) -> Self {
    Self {
      seed,
      output_path: PathBuf::from(output_path),
    }
  }

  pub fn run(self) -> Result<(), CommandError> {
    let params = ModelParameters::seeded(self.seed);
    params.save(&self.output_path)?;
    info!(
      path = %self.output_path.display(),
      seed = self.seed,
      parameters = params.parameter_count(),
      "wrote parameter artifact"
    );
    Ok(())
  }
}
