use std::path::Path;

use itertools::Itertools;
use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{HIDDEN_DIMENSION, INPUT_DIMENSION, OUTPUT_DIMENSION};
use crate::error::ModelError;

/// Weight and bias of one linear stage. `weight` is laid out `[out][in]`,
/// the same way a torch `nn.Linear` stores it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayerParams {
  pub weight: Vec<Vec<f32>>,
  pub bias: Vec<f32>,
}

impl LayerParams {
  pub fn zeros(outputs: usize, inputs: usize) -> Self {
    Self {
      weight: vec![vec![0.0; inputs]; outputs],
      bias: vec![0.0; outputs],
    }
  }

  /// Uniform in `[-1/sqrt(in), 1/sqrt(in)]`, torch's default `nn.Linear` init.
  fn seeded(rng: &mut StdRng, outputs: usize, inputs: usize) -> Self {
    let bound = 1.0 / (inputs as f32).sqrt();
    let dist = Uniform::new_inclusive(-bound, bound);
    Self {
      weight: (0..outputs)
        .map(|_| (0..inputs).map(|_| rng.sample(dist)).collect())
        .collect(),
      bias: (0..outputs).map(|_| rng.sample(dist)).collect(),
    }
  }

  /// Checks the layer maps `inputs` to `outputs` and holds only finite values.
  pub fn check(&self, name: &str, outputs: usize, inputs: usize) -> Result<(), ModelError> {
    let weight_name = format!("{name}.weight");
    let bias_name = format!("{name}.bias");
    if self.weight.len() != outputs || self.weight.iter().any(|row| row.len() != inputs) {
      return Err(ModelError::TensorShape {
        name: weight_name,
        expected: format!("[{outputs}, {inputs}]"),
        actual: describe_shape(&self.weight),
      });
    }
    if self.bias.len() != outputs {
      return Err(ModelError::TensorShape {
        name: bias_name,
        expected: format!("[{outputs}]"),
        actual: format!("[{}]", self.bias.len()),
      });
    }
    if let Some(index) = self.weight.iter().flatten().position(|x| !x.is_finite()) {
      return Err(ModelError::NonFinite {
        name: weight_name,
        index,
      });
    }
    if let Some(index) = self.bias.iter().position(|x| !x.is_finite()) {
      return Err(ModelError::NonFinite {
        name: bias_name,
        index,
      });
    }
    Ok(())
  }

  pub fn parameter_count(&self) -> usize {
    self.weight.iter().map(Vec::len).sum::<usize>() + self.bias.len()
  }
}

fn describe_shape(weight: &[Vec<f32>]) -> String {
  match weight.iter().map(Vec::len).dedup().collect_vec().as_slice() {
    [] => format!("[{}]", weight.len()),
    [width] => format!("[{}, {}]", weight.len(), width),
    _ => format!("[{}, ragged]", weight.len()),
  }
}

/// On-disk layout: the flat key names of the model's state dict.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StateDict {
  #[serde(rename = "fc1.weight")]
  fc1_weight: Vec<Vec<f32>>,
  #[serde(rename = "fc1.bias")]
  fc1_bias: Vec<f32>,
  #[serde(rename = "fc2.weight")]
  fc2_weight: Vec<Vec<f32>>,
  #[serde(rename = "fc2.bias")]
  fc2_bias: Vec<f32>,
  #[serde(rename = "fc3.weight")]
  fc3_weight: Vec<Vec<f32>>,
  #[serde(rename = "fc3.bias")]
  fc3_bias: Vec<f32>,
}

/// The trained parameters of the three linear stages (5 -> 64 -> 64 -> 2).
///
/// Read once at startup and never written by the server. The artifact is a JSON
/// object keyed like the training side's state dict:
/// `fc1.weight`, `fc1.bias`, `fc2.weight`, `fc2.bias`, `fc3.weight`, `fc3.bias`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StateDict", into = "StateDict")]
pub struct ModelParameters {
  pub fc1: LayerParams,
  pub fc2: LayerParams,
  pub fc3: LayerParams,
}

impl From<StateDict> for ModelParameters {
  fn from(dict: StateDict) -> Self {
    Self {
      fc1: LayerParams {
        weight: dict.fc1_weight,
        bias: dict.fc1_bias,
      },
      fc2: LayerParams {
        weight: dict.fc2_weight,
        bias: dict.fc2_bias,
      },
      fc3: LayerParams {
        weight: dict.fc3_weight,
        bias: dict.fc3_bias,
      },
    }
  }
}

impl From<ModelParameters> for StateDict {
  fn from(params: ModelParameters) -> Self {
    Self {
      fc1_weight: params.fc1.weight,
      fc1_bias: params.fc1.bias,
      fc2_weight: params.fc2.weight,
      fc2_bias: params.fc2.bias,
      fc3_weight: params.fc3.weight,
      fc3_bias: params.fc3.bias,
    }
  }
}

impl ModelParameters {
  pub fn zeros() -> Self {
    Self {
      fc1: LayerParams::zeros(HIDDEN_DIMENSION, INPUT_DIMENSION),
      fc2: LayerParams::zeros(HIDDEN_DIMENSION, HIDDEN_DIMENSION),
      fc3: LayerParams::zeros(OUTPUT_DIMENSION, HIDDEN_DIMENSION),
    }
  }

  /// Freshly initialised (untrained) parameters. Same seed, same parameters.
  pub fn seeded(seed: u64) -> Self {
    let mut rng = StdRng::seed_from_u64(seed);
    Self {
      fc1: LayerParams::seeded(&mut rng, HIDDEN_DIMENSION, INPUT_DIMENSION),
      fc2: LayerParams::seeded(&mut rng, HIDDEN_DIMENSION, HIDDEN_DIMENSION),
      fc3: LayerParams::seeded(&mut rng, OUTPUT_DIMENSION, HIDDEN_DIMENSION),
    }
  }

  pub fn validate(&self) -> Result<(), ModelError> {
    self.fc1.check("fc1", HIDDEN_DIMENSION, INPUT_DIMENSION)?;
    self.fc2.check("fc2", HIDDEN_DIMENSION, HIDDEN_DIMENSION)?;
    self.fc3.check("fc3", OUTPUT_DIMENSION, HIDDEN_DIMENSION)
  }

  pub fn from_json_str(content: &str) -> Result<Self, ModelError> {
    let params: Self = serde_json::from_str(content)?;
    params.validate()?;
    Ok(params)
  }

  pub fn load(path: &Path) -> Result<Self, ModelError> {
    let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let params = Self::from_json_str(&content)?;
    info!(
      path = %path.display(),
      parameters = params.parameter_count(),
      "loaded model parameters"
    );
    Ok(params)
  }

  pub fn save(&self, path: &Path) -> Result<(), ModelError> {
    crate::utils::serialize_to_file(path, self).map_err(|source| ModelError::Io {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn parameter_count(&self) -> usize {
    self.fc1.parameter_count() + self.fc2.parameter_count() + self.fc3.parameter_count()
  }
}
