use std::path::Path;

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};

use crate::{error::CommandError, pipeline::PredictResponse, utils::read_input};

/// Sends a payload file to a running model server.
pub struct Client {
  url: String,
  payload: Vec<u8>,
}

impl Client {
  pub fn new(input_path: &Path, url: String) -> Result<Self, CommandError> {
    Ok(Self::from_payload(read_input(input_path)?, url))
  }

  pub fn from_payload(payload: Vec<u8>, url: String) -> Self {
    Self { url, payload }
  }

  pub async fn run(self) -> Result<PredictResponse, CommandError> {
    info!(url = %self.url, bytes = self.payload.len(), "sending payload");
    let response = reqwest::Client::new()
      .post(&self.url)
      .header(CONTENT_TYPE, "application/json")
      .body(self.payload)
      .send()
      .await?;
    let status = response.status();
    let text = response.text().await?;
    debug!(%status, "reply received");
    Ok(serde_json::from_str(&text)?)
  }
}
