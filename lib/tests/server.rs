use std::net::SocketAddr;

use pcb_inference::{
  subcommands::{Client, Predict, Server, Setup, LIVENESS_MESSAGE},
  utils, ModelParameters, PcbModel, PredictResponse, ServerConfig,
};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn spawn_server(config: ServerConfig) -> SocketAddr {
  spawn_server_with(config, &ModelParameters::seeded(7)).await
}

async fn spawn_server_with(config: ServerConfig, params: &ModelParameters) -> SocketAddr {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let address = listener.local_addr().unwrap();
  let model = PcbModel::from_parameters(params).unwrap();
  tokio::spawn(Server::new(config, model).serve(listener));
  address
}

async fn post(address: SocketAddr, body: impl Into<reqwest::Body>) -> (StatusCode, Value) {
  let response = reqwest::Client::new()
    .post(format!("http://{address}/predict"))
    .header("content-type", "application/json")
    .body(body)
    .send()
    .await
    .unwrap();
  let status = response.status();
  let text = response.text().await.unwrap();
  (status, serde_json::from_str(&text).unwrap())
}

fn temp_path(name: &str) -> std::path::PathBuf {
  std::env::temp_dir().join(format!("pcb-inference-{}-{name}", std::process::id()))
}

#[tokio::test]
async fn liveness_endpoint() {
  let _scope = utils::init_logging_tests();
  let address = spawn_server(ServerConfig::default()).await;
  let response = reqwest::get(format!("http://{address}/")).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(response.text().await.unwrap(), LIVENESS_MESSAGE);
}

#[tokio::test]
async fn one_row_one_prediction() {
  let address = spawn_server(ServerConfig::default()).await;
  let (status, body) = post(address, json!([[1, 2, 3, 4, 5]]).to_string()).await;
  assert_eq!(status, StatusCode::OK);
  let predictions = body["predictions"].as_array().unwrap();
  assert_eq!(predictions.len(), 1);
  let pair = predictions[0].as_array().unwrap();
  assert_eq!(pair.len(), 2);
  assert!(pair.iter().all(Value::is_number));
  assert_eq!(body.as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_batch() {
  let address = spawn_server(ServerConfig::default()).await;
  let (status, body) = post(address, "[]").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({"predictions": []}));
}

#[tokio::test]
async fn failures_carry_only_an_error_message() {
  let address = spawn_server(ServerConfig::default()).await;
  let cases = [
    (json!([[1, 2, 3, 4]]).to_string(), StatusCode::UNPROCESSABLE_ENTITY),
    (json!([[1, 2, "x", 4, 5]]).to_string(), StatusCode::BAD_REQUEST),
    ("{not json".to_string(), StatusCode::BAD_REQUEST),
    (String::new(), StatusCode::BAD_REQUEST),
    (json!([[1, 2, 3, 4, 5], [1, 2]]).to_string(), StatusCode::BAD_REQUEST),
  ];
  for (payload, expected) in cases {
    let (status, body) = post(address, payload.clone()).await;
    assert_eq!(status, expected, "{payload}");
    let object = body.as_object().unwrap();
    assert_eq!(object.len(), 1, "{payload}");
    assert!(object["error"].as_str().is_some_and(|e| !e.is_empty()));
  }
}

#[tokio::test]
async fn overflowing_model_answers_500() {
  // a single large activation overflows f32 in the last layer
  let mut params = ModelParameters::zeros();
  params.fc1.weight[0][0] = 1.0;
  params.fc2.weight[0][0] = 1.0;
  params.fc3.weight[0][0] = f32::MAX;
  params.fc3.bias = vec![f32::MAX, 0.0];
  let address = spawn_server_with(ServerConfig::default(), &params).await;

  let (status, body) = post(address, json!([[2, 0, 0, 0, 0]]).to_string()).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  let object = body.as_object().unwrap();
  assert_eq!(object.len(), 1);
  assert!(object["error"].as_str().unwrap().contains("non-finite"));

  let (status, body) = post(address, json!([[0, 0, 0, 0, 0]]).to_string()).await;
  assert_eq!(status, StatusCode::OK);
  assert!(body["predictions"].is_array());
}

#[tokio::test]
async fn uniform_status_mode_answers_200() {
  let address = spawn_server(ServerConfig {
    uniform_error_status: true,
    ..Default::default()
  })
  .await;
  let (status, body) = post(address, json!([[1, 2, 3, 4]]).to_string()).await;
  assert_eq!(status, StatusCode::OK);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn oversized_body_is_a_structured_error() {
  let address = spawn_server(ServerConfig {
    body_limit: 64,
    ..Default::default()
  })
  .await;
  let rows = vec![[1.0, 2.0, 3.0, 4.0, 5.0]; 50];
  let (status, body) = post(address, json!(rows).to_string()).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn concurrent_requests_match_offline_predictions() {
  let address = spawn_server(ServerConfig::default()).await;
  let model = PcbModel::from_parameters(&ModelParameters::seeded(7)).unwrap();
  let requests = (0..8).map(|i| {
    let row = [i as f32, 1.0, -2.0, 0.5, 3.0];
    tokio::spawn(async move { (row, post(address, json!([row]).to_string()).await) })
  });
  for request in requests.collect::<Vec<_>>() {
    let (row, (status, body)) = request.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let reply: PredictResponse = serde_json::from_value(body).unwrap();
    let expected = model.predict(&[row]).unwrap();
    assert_eq!(reply, PredictResponse::Predictions { predictions: expected });
  }
}

#[tokio::test]
async fn client_subcommand_round_trip() {
  let address = spawn_server(ServerConfig::default()).await;
  let input = temp_path("client-input.json");
  let payload = json!({"a": [1], "b": [2], "c": [3], "d": [4], "e": [5]});
  std::fs::write(&input, payload.to_string()).unwrap();
  let client = Client::new(&input, format!("http://{address}/predict")).unwrap();
  let reply = client.run().await.unwrap();
  std::fs::remove_file(&input).ok();
  match reply {
    PredictResponse::Predictions { predictions } => assert_eq!(predictions.len(), 1),
    other => panic!("unexpected reply {other:?}"),
  }
}

#[test]
fn setup_artifact_feeds_offline_prediction() {
  let params = temp_path("setup-params.json");
  let input = temp_path("predict-input.json");
  Setup::new(&params, 7).run().unwrap();
  std::fs::write(&input, "[[1, 2, 3, 4, 5], [5, 4, 3, 2, 1]]").unwrap();

  let reply = Predict::new(&params, &input).unwrap().run();
  let model = PcbModel::from_parameters(&ModelParameters::seeded(7)).unwrap();
  let expected = model
    .predict(&[[1.0, 2.0, 3.0, 4.0, 5.0], [5.0, 4.0, 3.0, 2.0, 1.0]])
    .unwrap();
  assert_eq!(reply, PredictResponse::Predictions { predictions: expected });

  std::fs::remove_file(&params).ok();
  std::fs::remove_file(&input).ok();
}

#[test]
fn missing_artifact_fails_before_serving() {
  let err = PcbModel::load(&temp_path("does-not-exist.json")).unwrap_err();
  assert!(err.to_string().contains("does-not-exist.json"));
}
