//! Config-to-route tests for the analysis service.

use std::io::Write;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use keysense_conf::KeysenseConfig;
use keysensed::build_engine;
use keysensed::web::{router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn post(config: &KeysenseConfig, uri: &str, body: Value) -> (StatusCode, Value) {
    let engine = build_engine(&config.analysis).unwrap();
    let response = router(AppState::new(engine))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn config_limits_reach_the_wire() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[analysis]\nkey_candidate_limit = 2\nscale_candidate_limit = 3\nexecutor = \"sequential\""
    )
    .unwrap();
    let config = KeysenseConfig::load_from(Some(file.path())).unwrap();

    let (status, json) = post(
        &config,
        "/api/analyze/progression",
        json!({ "progression": "C G7 Am F" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["keyCandidates"].as_array().unwrap().len(), 2);
    assert_eq!(json["scaleCandidates"].as_array().unwrap().len(), 3);
    assert_eq!(json["scaleCandidates"][0]["score"], 100);
}

#[tokio::test]
async fn minimum_capture_follows_config() {
    let mut config = KeysenseConfig::default();
    config.analysis.min_capture_sec = 1.0;

    let mut pcp = [0.02f32; 12];
    pcp[9] = 0.3;
    pcp[0] = 0.2;
    pcp[4] = 0.2;

    let (status, json) = post(
        &config,
        "/api/analyze/pcp",
        json!({ "pcp12": pcp, "lengthSec": 2.0 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["keyCandidates"].as_array().unwrap().len(), 5);
    // Two seconds out of eight for full trust.
    assert!(json["conf"].as_f64().unwrap() <= 0.25);
}
