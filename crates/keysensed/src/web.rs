//! HTTP routes for key and scale analysis.
//!
//! Routes:
//! - GET  /                          - Service discovery
//! - GET  /health                    - Liveness and uptime
//! - POST /api/analyze/pcp           - Rank keys for a folded pitch-class profile
//! - POST /api/analyze/progression   - Rank keys for a chord progression

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use keysense::{tokenize_progression, AnalysisError, KeyEngine};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared state for the analysis routes.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<KeyEngine>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: KeyEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            start_time: Instant::now(),
        }
    }
}

/// Create the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_root))
        .route("/health", get(handle_health))
        .route("/api/analyze/pcp", post(analyze_pcp))
        .route("/api/analyze/progression", post(analyze_progression))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Body of `POST /api/analyze/pcp`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcpRequest {
    pub pcp12: [f32; 12],
    pub length_sec: f32,
}

/// Body of `POST /api/analyze/progression`: a chord list or a single string.
#[derive(Debug, Default, Deserialize)]
pub struct ProgressionRequest {
    #[serde(default)]
    pub chords: Option<Vec<String>>,
    #[serde(default)]
    pub progression: Option<String>,
}

impl ProgressionRequest {
    fn into_tokens(self) -> Vec<String> {
        match (self.chords, self.progression) {
            (Some(chords), _) => chords,
            (None, Some(text)) => tokenize_progression(&text),
            (None, None) => Vec::new(),
        }
    }
}

/// Error body returned by the analysis routes.
#[derive(Debug)]
pub enum ApiError {
    Analysis(AnalysisError),
    Internal(String),
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        ApiError::Analysis(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Analysis(AnalysisError::InputTooShort { seconds, minimum }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "input_too_short",
                    "message": format!("capture is {:.2}s, need at least {:.1}s", seconds, minimum),
                    "lengthSec": seconds,
                    "minimumSec": minimum,
                }),
            ),
            ApiError::Analysis(err @ AnalysisError::InvalidProfile(_))
            | ApiError::Analysis(err @ AnalysisError::InvalidSampleRate(_)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "invalid_input", "message": err.to_string() }),
            ),
            ApiError::Analysis(err @ AnalysisError::WorkerPool(_))
            | ApiError::Analysis(err @ AnalysisError::InvalidParams(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "internal", "message": err.to_string() }),
            ),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "internal", "message": message }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

async fn serve_root() -> impl IntoResponse {
    Json(json!({
        "name": "keysensed",
        "version": env!("CARGO_PKG_VERSION"),
        "links": {
            "health": "/health",
            "pcp": "/api/analyze/pcp",
            "progression": "/api/analyze/progression",
        },
    }))
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "executor": state.engine.executor_name(),
    }))
}

#[tracing::instrument(skip(state, req), fields(length_sec = req.length_sec))]
async fn analyze_pcp(
    State(state): State<AppState>,
    Json(req): Json<PcpRequest>,
) -> Result<Response, ApiError> {
    let engine = Arc::clone(&state.engine);
    let result = tokio::task::spawn_blocking(move || engine.analyze_pcp(req.pcp12, req.length_sec))
        .await
        .map_err(|e| ApiError::Internal(format!("analysis task failed: {}", e)))?;

    match result {
        Ok(analysis) => Ok(Json(analysis).into_response()),
        Err(err) => {
            warn!(error = %err, "rejected pcp request");
            Err(err.into())
        }
    }
}

#[tracing::instrument(skip(state, req))]
async fn analyze_progression(
    State(state): State<AppState>,
    Json(req): Json<ProgressionRequest>,
) -> Result<Response, ApiError> {
    let tokens = req.into_tokens();
    let engine = Arc::clone(&state.engine);
    let analysis = tokio::task::spawn_blocking(move || engine.analyze_progression(&tokens[..]))
        .await
        .map_err(|e| ApiError::Internal(format!("analysis task failed: {}", e)))?;

    Ok(Json(analysis).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use keysense::{AnalysisParams, SequentialExecutor};
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let engine = KeyEngine::with_executor(AnalysisParams::default(), Arc::new(SequentialExecutor));
        router(AppState::new(engine))
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
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

    fn c_major_pcp() -> Value {
        json!([0.3, 0.02, 0.06, 0.02, 0.15, 0.06, 0.02, 0.2, 0.02, 0.06, 0.02, 0.05])
    }

    #[tokio::test]
    async fn test_root_lists_routes() {
        let response = test_app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["name"], "keysensed");
        assert_eq!(json["links"]["pcp"], "/api/analyze/pcp");
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["executor"], "sequential");
        assert!(json["uptime_secs"].is_u64());
    }

    #[tokio::test]
    async fn test_pcp_ranks_keys() {
        let (status, json) = post_json(
            test_app(),
            "/api/analyze/pcp",
            json!({ "pcp12": c_major_pcp(), "lengthSec": 6.0 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["keyCandidates"][0]["label"], "C major");
        assert_eq!(json["lengthSec"], 6.0);
        assert!(json["conf"].as_f64().unwrap() <= 0.75);
        assert!(json["scaleCandidates"].as_array().unwrap().len() > 1);
    }

    #[tokio::test]
    async fn test_pcp_short_capture_is_422() {
        let (status, json) = post_json(
            test_app(),
            "/api/analyze/pcp",
            json!({ "pcp12": c_major_pcp(), "lengthSec": 2.5 }),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"], "input_too_short");
        assert_eq!(json["minimumSec"], 4.0);
    }

    #[tokio::test]
    async fn test_pcp_negative_bin_is_400() {
        let mut pcp = [0.1f32; 12];
        pcp[3] = -0.2;
        let (status, json) = post_json(
            test_app(),
            "/api/analyze/pcp",
            json!({ "pcp12": pcp, "lengthSec": 6.0 }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_progression_from_chord_list() {
        let (status, json) = post_json(
            test_app(),
            "/api/analyze/progression",
            json!({ "chords": ["C", "Am", "F", "G", "C"] }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["keyCandidates"][0]["label"], "C major");
        assert_eq!(json["cadence"]["kind"], "perfect");
        assert_eq!(json["numerals"], json!(["I", "VI", "IV", "V", "I"]));
    }

    #[tokio::test]
    async fn test_progression_from_text_skips_bad_tokens() {
        let (status, json) = post_json(
            test_app(),
            "/api/analyze/progression",
            json!({ "progression": "C | G, Am xyz F" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["chords"], json!(["C", "G", "Am", "F"]));
        assert_eq!(json["skipped"], json!(["xyz"]));
    }

    #[tokio::test]
    async fn test_empty_progression() {
        let (status, json) = post_json(test_app(), "/api/analyze/progression", json!({})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["keyCandidates"], json!([]));
        assert_eq!(json["cadence"], Value::Null);
    }
}
