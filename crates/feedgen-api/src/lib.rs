//! HTTP stand-in for the feedback generator service.

pub mod store;

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use feedgen_common::wire::{FeedbackListing, GenerateRequest, GenerationResult, ProgressReport};
use tokio::sync::RwLock;

use crate::store::{percent_of, FeedbackStore, LIST_LIMIT};

const DEFAULT_BATCH: u64 = 10;
const MAX_BATCH: u64 = LIST_LIMIT as u64;

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Denominator of the progress percentage.
    pub target: u64,
    /// Generate calls after this many fail with a 500.
    pub fail_after: Option<u64>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self { target: 1000, fail_after: None }
    }
}

#[derive(Clone)]
pub struct AppState {
    store: Arc<RwLock<FeedbackStore>>,
    options: Arc<ServiceOptions>,
}

pub fn app() -> Router {
    app_with(ServiceOptions::default())
}

pub fn app_with(options: ServiceOptions) -> Router {
    feedgen_obs::init();
    let state = AppState {
        store: Arc::new(RwLock::new(FeedbackStore::default())),
        options: Arc::new(options),
    };

    Router::new()
        .route("/", get(index))
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics))
        .route("/generate", post(generate))
        .route("/progress", get(progress))
        .route("/list", get(list))
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    (
        [("content-type", "text/plain")],
        "Feedback Generator API\n\nEndpoints:\n- POST /generate (body: {\"count\": 10})\n- GET /progress\n- GET /list",
    )
}

async fn metrics() -> impl IntoResponse {
    match feedgen_obs::render() {
        Ok((content_type, buffer)) => (StatusCode::OK, [("content-type", content_type)], buffer),
        Err(e) => {
            tracing::error!(target: "api", "metrics encoding failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, [("content-type", "text/plain".to_string())], Vec::new())
        }
    }
}

// A missing, malformed or zero count falls back to the default batch; counts
// above MAX_BATCH are refused before the store is locked.
async fn generate(State(state): State<AppState>, body: Bytes) -> (StatusCode, Json<GenerationResult>) {
    let count = serde_json::from_slice::<GenerateRequest>(&body)
        .ok()
        .map(|req| req.count)
        .filter(|&c| c > 0)
        .unwrap_or(DEFAULT_BATCH);
    if count > MAX_BATCH {
        tracing::warn!(target: "api", count, "rejecting oversized generate request");
        return (
            StatusCode::BAD_REQUEST,
            Json(GenerationResult::failed(format!("count must be at most {}", MAX_BATCH))),
        );
    }

    let mut store = state.store.write().await;
    let call = store.note_generate_call();
    if state.options.fail_after.is_some_and(|n| call > n) {
        feedgen_obs::record_injected_failure();
        tracing::warn!(target: "api", call, "injecting generate failure");
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(GenerationResult::failed("rate limited")));
    }

    let feedbacks = store.generate(count);
    let total = store.count();
    feedgen_obs::record_generate(count, total);
    tracing::info!(target: "api", count, total, "generated feedback batch");

    let mut result = GenerationResult::succeeded(count, total);
    result.feedbacks = Some(feedbacks);
    (StatusCode::OK, Json(result))
}

async fn progress(State(state): State<AppState>) -> Json<ProgressReport> {
    let store = state.store.read().await;
    let count = store.count();
    if count == 0 {
        return Json(ProgressReport {
            progress: Some(serde_json::json!(0)),
            message: Some("No feedbacks generated yet".into()),
            ..ProgressReport::default()
        });
    }
    Json(ProgressReport {
        count,
        progress: Some(serde_json::Value::String(percent_of(count, state.options.target))),
        last_updated: store.last_updated().map(str::to_string),
        ..ProgressReport::default()
    })
}

async fn list(State(state): State<AppState>) -> Json<FeedbackListing> {
    let files = state.store.read().await.keys();
    Json(FeedbackListing { count: files.len() as u64, files })
}
