use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::ingest_service::IngestService;
use crate::query_service::QueryService;

// Application state shared by every request
#[derive(Clone)]
pub struct AppState {
    pub query_service: Arc<QueryService>,
    pub ingest_service: Arc<IngestService>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct AddRequest {
    pub text: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/query", post(query_handler))
        .route("/add", post(add_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

// Failures on /query and /add keep the success status code; callers
// detect them by body shape alone.
async fn query_handler(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> impl IntoResponse {
    match state.query_service.answer(&payload.q).await {
        Ok(answer) => Json(QueryResponse { answer }).into_response(),
        Err(e) => {
            error!("Error in /query endpoint: {:#}", e);
            Json(json!({ "error": format!("{:#}", e) })).into_response()
        }
    }
}

async fn add_handler(
    State(state): State<AppState>,
    Json(payload): Json<AddRequest>,
) -> impl IntoResponse {
    match state.ingest_service.ingest(&payload.text).await {
        Ok(id) => Json(json!({
            "status": "success",
            "message": "Content added to knowledge base",
            "id": id,
        }))
        .into_response(),
        Err(e) => {
            error!("Error in /add endpoint: {:#}", e);
            Json(json!({
                "status": "error",
                "message": format!("{:#}", e),
            }))
            .into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
