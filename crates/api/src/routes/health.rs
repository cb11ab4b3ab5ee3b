use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/ping", get(ping))
}

/// Reports the configured renderer binary; does not spawn it.
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "renderer": state.renderer().binary(),
    }))
}

async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
