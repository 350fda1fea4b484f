//! Route table

use super::health::health_routes;
use crate::AppState;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handle_root))
        .merge(health_routes())
}

async fn handle_root(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "app": state.app_name,
        "version": state.version,
        "endpoints": {
            "liveness": "/health/live",
            "readiness": "/health/ready"
        }
    }))
}
