//! Liveness and readiness endpoints

use crate::{health::EvaluationReport, signal::Signal, AppState};
use axum::{extract::State, routing::get, Router};
use tracing::info;

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health/live", get(handle_liveness))
        .route("/health/ready", get(handle_readiness))
}

/// Runs the liveness collection. A client that goes away cancels the
/// in-flight cancelable checks.
pub async fn handle_liveness(State(state): State<AppState>, signal: Signal) -> EvaluationReport {
    info!("GET /health/live - Running liveness checks");

    let signal = signal.child();
    let _cancel_on_drop = signal.drop_guard();

    state.evaluator.liveness(&signal).await
}

pub async fn handle_readiness(State(state): State<AppState>, signal: Signal) -> EvaluationReport {
    info!("GET /health/ready - Running readiness checks");

    let signal = signal.child();
    let _cancel_on_drop = signal.drop_guard();

    state.evaluator.readiness(&signal).await
}
