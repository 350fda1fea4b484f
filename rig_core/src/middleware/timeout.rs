//! Request timeout middleware
//!
//! Wraps the rest of the stack so a request that has not produced a response
//! within its budget gets the fallback instead. The deadline-bearing
//! [`Signal`] and the request's [`ResponseWriteState`] are installed in the
//! request extensions; handlers should pass the signal to downstream calls.

use crate::error::AppError;
use crate::guard::{run_guarded, GuardOutcome, ResponseWriteState};
use crate::signal::Signal;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub type OnTimeout = Arc<dyn Fn() -> Response + Send + Sync>;

#[derive(Clone)]
pub struct TimeoutConfig {
    pub timeout: Duration,
    pub on_timeout: OnTimeout,
}

impl TimeoutConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            on_timeout: Arc::new(default_timeout_response),
        }
    }

    pub fn with_on_timeout<F>(mut self, on_timeout: F) -> Self
    where
        F: Fn() -> Response + Send + Sync + 'static,
    {
        self.on_timeout = Arc::new(on_timeout);
        self
    }
}

impl std::fmt::Debug for TimeoutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutConfig")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

pub fn default_timeout_response() -> Response {
    (
        StatusCode::GATEWAY_TIMEOUT,
        Json(json!({
            "error": "request timed out",
        })),
    )
        .into_response()
}

pub async fn timeout_middleware(
    State(config): State<TimeoutConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let ambient = request
        .extensions()
        .get::<Signal>()
        .cloned()
        .unwrap_or_default();
    let signal = ambient.with_timeout(config.timeout);
    // Aborting this request cancels the inner handler's signal too.
    let _cancel_on_drop = signal.drop_guard();
    let write_state = ResponseWriteState::new();

    request.extensions_mut().insert(signal.clone());
    request.extensions_mut().insert(write_state.clone());

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let on_timeout = config.on_timeout.clone();

    match run_guarded(&signal, &write_state, next.run(request), move || on_timeout()).await {
        GuardOutcome::Completed(response) => response,
        GuardOutcome::TimedOut(response) => {
            warn!(
                method = %method,
                path = %path,
                timeout_ms = config.timeout.as_millis() as u64,
                "request timed out"
            );
            response
        }
        GuardOutcome::Faulted(fault) => AppError::from(fault).into_response(),
        GuardOutcome::Cancelled(e) => AppError::from(e).into_response(),
    }
}
