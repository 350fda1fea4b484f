//! Application error types and handling

use crate::health::CheckKind;
use crate::race::Fault;
use crate::signal::SignalError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{kind} check '{name}' is already registered")]
    DuplicateCheck { kind: CheckKind, name: String },

    #[error("Handler fault: {0}")]
    Fault(#[from] Fault),

    #[error("Request aborted: {0}")]
    Signal(#[from] SignalError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::DuplicateCheck { kind, name } => (
                StatusCode::CONFLICT,
                format!("{} check '{}' is already registered", kind, name),
            ),
            AppError::Fault(fault) => {
                tracing::error!("Handler fault: {}", fault);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Signal(SignalError::DeadlineExceeded) => {
                (StatusCode::GATEWAY_TIMEOUT, "request timed out".to_string())
            }
            AppError::Signal(SignalError::Cancelled) => {
                (StatusCode::SERVICE_UNAVAILABLE, "request cancelled".to_string())
            }
            AppError::Config(err) => {
                tracing::error!("Configuration error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::IoError(err) => {
                tracing::error!("IO error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
