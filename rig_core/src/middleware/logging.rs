//! Request logging middleware configuration

use super::request_id::RequestId;
use http::{Request, Response};
use std::time::Duration;
use tower_http::classify::{ServerErrorsAsFailures, ServerErrorsFailureClass, SharedClassifier};
use tower_http::trace::{
    DefaultOnBodyChunk, DefaultOnEos, MakeSpan, OnFailure, OnRequest, OnResponse, TraceLayer,
};
use tracing::{info_span, Span};

pub type HttpTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    RequestSpan,
    RequestLogger,
    ResponseLogger,
    DefaultOnBodyChunk,
    DefaultOnEos,
    FailureLogger,
>;

pub fn logging_layer() -> HttpTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_request(RequestLogger)
        .on_response(ResponseLogger)
        .on_failure(FailureLogger)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.to_string())
            .unwrap_or_default();

        info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
            query = ?request.uri().query(),
            request_id = %request_id,
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogger;

impl<B> OnRequest<B> for RequestLogger {
    fn on_request(&mut self, request: &Request<B>, _span: &Span) {
        tracing::debug!(
            "started processing request {} {}",
            request.method(),
            request.uri().path()
        );
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseLogger;

impl<B> OnResponse<B> for ResponseLogger {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        let status = response.status();
        let latency_ms = latency.as_millis();

        if status.is_success() {
            tracing::info!(
                status = status.as_u16(),
                latency_ms = latency_ms,
                "request completed successfully"
            );
        } else if status.is_client_error() {
            tracing::warn!(
                status = status.as_u16(),
                latency_ms = latency_ms,
                "client error response"
            );
        } else {
            tracing::error!(
                status = status.as_u16(),
                latency_ms = latency_ms,
                "server error response"
            );
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FailureLogger;

impl OnFailure<ServerErrorsFailureClass> for FailureLogger {
    fn on_failure(&mut self, error: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
        tracing::error!(
            latency_ms = latency.as_millis(),
            error = ?error,
            "request failed"
        );
    }
}
