//! Request id propagation

use crate::config::RequestIdConfig;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(|| RequestId(String::new())))
    }
}

pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Middleware state: the configured header policy plus the id generator,
/// UUID v4 unless replaced.
#[derive(Clone)]
pub struct RequestIdState {
    pub config: RequestIdConfig,
    pub generator: IdGenerator,
}

impl RequestIdState {
    pub fn new(config: RequestIdConfig) -> Self {
        Self {
            config,
            generator: Arc::new(|| RequestId::generate().0),
        }
    }

    pub fn with_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.generator = Arc::new(generator);
        self
    }

    fn generate(&self) -> RequestId {
        RequestId((self.generator)())
    }
}

impl From<RequestIdConfig> for RequestIdState {
    fn from(config: RequestIdConfig) -> Self {
        Self::new(config)
    }
}

impl fmt::Debug for RequestIdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestIdState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

pub async fn request_id_middleware(
    State(state): State<RequestIdState>,
    mut request: Request,
    next: Next,
) -> Response {
    let config = &state.config;
    let header = HeaderName::from_bytes(config.header.as_bytes())
        .unwrap_or_else(|_| HeaderName::from_static("x-request-id"));

    let inbound = if config.trust_proxy {
        request
            .headers()
            .get(&header)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|value| RequestId(value.to_string()))
    } else {
        None
    };
    let request_id = inbound.unwrap_or_else(|| state.generate());

    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(header, value);
    }

    response
}
