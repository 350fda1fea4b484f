//! Bounded request execution and liveness/readiness evaluation for axum services.

pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod race;
pub mod signal;

pub use config::{AppConfig, HealthConfig};
pub use error::{AppError, Result};
pub use guard::{run_guarded, GuardOutcome, ResponseWriteState};
pub use handlers::routes::create_routes;
pub use health::{
    AggregateStatus, CheckKind, CheckRegistry, EvaluationReport, HealthEvaluator, ProbeResult,
};
pub use middleware::{RequestId, RequestIdState, TimeoutConfig};
pub use race::{race, race_blocking, Fault, RaceOutcome};
pub use signal::{Signal, SignalError};

use axum::{middleware as axum_middleware, Router};
use std::{future::IntoFuture, net::SocketAddr, sync::Arc, time::Duration};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub registry: Arc<CheckRegistry>,
    pub evaluator: HealthEvaluator,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}

impl AppState {
    pub fn new(health: HealthConfig) -> Self {
        let registry = Arc::new(CheckRegistry::new(health));
        let evaluator = HealthEvaluator::new(registry.clone());

        Self {
            app_name: "rig".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            registry,
            evaluator,
        }
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }
}

/// Builds the application router. Every request gets a child of `root` as its
/// ambient signal; when a request timeout is configured the guard derives a
/// deadline from it.
pub fn create_app(state: AppState, config: &AppConfig, root: Signal) -> Router {
    create_app_with_routes(create_routes(), state, config, root)
}

/// Same as [`create_app`] but serves `routes` instead of the default table.
pub fn create_app_with_routes(
    routes: Router<AppState>,
    state: AppState,
    config: &AppConfig,
    root: Signal,
) -> Router {
    let mut router = routes;

    if let Some(timeout) = config.server.request_timeout() {
        router = router.layer(axum_middleware::from_fn_with_state(
            TimeoutConfig::new(timeout),
            middleware::timeout::timeout_middleware,
        ));
    }

    router = router.layer(axum_middleware::from_fn_with_state(
        root,
        middleware::signal::signal_middleware,
    ));

    router = router.layer(middleware::recover::recover_layer());

    router = router.layer(middleware::logging::logging_layer());

    router = router.layer(axum_middleware::from_fn_with_state(
        RequestIdState::from(config.request_id.clone()),
        middleware::request_id::request_id_middleware,
    ));

    router.with_state(state)
}

/// Serves `app` until Ctrl+C or SIGTERM. Shutdown cancels `root`, which reaches
/// every in-flight request signal; connections still open after
/// `shutdown_timeout` are abandoned.
pub async fn run_server(
    app: Router,
    addr: SocketAddr,
    root: Signal,
    shutdown_timeout: Duration,
) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let app = app.into_make_service_with_connect_info::<SocketAddr>();

    let shutdown_root = root.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_root.cancel();
        })
        .into_future();

    let grace_expired = async {
        root.done().await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = server => result?,
        _ = grace_expired => {
            warn!(
                timeout_secs = shutdown_timeout.as_secs(),
                "graceful shutdown timed out, dropping open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
