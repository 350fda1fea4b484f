//! Main entry point for the HTTP server binary

use anyhow::{Context, Result};
use axum::{extract::State, routing::{get, post}, Json, Router};
use rig_core::{
    config::LogFormat, create_app_with_routes, create_routes, run_server, AppConfig, AppState,
    ProbeResult, Signal,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Stand-in for an external dependency whose health can be flipped at runtime.
#[derive(Debug)]
struct Dependency {
    name: &'static str,
    up: AtomicBool,
}

impl Dependency {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            up: AtomicBool::new(true),
        })
    }

    fn ping(&self) -> ProbeResult {
        if self.up.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(anyhow::anyhow!("{} unavailable", self.name))
        }
    }

    fn set(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
        if up {
            info!("{} marked as UP", self.name);
        } else {
            warn!("{} marked as DOWN", self.name);
        }
    }
}

#[derive(Clone)]
struct Demo {
    database: Arc<Dependency>,
    cache: Arc<Dependency>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(config.logging.format);

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let state = AppState::new(config.health.clone());
    let demo = Demo {
        database: Dependency::new("database"),
        cache: Dependency::new("cache"),
    };
    register_checks(&state, &demo)?;

    info!("App: {} v{}", state.app_name, state.version);
    info!(
        liveness = state.registry.len(rig_core::CheckKind::Liveness),
        readiness = state.registry.len(rig_core::CheckKind::Readiness),
        parallel = config.health.parallel,
        "Health checks registered"
    );

    let routes = create_routes()
        .route("/slow", get(handle_slow))
        .merge(admin_routes(demo));

    let root = Signal::new();
    let app = create_app_with_routes(routes, state, &config, root.clone());

    run_server(
        app,
        addr,
        root,
        Duration::from_secs(config.server.shutdown_timeout_seconds),
    )
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn register_checks(state: &AppState, demo: &Demo) -> Result<()> {
    let registry = &state.registry;

    registry.add_liveness_check("runtime", || Ok(()))?;

    let database = demo.database.clone();
    registry.add_readiness_check("database", move || database.ping())?;

    let cache = demo.cache.clone();
    registry.add_readiness_check_cancelable("cache", move |signal: Signal| {
        let cache = cache.clone();
        async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(20)) => cache.ping(),
                _ = signal.done() => Err(anyhow::anyhow!("cache ping abandoned")),
            }
        }
    })?;

    Ok(())
}

/// Sleeps for `ms` milliseconds unless the request signal fires first.
async fn handle_slow(
    signal: Signal,
    axum::extract::Query(params): axum::extract::Query<std::collections::HashMap<String, u64>>,
) -> Json<Value> {
    let ms = params.get("ms").copied().unwrap_or(1_000);

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(ms)) => Json(json!({ "slept_ms": ms })),
        _ = signal.done() => Json(json!({ "abandoned": true })),
    }
}

fn admin_routes(demo: Demo) -> Router<AppState> {
    Router::new()
        .route("/admin/:dependency/:state", post(handle_toggle))
        .with_state(demo)
}

async fn handle_toggle(
    State(demo): State<Demo>,
    axum::extract::Path((dependency, state)): axum::extract::Path<(String, String)>,
) -> std::result::Result<Json<Value>, rig_core::AppError> {
    let target = match dependency.as_str() {
        "db" | "database" => &demo.database,
        "cache" => &demo.cache,
        other => return Err(rig_core::AppError::NotFound(format!("dependency '{}'", other))),
    };

    let up = match state.as_str() {
        "up" => true,
        "down" => false,
        other => return Err(rig_core::AppError::BadRequest(format!("unknown state '{}'", other))),
    };

    target.set(up);
    Ok(Json(json!({ "dependency": target.name, "state": state })))
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if cfg!(debug_assertions) {
            "debug"
        } else {
            "info"
        };

        format!(
            "{}={},rig_core={},tower_http=debug",
            env!("CARGO_CRATE_NAME").replace('-', "_"),
            default_level,
            default_level
        )
        .into()
    });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(format == LogFormat::Json);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
