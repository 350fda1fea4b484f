use axum::{
    body::Body,
    extract::Extension,
    http::{Request, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use rig_core::{
    create_app_with_routes, middleware::timeout_middleware, AppConfig, AppState,
    ResponseWriteState, Signal, TimeoutConfig,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tower::ServiceExt;

fn config_with_timeout(ms: u64) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.request_timeout_ms = ms;
    config
}

fn app(routes: Router<AppState>, timeout_ms: u64) -> Router {
    create_app_with_routes(
        routes,
        AppState::default(),
        &config_with_timeout(timeout_ms),
        Signal::new(),
    )
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_fast_handler_passes_through() {
    let routes = Router::new().route("/fast", get(|| async { "fast" }));

    let response = app(routes, 200).oneshot(get_request("/fast")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"fast");
}

#[tokio::test]
async fn test_slow_handler_gets_gateway_timeout() {
    let routes = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            "slow"
        }),
    );

    let started = std::time::Instant::now();
    let response = app(routes, 50).oneshot(get_request("/slow")).await.unwrap();

    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body_json(response).await["error"], "request timed out");
}

#[tokio::test]
async fn test_zero_timeout_disables_guard() {
    let routes = Router::new().route(
        "/slow",
        get(|signal: Signal| async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            if signal.deadline().is_some() {
                "deadline"
            } else {
                "unbounded"
            }
        }),
    );

    let response = app(routes, 0).oneshot(get_request("/slow")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"unbounded");
}

#[tokio::test]
async fn test_custom_timeout_response() {
    let config = TimeoutConfig::new(Duration::from_millis(30))
        .with_on_timeout(|| (StatusCode::REQUEST_TIMEOUT, "too slow").into_response());
    let app = Router::new()
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                "slow"
            }),
        )
        .layer(middleware::from_fn_with_state(config, timeout_middleware));

    let response = app.oneshot(get_request("/slow")).await.unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"too slow");
}

#[tokio::test]
async fn test_handler_sees_deadline() {
    let routes = Router::new().route(
        "/deadline",
        get(|signal: Signal| async move {
            let remaining = signal.remaining().unwrap_or_default();
            (remaining > Duration::ZERO && remaining <= Duration::from_millis(200)).to_string()
        }),
    );

    let response = app(routes, 200)
        .oneshot(get_request("/deadline"))
        .await
        .unwrap();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"true");
}

#[tokio::test]
async fn test_handler_observes_cancellation() {
    let (tx, rx) = oneshot::channel::<bool>();
    let tx = Arc::new(parking_lot::Mutex::new(Some(tx)));

    let routes = Router::new().route(
        "/watch",
        get(move |signal: Signal| {
            let tx = tx.clone();
            async move {
                let observed = tokio::select! {
                    _ = signal.done() => true,
                    _ = tokio::time::sleep(Duration::from_secs(2)) => false,
                };
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send(observed);
                }
                "done"
            }
        }),
    );

    let response = app(routes, 50).oneshot(get_request("/watch")).await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    let observed = tokio::time::timeout(Duration::from_millis(500), rx)
        .await
        .expect("handler should return promptly after cancellation")
        .unwrap();
    assert!(observed);
}

#[tokio::test]
async fn test_late_response_is_discarded() {
    let late_refused = Arc::new(AtomicBool::new(false));
    let flag = late_refused.clone();

    let routes = Router::new().route(
        "/late",
        get(move |Extension(state): Extension<ResponseWriteState>| {
            let flag = flag.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                flag.store(state.is_written(), Ordering::SeqCst);
                (StatusCode::CREATED, "late")
            }
        }),
    );

    let response = app(routes, 40).oneshot(get_request("/late")).await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body_json(response).await["error"], "request timed out");

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(late_refused.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_panicking_handler_returns_internal_error() {
    async fn exploding() -> &'static str {
        panic!("handler exploded")
    }

    let routes = Router::new().route("/boom", get(exploding));

    let response = app(routes, 500).oneshot(get_request("/boom")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["status"], 500);
}

#[tokio::test]
async fn test_root_cancellation_reaches_handler() {
    let root = Signal::new();
    let routes = Router::new().route(
        "/wait",
        get(|signal: Signal| async move {
            signal.done().await;
            signal.error().map(|e| e.to_string()).unwrap_or_default()
        }),
    );
    let app = create_app_with_routes(
        routes,
        AppState::default(),
        &config_with_timeout(0),
        root.clone(),
    );

    let canceller = root.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel();
    });

    let response = tokio::time::timeout(Duration::from_secs(1), app.oneshot(get_request("/wait")))
        .await
        .expect("request should finish after shutdown")
        .unwrap();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"operation cancelled");
}

#[tokio::test]
async fn test_panic_without_guard_returns_internal_error() {
    async fn exploding() -> &'static str {
        panic!("handler exploded")
    }

    let routes = Router::new().route("/boom", get(exploding));

    let response = app(routes, 0).oneshot(get_request("/boom")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert_eq!(body["error"], "Internal server error");
    assert_eq!(body["status"], 500);
}
