use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use rig_core::{create_app, AppConfig, AppState, HealthConfig, Signal};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn build_app(state: AppState) -> Router {
    create_app(state, &AppConfig::default(), Signal::new())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_empty_collections_are_healthy() {
    let app = build_app(AppState::default());

    let (status, body) = get_json(app.clone(), "/health/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "OK", "checks": {} }));

    let (status, body) = get_json(app, "/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "OK", "checks": {} }));
}

#[tokio::test]
async fn test_readiness_reports_failing_dependency() {
    let state = AppState::default();
    state.registry.add_liveness_check("runtime", || Ok(())).unwrap();
    state.registry.add_readiness_check("database", || Ok(())).unwrap();
    state
        .registry
        .add_readiness_check("cache", || Err(anyhow::anyhow!("cache unavailable")))
        .unwrap();

    let app = build_app(state);

    let (status, body) = get_json(app.clone(), "/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body,
        json!({
            "status": "Service Unavailable",
            "checks": {
                "database": "OK",
                "cache": "FAIL: cache unavailable"
            }
        })
    );

    let (status, body) = get_json(app, "/health/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["runtime"], "OK");
}

#[tokio::test]
async fn test_readiness_follows_dependency_state() {
    let up = Arc::new(AtomicBool::new(true));
    let state = AppState::default();
    let probe_flag = up.clone();
    state
        .registry
        .add_readiness_check("database", move || {
            if probe_flag.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(anyhow::anyhow!("database connection lost"))
            }
        })
        .unwrap();

    let app = build_app(state);

    let (status, _) = get_json(app.clone(), "/health/ready").await;
    assert_eq!(status, StatusCode::OK);

    up.store(false, Ordering::SeqCst);
    let (status, body) = get_json(app.clone(), "/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["checks"]["database"], "FAIL: database connection lost");

    up.store(true, Ordering::SeqCst);
    let (status, _) = get_json(app, "/health/ready").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_check_times_out_over_http() {
    let state = AppState::new(HealthConfig::new(Duration::from_millis(50), false));
    state
        .registry
        .add_readiness_check("slow", || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        })
        .unwrap();

    let started = std::time::Instant::now();
    let (status, body) = get_json(build_app(state), "/health/ready").await;

    assert!(started.elapsed() < Duration::from_millis(250));
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["checks"]["slow"], "FAIL: check timed out");
}

#[tokio::test]
async fn test_health_response_carries_request_id() {
    let request = Request::builder()
        .uri("/health/live")
        .body(Body::empty())
        .unwrap();

    let response = build_app(AppState::default()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_root_lists_health_endpoints() {
    let state = AppState::default().with_app_name("orders");

    let (status, body) = get_json(build_app(state), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["app"], "orders");
    assert_eq!(body["endpoints"]["readiness"], "/health/ready");
}
