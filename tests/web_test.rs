use axum::body::Body;
use axum::http::{Request, StatusCode};
use gridwatch::clock::Clock;
use gridwatch::monitor::Monitor;
use gridwatch::web::{AppState, build_router};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

fn test_state() -> AppState {
    AppState {
        monitor: Arc::new(Monitor::new(
            "Kyiv, Khreshchatyk, 12".to_string(),
            "0.0.0-test".to_string(),
        )),
        clock: Clock::new("Europe/Kyiv").unwrap(),
    }
}

async fn get(router: axum::Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

#[tokio::test]
async fn health_ok() {
    let (status, body) = get(build_router(test_state()), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn api_state_serves_pending_snapshot() {
    let (status, body) = get(build_router(test_state()), "/api/state").await;
    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["grid"], "pending");
    assert_eq!(parsed["outage"], serde_json::Value::Null);
    assert_eq!(parsed["address"], "Kyiv, Khreshchatyk, 12");
    assert_eq!(parsed["version"], "0.0.0-test");
    assert!(parsed["history"].as_array().unwrap().is_empty());
    assert!(parsed.get("demo").is_none());
}

#[tokio::test]
async fn api_state_reflects_subscriber_updates() {
    let state = test_state();
    state.monitor.on_grid_update()(gridwatch::grid_state::GridState::Off);
    let (_, body) = get(build_router(state), "/api/state").await;
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["grid"], "off");
}

#[tokio::test]
async fn index_renders_html() {
    let (status, body) = get(build_router(test_state()), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<!DOCTYPE html>"));
    assert!(body.contains("Kyiv, Khreshchatyk, 12"));
    assert!(body.contains("Waiting for first reading"));
}

#[tokio::test]
async fn example_pages_render_demo_data() {
    let (status, on_page) = get(build_router(test_state()), "/example/on").await;
    assert_eq!(status, StatusCode::OK);
    assert!(on_page.contains("Grid power is ON"));

    let (_, off_page) = get(build_router(test_state()), "/example/off").await;
    assert!(off_page.contains("Grid power is OFF"));
    assert!(off_page.contains("emergency"));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (status, _) = get(build_router(test_state()), "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
