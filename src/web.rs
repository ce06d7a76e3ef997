//! Axum-based HTTP server for the status page and JSON API
//!
//! Presentation only: every route reads the aggregated snapshot and renders
//! it. Upstream failures never surface here; the worst a client can observe
//! is a stale snapshot.

use crate::clock::Clock;
use crate::error::{GridwatchError, Result};
use crate::grid_state::GridState;
use crate::history::HistoryItem;
use crate::logging::get_logger;
use crate::monitor::{Monitor, PowerSnapshot, demo_snapshot};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub clock: Clock,
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn api_state(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.snapshot())
}

async fn index(State(state): State<AppState>) -> impl IntoResponse {
    Html(render_page(&state.monitor.snapshot()))
}

async fn example_on(State(state): State<AppState>) -> impl IntoResponse {
    let snap = state.monitor.snapshot();
    Html(render_page(&demo_snapshot(
        GridState::On,
        &snap.address,
        &snap.version,
        &state.clock,
    )))
}

async fn example_off(State(state): State<AppState>) -> impl IntoResponse {
    let snap = state.monitor.snapshot();
    Html(render_page(&demo_snapshot(
        GridState::Off,
        &snap.address,
        &snap.version,
        &state.clock,
    )))
}

/// Assemble the route table
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/state", get(api_state))
        .route("/example/on", get(example_on))
        .route("/example/off", get(example_off))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the shutdown signal fires
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> Result<()> {
    let logger = get_logger("web");
    let router = build_router(state);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| GridwatchError::web(format!("invalid bind address: {}", e)))?;
    logger.info(&format!("starting server on {}", addr));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| GridwatchError::web(format!("bind failed: {}", e)))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .map_err(|e| GridwatchError::web(e.to_string()))?;
    logger.info("server stopped");
    Ok(())
}

/// Server-rendered status page
fn render_page(snapshot: &PowerSnapshot) -> String {
    let grid_label = match snapshot.grid.as_str() {
        "on" => "Grid power is ON",
        "off" => "Grid power is OFF",
        _ => "Waiting for first reading…",
    };

    let outage_block = match &snapshot.outage {
        Some(window) => format!(
            "<p class=\"outage\">Announced {} outage: {} &ndash; {}</p>",
            escape(&window.kind),
            window
                .from
                .map_or_else(|| "?".to_string(), |ts| ts.to_string()),
            window.to.map_or_else(|| "?".to_string(), |ts| ts.to_string()),
        ),
        None => String::new(),
    };

    let history_rows: String = snapshot
        .history
        .iter()
        .rev()
        .map(render_history_row)
        .collect();

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>Gridwatch &mdash; {address}</title>\n\
         <link rel=\"stylesheet\" href=\"/static/style.css\">\n</head>\n<body>\n\
         <header><h1>{address}</h1></header>\n\
         <main class=\"grid-{grid}\">\n<h2>{grid_label}</h2>\n{outage_block}\n\
         <table class=\"history\">\n<thead><tr><th>State</th><th>From</th><th>To</th></tr></thead>\n\
         <tbody>\n{history_rows}</tbody>\n</table>\n</main>\n\
         <footer>gridwatch {version}</footer>\n</body>\n</html>\n",
        address = escape(&snapshot.address),
        grid = escape(&snapshot.grid),
        grid_label = grid_label,
        outage_block = outage_block,
        history_rows = history_rows,
        version = escape(&snapshot.version),
    )
}

fn render_history_row(item: &HistoryItem) -> String {
    format!(
        "<tr class=\"state-{state}\"><td>{state}</td><td>{from}</td><td>{to}</td></tr>\n",
        state = item.state,
        from = item.from,
        to = item
            .to
            .map_or_else(|| "ongoing".to_string(), |ts| ts.to_string()),
    )
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::LocalTimestamp;

    #[test]
    fn page_renders_pending_state() {
        let monitor = Monitor::new("Kyiv, Khreshchatyk, 12".into(), "0.0.0-test".into());
        let page = render_page(&monitor.snapshot());
        assert!(page.contains("Waiting for first reading"));
        assert!(page.contains("Kyiv, Khreshchatyk, 12"));
    }

    #[test]
    fn page_marks_open_interval_as_ongoing() {
        let snapshot = PowerSnapshot {
            outage: None,
            grid: "off".into(),
            history: vec![HistoryItem {
                state: GridState::Off,
                from: LocalTimestamp::parse("10:00 01.02.2025").unwrap(),
                to: None,
            }],
            address: "addr".into(),
            version: "v".into(),
            demo: false,
        };
        let page = render_page(&snapshot);
        assert!(page.contains("Grid power is OFF"));
        assert!(page.contains("ongoing"));
    }

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(escape("<b>&\"x\""), "&lt;b&gt;&amp;&quot;x&quot;");
    }
}
