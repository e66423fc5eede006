// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/` and are read-only views over public
// market data, so none of them require authentication. A presenter fetches
// `/snapshot` once, then refetches the individual view whose redraw hint
// arrives over the WebSocket.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::app_state::{DashboardState, MaLine};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<DashboardState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        // ── Full snapshot ───────────────────────────────────────────
        .route("/api/v1/snapshot", get(snapshot))
        // ── Individual views for incremental redraw ─────────────────
        .route("/api/v1/ticker", get(ticker))
        .route("/api/v1/candles", get(candles))
        .route("/api/v1/volumes", get(volumes))
        .route("/api/v1/moving-averages", get(moving_averages))
        .route("/api/v1/depth", get(depth))
        .route("/api/v1/trades", get(trades))
        // ── Operational status ──────────────────────────────────────
        .route("/api/v1/status", get(status))
        // ── WebSocket redraw feed ───────────────────────────────────
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    symbol: String,
    uptime_s: u64,
}

async fn health(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        symbol: state.config.read().symbol.clone(),
        uptime_s: state.start_time.elapsed().as_secs(),
    })
}

async fn snapshot(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

async fn ticker(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    Json(*state.ticker.read())
}

async fn candles(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    Json(state.series.candles())
}

async fn volumes(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    Json(state.series.volumes())
}

#[derive(Serialize)]
struct MovingAveragesResponse {
    fast: MaLine,
    slow: MaLine,
}

async fn moving_averages(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    let (fast_window, slow_window) = state.series.ma_windows();
    Json(MovingAveragesResponse {
        fast: MaLine {
            window: fast_window,
            points: state.series.ma_fast(),
        },
        slow: MaLine {
            window: slow_window,
            points: state.series.ma_slow(),
        },
    })
}

async fn depth(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    Json(state.build_depth_view())
}

async fn trades(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    Json(state.build_tape_view())
}

async fn status(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    Json(state.build_status())
}
