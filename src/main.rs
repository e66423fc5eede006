// =============================================================================
// marketdeck — Main Entry Point
// =============================================================================
//
// Single-symbol live market dashboard core: five independently-cadenced poll
// tasks against the Binance public API, reconciled into one consistent
// in-memory series and served to presenters over a read-only REST/WS surface.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod error;
mod indicators;
mod market_data;
mod reconcile;
mod runtime_config;
mod scheduler;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::DashboardState;
use crate::binance::MarketDataClient;
use crate::reconcile::{Reconciler, TailOutcome};
use crate::runtime_config::DashboardConfig;
use crate::scheduler::PollScheduler;
use crate::types::View;

const CONFIG_PATH: &str = "dashboard_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        marketdeck — Live Market Dashboard Core           ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = DashboardConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        DashboardConfig::default()
    });

    // Override the instrument from env if available.
    if let Ok(symbol) = std::env::var("DECK_SYMBOL") {
        if !symbol.trim().is_empty() {
            config.symbol = symbol.trim().to_uppercase();
        }
    }
    config.validate().context("invalid dashboard configuration")?;

    info!(
        symbol = %config.symbol,
        interval = %config.interval,
        ma_fast = config.ma_fast_window,
        ma_slow = config.ma_slow_window,
        "Dashboard configured"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let state = Arc::new(DashboardState::new(config.clone()));

    // ── 3. Build the market data client & reconciler ─────────────────────
    let client = Arc::new(MarketDataClient::new(
        config.symbol.clone(),
        state.limits.clone(),
    ));
    let reconciler = Arc::new(Reconciler::new(
        client.clone(),
        state.series.clone(),
        &config.interval,
        config.history_limit,
    )?);

    // ── 4. Initial fill ──────────────────────────────────────────────────
    // Failures here only degrade freshness: each poll task heals its own
    // view on its next tick.
    match reconciler.resync_full().await {
        Ok(count) => info!(count, "initial candle history loaded"),
        Err(e) => {
            warn!(error = %e, "initial candle fetch failed — resync task will retry");
            state.push_error("resync", e.to_string());
        }
    }
    match client.fetch_ticker().await {
        Ok(ticker) => *state.ticker.write() = Some(ticker),
        Err(e) => warn!(error = %e, "initial ticker fetch failed"),
    }
    match client.fetch_order_book(config.book_depth).await {
        Ok(book) => state.series.replace_order_book(book),
        Err(e) => warn!(error = %e, "initial order-book fetch failed"),
    }
    match client.fetch_recent_trades(config.tape_length).await {
        Ok(ticks) => state.series.replace_trades(ticks),
        Err(e) => warn!(error = %e, "initial trade fetch failed"),
    }
    state.increment_version();

    // ── 5. Poll tasks ────────────────────────────────────────────────────
    let mut scheduler = PollScheduler::new(state.tasks.clone());

    // 24h ticker
    {
        let state = state.clone();
        let client = client.clone();
        scheduler.spawn(
            "ticker",
            Duration::from_millis(config.ticker_poll_ms),
            move || {
                let state = state.clone();
                let client = client.clone();
                async move {
                    match client.fetch_ticker().await {
                        Ok(ticker) => {
                            *state.ticker.write() = Some(ticker);
                            state.notify_redraw(View::Ticker);
                            Ok(())
                        }
                        Err(e) => {
                            state.push_error("ticker", e.to_string());
                            Err(e)
                        }
                    }
                }
            },
        );
    }

    // Order-book snapshot
    {
        let state = state.clone();
        let client = client.clone();
        let depth = config.book_depth;
        scheduler.spawn(
            "order_book",
            Duration::from_millis(config.book_poll_ms),
            move || {
                let state = state.clone();
                let client = client.clone();
                async move {
                    match client.fetch_order_book(depth).await {
                        Ok(book) => {
                            state.series.replace_order_book(book);
                            state.notify_redraw(View::OrderBook);
                            Ok(())
                        }
                        Err(e) => {
                            state.push_error("order_book", e.to_string());
                            Err(e)
                        }
                    }
                }
            },
        );
    }

    // Trade tape
    {
        let state = state.clone();
        let client = client.clone();
        let limit = config.tape_length;
        scheduler.spawn(
            "trades",
            Duration::from_millis(config.tape_poll_ms),
            move || {
                let state = state.clone();
                let client = client.clone();
                async move {
                    match client.fetch_recent_trades(limit).await {
                        Ok(ticks) => {
                            state.series.replace_trades(ticks);
                            state.notify_redraw(View::Trades);
                            Ok(())
                        }
                        Err(e) => {
                            state.push_error("trades", e.to_string());
                            Err(e)
                        }
                    }
                }
            },
        );
    }

    // Candle tail (incremental)
    {
        let state = state.clone();
        let reconciler = reconciler.clone();
        scheduler.spawn(
            "candle_tail",
            Duration::from_millis(config.candle_poll_ms),
            move || {
                let state = state.clone();
                let reconciler = reconciler.clone();
                async move {
                    match reconciler.tick_latest().await {
                        // A dropped stale sample changes nothing on screen.
                        Ok(TailOutcome::SkippedStale) => Ok(()),
                        Ok(_) => {
                            state.notify_redraw(View::Candles);
                            Ok(())
                        }
                        Err(e) => {
                            state.push_error("candle_tail", e.to_string());
                            Err(e)
                        }
                    }
                }
            },
        );
    }

    // Full resync (drift correction)
    {
        let state = state.clone();
        let reconciler = reconciler.clone();
        scheduler.spawn(
            "resync",
            Duration::from_millis(config.resync_poll_ms),
            move || {
                let state = state.clone();
                let reconciler = reconciler.clone();
                async move {
                    match reconciler.resync_full().await {
                        Ok(_count) => {
                            state.notify_redraw(View::Candles);
                            Ok(())
                        }
                        Err(e) => {
                            state.push_error("resync", e.to_string());
                            Err(e)
                        }
                    }
                }
            },
        );
    }

    info!(count = scheduler.task_count(), "Poll tasks launched");

    // ── 6. Start the API server ──────────────────────────────────────────
    let bind_addr = std::env::var("DECK_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let api_state = state.clone();
    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        axum::serve(listener, app).await.expect("API server failed");
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 7. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    scheduler.shutdown().await;

    if let Err(e) = state.config.read().save(CONFIG_PATH) {
        warn!(error = %e, "Failed to save config on shutdown");
    }

    info!("marketdeck shut down complete.");
    Ok(())
}
