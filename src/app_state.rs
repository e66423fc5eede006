// =============================================================================
// Central Dashboard State
// =============================================================================
//
// The single composition-root struct owned by `main` and shared with every
// poll task and API handler via `Arc<DashboardState>` — no ambient globals.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for small mutable cells (config, ticker, errors).
//   - SeriesStore manages its own interior mutability.
//   - A tokio broadcast channel fans redraw hints out to WebSocket clients.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::binance::{RateLimitSnapshot, RateLimitTracker};
use crate::indicators::MaPoint;
use crate::market_data::{BookLevel, Candle, SeriesStore, TapeStats, TradeTick, VolumeBar};
use crate::runtime_config::DashboardConfig;
use crate::scheduler::{TaskBoard, TaskStatus};
use crate::types::{TickerStats, View};

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// Redraw-hint fan-out capacity; a slow client that lags simply receives a
/// fresh full snapshot.
const REDRAW_CHANNEL_CAPACITY: usize = 64;

/// A recorded task failure for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// Poll task that hit the error.
    pub task: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// DashboardState
// =============================================================================

/// Shared state for the whole dashboard core.
pub struct DashboardState {
    /// Monotonically increasing version counter, incremented on every
    /// meaningful mutation. WebSocket clients use it to detect missed data.
    pub state_version: AtomicU64,

    pub config: RwLock<DashboardConfig>,

    /// Authoritative candle/volume/MA series plus book and tape snapshots.
    pub series: Arc<SeriesStore>,

    /// Latest 24h ticker, refreshed on its own cadence.
    pub ticker: RwLock<Option<TickerStats>>,

    /// Per-task run/failure/staleness bookkeeping.
    pub tasks: Arc<TaskBoard>,

    /// Provider rate-limit usage observed from response headers.
    pub limits: Arc<RateLimitTracker>,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    redraw_tx: broadcast::Sender<View>,

    pub start_time: std::time::Instant,
}

impl DashboardState {
    /// Construct the state from a validated configuration. The returned value
    /// is typically wrapped in `Arc` immediately.
    pub fn new(config: DashboardConfig) -> Self {
        let series = Arc::new(SeriesStore::new(
            config.ma_fast_window,
            config.ma_slow_window,
            config.history_limit as usize,
        ));
        let (redraw_tx, _) = broadcast::channel(REDRAW_CHANNEL_CAPACITY);

        Self {
            state_version: AtomicU64::new(1),
            config: RwLock::new(config),
            series,
            ticker: RwLock::new(None),
            tasks: Arc::new(TaskBoard::new()),
            limits: Arc::new(RateLimitTracker::new()),
            recent_errors: RwLock::new(Vec::new()),
            redraw_tx,
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Redraw signalling ───────────────────────────────────────────────

    /// Announce fresh data for `view`: bump the version and notify every
    /// connected presenter to repaint that view only.
    pub fn notify_redraw(&self, view: View) {
        self.increment_version();
        // No receivers connected is fine — the data is still in the store.
        let _ = self.redraw_tx.send(view);
    }

    pub fn subscribe_redraw(&self) -> broadcast::Receiver<View> {
        self.redraw_tx.subscribe()
    }

    // ── Error logging ───────────────────────────────────────────────────

    /// Record a task failure. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted first.
    pub fn push_error(&self, task: &str, message: String) {
        let record = ErrorRecord {
            message,
            task: Some(task.to_string()),
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    // ── Snapshot builders ───────────────────────────────────────────────

    /// Everything a presenter needs to paint the whole dashboard at once.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let config = self.config.read();
        let (fast_window, slow_window) = self.series.ma_windows();

        StateSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            symbol: config.symbol.clone(),
            interval: config.interval.clone(),
            ticker: *self.ticker.read(),
            candles: self.series.candles(),
            volumes: self.series.volumes(),
            ma_fast: MaLine {
                window: fast_window,
                points: self.series.ma_fast(),
            },
            ma_slow: MaLine {
                window: slow_window,
                points: self.series.ma_slow(),
            },
            order_book: self.build_depth_view(),
            trades: self.build_tape_view(),
        }
    }

    /// Order-book view: normalised ladder plus derived metrics.
    pub fn build_depth_view(&self) -> DepthView {
        let book = self.series.order_book();
        DepthView {
            last_update_id: book.last_update_id,
            mid_price: book.mid_price(),
            spread_bps: book.spread_bps(),
            imbalance: book.imbalance(),
            bids: book.bids.clone(),
            asks: book.asks.clone(),
        }
    }

    /// Trade-tape view: newest trade first for rendering, stats alongside.
    pub fn build_tape_view(&self) -> TapeView {
        let ticks = self.series.trades();
        let stats = TapeStats::from_ticks(&ticks);
        TapeView {
            ticks: ticks.iter().rev().copied().collect(),
            stats,
        }
    }

    /// Operational status: task board, error log, rate-limit usage, uptime.
    pub fn build_status(&self) -> StatusReport {
        StatusReport {
            state_version: self.current_state_version(),
            uptime_s: self.start_time.elapsed().as_secs(),
            candle_count: self.series.candle_count(),
            tasks: self.tasks.snapshot(),
            rate_limit: self.limits.snapshot(),
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}

// =============================================================================
// Serialisable view types
// =============================================================================

/// One moving-average overlay line.
#[derive(Debug, Clone, Serialize)]
pub struct MaLine {
    pub window: usize,
    pub points: Vec<MaPoint>,
}

/// Full dashboard snapshot sent on WebSocket connect and `/snapshot`.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub symbol: String,
    pub interval: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<TickerStats>,
    pub candles: Vec<Candle>,
    pub volumes: Vec<VolumeBar>,
    pub ma_fast: MaLine,
    pub ma_slow: MaLine,
    pub order_book: DepthView,
    pub trades: TapeView,
}

/// Order-book ladder with derived metrics.
#[derive(Debug, Clone, Serialize)]
pub struct DepthView {
    pub last_update_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mid_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spread_bps: Option<f64>,
    pub imbalance: f64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

/// Trade tape, newest first, with per-window aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct TapeView {
    pub ticks: Vec<TradeTick>,
    pub stats: TapeStats,
}

/// Operational status for the `/status` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state_version: u64,
    pub uptime_s: u64,
    pub candle_count: usize,
    pub tasks: std::collections::HashMap<String, TaskStatus>,
    pub rate_limit: RateLimitSnapshot,
    pub recent_errors: Vec<ErrorRecord>,
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DashboardState {
        DashboardState::new(DashboardConfig::default())
    }

    fn candle(bucket_start: i64, close: f64) -> Candle {
        Candle {
            bucket_start,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn error_ring_is_capped() {
        let state = state();
        for i in 0..60 {
            state.push_error("ticker", format!("error {i}"));
        }
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors.first().unwrap().message, "error 10");
        assert_eq!(errors.last().unwrap().message, "error 59");
    }

    #[test]
    fn notify_redraw_bumps_version_and_delivers_hint() {
        let state = state();
        let mut rx = state.subscribe_redraw();
        let before = state.current_state_version();

        state.notify_redraw(View::OrderBook);

        assert_eq!(state.current_state_version(), before + 1);
        assert_eq!(rx.try_recv().unwrap(), View::OrderBook);
    }

    #[test]
    fn notify_without_subscribers_is_harmless() {
        let state = state();
        state.notify_redraw(View::Ticker);
        state.notify_redraw(View::Candles);
        assert_eq!(state.current_state_version(), 3);
    }

    #[test]
    fn snapshot_reflects_store_contents() {
        let state = state();
        state
            .series
            .initialize((0..30).map(|i| candle(i * 300_000, 100.0 + i as f64)).collect());
        *state.ticker.write() = Some(TickerStats {
            last_price: 129.0,
            percent_change_24h: 2.5,
        });

        let snapshot = state.build_snapshot();
        assert_eq!(snapshot.symbol, "BTCUSDT");
        assert_eq!(snapshot.candles.len(), 30);
        assert_eq!(snapshot.volumes.len(), 30);
        assert_eq!(snapshot.ma_fast.window, 9);
        assert_eq!(snapshot.ma_fast.points.len(), 30 - 9 + 1);
        assert_eq!(snapshot.ma_slow.points.len(), 30 - 21 + 1);
        assert!(snapshot.ticker.unwrap().is_up());
    }

    #[test]
    fn tape_view_reverses_to_newest_first() {
        let state = state();
        state.series.replace_trades(vec![
            TradeTick {
                timestamp: 1,
                price: 100.0,
                quantity: 1.0,
                taker_is_seller: false,
            },
            TradeTick {
                timestamp: 2,
                price: 101.0,
                quantity: 1.0,
                taker_is_seller: true,
            },
        ]);

        let view = state.build_tape_view();
        assert_eq!(view.ticks[0].timestamp, 2);
        assert_eq!(view.ticks[1].timestamp, 1);
        assert_eq!(view.stats.last_price, Some(101.0));
    }
}
