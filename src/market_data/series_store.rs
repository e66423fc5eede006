// =============================================================================
// Series Store — authoritative in-memory market state
// =============================================================================
//
// Owns the ordered candle series, the volume bars derived from it, and the
// two moving-average lines, all mutated under a single lock so a reader can
// never observe the candle series disagreeing with its derived views. The
// order book and trade tape are independent snapshots swapped atomically as
// `Arc`s.
//
// Ordering invariant: candle `bucket_start` values are strictly increasing
// and unique. A sample that would rewind history is rejected, never merged.
// =============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MarketError, Result};
use crate::indicators::{MaPoint, MaSeries};
use crate::market_data::orderbook::OrderBookSnapshot;
use crate::market_data::trade_tape::TradeTick;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// One OHLCV bucket, aligned to the configured interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket open time in milliseconds since epoch.
    pub bucket_start: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Up-buckets close at or above their open.
    pub fn direction_up(&self) -> bool {
        self.close >= self.open
    }

    fn volume_bar(&self) -> VolumeBar {
        VolumeBar {
            bucket_start: self.bucket_start,
            volume: self.volume,
            direction_up: self.direction_up(),
        }
    }
}

/// Histogram bar derived one-to-one from a candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeBar {
    pub bucket_start: i64,
    pub volume: f64,
    pub direction_up: bool,
}

/// How `apply_latest` merged a sample into the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The sample opened a new bucket and was appended.
    Appended,
    /// The sample re-quoted the in-progress bucket and replaced it in place.
    ReplacedLast,
}

// ---------------------------------------------------------------------------
// SeriesStore
// ---------------------------------------------------------------------------

/// Candle series plus derived views, guarded together.
struct SeriesInner {
    candles: Vec<Candle>,
    volumes: Vec<VolumeBar>,
    ma_fast: MaSeries,
    ma_slow: MaSeries,
}

/// Thread-safe store for everything the presenter reads.
pub struct SeriesStore {
    inner: RwLock<SeriesInner>,
    book: RwLock<Arc<OrderBookSnapshot>>,
    trades: RwLock<Arc<Vec<TradeTick>>>,
    max_candles: usize,
}

impl SeriesStore {
    /// Create an empty store with the two MA windows and a candle capacity.
    ///
    /// Capacity is clamped to at least the slower window so trimming the ring
    /// can never cut into an MA window still in use.
    pub fn new(fast_window: usize, slow_window: usize, max_candles: usize) -> Self {
        let max_candles = max_candles.max(fast_window).max(slow_window).max(1);
        Self {
            inner: RwLock::new(SeriesInner {
                candles: Vec::with_capacity(max_candles + 1),
                volumes: Vec::with_capacity(max_candles + 1),
                ma_fast: MaSeries::new(fast_window),
                ma_slow: MaSeries::new(slow_window),
            }),
            book: RwLock::new(Arc::new(OrderBookSnapshot::default())),
            trades: RwLock::new(Arc::new(Vec::new())),
            max_candles,
        }
    }

    // -------------------------------------------------------------------------
    // Candle series mutation
    // -------------------------------------------------------------------------

    /// Full replace: install a freshly fetched history window, re-derive the
    /// volume bars, and recompute both MA lines from scratch.
    ///
    /// Rows that do not strictly advance the bucket time are dropped (the
    /// provider should never send them, but the ordering invariant is
    /// enforced here, not assumed).
    pub fn initialize(&self, candles: Vec<Candle>) {
        let incoming = candles.len();
        let mut ordered: Vec<Candle> = Vec::with_capacity(incoming);
        for candle in candles {
            match ordered.last() {
                Some(last) if candle.bucket_start <= last.bucket_start => {}
                _ => ordered.push(candle),
            }
        }
        if ordered.len() < incoming {
            warn!(
                dropped = incoming - ordered.len(),
                "initialize: dropped out-of-order candle rows"
            );
        }

        if ordered.len() > self.max_candles {
            ordered.drain(..ordered.len() - self.max_candles);
        }

        let mut inner = self.inner.write();
        inner.volumes = ordered.iter().map(Candle::volume_bar).collect();
        inner.ma_fast.recompute(&ordered);
        inner.ma_slow.recompute(&ordered);
        inner.candles = ordered;
        debug!(count = inner.candles.len(), "series initialised");
    }

    /// Merge the latest polled bucket into the series.
    ///
    /// * Same bucket as the stored tail ⇒ in-place replace (live bucket
    ///   re-quote). Applying the identical sample twice is a no-op.
    /// * Strictly newer bucket ⇒ append, trimming the oldest bucket once the
    ///   capacity is exceeded.
    /// * Older bucket ⇒ `OutOfOrderSample`; the series is left untouched.
    ///
    /// Both MA lines are patched incrementally, limited to the affected tail.
    pub fn apply_latest(&self, candle: Candle) -> Result<Applied> {
        let mut guard = self.inner.write();
        let SeriesInner {
            candles,
            volumes,
            ma_fast,
            ma_slow,
        } = &mut *guard;

        match candles.last().map(|c| c.bucket_start) {
            Some(newest) if candle.bucket_start < newest => {
                Err(MarketError::OutOfOrderSample {
                    incoming: candle.bucket_start,
                    newest,
                })
            }
            Some(newest) if candle.bucket_start == newest => {
                *candles.last_mut().expect("non-empty") = candle;
                *volumes.last_mut().expect("non-empty") = candle.volume_bar();
                ma_fast.on_replace_last(candles);
                ma_slow.on_replace_last(candles);
                Ok(Applied::ReplacedLast)
            }
            _ => {
                candles.push(candle);
                volumes.push(candle.volume_bar());
                ma_fast.on_append(candles);
                ma_slow.on_append(candles);

                while candles.len() > self.max_candles {
                    candles.remove(0);
                    volumes.remove(0);
                }
                ma_fast.trim_to(candles.len());
                ma_slow.trim_to(candles.len());
                Ok(Applied::Appended)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Snapshot replacement
    // -------------------------------------------------------------------------

    /// Atomically install a fresh order-book snapshot.
    pub fn replace_order_book(&self, snapshot: OrderBookSnapshot) {
        *self.book.write() = Arc::new(snapshot);
    }

    /// Atomically install a fresh trade-tape window.
    pub fn replace_trades(&self, ticks: Vec<TradeTick>) {
        *self.trades.write() = Arc::new(ticks);
    }

    // -------------------------------------------------------------------------
    // Read accessors (presenter views)
    // -------------------------------------------------------------------------

    pub fn candles(&self) -> Vec<Candle> {
        self.inner.read().candles.clone()
    }

    pub fn volumes(&self) -> Vec<VolumeBar> {
        self.inner.read().volumes.clone()
    }

    pub fn ma_fast(&self) -> Vec<MaPoint> {
        self.inner.read().ma_fast.points().to_vec()
    }

    pub fn ma_slow(&self) -> Vec<MaPoint> {
        self.inner.read().ma_slow.points().to_vec()
    }

    /// The configured (fast, slow) MA window lengths.
    pub fn ma_windows(&self) -> (usize, usize) {
        let inner = self.inner.read();
        (inner.ma_fast.window(), inner.ma_slow.window())
    }

    pub fn order_book(&self) -> Arc<OrderBookSnapshot> {
        self.book.read().clone()
    }

    pub fn trades(&self) -> Arc<Vec<TradeTick>> {
        self.trades.read().clone()
    }

    pub fn candle_count(&self) -> usize {
        self.inner.read().candles.len()
    }

    /// Bucket time of the newest stored candle, if any.
    pub fn last_bucket(&self) -> Option<i64> {
        self.inner.read().candles.last().map(|c| c.bucket_start)
    }
}
