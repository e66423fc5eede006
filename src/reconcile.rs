// =============================================================================
// Reconciliation Engine — merge polled candle samples into the series
// =============================================================================
//
// Two-tier update policy:
//
//   - Short cadence: fetch only the most recent bucket and patch the series
//     tail (append or in-place replace). Cheap, keeps the chart live.
//   - Long cadence: fetch the full history window and rebuild the series from
//     scratch. Runs unconditionally so drift from missed ticks or stale
//     in-progress buckets is bounded by one resync period.
//
// A sample that would rewind history is dropped, never merged. A sample that
// skips ahead by more than one bucket means intermediate ticks were lost; the
// incremental patch is abandoned for an immediate full resync rather than
// painting a series with a hole in it.
// =============================================================================

use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};

use crate::binance::MarketDataClient;
use crate::error::{MarketError, Result};
use crate::market_data::{Applied, SeriesStore};
use crate::types::interval_duration_ms;

/// What a short-cadence tick did to the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailOutcome {
    Appended,
    ReplacedLast,
    /// The sample was stale and silently dropped.
    SkippedStale,
    /// A bucket gap was detected; a full resync ran instead of a patch.
    Resynced,
}

pub struct Reconciler {
    client: Arc<MarketDataClient>,
    store: Arc<SeriesStore>,
    interval: String,
    interval_ms: i64,
    history_limit: u32,
}

impl Reconciler {
    pub fn new(
        client: Arc<MarketDataClient>,
        store: Arc<SeriesStore>,
        interval: &str,
        history_limit: u32,
    ) -> anyhow::Result<Self> {
        let interval_ms = interval_duration_ms(interval)
            .with_context(|| format!("unsupported candle interval '{interval}'"))?;

        Ok(Self {
            client,
            store,
            interval: interval.to_string(),
            interval_ms,
            history_limit,
        })
    }

    /// Fetch the full history window and rebuild the series.
    pub async fn resync_full(&self) -> Result<usize> {
        let candles = self
            .client
            .fetch_candles(&self.interval, self.history_limit)
            .await?;
        let count = candles.len();
        self.store.initialize(candles);
        info!(count, interval = %self.interval, "full series resync applied");
        Ok(count)
    }

    /// Fetch only the latest bucket and merge it into the series tail.
    pub async fn tick_latest(&self) -> Result<TailOutcome> {
        let mut latest = self.client.fetch_candles(&self.interval, 1).await?;
        let candle = latest
            .pop()
            .ok_or_else(|| MarketError::MalformedResponse("klines response was empty".into()))?;

        if needs_resync(self.store.last_bucket(), candle.bucket_start, self.interval_ms) {
            debug!(
                incoming = candle.bucket_start,
                stored = ?self.store.last_bucket(),
                "bucket gap detected — running full resync"
            );
            self.resync_full().await?;
            return Ok(TailOutcome::Resynced);
        }

        match self.store.apply_latest(candle) {
            Ok(Applied::Appended) => Ok(TailOutcome::Appended),
            Ok(Applied::ReplacedLast) => Ok(TailOutcome::ReplacedLast),
            Err(MarketError::OutOfOrderSample { incoming, newest }) => {
                // Stale data must never rewind history; drop it quietly.
                debug!(incoming, newest, "stale candle sample dropped");
                Ok(TailOutcome::SkippedStale)
            }
            Err(e) => Err(e),
        }
    }
}

/// Whether an incremental patch would leave a hole the presenter can see.
///
/// True when the series is empty (a one-bucket patch cannot seed a chart) or
/// when the incoming bucket skips past the next expected one.
fn needs_resync(last_bucket: Option<i64>, incoming: i64, interval_ms: i64) -> bool {
    match last_bucket {
        None => true,
        Some(last) => incoming > last + interval_ms,
    }
}
