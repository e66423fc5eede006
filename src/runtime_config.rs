// =============================================================================
// Dashboard Configuration — JSON-backed settings with atomic save
// =============================================================================
//
// Every tunable of the dashboard core lives here: instrument, candle
// interval, history window, the two MA window lengths, book depth, tape
// length, and the five task cadences.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry serde defaults so adding new fields never breaks
// loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::interval_duration_ms;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_interval() -> String {
    "5m".to_string()
}

fn default_history_limit() -> u32 {
    200
}

fn default_ma_fast_window() -> usize {
    9
}

fn default_ma_slow_window() -> usize {
    21
}

fn default_book_depth() -> u16 {
    20
}

fn default_tape_length() -> u16 {
    30
}

fn default_ticker_poll_ms() -> u64 {
    2_000
}

fn default_book_poll_ms() -> u64 {
    3_000
}

fn default_tape_poll_ms() -> u64 {
    3_000
}

fn default_candle_poll_ms() -> u64 {
    5_000
}

fn default_resync_poll_ms() -> u64 {
    60_000
}

// =============================================================================
// DashboardConfig
// =============================================================================

/// Top-level runtime configuration for the dashboard core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    // --- Instrument & series ------------------------------------------------

    /// Instrument the dashboard tracks, e.g. "BTCUSDT".
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Candle interval, e.g. "5m".
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Number of candles fetched on a full resync and retained in memory.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    /// Fast moving-average window (candles).
    #[serde(default = "default_ma_fast_window")]
    pub ma_fast_window: usize,

    /// Slow moving-average window (candles).
    #[serde(default = "default_ma_slow_window")]
    pub ma_slow_window: usize,

    // --- Snapshot sizes -----------------------------------------------------

    /// Order-book levels requested per side.
    #[serde(default = "default_book_depth")]
    pub book_depth: u16,

    /// Trades retained on the tape.
    #[serde(default = "default_tape_length")]
    pub tape_length: u16,

    // --- Task cadences ------------------------------------------------------

    #[serde(default = "default_ticker_poll_ms")]
    pub ticker_poll_ms: u64,

    #[serde(default = "default_book_poll_ms")]
    pub book_poll_ms: u64,

    #[serde(default = "default_tape_poll_ms")]
    pub tape_poll_ms: u64,

    /// Latest-bucket (incremental) candle poll.
    #[serde(default = "default_candle_poll_ms")]
    pub candle_poll_ms: u64,

    /// Full-window resync poll.
    #[serde(default = "default_resync_poll_ms")]
    pub resync_poll_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            interval: default_interval(),
            history_limit: default_history_limit(),
            ma_fast_window: default_ma_fast_window(),
            ma_slow_window: default_ma_slow_window(),
            book_depth: default_book_depth(),
            tape_length: default_tape_length(),
            ticker_poll_ms: default_ticker_poll_ms(),
            book_poll_ms: default_book_poll_ms(),
            tape_poll_ms: default_tape_poll_ms(),
            candle_poll_ms: default_candle_poll_ms(),
            resync_poll_ms: default_resync_poll_ms(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            interval = %config.interval,
            "dashboard config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "dashboard config saved (atomic)");
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.is_empty() {
            anyhow::bail!("symbol must not be empty");
        }
        if interval_duration_ms(&self.interval).is_none() {
            anyhow::bail!("unsupported candle interval '{}'", self.interval);
        }
        if self.ma_fast_window == 0 || self.ma_slow_window == 0 {
            anyhow::bail!("moving-average windows must be at least 1");
        }
        if (self.history_limit as usize) < self.ma_slow_window {
            anyhow::bail!(
                "history_limit {} is smaller than the slow MA window {}",
                self.history_limit,
                self.ma_slow_window
            );
        }
        if self.book_depth == 0 || self.tape_length == 0 {
            anyhow::bail!("book_depth and tape_length must be at least 1");
        }
        for (name, cadence) in [
            ("ticker_poll_ms", self.ticker_poll_ms),
            ("book_poll_ms", self.book_poll_ms),
            ("tape_poll_ms", self.tape_poll_ms),
            ("candle_poll_ms", self.candle_poll_ms),
            ("resync_poll_ms", self.resync_poll_ms),
        ] {
            if cadence == 0 {
                anyhow::bail!("{name} must be greater than zero");
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.interval, "5m");
        assert_eq!(cfg.history_limit, 200);
        assert_eq!(cfg.ma_fast_window, 9);
        assert_eq!(cfg.ma_slow_window, 21);
        assert_eq!(cfg.book_depth, 20);
        assert_eq!(cfg.tape_length, 30);
        assert_eq!(cfg.ticker_poll_ms, 2_000);
        assert_eq!(cfg.book_poll_ms, 3_000);
        assert_eq!(cfg.tape_poll_ms, 3_000);
        assert_eq!(cfg.candle_poll_ms, 5_000);
        assert_eq!(cfg.resync_poll_ms, 60_000);
        cfg.validate().expect("defaults must validate");
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: DashboardConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.ma_slow_window, 21);
        assert_eq!(cfg.resync_poll_ms, 60_000);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbol": "ETHUSDT", "interval": "1m", "ma_fast_window": 7 }"#;
        let cfg: DashboardConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbol, "ETHUSDT");
        assert_eq!(cfg.interval, "1m");
        assert_eq!(cfg.ma_fast_window, 7);
        assert_eq!(cfg.ma_slow_window, 21);
        assert_eq!(cfg.book_depth, 20);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = DashboardConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: DashboardConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.symbol, cfg2.symbol);
        assert_eq!(cfg.candle_poll_ms, cfg2.candle_poll_ms);
        assert_eq!(cfg.ma_slow_window, cfg2.ma_slow_window);
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let mut cfg = DashboardConfig::default();
        cfg.interval = "7m".into();
        assert!(cfg.validate().is_err());

        let mut cfg = DashboardConfig::default();
        cfg.ma_slow_window = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = DashboardConfig::default();
        cfg.history_limit = 10; // below the slow window
        assert!(cfg.validate().is_err());

        let mut cfg = DashboardConfig::default();
        cfg.candle_poll_ms = 0;
        assert!(cfg.validate().is_err());
    }
}
