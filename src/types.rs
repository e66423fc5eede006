// =============================================================================
// Shared types used across the marketdeck dashboard core
// =============================================================================

use serde::{Deserialize, Serialize};

/// 24-hour ticker statistics for the configured instrument.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TickerStats {
    pub last_price: f64,
    pub percent_change_24h: f64,
}

impl TickerStats {
    /// Whether the price-box should render in the "up" color.
    pub fn is_up(&self) -> bool {
        self.percent_change_24h >= 0.0
    }
}

/// The independently refreshed views a presenter can redraw.
///
/// Each poll task announces the view it landed fresh data for; the WebSocket
/// feed forwards the hint so the presenter repaints only that view. `Candles`
/// covers the candle series and everything derived from it in the same store
/// mutation (volume bars and both moving-average lines).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Ticker,
    Candles,
    OrderBook,
    Trades,
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ticker => write!(f, "ticker"),
            Self::Candles => write!(f, "candles"),
            Self::OrderBook => write!(f, "order_book"),
            Self::Trades => write!(f, "trades"),
        }
    }
}

/// Bucket duration in milliseconds for a Binance kline interval string.
///
/// Returns `None` for intervals the dashboard does not support.
pub fn interval_duration_ms(interval: &str) -> Option<i64> {
    match interval {
        "1m" => Some(60_000),
        "3m" => Some(180_000),
        "5m" => Some(300_000),
        "15m" => Some(900_000),
        "30m" => Some(1_800_000),
        "1h" => Some(3_600_000),
        "4h" => Some(14_400_000),
        "1d" => Some(86_400_000),
        _ => None,
    }
}
