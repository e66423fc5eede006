// =============================================================================
// Trade Tape — most recent executed trades
// =============================================================================
//
// The tape is a stateless snapshot: each poll replaces the whole window in
// exchange-native order (oldest-first as Binance returns it), never re-sorted.
// Side classification follows the taker: `taker_is_seller` trades print as
// the sell (down) side.
// =============================================================================

use serde::{Deserialize, Serialize};

/// A single executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    /// Execution time in milliseconds since epoch.
    pub timestamp: i64,
    pub price: f64,
    pub quantity: f64,
    /// True when the buyer was the maker, i.e. the aggressing side sold.
    pub taker_is_seller: bool,
}

impl TradeTick {
    /// Whether the tape renders this trade on the sell (down) side.
    pub fn is_sell(&self) -> bool {
        self.taker_is_seller
    }
}

/// Aggregates derived from one tape snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TapeStats {
    /// Quote volume (price * quantity) taken by buyers.
    pub taker_buy_volume: f64,
    /// Quote volume taken by sellers.
    pub taker_sell_volume: f64,
    /// Buy share of total taker volume; 0.5 when the tape is empty.
    pub buy_volume_ratio: f64,
    /// Price of the newest trade in the window.
    pub last_price: Option<f64>,
}

impl TapeStats {
    pub fn from_ticks(ticks: &[TradeTick]) -> Self {
        let mut buy = 0.0;
        let mut sell = 0.0;

        for tick in ticks {
            let volume = tick.price * tick.quantity;
            if tick.taker_is_seller {
                sell += volume;
            } else {
                buy += volume;
            }
        }

        let total = buy + sell;
        let buy_volume_ratio = if total > 0.0 { buy / total } else { 0.5 };

        Self {
            taker_buy_volume: buy,
            taker_sell_volume: sell,
            buy_volume_ratio,
            last_price: ticks.last().map(|t| t.price),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn tick(timestamp: i64, price: f64, quantity: f64, taker_is_seller: bool) -> TradeTick {
        TradeTick {
            timestamp,
            price,
            quantity,
            taker_is_seller,
        }
    }

    #[test]
    fn taker_side_classification() {
        // Buyer-is-maker means the taker sold: down/red on the tape.
        assert!(tick(1, 100.0, 1.0, true).is_sell());
        assert!(!tick(2, 100.0, 1.0, false).is_sell());
    }

    #[test]
    fn stats_split_by_taker_side() {
        let ticks = vec![
            tick(1, 100.0, 1.0, false), // taker buy, 100 quote
            tick(2, 100.0, 3.0, true),  // taker sell, 300 quote
        ];
        let stats = TapeStats::from_ticks(&ticks);
        assert!((stats.taker_buy_volume - 100.0).abs() < 1e-9);
        assert!((stats.taker_sell_volume - 300.0).abs() < 1e-9);
        assert!((stats.buy_volume_ratio - 0.25).abs() < 1e-9);
        assert_eq!(stats.last_price, Some(100.0));
    }

    #[test]
    fn stats_on_empty_tape() {
        let stats = TapeStats::from_ticks(&[]);
        assert_eq!(stats.taker_buy_volume, 0.0);
        assert_eq!(stats.taker_sell_volume, 0.0);
        assert!((stats.buy_volume_ratio - 0.5).abs() < 1e-9);
        assert_eq!(stats.last_price, None);
    }

    #[test]
    fn last_price_is_newest_in_native_order() {
        // Exchange-native order is oldest-first; the last element is newest.
        let ticks = vec![
            tick(1, 101.0, 1.0, false),
            tick(2, 102.0, 1.0, false),
            tick(3, 103.0, 1.0, true),
        ];
        assert_eq!(TapeStats::from_ticks(&ticks).last_price, Some(103.0));
    }
}
