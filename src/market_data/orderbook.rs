// =============================================================================
// Order Book Snapshot — ranked bid/ask ladder
// =============================================================================
//
// The dashboard consumes periodic full depth snapshots; there is no
// incremental diffing. Each snapshot is normalised on construction (bids
// descending, asks ascending, truncated to the configured depth) and then
// swapped into the store as one immutable value, so a reader can never
// observe old bids next to new asks.
// =============================================================================

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// One outstanding price level: aggregate quantity resting at `price`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
}

/// Full order-book snapshot for a single symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub last_update_id: u64,
    /// Best bid first (descending by price).
    pub bids: Vec<BookLevel>,
    /// Best ask first (ascending by price).
    pub asks: Vec<BookLevel>,
}

impl OrderBookSnapshot {
    /// Build a normalised snapshot: bids sorted descending, asks ascending,
    /// both truncated to `depth` levels.
    pub fn new(
        mut bids: Vec<BookLevel>,
        mut asks: Vec<BookLevel>,
        last_update_id: u64,
        depth: usize,
    ) -> Self {
        bids.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(Ordering::Equal));
        asks.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal));
        bids.truncate(depth);
        asks.truncate(depth);

        Self {
            last_update_id,
            bids,
            asks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// Midpoint of the best bid and ask.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    /// Bid/ask spread in basis points of the mid price.
    pub fn spread_bps(&self) -> Option<f64> {
        let (bid, ask) = (self.best_bid()?, self.best_ask()?);
        let mid = (bid + ask) / 2.0;
        if mid > 0.0 {
            Some(((ask - bid) / mid) * 10_000.0)
        } else {
            None
        }
    }

    /// Depth imbalance in [-1, +1]: positive when resting bid quantity
    /// outweighs resting ask quantity.
    pub fn imbalance(&self) -> f64 {
        let bid_depth: f64 = self.bids.iter().map(|l| l.quantity).sum();
        let ask_depth: f64 = self.asks.iter().map(|l| l.quantity).sum();
        let total = bid_depth + ask_depth;
        if total > 0.0 {
            (bid_depth - ask_depth) / total
        } else {
            0.0
        }
    }

    /// The top `n` levels of each side, best-first.
    pub fn top(&self, n: usize) -> (&[BookLevel], &[BookLevel]) {
        let bid_n = n.min(self.bids.len());
        let ask_n = n.min(self.asks.len());
        (&self.bids[..bid_n], &self.asks[..ask_n])
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn level(price: f64, quantity: f64) -> BookLevel {
        BookLevel { price, quantity }
    }

    #[test]
    fn snapshot_sorts_and_truncates() {
        // Bids arrive unsorted; the top-2 bid view must be 101 then 100, and
        // the top-2 ask view 102 then 103.
        let snapshot = OrderBookSnapshot::new(
            vec![level(100.0, 2.0), level(99.0, 5.0), level(101.0, 1.0)],
            vec![level(102.0, 3.0), level(103.0, 1.0)],
            7,
            20,
        );

        let (bids, asks) = snapshot.top(2);
        assert_eq!(bids, &[level(101.0, 1.0), level(100.0, 2.0)]);
        assert_eq!(asks, &[level(102.0, 3.0), level(103.0, 1.0)]);
    }

    #[test]
    fn depth_truncation_keeps_best_levels() {
        let bids: Vec<BookLevel> = (1..=30).map(|i| level(i as f64, 1.0)).collect();
        let snapshot = OrderBookSnapshot::new(bids, Vec::new(), 1, 10);
        assert_eq!(snapshot.bids.len(), 10);
        assert_eq!(snapshot.best_bid(), Some(30.0));
        assert_eq!(snapshot.bids.last().unwrap().price, 21.0);
    }

    #[test]
    fn derived_metrics() {
        let snapshot = OrderBookSnapshot::new(
            vec![level(99.0, 3.0)],
            vec![level(101.0, 1.0)],
            1,
            20,
        );
        assert_eq!(snapshot.mid_price(), Some(100.0));
        assert!((snapshot.spread_bps().unwrap() - 200.0).abs() < 1e-9);
        assert!((snapshot.imbalance() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn empty_snapshot_has_no_metrics() {
        let snapshot = OrderBookSnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.best_bid(), None);
        assert_eq!(snapshot.mid_price(), None);
        assert_eq!(snapshot.spread_bps(), None);
        assert_eq!(snapshot.imbalance(), 0.0);
    }
}
