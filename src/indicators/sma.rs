// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Arithmetic mean of the last `window` closing prices, defined from the
// window-th candle onward. Two evaluation paths exist:
//
//   - `compute_full`: one pass over the whole candle series. Used at startup
//     and on every full resync.
//   - `MaSeries`: running-sum state that patches only the newest point when a
//     candle is appended or replaced in place. O(1) per tick instead of O(n).
//
// The running sum accumulates floating-point drift over long sessions; the
// periodic full recompute bounds it.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

/// One moving-average sample, aligned to the candle at the right edge of its
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaPoint {
    pub bucket_start: i64,
    pub value: f64,
}

/// Compute the full SMA series for `candles` and look-back `window`.
///
/// Returns an empty `Vec` when `window` is zero or the series is shorter than
/// `window`; otherwise the result has exactly `candles.len() - window + 1`
/// points.
pub fn compute_full(candles: &[Candle], window: usize) -> Vec<MaPoint> {
    if window == 0 || candles.len() < window {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(candles.len() - window + 1);
    let mut sum = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        sum += candle.close;
        if i >= window {
            sum -= candles[i - window].close;
        }
        if i + 1 >= window {
            out.push(MaPoint {
                bucket_start: candle.bucket_start,
                value: sum / window as f64,
            });
        }
    }

    out
}

// ---------------------------------------------------------------------------
// MaSeries -- incrementally maintained SMA line
// ---------------------------------------------------------------------------

/// A single SMA line kept in sync with the candle series it is derived from.
///
/// Invariant: after any mutation, `points().len()` equals
/// `candle_count - window + 1` (or zero below the warm-up window), and
/// `sum` holds the sum of the last `min(candle_count, window)` closes.
#[derive(Debug, Clone)]
pub struct MaSeries {
    window: usize,
    sum: f64,
    last_close: f64,
    points: Vec<MaPoint>,
}

impl MaSeries {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            sum: 0.0,
            last_close: 0.0,
            points: Vec::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn points(&self) -> &[MaPoint] {
        &self.points
    }

    /// Rebuild the whole line from scratch. Also the drift-correction path.
    pub fn recompute(&mut self, candles: &[Candle]) {
        self.points = compute_full(candles, self.window);
        let tail = candles.len().min(self.window);
        self.sum = candles[candles.len() - tail..]
            .iter()
            .map(|c| c.close)
            .sum();
        self.last_close = candles.last().map_or(0.0, |c| c.close);
    }

    /// Patch the line after a new candle was appended to `candles`.
    ///
    /// `candles` must already contain the appended candle as its last element.
    pub fn on_append(&mut self, candles: &[Candle]) {
        let Some(newest) = candles.last() else {
            return;
        };
        if self.window == 0 {
            return;
        }

        let n = candles.len();
        self.sum += newest.close;
        if n > self.window {
            self.sum -= candles[n - 1 - self.window].close;
        }
        if n >= self.window {
            self.points.push(MaPoint {
                bucket_start: newest.bucket_start,
                value: self.sum / self.window as f64,
            });
        }
        self.last_close = newest.close;
    }

    /// Patch the line after the last candle of `candles` was replaced in
    /// place (an in-progress bucket update). Only the final point moves.
    pub fn on_replace_last(&mut self, candles: &[Candle]) {
        let Some(newest) = candles.last() else {
            return;
        };
        if self.window == 0 {
            return;
        }

        self.sum += newest.close - self.last_close;
        if candles.len() >= self.window {
            if let Some(last) = self.points.last_mut() {
                last.bucket_start = newest.bucket_start;
                last.value = self.sum / self.window as f64;
            }
        }
        self.last_close = newest.close;
    }

    /// Drop points from the front so the alignment invariant holds after the
    /// candle series was trimmed to `candle_count` elements.
    ///
    /// Only valid when the trim removed candles that had already left the
    /// window (the store guarantees its capacity is at least the window).
    pub fn trim_to(&mut self, candle_count: usize) {
        let expected = (candle_count + 1).saturating_sub(self.window);
        while self.points.len() > expected {
            self.points.remove(0);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: candles with the given closes at 1-minute buckets.
    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                bucket_start: i as i64 * 60_000,
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 10.0,
            })
            .collect()
    }

    // ---- compute_full ----------------------------------------------------

    #[test]
    fn full_empty_input() {
        assert!(compute_full(&[], 5).is_empty());
    }

    #[test]
    fn full_window_zero() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0]);
        assert!(compute_full(&candles, 0).is_empty());
    }

    #[test]
    fn full_insufficient_data() {
        let candles = candles_from_closes(&[1.0, 2.0]);
        assert!(compute_full(&candles, 5).is_empty());
    }

    #[test]
    fn full_window_one_echoes_closes() {
        let candles = candles_from_closes(&[3.0, 7.0, 5.0]);
        let points = compute_full(&candles, 1);
        assert_eq!(points.len(), 3);
        assert!((points[1].value - 7.0).abs() < 1e-12);
    }

    #[test]
    fn full_twenty_two_closes_window_twenty_one() {
        // Closes 1..22 with W = 21 must produce exactly two points:
        // mean(1..21) = 11 and mean(2..22) = 12.
        let closes: Vec<f64> = (1..=22).map(|x| x as f64).collect();
        let candles = candles_from_closes(&closes);
        let points = compute_full(&candles, 21);

        assert_eq!(points.len(), 2);
        assert!((points[0].value - 11.0).abs() < 1e-9);
        assert!((points[1].value - 12.0).abs() < 1e-9);
        // Aligned to the right edge of each window.
        assert_eq!(points[0].bucket_start, candles[20].bucket_start);
        assert_eq!(points[1].bucket_start, candles[21].bucket_start);
    }

    #[test]
    fn full_length_invariant() {
        let closes: Vec<f64> = (0..50).map(|x| 100.0 + (x % 7) as f64).collect();
        let candles = candles_from_closes(&closes);
        for window in [1usize, 2, 9, 21, 50] {
            let points = compute_full(&candles, window);
            assert_eq!(points.len(), candles.len() - window + 1);
        }
    }

    // ---- MaSeries incremental maintenance --------------------------------

    #[test]
    fn incremental_append_matches_full() {
        let closes: Vec<f64> = (0..40).map(|x| 50.0 + ((x * 13) % 11) as f64).collect();
        let candles = candles_from_closes(&closes);

        for window in [2usize, 3, 9, 21] {
            let mut series = MaSeries::new(window);
            let mut grown: Vec<Candle> = Vec::new();

            for candle in &candles {
                grown.push(*candle);
                series.on_append(&grown);

                let full = compute_full(&grown, window);
                assert_eq!(series.points().len(), full.len());
                for (inc, exact) in series.points().iter().zip(full.iter()) {
                    assert_eq!(inc.bucket_start, exact.bucket_start);
                    assert!(
                        (inc.value - exact.value).abs() < 1e-9,
                        "window {window}: incremental {} vs full {}",
                        inc.value,
                        exact.value
                    );
                }
            }
        }
    }

    #[test]
    fn incremental_replace_last_matches_full() {
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let mut candles = candles_from_closes(&closes);

        let mut series = MaSeries::new(3);
        series.recompute(&candles);

        // Re-quote the in-progress bucket a few times.
        for new_close in [10.5, 9.25, 11.0] {
            let last = candles.last_mut().unwrap();
            last.close = new_close;
            last.high = last.high.max(new_close);
            series.on_replace_last(&candles);

            let full = compute_full(&candles, 3);
            assert_eq!(series.points().len(), full.len());
            let (inc, exact) = (series.points().last().unwrap(), full.last().unwrap());
            assert!((inc.value - exact.value).abs() < 1e-9);
        }
    }

    #[test]
    fn replace_last_below_window_keeps_series_empty() {
        let mut candles = candles_from_closes(&[1.0, 2.0]);
        let mut series = MaSeries::new(5);
        series.recompute(&candles);

        candles.last_mut().unwrap().close = 3.0;
        series.on_replace_last(&candles);
        assert!(series.points().is_empty());

        // Growing past the window afterwards still yields exact values.
        for close in [3.0, 4.0, 5.0] {
            let bucket = candles.last().unwrap().bucket_start + 60_000;
            candles.push(Candle {
                bucket_start: bucket,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            });
            series.on_append(&candles);
        }
        let full = compute_full(&candles, 5);
        assert_eq!(series.points().len(), full.len());
        assert!((series.points()[0].value - full[0].value).abs() < 1e-9);
    }

    #[test]
    fn trim_to_restores_alignment() {
        let closes: Vec<f64> = (1..=12).map(|x| x as f64).collect();
        let candles = candles_from_closes(&closes);
        let mut series = MaSeries::new(3);
        series.recompute(&candles);
        assert_eq!(series.points().len(), 10);

        // Store dropped the two oldest candles.
        series.trim_to(10);
        assert_eq!(series.points().len(), 8);
        // Remaining points are the newest ones, untouched.
        let full = compute_full(&candles, 3);
        assert_eq!(series.points(), &full[2..]);
    }
}
