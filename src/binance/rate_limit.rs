// =============================================================================
// Rate-Limit Tracker — monitors Binance API weight usage
// =============================================================================
//
// Binance allows 1200 request weight per minute and reports current usage in
// the `X-MBX-USED-WEIGHT-1M` response header of every reply. The dashboard's
// polling cadences sit far below the limit, so there is no client-side
// throttling; the tracker only observes the header so the status endpoint can
// surface usage, and warns if a misconfiguration ever drives it high.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

/// Threshold above which each update logs a warning.
const WEIGHT_WARN_THRESHOLD: u32 = 800;

/// Thread-safe weight tracker backed by an atomic counter.
pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
}

/// Immutable snapshot of the current usage (suitable for serialisation into
/// the status payload).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub used_weight_1m: u32,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
        }
    }

    /// Update the counter from the response headers of a completed request.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let Some(weight) = headers
            .get("X-MBX-USED-WEIGHT-1M")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            return;
        };

        let prev = self.used_weight_1m.swap(weight, Ordering::Relaxed);
        if weight >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = weight,
                "rate-limit weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = weight, "rate-limit weight updated");
    }

    pub fn used_weight_1m(&self) -> u32 {
        self.used_weight_1m.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            used_weight_1m: self.used_weight_1m(),
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}
