// =============================================================================
// Error taxonomy for the market data pipeline
// =============================================================================
//
// Every poll task catches these at its own boundary: a failed tick is logged
// and skipped, and the next scheduled tick is the implicit retry. No error
// ever crosses into the series store or the presenter surface.
// =============================================================================

use thiserror::Error;

/// Errors produced by the market data client and the series store.
#[derive(Debug, Error)]
pub enum MarketError {
    /// Transport failure or an unreadable response body from the provider.
    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    /// The provider answered, but the payload violated the expected schema
    /// (missing field, wrong type, unparsable numeric string).
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A candle sample whose bucket time would rewind recorded history.
    /// The store rejects it and keeps the series untouched.
    #[error("out-of-order sample: bucket {incoming} is behind stored bucket {newest}")]
    OutOfOrderSample { incoming: i64, newest: i64 },
}

impl From<reqwest::Error> for MarketError {
    fn from(err: reqwest::Error) -> Self {
        Self::DataUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
