pub mod client;
pub mod rate_limit;

pub use client::MarketDataClient;
pub use rate_limit::{RateLimitSnapshot, RateLimitTracker};
