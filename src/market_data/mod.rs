pub mod orderbook;
pub mod series_store;
pub mod trade_tape;

// Re-export the core domain types for convenient access
// (e.g. `use crate::market_data::Candle`).
pub use orderbook::{BookLevel, OrderBookSnapshot};
pub use series_store::{Applied, Candle, SeriesStore, VolumeBar};
pub use trade_tape::{TapeStats, TradeTick};
