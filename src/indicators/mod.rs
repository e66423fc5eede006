// =============================================================================
// Indicators Module
// =============================================================================
//
// Pure, side-effect-free series math for the dashboard overlays. Functions
// return empty output rather than panicking on insufficient data so callers
// are forced to handle the warm-up window.

pub mod sma;

pub use sma::{compute_full, MaPoint, MaSeries};
