//! Indicators used by the engine: ATR, SMA and ADX.
//!
//! Indicators are pure functions: bar history in, numeric series out. The
//! engine mostly needs the value at the latest bar, which
//! [`Indicator::latest`] provides.

pub mod adx;
pub mod atr;
pub mod sma;

pub use adx::Adx;
pub use atr::Atr;
pub use sma::Sma;

use crate::domain::Bar;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. The first `lookback()` values are `f64::NAN` (warmup).
///
/// # Look-ahead contamination guard
/// No indicator value at bar t may depend on price data from bar t+1 or later.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;

    /// Value at the last bar, or `None` during warmup or on NaN input.
    fn latest(&self, bars: &[Bar]) -> Option<f64> {
        self.compute(bars)
            .last()
            .copied()
            .filter(|v| v.is_finite())
    }
}
