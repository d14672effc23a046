//! `PriceHistory`: read-only accessor over per-ticker bar sequences.

use crate::domain::{Bar, Positions};

/// Read-only view of the bar history the harness supplied for one tick.
///
/// Implementations only provide [`PriceHistory::history`]; everything else is
/// derived. Histories are ordered oldest first. A ticker the view does not know
/// about yields an empty slice, never an error.
pub trait PriceHistory {
    /// Full bar history for `ticker`, oldest first. Empty for unknown tickers.
    fn history(&self, ticker: &str) -> &[Bar];

    /// Current holdings, when the harness reports them.
    fn positions(&self) -> Option<&Positions> {
        None
    }

    /// Number of bars available for `ticker`.
    fn length(&self, ticker: &str) -> usize {
        self.history(ticker).len()
    }

    /// The last `n` bars (or fewer if the history is shorter).
    fn window(&self, ticker: &str, n: usize) -> &[Bar] {
        let bars = self.history(ticker);
        &bars[bars.len().saturating_sub(n)..]
    }

    /// The last `n` closes (or fewer if the history is shorter), oldest first.
    fn closes(&self, ticker: &str, n: usize) -> Vec<f64> {
        self.window(ticker, n).iter().map(|b| b.close).collect()
    }

    /// Bar `back` positions before the latest one (`back = 0` is the latest bar).
    fn bar_back(&self, ticker: &str, back: usize) -> Option<&Bar> {
        let bars = self.history(ticker);
        bars.len()
            .checked_sub(back + 1)
            .and_then(|idx| bars.get(idx))
    }

    /// Bar at absolute index `index` (0 is the oldest bar).
    fn bar_at(&self, ticker: &str, index: usize) -> Option<&Bar> {
        self.history(ticker).get(index)
    }

    /// Most recent bar.
    fn latest(&self, ticker: &str) -> Option<&Bar> {
        self.history(ticker).last()
    }

    /// Most recent close.
    fn latest_close(&self, ticker: &str) -> Option<f64> {
        self.latest(ticker).map(|b| b.close)
    }
}
