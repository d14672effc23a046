//! Owned market snapshot and point-in-time views over it.

use crate::domain::{Bar, Positions};
use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashMap};

use super::history::PriceHistory;

/// Per-ticker bar histories plus optional holdings, as handed over by a harness.
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    bars: HashMap<String, Vec<Bar>>,
    positions: Option<Positions>,
}

impl MarketSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the history of `ticker`. Bars are stably sorted by timestamp.
    pub fn insert_history(&mut self, ticker: impl Into<String>, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.timestamp);
        self.bars.insert(ticker.into(), bars);
    }

    /// Append one bar, keeping the history ordered.
    pub fn push(&mut self, ticker: &str, bar: Bar) {
        let bars = self.bars.entry(ticker.to_string()).or_default();
        let idx = bars.partition_point(|b| b.timestamp <= bar.timestamp);
        bars.insert(idx, bar);
    }

    pub fn with_positions(mut self, positions: Positions) -> Self {
        self.positions = Some(positions);
        self
    }

    pub fn set_positions(&mut self, positions: Option<Positions>) {
        self.positions = positions;
    }

    /// Tickers present in the snapshot, sorted.
    pub fn tickers(&self) -> Vec<&str> {
        let mut tickers: Vec<&str> = self.bars.keys().map(String::as_str).collect();
        tickers.sort_unstable();
        tickers
    }

    /// Union of bar timestamps across all tickers, ascending.
    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.bars
            .values()
            .flat_map(|bars| bars.iter().map(|b| b.timestamp))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Point-in-time view containing only bars at or before `as_of`.
    pub fn as_of(&self, as_of: NaiveDateTime) -> SnapshotView<'_> {
        let cutoffs = self
            .bars
            .iter()
            .map(|(ticker, bars)| {
                let end = bars.partition_point(|b| b.timestamp <= as_of);
                (ticker.as_str(), end)
            })
            .collect();
        SnapshotView {
            snapshot: self,
            cutoffs,
        }
    }
}

impl PriceHistory for MarketSnapshot {
    fn history(&self, ticker: &str) -> &[Bar] {
        self.bars.get(ticker).map(Vec::as_slice).unwrap_or(&[])
    }

    fn positions(&self) -> Option<&Positions> {
        self.positions.as_ref()
    }
}

/// Borrowed, truncated view of a [`MarketSnapshot`], used for replaying a
/// stored history one tick at a time without copying bars.
#[derive(Debug, Clone)]
pub struct SnapshotView<'a> {
    snapshot: &'a MarketSnapshot,
    cutoffs: HashMap<&'a str, usize>,
}

impl PriceHistory for SnapshotView<'_> {
    fn history(&self, ticker: &str) -> &[Bar] {
        let bars = self.snapshot.history(ticker);
        match self.cutoffs.get(ticker) {
            Some(&end) => &bars[..end],
            None => &[],
        }
    }

    fn positions(&self) -> Option<&Positions> {
        self.snapshot.positions()
    }
}
