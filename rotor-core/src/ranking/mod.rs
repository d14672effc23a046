//! Momentum scoring and ranking of candidate tickers.

pub mod filters;

pub use filters::CandidateFilters;

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::config::{MomentumConfig, ShortHistoryPolicy};
use crate::data::PriceHistory;

/// Result of scoring one ticker.
///
/// Unscoreable tickers are kept in the ranking and sort after every
/// computed score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Score {
    /// Not enough history under the configured policy.
    NoData,
    Computed(f64),
    /// History exists but the ratio is undefined (non-positive or non-finite
    /// prior close).
    Invalid,
}

impl Score {
    pub fn value(self) -> Option<f64> {
        match self {
            Score::Computed(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_computed(self) -> bool {
        matches!(self, Score::Computed(_))
    }

    pub fn is_positive(self) -> bool {
        matches!(self, Score::Computed(v) if v > 0.0)
    }

    /// Ranking order: larger computed scores first, then everything else.
    pub fn rank_order(&self, other: &Score) -> Ordering {
        match (self, other) {
            (Score::Computed(a), Score::Computed(b)) => b.partial_cmp(a).unwrap_or(Ordering::Equal),
            (Score::Computed(_), _) => Ordering::Less,
            (_, Score::Computed(_)) => Ordering::Greater,
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::NoData => f.write_str("n/a"),
            Score::Computed(v) => write!(f, "{:+.4}", v),
            Score::Invalid => f.write_str("invalid"),
        }
    }
}

/// Ratio score `last / prior - 1`, `Invalid` when the prior close is unusable.
fn ratio(last: f64, prior: f64) -> Score {
    if !last.is_finite() || !prior.is_finite() || prior <= 0.0 {
        return Score::Invalid;
    }
    let value = last / prior - 1.0;
    if value.is_finite() {
        Score::Computed(value)
    } else {
        Score::Invalid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTicker {
    pub ticker: String,
    pub score: Score,
}

/// Tickers sorted by descending score. Ties keep input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ranking {
    entries: Vec<RankedTicker>,
}

impl Ranking {
    pub fn leader(&self) -> Option<&RankedTicker> {
        self.entries.first()
    }

    /// Second-ranked entry, or the leader when only one ticker was ranked.
    pub fn follower(&self) -> Option<&RankedTicker> {
        self.entries.get(1).or_else(|| self.entries.first())
    }

    pub fn nth(&self, n: usize) -> Option<&RankedTicker> {
        self.entries.get(n)
    }

    /// Highest-ranked entry whose ticker is not in `exclude`.
    pub fn best_excluding(&self, exclude: &[&str]) -> Option<&RankedTicker> {
        self.entries
            .iter()
            .find(|e| !exclude.contains(&e.ticker.as_str()))
    }

    pub fn score_of(&self, ticker: &str) -> Option<Score> {
        self.entries
            .iter()
            .find(|e| e.ticker == ticker)
            .map(|e| e.score)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RankedTicker> {
        self.entries.iter()
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.ticker.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scores tickers by simple momentum over a fixed lookback.
#[derive(Debug, Clone)]
pub struct MomentumRanker {
    lookback: usize,
    short_history: ShortHistoryPolicy,
}

impl MomentumRanker {
    pub fn new(lookback: usize, short_history: ShortHistoryPolicy) -> Self {
        assert!(lookback >= 1, "momentum lookback must be >= 1");
        Self {
            lookback,
            short_history,
        }
    }

    pub fn from_config(config: &MomentumConfig) -> Self {
        Self::new(config.lookback, config.short_history)
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// `close[n-1] / close[n-lookback] - 1` over the ticker's history.
    pub fn score<H: PriceHistory + ?Sized>(&self, view: &H, ticker: &str) -> Score {
        let bars = view.history(ticker);
        let Some(last) = bars.last() else {
            return Score::NoData;
        };
        if bars.len() >= self.lookback {
            return ratio(last.close, bars[bars.len() - self.lookback].close);
        }
        match self.short_history {
            ShortHistoryPolicy::Unscored => Score::NoData,
            ShortHistoryPolicy::SinceInception => ratio(last.close, bars[0].close),
        }
    }

    /// Score every ticker and sort descending. Never drops a ticker.
    pub fn rank<H, S>(&self, view: &H, tickers: &[S]) -> Ranking
    where
        H: PriceHistory + ?Sized,
        S: AsRef<str>,
    {
        let mut entries: Vec<RankedTicker> = tickers
            .iter()
            .map(|t| RankedTicker {
                ticker: t.as_ref().to_string(),
                score: self.score(view, t.as_ref()),
            })
            .collect();
        // sort_by is stable: equal scores stay in input order
        entries.sort_by(|a, b| a.score.rank_order(&b.score));
        Ranking { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MarketSnapshot;
    use crate::test_support::{assert_approx, bars_from_closes};

    fn snapshot(series: &[(&str, &[f64])]) -> MarketSnapshot {
        let mut snap = MarketSnapshot::new();
        for (ticker, closes) in series {
            snap.insert_history(*ticker, bars_from_closes(closes));
        }
        snap
    }

    #[test]
    fn score_over_lookback() {
        let snap = snapshot(&[("A", &[50.0, 100.0, 110.0, 120.0])]);
        let ranker = MomentumRanker::new(3, ShortHistoryPolicy::Unscored);
        // 120 / 100 - 1
        assert_approx(ranker.score(&snap, "A").value().unwrap(), 0.2, 1e-12);
    }

    #[test]
    fn lookback_one_is_flat() {
        let snap = snapshot(&[("A", &[50.0, 100.0])]);
        let ranker = MomentumRanker::new(1, ShortHistoryPolicy::Unscored);
        assert_eq!(ranker.score(&snap, "A"), Score::Computed(0.0));
    }

    #[test]
    fn short_history_policies() {
        let snap = snapshot(&[("A", &[100.0, 90.0])]);
        let strict = MomentumRanker::new(5, ShortHistoryPolicy::Unscored);
        assert_eq!(strict.score(&snap, "A"), Score::NoData);

        let lenient = MomentumRanker::new(5, ShortHistoryPolicy::SinceInception);
        assert_approx(lenient.score(&snap, "A").value().unwrap(), -0.1, 1e-12);
    }

    #[test]
    fn missing_ticker_is_no_data() {
        let snap = MarketSnapshot::new();
        let ranker = MomentumRanker::new(5, ShortHistoryPolicy::SinceInception);
        assert_eq!(ranker.score(&snap, "GHOST"), Score::NoData);
    }

    #[test]
    fn zero_prior_close_is_invalid() {
        let snap = snapshot(&[("A", &[0.0, 5.0])]);
        let ranker = MomentumRanker::new(2, ShortHistoryPolicy::Unscored);
        assert_eq!(ranker.score(&snap, "A"), Score::Invalid);
    }

    #[test]
    fn rank_descending_with_unscored_last() {
        let snap = snapshot(&[
            ("A", &[100.0, 105.0]),
            ("B", &[100.0, 120.0]),
            ("C", &[100.0]),
            ("D", &[100.0, 90.0]),
        ]);
        let ranker = MomentumRanker::new(2, ShortHistoryPolicy::Unscored);
        let ranking = ranker.rank(&snap, &["A", "B", "C", "D"]);
        assert_eq!(ranking.tickers(), vec!["B", "A", "D", "C"]);
        assert_eq!(ranking.leader().unwrap().ticker, "B");
        assert_eq!(ranking.follower().unwrap().ticker, "A");
        assert_eq!(ranking.score_of("C"), Some(Score::NoData));
        assert_eq!(ranking.len(), 4);
    }

    #[test]
    fn ties_keep_input_order() {
        let snap = snapshot(&[
            ("X", &[100.0, 110.0]),
            ("Y", &[200.0, 220.0]),
            ("Z", &[10.0, 11.0]),
        ]);
        let ranker = MomentumRanker::new(2, ShortHistoryPolicy::Unscored);
        assert_eq!(ranker.rank(&snap, &["Y", "Z", "X"]).tickers(), vec!["Y", "Z", "X"]);
        assert_eq!(ranker.rank(&snap, &["Z", "X", "Y"]).tickers(), vec!["Z", "X", "Y"]);
    }

    #[test]
    fn all_unscored_keep_input_order() {
        let snap = snapshot(&[("A", &[1.0]), ("B", &[1.0])]);
        let ranker = MomentumRanker::new(10, ShortHistoryPolicy::Unscored);
        let ranking = ranker.rank(&snap, &["B", "A", "GHOST"]);
        assert_eq!(ranking.tickers(), vec!["B", "A", "GHOST"]);
        assert!(!ranking.leader().unwrap().score.is_positive());
    }

    #[test]
    fn follower_falls_back_to_leader() {
        let snap = snapshot(&[("A", &[1.0, 2.0])]);
        let ranker = MomentumRanker::new(2, ShortHistoryPolicy::Unscored);
        let ranking = ranker.rank(&snap, &["A"]);
        assert_eq!(ranking.follower().unwrap().ticker, "A");
        assert!(ranker.rank(&snap, &[] as &[&str]).follower().is_none());
    }

    #[test]
    fn best_excluding_skips_named() {
        let snap = snapshot(&[("A", &[1.0, 3.0]), ("B", &[1.0, 2.0]), ("C", &[1.0, 1.5])]);
        let ranker = MomentumRanker::new(2, ShortHistoryPolicy::Unscored);
        let ranking = ranker.rank(&snap, &["A", "B", "C"]);
        assert_eq!(ranking.best_excluding(&["A"]).unwrap().ticker, "B");
        assert_eq!(ranking.best_excluding(&["A", "B"]).unwrap().ticker, "C");
        assert!(ranking.best_excluding(&["A", "B", "C"]).is_none());
    }

    #[test]
    fn score_display() {
        assert_eq!(Score::Computed(0.25).to_string(), "+0.2500");
        assert_eq!(Score::NoData.to_string(), "n/a");
    }
}
