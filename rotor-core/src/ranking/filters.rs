//! Candidate filters applied to the offensive universe before ranking.

use tracing::debug;

use crate::config::{FilterConfig, ShortHistoryPolicy};
use crate::data::PriceHistory;
use crate::indicators::{Adx, Indicator};

use super::{MomentumRanker, Score};

/// Excludes candidates whose ADX shows no trend.
///
/// A candidate whose ADX cannot be computed yet is kept.
#[derive(Debug, Clone)]
pub struct ChopFilter {
    adx: Adx,
    min_adx: f64,
}

impl ChopFilter {
    pub fn new(period: usize, min_adx: f64) -> Self {
        Self {
            adx: Adx::new(period),
            min_adx,
        }
    }

    pub fn admits<H: PriceHistory + ?Sized>(&self, view: &H, ticker: &str) -> bool {
        match self.adx.latest(view.history(ticker)) {
            Some(adx) => adx >= self.min_adx,
            None => true,
        }
    }
}

/// Keeps only candidates that outperform a benchmark over `window` bars.
#[derive(Debug, Clone)]
pub struct RelativeStrengthFilter {
    benchmark: String,
    ranker: MomentumRanker,
}

impl RelativeStrengthFilter {
    pub fn new(benchmark: impl Into<String>, window: usize) -> Self {
        Self {
            benchmark: benchmark.into(),
            ranker: MomentumRanker::new(window, ShortHistoryPolicy::Unscored),
        }
    }

    /// Benchmark return over the window, if it can be computed.
    pub fn benchmark_score<H: PriceHistory + ?Sized>(&self, view: &H) -> Option<f64> {
        self.ranker.score(view, &self.benchmark).value()
    }

    /// `benchmark` is the value from [`Self::benchmark_score`]; without one
    /// every candidate is admitted.
    pub fn admits<H: PriceHistory + ?Sized>(&self, view: &H, ticker: &str, benchmark: Option<f64>) -> bool {
        let Some(benchmark) = benchmark else {
            return true;
        };
        match self.ranker.score(view, ticker) {
            Score::Computed(own) => own > benchmark,
            _ => false,
        }
    }
}

/// The configured set of candidate filters.
#[derive(Debug, Clone, Default)]
pub struct CandidateFilters {
    chop: Option<ChopFilter>,
    relative_strength: Option<RelativeStrengthFilter>,
}

impl CandidateFilters {
    /// `benchmark` is the broad-market proxy used for relative strength.
    pub fn from_config(config: &FilterConfig, benchmark: Option<&str>) -> Self {
        Self {
            chop: config
                .chop
                .as_ref()
                .map(|c| ChopFilter::new(c.period, c.min_adx)),
            relative_strength: match (&config.relative_strength, benchmark) {
                (Some(rs), Some(benchmark)) => Some(RelativeStrengthFilter::new(benchmark, rs.window)),
                _ => None,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chop.is_none() && self.relative_strength.is_none()
    }

    /// Candidates passing every filter, in input order.
    pub fn apply<H: PriceHistory + ?Sized>(&self, view: &H, candidates: &[String]) -> Vec<String> {
        if self.is_empty() {
            return candidates.to_vec();
        }
        let benchmark = self
            .relative_strength
            .as_ref()
            .and_then(|rs| rs.benchmark_score(view));

        candidates
            .iter()
            .filter(|ticker| {
                if let Some(chop) = &self.chop {
                    if !chop.admits(view, ticker) {
                        debug!(ticker = %ticker, "excluded by chop filter");
                        return false;
                    }
                }
                if let Some(rs) = &self.relative_strength {
                    if !rs.admits(view, ticker, benchmark) {
                        debug!(ticker = %ticker, "excluded by relative strength");
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect()
    }
}
