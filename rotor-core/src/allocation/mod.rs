//! Allocation targets, the planner that renders them, and the engine's
//! per-tick decision type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, SafetyMode, ShortHistoryPolicy};
use crate::data::PriceHistory;
use crate::error::AllocationError;
use crate::ranking::MomentumRanker;

/// Weight-sum tolerance for rounding in configured splits.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

// ─── Allocation ─────────────────────────────────────────────────────

/// Ticker to target weight. Tickers not present are implicitly zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Allocation {
    weights: BTreeMap<String, f64>,
}

impl Allocation {
    /// Empty allocation (all cash).
    pub fn cash() -> Self {
        Self::default()
    }

    pub fn single(ticker: impl Into<String>) -> Self {
        Self::from_pairs([(ticker.into(), 1.0)])
    }

    /// Build from pairs; repeated tickers have their weights summed.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut weights = BTreeMap::new();
        for (ticker, weight) in pairs {
            *weights.entry(ticker.into()).or_insert(0.0) += weight;
        }
        Self { weights }
    }

    pub fn weight(&self, ticker: &str) -> f64 {
        self.weights.get(ticker).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn is_cash(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(t, w)| (t.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    fn add(&mut self, ticker: &str, weight: f64) {
        *self.weights.entry(ticker.to_string()).or_insert(0.0) += weight;
    }

    /// Check weights are finite, in [0, 1], sum to at most 1, and name only
    /// tickers from `universe`.
    pub fn validate(&self, universe: &[String]) -> Result<(), AllocationError> {
        for (ticker, &weight) in &self.weights {
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(AllocationError::WeightOutOfRange {
                    ticker: ticker.clone(),
                    weight,
                });
            }
            if !universe.iter().any(|u| u == ticker) {
                return Err(AllocationError::UnknownTicker {
                    ticker: ticker.clone(),
                });
            }
        }
        let total = self.total();
        if total > 1.0 + WEIGHT_TOLERANCE {
            return Err(AllocationError::OverAllocated { total });
        }
        Ok(())
    }
}

// ─── Decision / Target ──────────────────────────────────────────────

/// What the engine tells the harness for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "weights", rename_all = "snake_case")]
pub enum Decision {
    /// Keep the current holdings.
    NoChange,
    Allocate(Allocation),
}

impl Decision {
    pub fn allocation(&self) -> Option<&Allocation> {
        match self {
            Decision::Allocate(a) => Some(a),
            Decision::NoChange => None,
        }
    }

    pub fn is_no_change(&self) -> bool {
        matches!(self, Decision::NoChange)
    }
}

/// Abstract holding the state machine asks for.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    #[default]
    Safety,
    Single {
        ticker: String,
    },
    Split {
        primary: String,
        primary_weight: f64,
        secondary: String,
        secondary_weight: f64,
    },
}

impl Target {
    pub fn single(ticker: impl Into<String>) -> Self {
        Target::Single {
            ticker: ticker.into(),
        }
    }
}

// ─── Planner ────────────────────────────────────────────────────────

/// Turns a [`Target`] into a validated [`Allocation`].
#[derive(Debug, Clone)]
pub struct AllocationPlanner {
    universe: Vec<String>,
    defensive: Vec<String>,
    mode: SafetyMode,
    fixed: Option<String>,
    slots: usize,
    sweep_remainder: bool,
    ranker: MomentumRanker,
}

impl AllocationPlanner {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            universe: config.universe(),
            defensive: config.universe.defensive.clone(),
            mode: config.safety.mode,
            fixed: config.safety_ticker().map(String::from),
            slots: config.safety.slots.max(1),
            sweep_remainder: config.safety.sweep_remainder,
            ranker: MomentumRanker::new(config.safety.lookback, ShortHistoryPolicy::Unscored),
        }
    }

    /// Safety tickers for this tick, best first.
    ///
    /// In best-of mode the defensive candidates are ranked by momentum and the
    /// top `slots` computed scores are taken; ties keep declaration order. With
    /// nothing scoreable the first defensive ticker is used.
    pub fn safety_tickers<H: PriceHistory + ?Sized>(&self, view: &H) -> Vec<String> {
        match self.mode {
            SafetyMode::Cash => Vec::new(),
            SafetyMode::Fixed => self.fixed.iter().cloned().collect(),
            SafetyMode::BestOf => {
                let ranking = self.ranker.rank(view, &self.defensive);
                let picked: Vec<String> = ranking
                    .iter()
                    .filter(|e| e.score.is_computed())
                    .take(self.slots)
                    .map(|e| e.ticker.clone())
                    .collect();
                if picked.is_empty() {
                    self.fixed
                        .iter()
                        .chain(self.defensive.first())
                        .take(1)
                        .cloned()
                        .collect()
                } else {
                    picked
                }
            }
        }
    }

    /// Render `target` and validate the result.
    pub fn render<H: PriceHistory + ?Sized>(
        &self,
        target: &Target,
        view: &H,
    ) -> Result<Allocation, AllocationError> {
        let allocation = match target {
            Target::Safety => {
                let picks = self.safety_tickers(view);
                let weight = 1.0 / picks.len().max(1) as f64;
                Allocation::from_pairs(picks.into_iter().map(|t| (t, weight)))
            }
            Target::Single { ticker } => Allocation::single(ticker.as_str()),
            Target::Split {
                primary,
                primary_weight,
                secondary,
                secondary_weight,
            } => {
                let mut allocation = Allocation::from_pairs([
                    (primary.as_str(), *primary_weight),
                    (secondary.as_str(), *secondary_weight),
                ]);
                if self.sweep_remainder {
                    let remainder = 1.0 - allocation.total();
                    if remainder > WEIGHT_TOLERANCE {
                        if let Some(safety) = self.safety_tickers(view).first() {
                            allocation.add(safety, remainder);
                        }
                    }
                }
                allocation
            }
        };
        allocation.validate(&self.universe)?;
        Ok(allocation)
    }
}
