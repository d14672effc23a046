//! Volatility stops: ATR with fallback, high-water marks, and stop rules.
//!
//! Stop prices only ever tighten as the high-water mark rises. A stop fires
//! when the close is strictly below the stop level.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::config::{StopConfig, StopMultiplier, StopStyle};
use crate::data::PriceHistory;
use crate::domain::Bar;
use crate::indicators::{Atr, Indicator};
use crate::ranking::{MomentumRanker, Score};

// ─── ATR reading ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AtrSource {
    Computed,
    /// Percentage of the current price, used when ATR is unavailable.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AtrReading {
    pub value: f64,
    pub source: AtrSource,
}

// ─── High-water marks ───────────────────────────────────────────────

/// Highest close observed per held ticker since entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HighWaterMarks {
    marks: BTreeMap<String, f64>,
}

impl HighWaterMarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the mark to `price` if higher and return the current mark.
    /// A ticker seen for the first time starts at `price`.
    pub fn update(&mut self, ticker: &str, price: f64) -> f64 {
        let mark = self.marks.entry(ticker.to_string()).or_insert(price);
        if price > *mark {
            *mark = price;
        }
        *mark
    }

    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.marks.get(ticker).copied()
    }

    pub fn remove(&mut self, ticker: &str) -> Option<f64> {
        self.marks.remove(ticker)
    }

    pub fn clear(&mut self) {
        self.marks.clear();
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

// ─── Stop prices ────────────────────────────────────────────────────

/// Fixed stop below entry: `entry - mult * atr`.
pub fn hard_stop_price(entry: f64, atr: f64, multiplier: f64) -> f64 {
    entry - multiplier * atr
}

/// Trailing stop below the high-water mark: `hwm - mult * atr`.
pub fn trailing_stop_price(high_water: f64, atr: f64, multiplier: f64) -> f64 {
    high_water - multiplier * atr
}

/// Lowest low over the `window` bars before the latest one.
///
/// Needs `window + 1` bars; the latest bar is excluded so it can break the floor.
pub fn structural_floor(bars: &[Bar], window: usize) -> Option<f64> {
    if window == 0 || bars.len() < window + 1 {
        return None;
    }
    let prior = &bars[bars.len() - 1 - window..bars.len() - 1];
    prior
        .iter()
        .map(|b| b.low)
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<f64>, low| Some(acc.map_or(low, |a| a.min(low))))
}

// ─── Stop evaluation ────────────────────────────────────────────────

/// Why a stop fired.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopTrigger {
    Hard { price: f64, stop: f64 },
    Trailing { price: f64, stop: f64 },
    StructuralFloor { price: f64, floor: f64 },
    MomentumReversal { score: f64 },
}

/// Computes ATR and evaluates the configured stop rule for a holding.
#[derive(Debug, Clone)]
pub struct VolatilityStopEngine {
    atr: Atr,
    fallback_pct: f64,
    style: StopStyle,
    hard: Option<StopMultiplier>,
    trailing: Option<StopMultiplier>,
    momentum: MomentumRanker,
}

impl VolatilityStopEngine {
    /// `momentum` scores holdings for the momentum-reversal style.
    pub fn new(config: &StopConfig, momentum: MomentumRanker) -> Self {
        Self {
            atr: Atr::new(config.atr_period),
            fallback_pct: config.fallback_pct,
            style: config.style,
            hard: config.hard.clone(),
            trailing: config.trailing.clone(),
            momentum,
        }
    }

    /// Simple-average ATR at the latest bar, or `fallback_pct` of the latest
    /// close when there are fewer than `period + 1` bars or the value is not
    /// a positive number.
    pub fn atr<H: PriceHistory + ?Sized>(&self, view: &H, ticker: &str) -> AtrReading {
        let bars = view.history(ticker);
        if let Some(value) = self.atr.latest(bars).filter(|v| *v > 0.0) {
            return AtrReading {
                value,
                source: AtrSource::Computed,
            };
        }
        let price = bars.last().map(|b| b.close).filter(|p| p.is_finite()).unwrap_or(0.0);
        let value = price * self.fallback_pct;
        warn!(
            ticker = %ticker,
            bars = bars.len(),
            fallback = value,
            "ATR unavailable, using fallback"
        );
        AtrReading {
            value,
            source: AtrSource::Fallback,
        }
    }

    /// Evaluate the stop for a holding with entry `entry` and peak `high_water`.
    ///
    /// Returns `None` when no stop fires or the ticker has no price.
    pub fn check<H: PriceHistory + ?Sized>(
        &self,
        view: &H,
        ticker: &str,
        entry: f64,
        high_water: f64,
    ) -> Option<StopTrigger> {
        let price = view.latest_close(ticker)?;

        match self.style {
            StopStyle::HardAndTrailing => {
                if self.hard.is_none() && self.trailing.is_none() {
                    return None;
                }
                let atr = self.atr(view, ticker).value;
                if let Some(mult) = &self.hard {
                    let stop = hard_stop_price(entry, atr, mult.for_ticker(ticker));
                    if price < stop {
                        return Some(StopTrigger::Hard { price, stop });
                    }
                }
                if let Some(mult) = &self.trailing {
                    let stop = trailing_stop_price(high_water, atr, mult.for_ticker(ticker));
                    if price < stop {
                        return Some(StopTrigger::Trailing { price, stop });
                    }
                }
                None
            }
            StopStyle::StructuralFloor { window } => {
                let floor = structural_floor(view.history(ticker), window)?;
                (price < floor).then_some(StopTrigger::StructuralFloor { price, floor })
            }
            StopStyle::MomentumReversal => match self.momentum.score(view, ticker) {
                Score::Computed(score) if score < 0.0 => Some(StopTrigger::MomentumReversal { score }),
                _ => None,
            },
        }
    }
}
