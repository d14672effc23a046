//! Market regime: volatility shield and trend governor.
//!
//! The shield compares the volatility proxy's latest close with its simple
//! moving average (current bar included). With a release factor it becomes a
//! Schmitt trigger: it engages above `average * trigger_factor` and releases
//! only below `average * release_factor`.
//!
//! The governor scores a broad-market proxy. A negative trend always blocks
//! new entries; it liquidates open holdings only when `forces_exit` is set.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{GovernorConfig, GovernorMethod, RegimeConfig, ShortHistoryPolicy};
use crate::data::PriceHistory;
use crate::indicators::{Indicator, Sma};
use crate::ranking::MomentumRanker;

/// Shield latch carried between ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldState {
    pub active: bool,
}

/// Regime evaluation for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RegimeVerdict {
    pub is_defensive: bool,
    pub entries_blocked: bool,
    pub force_exit: bool,
    /// Latest volatility proxy close.
    pub proxy_level: Option<f64>,
    /// Volatility proxy moving average.
    pub proxy_average: Option<f64>,
    /// Governor trend value: momentum, or price over average minus one.
    pub trend: Option<f64>,
}

#[derive(Debug, Clone)]
struct Governor {
    proxy: String,
    method: GovernorMethod,
    forces_exit: bool,
    momentum: MomentumRanker,
    average: Sma,
}

impl Governor {
    fn new(config: &GovernorConfig, short_history: ShortHistoryPolicy) -> Self {
        Self {
            proxy: config.proxy.clone(),
            method: config.method,
            forces_exit: config.forces_exit,
            momentum: MomentumRanker::new(config.window, short_history),
            average: Sma::new(config.window),
        }
    }

    /// Trend value, `None` when the proxy history cannot be scored.
    fn trend<H: PriceHistory + ?Sized>(&self, view: &H) -> Option<f64> {
        match self.method {
            GovernorMethod::Momentum => self.momentum.score(view, &self.proxy).value(),
            GovernorMethod::MovingAverage => {
                let bars = view.history(&self.proxy);
                let average = self.average.latest(bars).filter(|a| *a > 0.0)?;
                let price = bars.last()?.close;
                Some(price / average - 1.0).filter(|v| v.is_finite())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegimeEvaluator {
    proxy: String,
    average: Sma,
    trigger_factor: f64,
    release_factor: Option<f64>,
    governor: Option<Governor>,
}

impl RegimeEvaluator {
    /// `short_history` applies to a momentum governor whose proxy history is
    /// shorter than its window.
    pub fn new(config: &RegimeConfig, short_history: ShortHistoryPolicy) -> Self {
        Self {
            proxy: config.volatility_proxy.clone(),
            average: Sma::new(config.ma_window),
            trigger_factor: config.trigger_factor,
            release_factor: config.release_factor,
            governor: config
                .governor
                .as_ref()
                .map(|g| Governor::new(g, short_history)),
        }
    }

    /// Evaluate the regime, updating the shield latch in place.
    pub fn evaluate<H: PriceHistory + ?Sized>(&self, view: &H, shield: &mut ShieldState) -> RegimeVerdict {
        let bars = view.history(&self.proxy);
        let level = bars.last().map(|b| b.close).filter(|v| v.is_finite());
        let average = self.average.latest(bars);

        let was_active = shield.active;
        match (level, average) {
            (Some(level), Some(average)) => {
                let trigger = average * self.trigger_factor;
                shield.active = match self.release_factor {
                    Some(release) if was_active => level >= average * release,
                    _ => level > trigger,
                };
            }
            // Without a reading a plain threshold reads calm; a latch holds.
            _ => {
                if self.release_factor.is_none() {
                    shield.active = false;
                }
            }
        }
        if shield.active != was_active {
            if shield.active {
                info!(proxy = %self.proxy, level = ?level, average = ?average, "volatility shield engaged");
            } else {
                info!(proxy = %self.proxy, level = ?level, average = ?average, "volatility shield released");
            }
        }

        // An unscoreable governor blocks entries but never forces an exit.
        let (trend, entries_blocked, force_exit) = match &self.governor {
            Some(gov) => {
                let trend = gov.trend(view);
                let negative = trend.is_some_and(|t| t < 0.0);
                (trend, trend.is_none() || negative, gov.forces_exit && negative)
            }
            None => (None, false, false),
        };

        RegimeVerdict {
            is_defensive: shield.active,
            entries_blocked,
            force_exit,
            proxy_level: level,
            proxy_average: average,
            trend,
        }
    }
}
