//! Mutable engine state carried across ticks.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::allocation::{Allocation, Target};
use crate::regime::ShieldState;
use crate::stops::HighWaterMarks;

/// Position phase. Each tick is in exactly one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Flat,
    HoldingSingle,
    HoldingStage1,
    HoldingStage2,
    LockedOut,
}

impl Phase {
    pub fn is_holding(self) -> bool {
        matches!(
            self,
            Phase::HoldingSingle | Phase::HoldingStage1 | Phase::HoldingStage2
        )
    }

    /// Rotation stage: 0 for a single holding, 1 and 2 for the split stages.
    pub fn rotation_stage(self) -> Option<u8> {
        match self {
            Phase::HoldingSingle => Some(0),
            Phase::HoldingStage1 => Some(1),
            Phase::HoldingStage2 => Some(2),
            Phase::Flat | Phase::LockedOut => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Flat => "FLAT",
            Phase::HoldingSingle => "HOLDING_SINGLE",
            Phase::HoldingStage1 => "HOLDING_STAGE1",
            Phase::HoldingStage2 => "HOLDING_STAGE2",
            Phase::LockedOut => "LOCKED_OUT",
        };
        f.write_str(name)
    }
}

/// A ticker held by the engine and the close it was entered at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub ticker: String,
    pub entry_price: f64,
}

impl Holding {
    pub fn new(ticker: impl Into<String>, entry_price: f64) -> Self {
        Self {
            ticker: ticker.into(),
            entry_price,
        }
    }

    /// Fractional gain of `price` over the entry price.
    pub fn gain(&self, price: f64) -> f64 {
        price / self.entry_price - 1.0
    }
}

/// Everything the engine remembers between ticks.
///
/// Owned by [`super::RotationEngine`] and mutated only by the state machine.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineState {
    pub phase: Phase,
    pub primary: Option<Holding>,
    /// Allocated second holding during rotation stages 1 and 2.
    pub secondary: Option<Holding>,
    /// Next-best ticker recorded at entry; not allocated.
    pub standby: Option<String>,
    pub high_water_marks: HighWaterMarks,
    pub lockout_remaining: u32,
    /// Ticker to the first tick at which it may be entered again.
    pub cooldowns: BTreeMap<String, u64>,
    pub shield: ShieldState,
    pub entries_blocked: bool,
    /// Ticks seen so far, including gated ones.
    pub tick: u64,
    pub last_target: Target,
    pub last_allocation: Option<Allocation>,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held_tickers(&self) -> Vec<&str> {
        self.primary
            .iter()
            .chain(self.secondary.iter())
            .map(|h| h.ticker.as_str())
            .collect()
    }

    pub fn in_cooldown(&self, ticker: &str) -> bool {
        self.cooldowns
            .get(ticker)
            .is_some_and(|&until| self.tick < until)
    }

    /// Drop cooldowns that have run out.
    pub fn prune_cooldowns(&mut self) {
        let tick = self.tick;
        self.cooldowns.retain(|_, until| tick < *until);
    }

    /// Forget every holding and its high-water mark.
    pub fn clear_holdings(&mut self) {
        self.primary = None;
        self.secondary = None;
        self.standby = None;
        self.high_water_marks.clear();
    }
}
