//! Position state machine: one transition per tick.
//!
//! ```text
//!            entry                 gain >= profit_take         trail breach
//!   FLAT ───────────► SINGLE ─────────────────────► STAGE1 ─────────────► STAGE2
//!    ▲                  ▲                                                   │
//!    │                  └──────────── full rotation (price <= entry) ───────┘
//!    │
//!    └──── lockout expires ──── LOCKED_OUT ◄──── stop (system lockout)
//! ```
//!
//! Shield and governor exits, and any stop without a system lockout, go
//! straight back to FLAT.

use tracing::{debug, info};

use crate::allocation::Target;
use crate::config::{
    EngineConfig, LockoutConfig, LockoutScope, RotationConfig, Split, StopScope, TrailBreach,
};
use crate::data::PriceHistory;
use crate::ranking::{CandidateFilters, MomentumRanker, Ranking};
use crate::regime::RegimeEvaluator;
use crate::stops::{StopTrigger, VolatilityStopEngine};

use super::state::{EngineState, Holding, Phase};

#[derive(Debug, Clone)]
enum ExitReason {
    Stop { ticker: String, trigger: StopTrigger },
    Shield,
    Governor,
}

/// Owns the per-tick decision logic. State lives in [`EngineState`].
#[derive(Debug, Clone)]
pub struct PositionStateMachine {
    offensive: Vec<String>,
    ranker: MomentumRanker,
    filters: CandidateFilters,
    stops: VolatilityStopEngine,
    regime: RegimeEvaluator,
    rotation: Option<RotationConfig>,
    lockout: LockoutConfig,
    stop_scope: StopScope,
    every_n_ticks: u64,
}

impl PositionStateMachine {
    pub fn new(config: &EngineConfig) -> Self {
        let ranker = MomentumRanker::from_config(&config.momentum);
        let benchmark = config.regime.governor.as_ref().map(|g| g.proxy.as_str());
        Self {
            offensive: config.universe.offensive.clone(),
            filters: CandidateFilters::from_config(&config.filters, benchmark),
            stops: VolatilityStopEngine::new(&config.stops, ranker.clone()),
            regime: RegimeEvaluator::new(&config.regime, config.momentum.short_history),
            rotation: config.rotation.clone(),
            lockout: config.lockout.clone(),
            stop_scope: config.stops.scope,
            every_n_ticks: u64::from(config.cadence.every_n_ticks.max(1)),
            ranker,
        }
    }

    /// Advance one tick. `None` means the tick was skipped by the cadence gate.
    pub fn step<H: PriceHistory + ?Sized>(&self, state: &mut EngineState, view: &H) -> Option<Target> {
        state.tick += 1;

        if state.phase == Phase::LockedOut {
            state.lockout_remaining = state.lockout_remaining.saturating_sub(1);
            if state.lockout_remaining == 0 {
                state.phase = Phase::Flat;
                info!(tick = state.tick, "lockout expired");
            } else {
                debug!(remaining = state.lockout_remaining, "locked out");
            }
            return Some(Target::Safety);
        }

        if state.tick % self.every_n_ticks != 0 {
            return None;
        }

        let verdict = self.regime.evaluate(view, &mut state.shield);
        if verdict.entries_blocked != state.entries_blocked {
            state.entries_blocked = verdict.entries_blocked;
            if verdict.entries_blocked {
                info!(trend = ?verdict.trend, "governor blocking entries");
            } else {
                info!(trend = ?verdict.trend, "governor cleared");
            }
        }
        state.prune_cooldowns();

        let target = if state.phase.is_holding() {
            if verdict.is_defensive {
                self.exit(state, ExitReason::Shield)
            } else if verdict.force_exit {
                self.exit(state, ExitReason::Governor)
            } else {
                self.manage(state, view)
            }
        } else if verdict.is_defensive || verdict.entries_blocked {
            debug!(
                defensive = verdict.is_defensive,
                blocked = verdict.entries_blocked,
                "flat, staying in safety"
            );
            Target::Safety
        } else {
            self.try_enter(state, view)
        };
        Some(target)
    }

    fn rank_candidates<H: PriceHistory + ?Sized>(&self, view: &H) -> Ranking {
        let candidates = self.filters.apply(view, &self.offensive);
        let ranking = self.ranker.rank(view, &candidates);
        if tracing::enabled!(tracing::Level::DEBUG) {
            let table: Vec<String> = ranking
                .iter()
                .map(|e| format!("{}={}", e.ticker, e.score))
                .collect();
            debug!(scores = ?table, "ranked candidates");
        }
        ranking
    }

    fn try_enter<H: PriceHistory + ?Sized>(&self, state: &mut EngineState, view: &H) -> Target {
        let ranking = self.rank_candidates(view);
        let Some(leader) = ranking.leader() else {
            return Target::Safety;
        };
        if !leader.score.is_positive() {
            debug!(ticker = %leader.ticker, score = %leader.score, "leader not positive");
            return Target::Safety;
        }
        if state.in_cooldown(&leader.ticker) {
            debug!(ticker = %leader.ticker, "leader in cooldown");
            return Target::Safety;
        }
        let Some(price) = view.latest_close(&leader.ticker) else {
            return Target::Safety;
        };

        state.clear_holdings();
        state.high_water_marks.update(&leader.ticker, price);
        state.primary = Some(Holding::new(leader.ticker.clone(), price));
        state.standby = ranking
            .follower()
            .filter(|f| f.ticker != leader.ticker)
            .map(|f| f.ticker.clone());
        state.phase = Phase::HoldingSingle;
        info!(
            ticker = %leader.ticker,
            price,
            score = %leader.score,
            standby = ?state.standby,
            "entry"
        );
        Target::single(leader.ticker.clone())
    }

    /// Stop check honoring reported holdings: a ticker the harness reports
    /// with zero quantity is not stop-checked.
    fn check_stop<H: PriceHistory + ?Sized>(&self, view: &H, holding: &Holding, peak: f64) -> Option<StopTrigger> {
        if let Some(positions) = view.positions() {
            if !positions.is_held(&holding.ticker) {
                debug!(ticker = %holding.ticker, "not reported as held, skipping stop");
                return None;
            }
        }
        self.stops
            .check(view, &holding.ticker, holding.entry_price, peak)
    }

    fn manage<H: PriceHistory + ?Sized>(&self, state: &mut EngineState, view: &H) -> Target {
        let Some(primary) = state.primary.clone() else {
            state.phase = Phase::Flat;
            return Target::Safety;
        };
        let Some(price) = view.latest_close(&primary.ticker) else {
            debug!(ticker = %primary.ticker, "no price for primary, holding");
            return state.last_target.clone();
        };
        let peak = state.high_water_marks.update(&primary.ticker, price);

        if let Some(trigger) = self.check_stop(view, &primary, peak) {
            return self.exit(
                state,
                ExitReason::Stop {
                    ticker: primary.ticker,
                    trigger,
                },
            );
        }
        if let Some(secondary) = state.secondary.clone() {
            if let Some(sec_price) = view.latest_close(&secondary.ticker) {
                let sec_peak = state.high_water_marks.update(&secondary.ticker, sec_price);
                if self.stop_scope == StopScope::AnyHeld {
                    if let Some(trigger) = self.check_stop(view, &secondary, sec_peak) {
                        return self.exit(
                            state,
                            ExitReason::Stop {
                                ticker: secondary.ticker,
                                trigger,
                            },
                        );
                    }
                }
            }
        }

        let Some(rotation) = &self.rotation else {
            return Target::single(primary.ticker);
        };

        match state.phase {
            Phase::HoldingSingle => {
                let gain = primary.gain(price);
                if gain < rotation.profit_take {
                    return Target::single(primary.ticker);
                }
                let ranking = self.rank_candidates(view);
                let pick = ranking
                    .best_excluding(&[primary.ticker.as_str()])
                    .and_then(|e| {
                        view.latest_close(&e.ticker)
                            .map(|p| Holding::new(e.ticker.clone(), p))
                    });
                let Some(secondary) = pick else {
                    debug!(ticker = %primary.ticker, "profit target hit but no secondary available");
                    return Target::single(primary.ticker);
                };
                state.high_water_marks.update(&secondary.ticker, secondary.entry_price);
                info!(
                    primary = %primary.ticker,
                    secondary = %secondary.ticker,
                    gain,
                    "profit take, rotation stage 1"
                );
                state.secondary = Some(secondary);
                state.phase = Phase::HoldingStage1;
                split_target(state, rotation.stage1_split)
            }
            Phase::HoldingStage1 => {
                let atr = self.stops.atr(view, &primary.ticker).value;
                let trail = peak - rotation.trail_multiplier * atr;
                if price > trail {
                    return split_target(state, rotation.stage1_split);
                }
                match rotation.on_trail_breach {
                    TrailBreach::Derisk => {
                        info!(
                            ticker = %primary.ticker,
                            price,
                            peak,
                            trail,
                            "trail breached, rotation stage 2"
                        );
                        state.phase = Phase::HoldingStage2;
                        split_target(state, rotation.stage2_split)
                    }
                    TrailBreach::Exit => self.exit(
                        state,
                        ExitReason::Stop {
                            ticker: primary.ticker,
                            trigger: StopTrigger::Trailing { price, stop: trail },
                        },
                    ),
                }
            }
            Phase::HoldingStage2 => {
                if price > primary.entry_price {
                    return split_target(state, rotation.stage2_split);
                }
                self.full_rotation(state, view, &primary, rotation.stage2_split)
            }
            Phase::Flat | Phase::LockedOut => Target::single(primary.ticker),
        }
    }

    /// Secondary becomes the sole primary; a fresh third-ranked ticker is
    /// recorded as standby.
    fn full_rotation<H: PriceHistory + ?Sized>(
        &self,
        state: &mut EngineState,
        view: &H,
        old: &Holding,
        stage2: Split,
    ) -> Target {
        let Some(secondary) = state.secondary.clone() else {
            state.phase = Phase::HoldingSingle;
            return Target::single(old.ticker.clone());
        };
        let Some(price) = view.latest_close(&secondary.ticker) else {
            return split_target(state, stage2);
        };

        // Standby is never the new primary or the holding that just failed.
        let ranking = self.rank_candidates(view);
        let exclude = [secondary.ticker.as_str(), old.ticker.as_str()];
        let standby = ranking
            .nth(2)
            .filter(|e| !exclude.contains(&e.ticker.as_str()))
            .or_else(|| ranking.best_excluding(&exclude))
            .map(|e| e.ticker.clone());

        state.clear_holdings();
        state.high_water_marks.update(&secondary.ticker, price);
        state.primary = Some(Holding::new(secondary.ticker.clone(), price));
        state.standby = standby;
        state.phase = Phase::HoldingSingle;
        info!(
            from = %old.ticker,
            to = %secondary.ticker,
            price,
            standby = ?state.standby,
            "full rotation"
        );
        Target::single(secondary.ticker)
    }

    fn exit(&self, state: &mut EngineState, reason: ExitReason) -> Target {
        let held: Vec<String> = state.held_tickers().into_iter().map(String::from).collect();
        state.clear_holdings();
        state.phase = Phase::Flat;

        let penalize = match &reason {
            ExitReason::Stop { ticker, trigger } => {
                info!(ticker = %ticker, trigger = ?trigger, "stop exit");
                true
            }
            ExitReason::Shield => {
                info!(held = ?held, "volatility shield exit");
                self.lockout.on_regime_exit
            }
            ExitReason::Governor => {
                info!(held = ?held, "governor exit");
                self.lockout.on_regime_exit
            }
        };
        if !penalize || self.lockout.duration == 0 {
            return Target::Safety;
        }

        match self.lockout.scope {
            LockoutScope::System => {
                state.phase = Phase::LockedOut;
                state.lockout_remaining = self.lockout.duration;
                info!(ticks = self.lockout.duration, "lockout started");
            }
            LockoutScope::Ticker => {
                // blocked for `duration` ticks after this one
                let until = state.tick + u64::from(self.lockout.duration) + 1;
                let barred = match reason {
                    ExitReason::Stop { ticker, .. } => vec![ticker],
                    ExitReason::Shield | ExitReason::Governor => held,
                };
                for ticker in barred {
                    info!(ticker = %ticker, ticks = self.lockout.duration, "cooldown started");
                    state.cooldowns.insert(ticker, until);
                }
            }
        }
        Target::Safety
    }
}

fn split_target(state: &EngineState, split: Split) -> Target {
    match (&state.primary, &state.secondary) {
        (Some(primary), Some(secondary)) => Target::Split {
            primary: primary.ticker.clone(),
            primary_weight: split.primary,
            secondary: secondary.ticker.clone(),
            secondary_weight: split.secondary,
        },
        (Some(primary), None) => Target::single(primary.ticker.clone()),
        _ => Target::Safety,
    }
}
