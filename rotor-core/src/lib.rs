//! Rotor Core: regime-gated momentum rotation engine.
//!
//! Given per-ticker bar histories for one tick, the engine decides what the
//! portfolio should hold:
//! - Domain types (bars, normalized positions)
//! - Read-only price history views over a market snapshot
//! - Indicators (ATR, SMA, ADX)
//! - Momentum ranking with candidate filters
//! - Volatility stops and high-water marks
//! - Regime evaluation (volatility shield and trend governor)
//! - Position state machine with staged profit-taking rotation
//! - Allocation planning with safety selection and invariant checks
//!
//! The engine is a pure decision function over its own state: no order
//! execution, fills, or accounting.

pub mod allocation;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod ranking;
pub mod regime;
pub mod stops;

#[cfg(test)]
mod test_support;

pub use allocation::{Allocation, AllocationPlanner, Decision, Target};
pub use config::{EngineConfig, EnginePreset};
pub use data::{MarketSnapshot, PriceHistory, SnapshotView};
pub use domain::{Bar, Position, Positions};
pub use engine::{EngineState, Phase, RotationEngine};
pub use error::{AllocationError, ConfigError, EngineError};
pub use ranking::{MomentumRanker, Ranking, Score};
pub use regime::{RegimeEvaluator, RegimeVerdict, ShieldState};
pub use stops::{HighWaterMarks, VolatilityStopEngine};
