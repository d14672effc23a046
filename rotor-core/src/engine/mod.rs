//! Rotation engine: one decision per tick.
//!
//! Each call to [`RotationEngine::run`] goes through:
//!
//! 1. Lockout countdown (short-circuits to safety while locked out)
//! 2. Cadence gate (skipped ticks return `NoChange`)
//! 3. Regime evaluation (shield latch and governor)
//! 4. Position management or entry, via the state machine
//! 5. Rendering the target into a validated allocation
//! 6. Repeat suppression against the last emitted allocation

pub mod machine;
pub mod state;

pub use machine::PositionStateMachine;
pub use state::{EngineState, Holding, Phase};

use tracing::debug;

use crate::allocation::{AllocationPlanner, Decision};
use crate::config::EngineConfig;
use crate::data::PriceHistory;
use crate::error::{ConfigError, EngineError};

/// Stateful engine. One instance per independent strategy run.
#[derive(Debug, Clone)]
pub struct RotationEngine {
    config: EngineConfig,
    machine: PositionStateMachine,
    planner: AllocationPlanner,
    state: EngineState,
}

impl RotationEngine {
    /// Build an engine from a configuration, validating it first.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            machine: PositionStateMachine::new(&config),
            planner: AllocationPlanner::new(&config),
            state: EngineState::new(),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Forget all state, as if freshly constructed.
    pub fn reset(&mut self) {
        self.state = EngineState::new();
    }

    /// Process one tick of market data.
    pub fn run<H: PriceHistory + ?Sized>(&mut self, view: &H) -> Result<Decision, EngineError> {
        let Some(target) = self.machine.step(&mut self.state, view) else {
            debug!(tick = self.state.tick, "off-cadence tick");
            return Ok(Decision::NoChange);
        };

        let allocation = self.planner.render(&target, view)?;
        self.state.last_target = target;

        if self.config.cadence.suppress_unchanged
            && self.state.last_allocation.as_ref() == Some(&allocation)
        {
            debug!(tick = self.state.tick, phase = %self.state.phase, "allocation unchanged");
            return Ok(Decision::NoChange);
        }
        self.state.last_allocation = Some(allocation.clone());
        Ok(Decision::Allocate(allocation))
    }
}
