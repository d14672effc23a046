//! Error types.
//!
//! Missing tickers, short histories and indicator failures are handled where
//! they occur (sentinel scores, ATR fallback) and never surface here. What
//! remains is bad configuration and invariant violations at the allocation
//! boundary, which are programming defects rather than market conditions.

use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("ticker '{ticker}' is declared as both {first} and {second}")]
    RoleOverlap {
        ticker: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("unknown preset '{0}' (expected one of: rotator, lockdown, seed, structural, panic_switch)")]
    UnknownPreset(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Allocation invariant violations, rejected rather than clamped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    #[error("weight for '{ticker}' is {weight}, outside [0, 1]")]
    WeightOutOfRange { ticker: String, weight: f64 },

    #[error("weights sum to {total}, above 1")]
    OverAllocated { total: f64 },

    #[error("ticker '{ticker}' is not in the declared universe")]
    UnknownTicker { ticker: String },
}

/// Errors returned by [`crate::engine::RotationEngine::run`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("allocation rejected: {0}")]
    Allocation(#[from] AllocationError),
}
