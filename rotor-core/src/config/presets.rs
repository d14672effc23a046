//! Named configurations for the recurring strategy variants.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::*;

/// Named presets, each a complete and valid [`EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePreset {
    /// Staged profit-taking rotation with per-ticker cooldown after stops.
    Rotator,
    /// Rotator with a system-wide lockout after stops.
    Lockdown,
    /// Single holding, hard plus trailing ATR stops, no rotation.
    Seed,
    /// Structural-floor stop, 3-tick cadence, hysteresis shield.
    Structural,
    /// Per-ticker trailing multipliers, chop and relative-strength filters.
    PanicSwitch,
}

/// Helper: build a `BTreeMap<String, f64>` from `&[(&str, f64)]` pairs.
fn btree(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn tickers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn base_universe() -> UniverseConfig {
    UniverseConfig {
        offensive: tickers(&["SOXL", "FNGU", "DFEN", "UCO", "URNM", "SILJ", "BITU"]),
        defensive: tickers(&["SGOV", "IAU", "DBMF"]),
    }
}

fn fixed_sgov() -> SafetyConfig {
    SafetyConfig {
        mode: SafetyMode::Fixed,
        ticker: Some("SGOV".into()),
        ..SafetyConfig::default()
    }
}

fn governor(window: usize, method: GovernorMethod) -> Option<GovernorConfig> {
    Some(GovernorConfig {
        proxy: "SPY".into(),
        window,
        method,
        forces_exit: false,
    })
}

impl EnginePreset {
    pub fn name(self) -> &'static str {
        match self {
            Self::Rotator => "rotator",
            Self::Lockdown => "lockdown",
            Self::Seed => "seed",
            Self::Structural => "structural",
            Self::PanicSwitch => "panic_switch",
        }
    }

    /// Build the full configuration for this preset.
    pub fn to_config(self) -> EngineConfig {
        match self {
            Self::Rotator => EngineConfig {
                universe: base_universe(),
                momentum: MomentumConfig {
                    lookback: 40,
                    short_history: ShortHistoryPolicy::SinceInception,
                },
                regime: RegimeConfig {
                    volatility_proxy: "VXX".into(),
                    ma_window: 390,
                    trigger_factor: 1.0,
                    release_factor: None,
                    governor: governor(390, GovernorMethod::Momentum),
                },
                stops: StopConfig::default(),
                rotation: Some(RotationConfig::default()),
                lockout: LockoutConfig {
                    duration: 6,
                    scope: LockoutScope::Ticker,
                    on_regime_exit: false,
                },
                cadence: CadenceConfig::default(),
                safety: SafetyConfig::default(),
                filters: FilterConfig::default(),
            },
            Self::Lockdown => {
                let mut config = Self::Rotator.to_config();
                config.lockout = LockoutConfig {
                    duration: 78,
                    scope: LockoutScope::System,
                    on_regime_exit: false,
                };
                config
            }
            Self::Seed => EngineConfig {
                universe: base_universe(),
                momentum: MomentumConfig::default(),
                regime: RegimeConfig {
                    volatility_proxy: "VXX".into(),
                    ma_window: 390,
                    trigger_factor: 1.0,
                    release_factor: None,
                    governor: governor(156, GovernorMethod::Momentum),
                },
                stops: StopConfig {
                    hard: Some(StopMultiplier::flat(4.5)),
                    trailing: Some(StopMultiplier::flat(8.0)),
                    ..StopConfig::default()
                },
                rotation: None,
                lockout: LockoutConfig {
                    duration: 39,
                    scope: LockoutScope::System,
                    on_regime_exit: false,
                },
                cadence: CadenceConfig::default(),
                safety: fixed_sgov(),
                filters: FilterConfig::default(),
            },
            Self::Structural => EngineConfig {
                universe: base_universe(),
                momentum: MomentumConfig::default(),
                regime: RegimeConfig {
                    volatility_proxy: "VXX".into(),
                    ma_window: 390,
                    trigger_factor: 1.0,
                    release_factor: Some(0.98),
                    governor: governor(156, GovernorMethod::Momentum),
                },
                stops: StopConfig {
                    style: StopStyle::StructuralFloor { window: 9 },
                    hard: None,
                    trailing: None,
                    ..StopConfig::default()
                },
                rotation: None,
                lockout: LockoutConfig {
                    duration: 39,
                    scope: LockoutScope::System,
                    on_regime_exit: false,
                },
                cadence: CadenceConfig {
                    every_n_ticks: 3,
                    suppress_unchanged: true,
                },
                safety: fixed_sgov(),
                filters: FilterConfig::default(),
            },
            Self::PanicSwitch => EngineConfig {
                universe: UniverseConfig {
                    offensive: tickers(&["SOXL", "TECL", "FNGU", "BITX", "NVDL", "AGQ", "DFEN"]),
                    defensive: tickers(&["SGOV"]),
                },
                momentum: MomentumConfig::default(),
                regime: RegimeConfig {
                    volatility_proxy: "VXX".into(),
                    ma_window: 50,
                    trigger_factor: 1.1,
                    release_factor: None,
                    governor: governor(200, GovernorMethod::MovingAverage),
                },
                stops: StopConfig {
                    hard: None,
                    trailing: Some(StopMultiplier {
                        default: 3.0,
                        per_ticker: btree(&[
                            ("BITX", 3.5),
                            ("SOXL", 3.0),
                            ("TECL", 3.0),
                            ("FNGU", 3.0),
                            ("NVDL", 2.5),
                            ("AGQ", 2.5),
                            ("DFEN", 2.5),
                        ]),
                    }),
                    ..StopConfig::default()
                },
                rotation: None,
                lockout: LockoutConfig {
                    duration: 78,
                    scope: LockoutScope::Ticker,
                    on_regime_exit: false,
                },
                cadence: CadenceConfig::default(),
                safety: fixed_sgov(),
                filters: FilterConfig {
                    chop: Some(ChopFilterConfig {
                        period: 14,
                        min_adx: 20.0,
                    }),
                    relative_strength: Some(RelativeStrengthConfig { window: 60 }),
                },
            },
        }
    }

    /// All presets as a slice.
    pub fn all() -> &'static [EnginePreset] {
        &[
            Self::Rotator,
            Self::Lockdown,
            Self::Seed,
            Self::Structural,
            Self::PanicSwitch,
        ]
    }
}

impl fmt::Display for EnginePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EnginePreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}
