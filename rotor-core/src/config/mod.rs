//! Engine configuration.
//!
//! Every tunable the variant family exposes lives here, deserialized from TOML.
//! Sections other than `universe` and `regime` are optional and fall back to
//! their `Default` impls. Unknown keys are rejected so a typo never silently
//! runs the defaults.

mod presets;

pub use presets::EnginePreset;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ─── Top level ──────────────────────────────────────────────────────

/// Complete configuration for one [`crate::engine::RotationEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub universe: UniverseConfig,
    #[serde(default)]
    pub momentum: MomentumConfig,
    pub regime: RegimeConfig,
    #[serde(default)]
    pub stops: StopConfig,
    #[serde(default)]
    pub rotation: Option<RotationConfig>,
    #[serde(default)]
    pub lockout: LockoutConfig,
    #[serde(default)]
    pub cadence: CadenceConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub filters: FilterConfig,
}

/// Offensive candidates and defensive (safety) candidates.
///
/// Indicator tickers are not listed here; they come from the regime and
/// governor sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniverseConfig {
    pub offensive: Vec<String>,
    pub defensive: Vec<String>,
}

// ─── Momentum ───────────────────────────────────────────────────────

/// What to do with a ticker whose history is shorter than the lookback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortHistoryPolicy {
    /// Score as [`crate::ranking::Score::NoData`].
    #[default]
    Unscored,
    /// Score over all available bars: `last / first - 1`.
    SinceInception,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MomentumConfig {
    pub lookback: usize,
    pub short_history: ShortHistoryPolicy,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            lookback: 40,
            short_history: ShortHistoryPolicy::Unscored,
        }
    }
}

// ─── Regime ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegimeConfig {
    pub volatility_proxy: String,
    #[serde(default = "default_ma_window")]
    pub ma_window: usize,
    #[serde(default = "default_trigger_factor")]
    pub trigger_factor: f64,
    /// When set, the shield releases only below `average * release_factor`.
    #[serde(default)]
    pub release_factor: Option<f64>,
    #[serde(default)]
    pub governor: Option<GovernorConfig>,
}

fn default_ma_window() -> usize {
    390
}

fn default_trigger_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernorMethod {
    /// Negative when momentum over `window` is below zero.
    #[default]
    Momentum,
    /// Negative when price is below its simple moving average over `window`.
    MovingAverage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GovernorConfig {
    pub proxy: String,
    pub window: usize,
    #[serde(default)]
    pub method: GovernorMethod,
    /// A negative trend also liquidates open holdings, not just blocks entries.
    #[serde(default)]
    pub forces_exit: bool,
}

// ─── Stops ──────────────────────────────────────────────────────────

/// Which stop rule runs on held tickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopStyle {
    /// ATR hard stop below entry and/or ATR trailing stop below the high-water mark.
    #[default]
    HardAndTrailing,
    /// Exit when the close breaks the lowest low of the previous `window` bars.
    StructuralFloor { window: usize },
    /// Exit when the held ticker's momentum score turns negative.
    MomentumReversal,
}

/// ATR multiplier with optional per-ticker overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StopMultiplier {
    pub default: f64,
    #[serde(default)]
    pub per_ticker: BTreeMap<String, f64>,
}

impl StopMultiplier {
    pub fn flat(default: f64) -> Self {
        Self {
            default,
            per_ticker: BTreeMap::new(),
        }
    }

    pub fn for_ticker(&self, ticker: &str) -> f64 {
        self.per_ticker.get(ticker).copied().unwrap_or(self.default)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopScope {
    /// Only the primary holding is stop-checked.
    #[default]
    Primary,
    /// The rotation secondary is stop-checked too.
    AnyHeld,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StopConfig {
    pub atr_period: usize,
    /// Fraction of the current price used when ATR cannot be computed.
    pub fallback_pct: f64,
    pub style: StopStyle,
    pub hard: Option<StopMultiplier>,
    pub trailing: Option<StopMultiplier>,
    pub scope: StopScope,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            fallback_pct: 0.02,
            style: StopStyle::HardAndTrailing,
            hard: Some(StopMultiplier::flat(4.0)),
            trailing: None,
            scope: StopScope::Primary,
        }
    }
}

// ─── Rotation ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Split {
    pub primary: f64,
    pub secondary: f64,
}

impl Split {
    pub fn total(&self) -> f64 {
        self.primary + self.secondary
    }
}

/// Stage-1 trail breach handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailBreach {
    /// Shift weight from primary to secondary (stage 2).
    #[default]
    Derisk,
    /// Treat the breach as a stop and exit to safety.
    Exit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RotationConfig {
    /// Gain over entry that moves a single holding into stage 1.
    pub profit_take: f64,
    pub stage1_split: Split,
    pub stage2_split: Split,
    /// ATR multiple below the primary's peak that ends stage 1.
    pub trail_multiplier: f64,
    pub on_trail_breach: TrailBreach,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            profit_take: 0.20,
            stage1_split: Split {
                primary: 0.66,
                secondary: 0.33,
            },
            stage2_split: Split {
                primary: 0.33,
                secondary: 0.66,
            },
            trail_multiplier: 5.0,
            on_trail_breach: TrailBreach::Derisk,
        }
    }
}

// ─── Lockout / cadence ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockoutScope {
    /// The whole engine sits in safety for `duration` ticks.
    #[default]
    System,
    /// Only the stopped ticker is barred from re-entry for `duration` ticks.
    Ticker,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockoutConfig {
    /// Ticks of lockout after a stop. Zero disables it.
    pub duration: u32,
    pub scope: LockoutScope,
    /// Also lock out after a shield or governor liquidation.
    pub on_regime_exit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CadenceConfig {
    pub every_n_ticks: u32,
    /// Return `NoChange` when the rendered allocation equals the last one.
    pub suppress_unchanged: bool,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            every_n_ticks: 1,
            suppress_unchanged: false,
        }
    }
}

// ─── Safety ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyMode {
    /// Empty allocation.
    Cash,
    /// Always `safety.ticker`.
    Fixed,
    /// Top `slots` defensive tickers by momentum, equally weighted.
    #[default]
    BestOf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SafetyConfig {
    pub mode: SafetyMode,
    pub ticker: Option<String>,
    pub lookback: usize,
    pub slots: usize,
    /// Give capital left over by a split to the primary safety ticker.
    pub sweep_remainder: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            mode: SafetyMode::BestOf,
            ticker: None,
            lookback: 20,
            slots: 1,
            sweep_remainder: false,
        }
    }
}

// ─── Filters ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChopFilterConfig {
    #[serde(default = "default_adx_period")]
    pub period: usize,
    pub min_adx: f64,
}

fn default_adx_period() -> usize {
    14
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelativeStrengthConfig {
    pub window: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    pub chop: Option<ChopFilterConfig>,
    pub relative_strength: Option<RelativeStrengthConfig>,
}

// ─── Loading / validation ───────────────────────────────────────────

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Indicator tickers: the volatility proxy, then the governor proxy.
    pub fn indicator_tickers(&self) -> Vec<String> {
        let mut out = vec![self.regime.volatility_proxy.clone()];
        if let Some(gov) = &self.regime.governor {
            if gov.proxy != self.regime.volatility_proxy {
                out.push(gov.proxy.clone());
            }
        }
        out
    }

    /// The declared universe: offensive, then defensive, then indicators.
    pub fn universe(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let all = self
            .universe
            .offensive
            .iter()
            .chain(self.universe.defensive.iter())
            .cloned()
            .chain(self.indicator_tickers());
        for ticker in all {
            if !out.contains(&ticker) {
                out.push(ticker);
            }
        }
        out
    }

    /// Ticker the remainder sweep and fixed safety mode allocate to.
    pub fn safety_ticker(&self) -> Option<&str> {
        self.safety.ticker.as_deref()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_roles()?;

        if self.universe.offensive.is_empty() {
            return Err(ConfigError::invalid(
                "universe.offensive",
                "at least one offensive ticker is required",
            ));
        }
        if self.universe.defensive.is_empty() && self.safety.mode == SafetyMode::BestOf {
            return Err(ConfigError::invalid(
                "universe.defensive",
                "best_of safety needs at least one defensive ticker",
            ));
        }

        positive_window("momentum.lookback", self.momentum.lookback)?;
        positive_window("regime.ma_window", self.regime.ma_window)?;
        positive_factor("regime.trigger_factor", self.regime.trigger_factor)?;
        if let Some(release) = self.regime.release_factor {
            positive_factor("regime.release_factor", release)?;
            if release > self.regime.trigger_factor {
                return Err(ConfigError::invalid(
                    "regime.release_factor",
                    "must not exceed trigger_factor",
                ));
            }
        }
        if let Some(gov) = &self.regime.governor {
            positive_window("regime.governor.window", gov.window)?;
        }

        positive_window("stops.atr_period", self.stops.atr_period)?;
        if !(self.stops.fallback_pct > 0.0 && self.stops.fallback_pct < 1.0) {
            return Err(ConfigError::invalid(
                "stops.fallback_pct",
                "must be in (0, 1)",
            ));
        }
        if let StopStyle::StructuralFloor { window } = self.stops.style {
            positive_window("stops.style.window", window)?;
        }
        for (field, mult) in [("stops.hard", &self.stops.hard), ("stops.trailing", &self.stops.trailing)] {
            if let Some(mult) = mult {
                positive_factor(field, mult.default)?;
                for value in mult.per_ticker.values() {
                    positive_factor(field, *value)?;
                }
            }
        }

        if let Some(rotation) = &self.rotation {
            positive_factor("rotation.profit_take", rotation.profit_take)?;
            positive_factor("rotation.trail_multiplier", rotation.trail_multiplier)?;
            validate_split("rotation.stage1_split", rotation.stage1_split)?;
            validate_split("rotation.stage2_split", rotation.stage2_split)?;
        }

        if self.cadence.every_n_ticks == 0 {
            return Err(ConfigError::invalid(
                "cadence.every_n_ticks",
                "must be at least 1",
            ));
        }

        match (&self.safety.mode, &self.safety.ticker) {
            (SafetyMode::Fixed, None) => {
                return Err(ConfigError::invalid(
                    "safety.ticker",
                    "fixed safety mode needs a ticker",
                ));
            }
            (_, Some(ticker)) if !self.universe.defensive.contains(ticker) => {
                return Err(ConfigError::invalid(
                    "safety.ticker",
                    format!("'{ticker}' is not a defensive ticker"),
                ));
            }
            _ => {}
        }
        positive_window("safety.lookback", self.safety.lookback)?;
        positive_window("safety.slots", self.safety.slots)?;
        if self.safety.sweep_remainder && self.safety.mode == SafetyMode::Cash {
            return Err(ConfigError::invalid(
                "safety.sweep_remainder",
                "cash safety mode has no ticker to sweep into",
            ));
        }

        if let Some(chop) = &self.filters.chop {
            positive_window("filters.chop.period", chop.period)?;
            if !chop.min_adx.is_finite() || chop.min_adx < 0.0 {
                return Err(ConfigError::invalid(
                    "filters.chop.min_adx",
                    "must be a non-negative number",
                ));
            }
        }
        if let Some(rs) = &self.filters.relative_strength {
            positive_window("filters.relative_strength.window", rs.window)?;
            if self.regime.governor.is_none() {
                return Err(ConfigError::invalid(
                    "filters.relative_strength",
                    "needs regime.governor.proxy as the benchmark",
                ));
            }
        }

        Ok(())
    }

    fn validate_roles(&self) -> Result<(), ConfigError> {
        let indicators = self.indicator_tickers();
        for ticker in &self.universe.offensive {
            if self.universe.defensive.contains(ticker) {
                return Err(overlap(ticker, "offensive", "defensive"));
            }
            if indicators.contains(ticker) {
                return Err(overlap(ticker, "offensive", "indicator"));
            }
        }
        for ticker in &self.universe.defensive {
            if indicators.contains(ticker) {
                return Err(overlap(ticker, "defensive", "indicator"));
            }
        }
        Ok(())
    }

    /// Deterministic hash of the full configuration.
    ///
    /// Two configs with the same fingerprint produce identical decisions for
    /// identical input.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}

fn overlap(ticker: &str, first: &'static str, second: &'static str) -> ConfigError {
    ConfigError::RoleOverlap {
        ticker: ticker.to_string(),
        first,
        second,
    }
}

fn positive_window(field: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "must be at least 1"));
    }
    Ok(())
}

fn positive_factor(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::invalid(
            field,
            format!("must be a positive number, got {value}"),
        ));
    }
    Ok(())
}

fn validate_split(field: &str, split: Split) -> Result<(), ConfigError> {
    for weight in [split.primary, split.secondary] {
        if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
            return Err(ConfigError::invalid(field, "weights must be in [0, 1]"));
        }
    }
    if split.total() > 1.0 + 1e-9 {
        return Err(ConfigError::invalid(field, "weights sum above 1"));
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────
