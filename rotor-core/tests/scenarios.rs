//! End-to-end engine scenarios.
//!
//! Each scenario feeds the engine a growing market snapshot one tick at a
//! time and checks the emitted decision and resulting phase.
//!
//! A. Flat, calm market, clear leader → fully invested in the leader
//! B. Hard ATR stop → safety, then lockout countdown
//! C. Volatility spike past the scaled trigger while holding → safety, flat
//! D. Profit target → staged split with the follower
//! E. Nothing scoreable → safety

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rotor_core::{
    Allocation, Bar, Decision, EngineConfig, MarketSnapshot, Phase, PriceHistory, RotationEngine,
};

// ── Helpers ──────────────────────────────────────────────────────────

const CONFIG: &str = r#"
[universe]
offensive = ["SOXL", "FNGU", "DFEN"]
defensive = ["SGOV"]

[momentum]
lookback = 5

[regime]
volatility_proxy = "VXX"
ma_window = 5
trigger_factor = 1.1

[stops]
atr_period = 3
hard = { default = 4.0 }

[lockout]
duration = 3

[safety]
mode = "fixed"
ticker = "SGOV"
"#;

fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 2, 13)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
        + Duration::minutes(5 * i as i64)
}

/// Bar with a fixed 2-point range around the close.
fn bar(i: usize, close: f64) -> Bar {
    Bar::new(ts(i), close, close + 1.0, close - 1.0, close)
}

struct Feed {
    snap: MarketSnapshot,
}

impl Feed {
    fn new() -> Self {
        Self {
            snap: MarketSnapshot::new(),
        }
    }

    fn seed(&mut self, ticker: &str, closes: &[f64]) {
        for &close in closes {
            self.push(ticker, close);
        }
    }

    fn push(&mut self, ticker: &str, close: f64) {
        let n = self.snap.length(ticker);
        self.snap.push(ticker, bar(n, close));
    }

    fn tick(&mut self, prices: &[(&str, f64)]) {
        for (ticker, close) in prices {
            self.push(ticker, *close);
        }
    }
}

fn engine(config: &str) -> RotationEngine {
    RotationEngine::new(EngineConfig::from_toml(config).unwrap()).unwrap()
}

fn allocation(decision: Decision) -> Allocation {
    match decision {
        Decision::Allocate(a) => a,
        Decision::NoChange => panic!("expected an allocation, got NoChange"),
    }
}

fn safety() -> Allocation {
    Allocation::single("SGOV")
}

/// Calm market with SOXL the clear leader at a latest close of 100.
fn calm_feed_with_leader() -> Feed {
    let mut feed = Feed::new();
    feed.seed("SOXL", &[96.0, 97.0, 98.0, 99.0, 100.0]);
    feed.seed("FNGU", &[50.0; 5]);
    feed.seed("DFEN", &[50.0, 49.0, 48.0, 47.0, 46.0]);
    feed.seed("SGOV", &[100.0; 5]);
    feed.seed("VXX", &[20.0; 5]);
    feed
}

// ── A. Entry ─────────────────────────────────────────────────────────

#[test]
fn scenario_a_enters_leader() {
    let mut feed = Feed::new();
    feed.seed("SOXL", &[100.0, 105.0, 110.0, 115.0, 120.0]);
    feed.seed("FNGU", &[100.0, 102.5, 105.0, 107.5, 110.0]);
    feed.seed("DFEN", &[100.0; 5]);
    feed.seed("SGOV", &[100.0; 5]);
    feed.seed("VXX", &[20.0, 20.0, 20.0, 20.0, 19.0]);

    let mut engine = engine(CONFIG);
    let alloc = allocation(engine.run(&feed.snap).unwrap());

    assert_eq!(alloc, Allocation::single("SOXL"));
    assert_eq!(engine.phase(), Phase::HoldingSingle);
    let primary = engine.state().primary.as_ref().unwrap();
    assert_eq!(primary.ticker, "SOXL");
    assert_eq!(primary.entry_price, 120.0);
    assert_eq!(engine.state().standby.as_deref(), Some("FNGU"));
    assert_eq!(engine.state().high_water_marks.get("SOXL"), Some(120.0));
}

// ── B. Hard stop and lockout ─────────────────────────────────────────

#[test]
fn scenario_b_hard_stop_then_lockout() {
    let mut feed = calm_feed_with_leader();
    let mut engine = engine(CONFIG);
    assert_eq!(allocation(engine.run(&feed.snap).unwrap()), Allocation::single("SOXL"));

    // Decline one point per tick: ATR stays 2, so the stop sits at 100 - 4 * 2 = 92.
    for close in [99.0, 98.0, 97.0, 96.0, 95.0, 94.0, 93.0, 92.0] {
        feed.tick(&[("SOXL", close), ("FNGU", 50.0), ("DFEN", 46.0), ("SGOV", 100.0), ("VXX", 20.0)]);
        let alloc = allocation(engine.run(&feed.snap).unwrap());
        assert_eq!(alloc, Allocation::single("SOXL"), "stopped early at {close}");
    }

    feed.tick(&[("SOXL", 91.0), ("FNGU", 50.0), ("DFEN", 46.0), ("SGOV", 100.0), ("VXX", 20.0)]);
    assert_eq!(allocation(engine.run(&feed.snap).unwrap()), safety());
    assert_eq!(engine.phase(), Phase::LockedOut);
    assert_eq!(engine.state().lockout_remaining, 3);
    assert!(engine.state().primary.is_none());

    for remaining in [2, 1, 0] {
        feed.tick(&[("SOXL", 91.0), ("FNGU", 50.0), ("DFEN", 46.0), ("SGOV", 100.0), ("VXX", 20.0)]);
        assert_eq!(allocation(engine.run(&feed.snap).unwrap()), safety());
        assert_eq!(engine.state().lockout_remaining, remaining);
    }
    assert_eq!(engine.phase(), Phase::Flat);

    // Re-entry evaluation resumes; SOXL momentum is now negative.
    feed.tick(&[("SOXL", 91.0), ("FNGU", 50.0), ("DFEN", 46.0), ("SGOV", 100.0), ("VXX", 20.0)]);
    assert_eq!(allocation(engine.run(&feed.snap).unwrap()), safety());
    assert_eq!(engine.phase(), Phase::Flat);
}

// ── C. Volatility shield ─────────────────────────────────────────────

#[test]
fn scenario_c_shield_forces_exit() {
    let mut feed = Feed::new();
    feed.seed("SOXL", &[96.0, 97.0, 98.0, 99.0, 100.0]);
    feed.seed("FNGU", &[50.0; 5]);
    feed.seed("DFEN", &[50.0, 49.0, 48.0, 47.0, 46.0]);
    feed.seed("SGOV", &[100.0; 5]);
    feed.seed("VXX", &[18.75; 5]);

    let mut engine = engine(CONFIG);
    engine.run(&feed.snap).unwrap();
    assert_eq!(engine.phase(), Phase::HoldingSingle);

    // MA over [18.75 x4, 25] is 20; 25 clears the 1.1 x 20 = 22 trigger.
    feed.tick(&[("SOXL", 101.0), ("FNGU", 50.0), ("DFEN", 46.0), ("SGOV", 100.0), ("VXX", 25.0)]);
    assert_eq!(allocation(engine.run(&feed.snap).unwrap()), safety());
    assert_eq!(engine.phase(), Phase::Flat);
    assert!(engine.state().primary.is_none());
    assert!(engine.state().high_water_marks.is_empty());
    assert!(engine.state().shield.active);

    // Still spiking: flat stays in safety.
    feed.tick(&[("SOXL", 102.0), ("FNGU", 50.0), ("DFEN", 46.0), ("SGOV", 100.0), ("VXX", 40.0)]);
    assert_eq!(allocation(engine.run(&feed.snap).unwrap()), safety());
    assert_eq!(engine.phase(), Phase::Flat);
}

#[test]
fn scenario_c_level_below_scaled_trigger_keeps_holding() {
    let mut feed = Feed::new();
    feed.seed("SOXL", &[96.0, 97.0, 98.0, 99.0, 100.0]);
    feed.seed("FNGU", &[50.0; 5]);
    feed.seed("DFEN", &[50.0, 49.0, 48.0, 47.0, 46.0]);
    feed.seed("SGOV", &[100.0; 5]);
    feed.seed("VXX", &[19.5; 5]);

    let mut engine = engine(CONFIG);
    engine.run(&feed.snap).unwrap();
    assert_eq!(engine.phase(), Phase::HoldingSingle);

    // MA over [19.5 x4, 21.5] is 19.9; 21.5 is above the MA but below 1.1 x 19.9.
    feed.tick(&[("SOXL", 101.0), ("FNGU", 50.0), ("DFEN", 46.0), ("SGOV", 100.0), ("VXX", 21.5)]);
    assert_eq!(allocation(engine.run(&feed.snap).unwrap()), Allocation::single("SOXL"));
    assert_eq!(engine.phase(), Phase::HoldingSingle);
    assert!(!engine.state().shield.active);
}

// ── D. Staged rotation ───────────────────────────────────────────────

#[test]
fn scenario_d_profit_take_splits_with_follower() {
    let config = format!("{CONFIG}\n[rotation]\nprofit_take = 0.20\n");
    let mut feed = calm_feed_with_leader();
    let mut engine = engine(&config);
    engine.run(&feed.snap).unwrap();

    // +21% over the entry of 100.
    feed.tick(&[("SOXL", 121.0), ("FNGU", 50.0), ("DFEN", 45.0), ("SGOV", 100.0), ("VXX", 20.0)]);
    let alloc = allocation(engine.run(&feed.snap).unwrap());

    assert_eq!(alloc.weight("SOXL"), 0.66);
    assert_eq!(alloc.weight("FNGU"), 0.33);
    assert_eq!(alloc.len(), 2);
    assert_eq!(engine.phase(), Phase::HoldingStage1);
    assert_eq!(engine.phase().rotation_stage(), Some(1));
    let secondary = engine.state().secondary.as_ref().unwrap();
    assert_eq!(secondary.ticker, "FNGU");
    assert_eq!(secondary.entry_price, 50.0);
}

// ── E. Nothing scoreable ─────────────────────────────────────────────

#[test]
fn scenario_e_short_histories_stay_in_safety() {
    let mut feed = Feed::new();
    feed.seed("SOXL", &[100.0, 110.0, 120.0]);
    feed.seed("FNGU", &[100.0, 105.0, 110.0]);
    feed.seed("VXX", &[20.0; 5]);

    let mut engine = engine(CONFIG);
    assert_eq!(allocation(engine.run(&feed.snap).unwrap()), safety());
    assert_eq!(engine.phase(), Phase::Flat);
}

#[test]
fn missing_proxy_is_not_defensive() {
    let mut feed = Feed::new();
    feed.seed("SOXL", &[96.0, 97.0, 98.0, 99.0, 100.0]);

    let mut engine = engine(CONFIG);
    assert_eq!(allocation(engine.run(&feed.snap).unwrap()), Allocation::single("SOXL"));
}
