//! Bar builders shared by unit tests.

use crate::domain::Bar;
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Timestamp of tick `i`: 5-minute bars from 2025-02-13 09:30.
pub fn ts(i: usize) -> NaiveDateTime {
    let base = NaiveDate::from_ymd_opt(2025, 2, 13)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    base + Duration::minutes(5 * i as i64)
}

/// Synthetic bars from closes: open = prev close, high/low = max/min(open, close) ± 1.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(ts(i), open, open.max(close) + 1.0, open.min(close) - 1.0, close)
        })
        .collect()
}

/// Bars from explicit (open, high, low, close) tuples.
pub fn bars_from_ohlc(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar::new(ts(i), open, high, low, close))
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for numeric tests.
pub const DEFAULT_EPSILON: f64 = 1e-10;
