//! ADX - Average Directional Index (Wilder).
//!
//! +DI/-DI come from Wilder-smoothed directional movement over Wilder-smoothed
//! true range; DX = 100 * |+DI - -DI| / (+DI + -DI); ADX is Wilder-smoothed DX.
//! Lookback: 2 * period.
//!
//! The engine uses ADX as a chop filter: candidates whose trend strength is
//! below a floor are not ranked.

use super::atr::{true_range, wilder_smooth};
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: format!("adx_{period}"),
        }
    }
}

/// +DM / -DM per bar. Index 0 (no previous bar) and NaN inputs are NaN.
fn directional_movement(bars: &[Bar]) -> (Vec<f64>, Vec<f64>) {
    let mut plus = vec![f64::NAN; bars.len()];
    let mut minus = vec![f64::NAN; bars.len()];

    for (i, pair) in bars.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        if [prev.high, prev.low, cur.high, cur.low].iter().any(|v| v.is_nan()) {
            continue;
        }
        let up = cur.high - prev.high;
        let down = prev.low - cur.low;
        plus[i + 1] = if up > down && up > 0.0 { up } else { 0.0 };
        minus[i + 1] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    (plus, minus)
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        if bars.len() < 2 {
            return vec![f64::NAN; bars.len()];
        }

        let (plus_dm, minus_dm) = directional_movement(bars);
        let tr = wilder_smooth(&true_range(bars), self.period);
        let plus = wilder_smooth(&plus_dm, self.period);
        let minus = wilder_smooth(&minus_dm, self.period);

        let dx: Vec<f64> = (0..bars.len())
            .map(|i| {
                if tr[i].is_nan() || plus[i].is_nan() || minus[i].is_nan() || tr[i] == 0.0 {
                    return f64::NAN;
                }
                let plus_di = 100.0 * plus[i] / tr[i];
                let minus_di = 100.0 * minus[i] / tr[i];
                let sum = plus_di + minus_di;
                if sum == 0.0 {
                    0.0
                } else {
                    100.0 * (plus_di - minus_di).abs() / sum
                }
            })
            .collect();

        wilder_smooth(&dx, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::bars_from_ohlc;

    fn trending(n: usize, step: f64) -> Vec<Bar> {
        let data: Vec<_> = (0..n)
            .map(|i| {
                let base = 100.0 + i as f64 * step;
                (base - 1.0, base + 3.0, base - 3.0, base + 2.0)
            })
            .collect();
        bars_from_ohlc(&data)
    }

    fn sideways(n: usize) -> Vec<Bar> {
        let data: Vec<_> = (0..n)
            .map(|i| {
                let base = if i % 2 == 0 { 100.0 } else { 101.0 };
                (base, base + 2.0, base - 2.0, base)
            })
            .collect();
        bars_from_ohlc(&data)
    }

    #[test]
    fn adx_bounds() {
        let result = Adx::new(3).compute(&trending(15, 2.0));
        for (i, &v) in result.iter().enumerate() {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v), "ADX out of bounds at bar {i}: {v}");
            }
        }
    }

    #[test]
    fn strong_trend_scores_above_chop() {
        let adx = Adx::new(5);
        let trend = adx.latest(&trending(30, 5.0)).unwrap();
        let chop = adx.latest(&sideways(30)).unwrap();
        assert!(trend > 20.0, "trend ADX too low: {trend}");
        assert!(chop < trend, "chop {chop} should be below trend {trend}");
    }

    #[test]
    fn adx_lookback() {
        assert_eq!(Adx::new(14).lookback(), 28);
    }

    #[test]
    fn adx_too_few_bars() {
        let bars = bars_from_ohlc(&[(100.0, 105.0, 95.0, 102.0)]);
        assert!(Adx::new(3).compute(&bars).iter().all(|v| v.is_nan()));
        assert!(Adx::new(3).latest(&bars).is_none());
    }
}
