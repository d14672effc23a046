//! Tick-by-tick decision replay over a stored snapshot.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use rotor_core::{Decision, EngineConfig, MarketSnapshot, Phase, RotationEngine};
use serde::Serialize;
use std::io::Write;
use tracing::info;

/// One engine configuration to replay, labelled for the output stream.
#[derive(Debug, Clone)]
pub struct Variant {
    pub name: String,
    pub config: EngineConfig,
}

/// One JSON line of replay output.
#[derive(Debug, Clone, Serialize)]
pub struct TickRecord {
    pub variant: String,
    pub tick: u64,
    pub timestamp: NaiveDateTime,
    pub phase: Phase,
    pub decision: Decision,
}

/// Feed the engine the growing history one timestamp at a time.
pub fn replay(variant: &Variant, snapshot: &MarketSnapshot) -> Result<Vec<TickRecord>> {
    let mut engine = RotationEngine::new(variant.config.clone())
        .with_context(|| format!("invalid config for '{}'", variant.name))?;

    let timestamps = snapshot.timestamps();
    let mut records = Vec::with_capacity(timestamps.len());
    for timestamp in timestamps {
        let view = snapshot.as_of(timestamp);
        let decision = engine
            .run(&view)
            .with_context(|| format!("'{}' failed at {timestamp}", variant.name))?;
        records.push(TickRecord {
            variant: variant.name.clone(),
            tick: engine.state().tick,
            timestamp,
            phase: engine.phase(),
            decision,
        });
    }

    let changes = records.iter().filter(|r| !r.decision.is_no_change()).count();
    info!(
        variant = %variant.name,
        ticks = records.len(),
        changes,
        fingerprint = %variant.config.fingerprint(),
        "replay complete"
    );
    Ok(records)
}

/// Replay every variant in parallel. Output order follows input order.
pub fn replay_all(variants: &[Variant], snapshot: &MarketSnapshot) -> Result<Vec<TickRecord>> {
    let per_variant: Vec<Vec<TickRecord>> = variants
        .par_iter()
        .map(|v| replay(v, snapshot))
        .collect::<Result<_>>()?;
    Ok(per_variant.into_iter().flatten().collect())
}

/// Write records as JSON lines.
pub fn write_jsonl<W: Write>(records: &[TickRecord], mut out: W) -> Result<()> {
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bars::read_bars;
    use rotor_core::EnginePreset;

    const CONFIG: &str = r#"
[universe]
offensive = ["SOXL", "FNGU"]
defensive = ["SGOV"]

[momentum]
lookback = 2

[regime]
volatility_proxy = "VXX"
ma_window = 3

[safety]
mode = "fixed"
ticker = "SGOV"
"#;

    fn bars_csv() -> String {
        let mut csv = String::from("timestamp,ticker,open,high,low,close\n");
        let soxl = [100.0, 102.0, 104.0, 106.0];
        let fngu = [50.0, 50.0, 50.0, 50.0];
        for (i, (s, f)) in soxl.iter().zip(&fngu).enumerate() {
            let ts = format!("2025-02-13 09:{:02}:00", 30 + 5 * i);
            csv.push_str(&format!("{ts},SOXL,{s},{},{},{s}\n", s + 1.0, s - 1.0));
            csv.push_str(&format!("{ts},FNGU,{f},{},{},{f}\n", f + 1.0, f - 1.0));
            csv.push_str(&format!("{ts},SGOV,100,100.1,99.9,100\n"));
            csv.push_str(&format!("{ts},VXX,20,20.5,19.5,20\n"));
        }
        csv
    }

    fn variant(name: &str, config: EngineConfig) -> Variant {
        Variant {
            name: name.into(),
            config,
        }
    }

    #[test]
    fn one_record_per_timestamp() {
        let snap = read_bars(bars_csv().as_bytes()).unwrap();
        let v = variant("test", EngineConfig::from_toml(CONFIG).unwrap());
        let records = replay(&v, &snap).unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(records.iter().map(|r| r.tick).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        // Lookback 2 needs two bars before SOXL scores.
        assert_eq!(records[0].phase, Phase::Flat);
        assert_eq!(records[1].phase, Phase::HoldingSingle);
        assert_eq!(records[3].phase, Phase::HoldingSingle);
    }

    #[test]
    fn replay_all_keeps_variant_order() {
        let snap = read_bars(bars_csv().as_bytes()).unwrap();
        let variants = vec![
            variant("a", EngineConfig::from_toml(CONFIG).unwrap()),
            variant("rotator", EnginePreset::Rotator.to_config()),
            variant("b", EngineConfig::from_toml(CONFIG).unwrap()),
        ];
        let records = replay_all(&variants, &snap).unwrap();
        assert_eq!(records.len(), 12);
        assert_eq!(records[0].variant, "a");
        assert_eq!(records[4].variant, "rotator");
        assert_eq!(records[8].variant, "b");
    }

    #[test]
    fn invalid_config_is_reported() {
        let snap = MarketSnapshot::new();
        let mut config = EngineConfig::from_toml(CONFIG).unwrap();
        config.momentum.lookback = 0;
        assert!(replay(&variant("bad", config), &snap).is_err());
    }

    #[test]
    fn jsonl_output_shape() {
        let snap = read_bars(bars_csv().as_bytes()).unwrap();
        let v = variant("test", EngineConfig::from_toml(CONFIG).unwrap());
        let records = replay(&v, &snap).unwrap();

        let mut buf = Vec::new();
        write_jsonl(&records, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);

        let last: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
        assert_eq!(last["variant"], "test");
        assert_eq!(last["tick"], 4);
        assert_eq!(last["phase"], "HOLDING_SINGLE");
        assert_eq!(last["decision"]["action"], "allocate");
        assert_eq!(last["decision"]["weights"]["SOXL"], 1.0);
    }
}
