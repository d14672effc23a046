//! Long-format CSV bar loader.
//!
//! Expected columns: `timestamp,ticker,open,high,low,close`. One row per
//! ticker per tick; rows may arrive in any order.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rotor_core::{Bar, MarketSnapshot};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct BarRecord {
    timestamp: String,
    ticker: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a timestamp cell. Date-only values map to midnight.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(ts);
        }
    }
    if let Some(ts) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(ts);
    }
    bail!("unrecognised timestamp '{raw}'")
}

/// Read bars from any reader into a snapshot.
///
/// Rows that fail the OHLC sanity check are skipped with a warning; rows
/// that fail to parse are an error.
pub fn read_bars<R: std::io::Read>(reader: R) -> Result<MarketSnapshot> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut snapshot = MarketSnapshot::new();
    let mut loaded = 0usize;
    let mut skipped = 0usize;

    for (line, row) in rdr.deserialize::<BarRecord>().enumerate() {
        // Header is line 1.
        let record = row.with_context(|| format!("bad CSV row at line {}", line + 2))?;
        let timestamp = parse_timestamp(&record.timestamp)
            .with_context(|| format!("line {}", line + 2))?;
        let bar = Bar::new(timestamp, record.open, record.high, record.low, record.close);
        if !bar.is_sane() {
            warn!(ticker = %record.ticker, %timestamp, "skipping insane bar");
            skipped += 1;
            continue;
        }
        snapshot.push(&record.ticker, bar);
        loaded += 1;
    }

    info!(loaded, skipped, tickers = snapshot.tickers().len(), "bars loaded");
    Ok(snapshot)
}

pub fn load_bars(path: &Path) -> Result<MarketSnapshot> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open bars file: {}", path.display()))?;
    read_bars(file)
}
