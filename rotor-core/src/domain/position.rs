//! Position: canonical holdings shape at the input boundary.
//!
//! Harnesses report holdings either as a bare quantity per ticker or as a
//! record carrying a `quantity` key. Both shapes are normalized here into one
//! `Position { ticker, quantity }` before anything reaches the engine core.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A held quantity of one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub quantity: f64,
}

impl Position {
    pub fn new(ticker: impl Into<String>, quantity: f64) -> Self {
        Self {
            ticker: ticker.into(),
            quantity,
        }
    }

    /// True when the position holds a positive, finite quantity.
    pub fn is_open(&self) -> bool {
        self.quantity.is_finite() && self.quantity > 0.0
    }
}

/// Raw holdings value as delivered by a harness.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawPosition {
    Quantity(f64),
    Record { quantity: f64 },
}

impl RawPosition {
    pub fn quantity(&self) -> f64 {
        match self {
            Self::Quantity(q) => *q,
            Self::Record { quantity } => *quantity,
        }
    }
}

/// Normalized holdings keyed by ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Positions {
    by_ticker: BTreeMap<String, Position>,
}

impl Positions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a raw `ticker -> quantity | {quantity}` mapping.
    pub fn from_raw<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = (S, RawPosition)>,
        S: Into<String>,
    {
        let mut positions = Self::new();
        for (ticker, value) in raw {
            positions.insert(Position::new(ticker, value.quantity()));
        }
        positions
    }

    pub fn insert(&mut self, position: Position) {
        self.by_ticker.insert(position.ticker.clone(), position);
    }

    pub fn get(&self, ticker: &str) -> Option<&Position> {
        self.by_ticker.get(ticker)
    }

    /// Reported quantity, zero for tickers absent from the report.
    pub fn quantity(&self, ticker: &str) -> f64 {
        self.get(ticker).map(|p| p.quantity).unwrap_or(0.0)
    }

    pub fn is_held(&self, ticker: &str) -> bool {
        self.get(ticker).is_some_and(Position::is_open)
    }

    pub fn len(&self) -> usize {
        self.by_ticker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ticker.is_empty()
    }
}
