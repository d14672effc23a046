//! Market data views.
//!
//! The engine only ever reads bar histories through the [`PriceHistory`]
//! trait. Unknown tickers resolve to an empty history, so every downstream
//! component has exactly one "insufficient data" branch.

pub mod history;
pub mod snapshot;

pub use history::PriceHistory;
pub use snapshot::{MarketSnapshot, SnapshotView};
