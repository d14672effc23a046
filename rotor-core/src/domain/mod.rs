//! Domain types for rotor.

pub mod bar;
pub mod position;

pub use bar::Bar;
pub use position::{Position, Positions, RawPosition};
