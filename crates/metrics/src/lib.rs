//! Metric names for parley, plus the `metrics` facade macros.
//!
//! Crates record through these names behind their own `metrics` feature;
//! whichever recorder the embedding process installs receives them.
//!
//! ```rust,ignore
//! use parley_metrics::{counter, lanes};
//!
//! counter!(lanes::STEERED_TOTAL).increment(1);
//! ```

mod definitions;

pub use definitions::*;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
