//! Convenience re-exports.

pub use crate::counters::{CounterSnapshot, LoopCounters};
