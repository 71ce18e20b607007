//! Lock-free atomic counters for OpenGrasp real-time loops.
//!
//! Everything in this crate is safe to call from a haptics or physics loop
//! tick: single atomic instructions, no allocation, no blocking.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod counters;
pub mod prelude;

pub use counters::{CounterSnapshot, LoopCounters};
