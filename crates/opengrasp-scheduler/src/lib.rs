//! Fixed-frequency pacing for the OpenGrasp real-time loops.
//!
//! The haptics loops and the physics loop each hold a [`RatePacer`] and
//! call [`RatePacer::pace`] at the bottom of every tick. The pacer blocks
//! (by spinning, or by sleeping and then spinning the final slice) until
//! the next tick boundary and reschedules the boundary from the current
//! wall-clock time, so a stalled loop resumes at its nominal rate instead
//! of bursting to catch up.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod jitter;
pub mod pacer;
pub mod rate;

pub use error::{RTError, RTResult};
pub use jitter::JitterMetrics;
pub use pacer::{PaceOutcome, PaceStrategy, RatePacer};
pub use rate::{RateCounter, RateReader};

/// Period for a 1 kHz loop in nanoseconds.
pub const PERIOD_1KHZ_NS: u64 = 1_000_000;

/// Default physics loop frequency when no fixed timestep is configured.
pub const DEFAULT_PHYSICS_HZ: f64 = 1000.0;

/// Slice of the period a [`PaceStrategy::SleepSpin`] pacer spends spinning
/// after the coarse sleep returns.
pub const SPIN_SLICE_NS: u64 = 200_000;
