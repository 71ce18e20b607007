//! Atomic counters for loop metrics.
//!
//! [`LoopCounters`] can be shared between a real-time loop and any number
//! of observer threads. All increments use `Ordering::Relaxed`: counters
//! are eventually consistent and never participate in cross-field
//! invariants.

use core::sync::atomic::{AtomicU64, Ordering};

/// Counter snapshot returned by [`LoopCounters::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    /// Total loop ticks completed
    pub total_ticks: u64,
    /// Ticks that overran their deadline
    pub missed_ticks: u64,
    /// Wrench writes to a device that failed
    pub device_write_errors: u64,
    /// Interaction-mode transitions
    pub mode_changes: u64,
    /// Devices dropped during pairing (open or body-load failures)
    pub devices_dropped: u64,
}

/// Atomic counters shared by the OpenGrasp loops.
///
/// # Example
///
/// ```
/// use opengrasp_atomic::LoopCounters;
///
/// let counters = LoopCounters::new();
/// counters.inc_tick();
/// counters.inc_missed_tick();
///
/// let snapshot = counters.snapshot();
/// assert_eq!(snapshot.total_ticks, 1);
/// assert_eq!(snapshot.missed_ticks, 1);
/// ```
#[derive(Debug, Default)]
pub struct LoopCounters {
    total_ticks: AtomicU64,
    missed_ticks: AtomicU64,
    device_write_errors: AtomicU64,
    mode_changes: AtomicU64,
    devices_dropped: AtomicU64,
}

impl LoopCounters {
    /// Create counters initialized to zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            total_ticks: AtomicU64::new(0),
            missed_ticks: AtomicU64::new(0),
            device_write_errors: AtomicU64::new(0),
            mode_changes: AtomicU64::new(0),
            devices_dropped: AtomicU64::new(0),
        }
    }

    /// Record a completed tick.
    #[inline]
    pub fn inc_tick(&self) {
        self.total_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a missed deadline.
    #[inline]
    pub fn inc_missed_tick(&self) {
        self.missed_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed wrench write.
    #[inline]
    pub fn inc_device_write_error(&self) {
        self.device_write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an interaction-mode transition.
    #[inline]
    pub fn inc_mode_change(&self) {
        self.mode_changes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a device dropped at pairing time.
    #[inline]
    pub fn inc_device_dropped(&self) {
        self.devices_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a consistent-enough snapshot of all counters.
    ///
    /// Individual fields are read independently; a snapshot taken while a
    /// loop is running may straddle an update, which is acceptable for
    /// metrics display.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total_ticks: self.total_ticks.load(Ordering::Relaxed),
            missed_ticks: self.missed_ticks.load(Ordering::Relaxed),
            device_write_errors: self.device_write_errors.load(Ordering::Relaxed),
            mode_changes: self.mode_changes.load(Ordering::Relaxed),
            devices_dropped: self.devices_dropped.load(Ordering::Relaxed),
        }
    }

    /// Fraction of ticks that missed their deadline.
    pub fn missed_tick_rate(&self) -> f64 {
        let total = self.total_ticks.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            self.missed_ticks.load(Ordering::Relaxed) as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_start_at_zero() {
        let counters = LoopCounters::new();
        assert_eq!(counters.snapshot(), CounterSnapshot::default());
    }

    #[test]
    fn test_increment_and_snapshot() {
        let counters = LoopCounters::new();
        counters.inc_tick();
        counters.inc_tick();
        counters.inc_missed_tick();
        counters.inc_device_write_error();
        counters.inc_mode_change();
        counters.inc_device_dropped();

        let snap = counters.snapshot();
        assert_eq!(snap.total_ticks, 2);
        assert_eq!(snap.missed_ticks, 1);
        assert_eq!(snap.device_write_errors, 1);
        assert_eq!(snap.mode_changes, 1);
        assert_eq!(snap.devices_dropped, 1);
    }

    #[test]
    fn test_missed_tick_rate() {
        let counters = LoopCounters::new();
        assert_eq!(counters.missed_tick_rate(), 0.0);

        for _ in 0..3 {
            counters.inc_tick();
        }
        counters.inc_missed_tick();
        assert!((counters.missed_tick_rate() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_concurrent_increments() {
        let counters = Arc::new(LoopCounters::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let counters = Arc::clone(&counters);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    counters.inc_tick();
                }
            }));
        }
        for handle in handles {
            let joined = handle.join();
            assert!(joined.is_ok());
        }
        assert_eq!(counters.snapshot().total_ticks, 4000);
    }
}
