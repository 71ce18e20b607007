//! Fixed-frequency pacer with overrun recovery.
//!
//! Unlike an absolute scheduler that walks deadlines forward from the
//! previous boundary, [`RatePacer`] reschedules the next deadline from the
//! current wall-clock time after every wake. A loop that stalls for ten
//! periods resumes at its nominal rate immediately instead of running ten
//! back-to-back catch-up ticks; the trade-off is that the long-run average
//! rate is not guaranteed across overruns.

use crate::SPIN_SLICE_NS;
use crate::error::{RTError, RTResult};
use crate::jitter::JitterMetrics;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How a pacer waits out the remainder of a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaceStrategy {
    /// Busy-wait to the deadline. Lowest jitter, burns a core.
    #[default]
    Spin,
    /// Coarse `thread::sleep` to within [`SPIN_SLICE_NS`] of the deadline,
    /// then spin the final slice. For hosts where pure spinning is
    /// unacceptable.
    SleepSpin,
}

/// Outcome of one [`RatePacer::pace`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaceOutcome {
    /// Tick count after this pace call
    pub tick: u64,
    /// Whether the loop body overran the period
    pub overrun: bool,
    /// Jitter relative to the deadline, in nanoseconds
    pub jitter_ns: u64,
}

/// Fixed-frequency pacer for one real-time loop.
#[derive(Debug)]
pub struct RatePacer {
    period: Duration,
    strategy: PaceStrategy,
    next_deadline: Instant,
    tick_count: u64,
    metrics: JitterMetrics,
}

impl RatePacer {
    /// Create a pacer targeting `frequency_hz` ticks per second.
    ///
    /// # Errors
    ///
    /// Returns [`RTError::InvalidConfig`] if the frequency is not finite
    /// and positive.
    pub fn new(frequency_hz: f64, strategy: PaceStrategy) -> RTResult<Self> {
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return Err(RTError::InvalidConfig);
        }
        Ok(Self::with_period(
            Duration::from_secs_f64(1.0 / frequency_hz),
            strategy,
        ))
    }

    /// Create a pacer with an explicit period.
    pub fn with_period(period: Duration, strategy: PaceStrategy) -> Self {
        let period = period.max(Duration::from_nanos(1));
        Self {
            period,
            strategy,
            next_deadline: Instant::now() + period,
            tick_count: 0,
            metrics: JitterMetrics::new(),
        }
    }

    /// Block until the next tick boundary.
    ///
    /// If the deadline has already passed the call returns immediately,
    /// records the overrun, and schedules the next deadline one period
    /// from now.
    pub fn pace(&mut self) -> PaceOutcome {
        let now = Instant::now();
        let overrun = now >= self.next_deadline;
        let jitter_ns = if overrun {
            duration_ns(now.duration_since(self.next_deadline))
        } else {
            duration_ns(self.next_deadline.duration_since(now))
        };
        self.metrics.record_tick(jitter_ns, overrun);

        if !overrun {
            self.wait_until(self.next_deadline);
        }

        // Reschedule from the current time, not the previous boundary.
        self.next_deadline = Instant::now() + self.period;
        self.tick_count += 1;

        PaceOutcome {
            tick: self.tick_count,
            overrun,
            jitter_ns,
        }
    }

    fn wait_until(&self, deadline: Instant) {
        if self.strategy == PaceStrategy::SleepSpin {
            let spin_slice = Duration::from_nanos(SPIN_SLICE_NS);
            let now = Instant::now();
            if let Some(sleep_for) = deadline
                .checked_duration_since(now)
                .and_then(|d| d.checked_sub(spin_slice))
            {
                std::thread::sleep(sleep_for);
            }
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }

    /// Target period.
    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Configured wait strategy.
    #[inline]
    pub fn strategy(&self) -> PaceStrategy {
        self.strategy
    }

    /// Ticks paced so far.
    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Jitter metrics.
    #[inline]
    pub fn metrics(&self) -> &JitterMetrics {
        &self.metrics
    }

    /// Mutable jitter metrics, for percentile queries.
    #[inline]
    pub fn metrics_mut(&mut self) -> &mut JitterMetrics {
        &mut self.metrics
    }

    /// Reset the pacer, scheduling the first deadline one period from now.
    pub fn reset(&mut self) {
        self.next_deadline = Instant::now() + self.period;
        self.tick_count = 0;
        self.metrics.reset();
    }
}

fn duration_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
