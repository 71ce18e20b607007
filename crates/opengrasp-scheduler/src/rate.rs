//! Achieved-rate measurement for free-running loops.
//!
//! Each haptics loop free-runs at whatever rate the device sampling
//! allows; the measured frequency is displayed by the hosting UI. The
//! owner thread calls [`RateCounter::signal`] once per tick and the
//! counter publishes a windowed estimate through a cloneable
//! [`RateReader`] that any thread may poll.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const DEFAULT_WINDOW: Duration = Duration::from_millis(500);

/// Owner-side tick counter with a sliding measurement window.
#[derive(Debug)]
pub struct RateCounter {
    ticks_in_window: u64,
    window_start: Instant,
    window: Duration,
    published_millihz: Arc<AtomicU64>,
}

/// Cross-thread reader for a [`RateCounter`]'s published frequency.
#[derive(Debug, Clone)]
pub struct RateReader {
    millihz: Arc<AtomicU64>,
}

impl RateCounter {
    /// Create a counter with the default half-second window.
    pub fn new() -> (Self, RateReader) {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Create a counter with a custom measurement window.
    pub fn with_window(window: Duration) -> (Self, RateReader) {
        let window = window.max(Duration::from_millis(1));
        let published = Arc::new(AtomicU64::new(0));
        let reader = RateReader {
            millihz: Arc::clone(&published),
        };
        (
            Self {
                ticks_in_window: 0,
                window_start: Instant::now(),
                window,
                published_millihz: published,
            },
            reader,
        )
    }

    /// Record one tick; rolls the window and republishes when it elapses.
    pub fn signal(&mut self) {
        self.ticks_in_window += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= self.window {
            let hz = self.ticks_in_window as f64 / elapsed.as_secs_f64();
            self.published_millihz
                .store((hz * 1000.0) as u64, Ordering::Relaxed);
            self.ticks_in_window = 0;
            self.window_start = Instant::now();
        }
    }

    /// Most recently published frequency in Hz.
    pub fn frequency_hz(&self) -> f64 {
        self.published_millihz.load(Ordering::Relaxed) as f64 / 1000.0
    }
}

impl RateReader {
    /// Most recently published frequency in Hz.
    pub fn frequency_hz(&self) -> f64 {
        self.millihz.load(Ordering::Relaxed) as f64 / 1000.0
    }
}
