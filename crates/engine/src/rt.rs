//! Loop driver state types.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a loop driver thread.
///
/// The physics loop walks `Idle → Running → Draining → Stopped`; haptics
/// loops skip `Draining`. A stop request never interrupts a tick: the
/// in-flight tick completes, then the loop drains and parks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    /// Created, not yet started
    Idle = 0,
    /// Ticking
    Running = 1,
    /// Stop requested, finishing the in-flight work
    Draining = 2,
    /// Exited
    Stopped = 3,
}

/// Atomically published [`LoopState`], readable from any thread.
#[derive(Debug)]
pub(crate) struct LoopStateCell(AtomicU8);

impl LoopStateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(LoopState::Idle as u8))
    }

    pub(crate) fn set(&self, state: LoopState) {
        self.0.store(state as u8, Ordering::Release);
    }

    pub(crate) fn get(&self) -> LoopState {
        match self.0.load(Ordering::Acquire) {
            1 => LoopState::Running,
            2 => LoopState::Draining,
            3 => LoopState::Stopped,
            _ => LoopState::Idle,
        }
    }
}
