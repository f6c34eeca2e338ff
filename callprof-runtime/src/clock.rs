//! Time sources for the event handler.

use std::cell::Cell;
use std::rc::Rc;

use crate::tsc;

/// Monotonic nanosecond timestamp source.
pub trait Clock {
    fn now_ns(&self) -> u64;
}

/// Calibrated hardware counter, anchored at construction.
#[derive(Debug, Clone, Copy)]
pub struct TscClock {
    epoch: u64,
}

impl TscClock {
    pub fn new() -> Self {
        tsc::calibrate();
        Self { epoch: tsc::read() }
    }
}

impl Default for TscClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TscClock {
    #[inline(always)]
    fn now_ns(&self) -> u64 {
        tsc::ticks_to_ns(self.epoch, tsc::read())
    }
}

/// Externally driven clock. Clones share the same time.
///
/// Trace replay sets it to each recorded event time. With a non-zero `step`,
/// every read advances the clock afterwards, which stands in for the time the
/// handler itself consumes.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
    step: u64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(step: u64) -> Self {
        Self {
            now: Rc::default(),
            step,
        }
    }

    pub fn set(&self, ns: u64) {
        self.now.set(ns);
    }

    pub fn advance(&self, ns: u64) {
        self.now.set(self.now.get() + ns);
    }

    /// Current time without consuming a step.
    pub fn peek(&self) -> u64 {
        self.now.get()
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let a = ManualClock::new();
        let b = a.clone();
        a.set(40);
        b.advance(2);
        assert_eq!(a.now_ns(), 42);
        assert_eq!(b.now_ns(), 42);
    }

    #[test]
    fn manual_clock_step_advances_after_each_read() {
        let clock = ManualClock::with_step(3);
        clock.set(10);
        assert_eq!(clock.now_ns(), 10);
        assert_eq!(clock.now_ns(), 13);
        assert_eq!(clock.peek(), 16);
    }

    #[test]
    fn tsc_clock_is_monotonic() {
        let clock = TscClock::new();
        let a = clock.now_ns();
        std::hint::black_box((0..1000u64).sum::<u64>());
        let b = clock.now_ns();
        assert!(b >= a, "tsc clock went backwards: {a} -> {b}");
    }
}
