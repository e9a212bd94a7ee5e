//! Time management utilities

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic time source in milliseconds
pub trait Clock {
    /// Current time in milliseconds; never decreases
    fn now_ms(&self) -> f64;
}

/// Wall-clock backed monotonic time
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock reading zero now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Manually advanced clock for tests and deterministic hosts.
///
/// Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    /// Create a clock reading `start` milliseconds
    pub fn new(start: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, now: f64) {
        self.now.set(now);
    }

    /// Move forward by `delta` milliseconds
    pub fn advance(&self, delta: f64) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

/// Time credited to the accumulator by one scheduling callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Credit {
    /// Elapsed time credited, after capping and stall clamping
    pub elapsed: f64,
    /// Whether the elapsed time was treated as a stall
    pub stalled: bool,
}

/// Outcome of one accumulator step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advance {
    /// Elapsed time credited this step, after capping and stall clamping
    pub elapsed: f64,
    /// Number of fixed updates to run
    pub updates: u32,
    /// Whether the elapsed time was treated as a stall
    pub stalled: bool,
}

/// Fixed-timestep accumulator
///
/// Each step credits the time since the previous step (capped at
/// `max_frame_time`; anything above `stall_factor * time_step` counts as a
/// single step) and drains the accumulator in `time_step` increments.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedTimestep {
    time_step: f64,
    max_frame_time: f64,
    stall_factor: f64,
    accumulator: f64,
    last_time: f64,
}

impl FixedTimestep {
    /// Create an accumulator with the default cap (1000ms) and stall factor (10)
    pub fn new(time_step: f64) -> Self {
        Self::with_limits(time_step, 1000.0, 10.0)
    }

    /// Create an accumulator with explicit limits
    pub fn with_limits(time_step: f64, max_frame_time: f64, stall_factor: f64) -> Self {
        Self {
            time_step,
            max_frame_time,
            stall_factor,
            accumulator: 0.0,
            last_time: 0.0,
        }
    }

    /// Fixed step in milliseconds
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Unconsumed simulated time
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Time of the previous step
    pub fn last_time(&self) -> f64 {
        self.last_time
    }

    /// Restart timing at `now` with an empty accumulator
    pub fn reset(&mut self, now: f64) {
        self.accumulator = 0.0;
        self.last_time = now;
    }

    /// Move `last_time` forward without crediting any time.
    ///
    /// Returns the capped time since the previous step.
    pub fn skip_to(&mut self, now: f64) -> f64 {
        let elapsed = self.capped_elapsed(now);
        self.last_time = now;
        elapsed
    }

    fn capped_elapsed(&self, now: f64) -> f64 {
        (now - self.last_time).min(self.max_frame_time).max(0.0)
    }

    /// Credit the time since the previous step without consuming any of it
    pub fn credit(&mut self, current_time: f64) -> Credit {
        let mut elapsed = self.capped_elapsed(current_time);
        let stalled = elapsed > self.stall_factor * self.time_step;
        if stalled {
            log::warn!(
                "Frame took {elapsed:.1}ms (more than {} steps), counting it as one step",
                self.stall_factor
            );
            elapsed = self.time_step;
        }

        self.accumulator += elapsed;
        self.last_time = current_time;
        Credit { elapsed, stalled }
    }

    /// Take one `time_step` out of the accumulator if a full step is due
    pub fn consume_step(&mut self) -> bool {
        if self.accumulator >= self.time_step {
            self.accumulator -= self.time_step;
            true
        } else {
            false
        }
    }

    /// Credit the time since the previous step and drain every due update
    pub fn advance(&mut self, current_time: f64) -> Advance {
        let Credit { elapsed, stalled } = self.credit(current_time);
        let mut updates = 0;
        while self.consume_step() {
            updates += 1;
        }

        Advance {
            elapsed,
            updates,
            stalled,
        }
    }
}
