// Kernel tuning knobs
//
// Defaults are tuned for a 1 MHz tick (one tick = 1us): the coarse
// path sleeps in whole milliseconds, so anything longer than ~16ms
// is handed to it with an 8ms safety margin and re-evaluated later.

use super::clock::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Entries due up to this far in the future run in the current pass.
    pub run_tolerance: Ticks,
    /// Waits at or above this go through a coarse sleep.
    pub coarse_threshold: Ticks,
    /// Subtracted from a coarse sleep so it wakes before the deadline.
    pub coarse_margin: Ticks,
    /// Waits below this are not worth sleeping for.
    pub fine_threshold: Ticks,
    /// Coarse sleep taken when nothing is scheduled.
    pub idle_backoff: Ticks,
    /// Stand-in wait for entries more than one wrap away.
    pub far_wait: Ticks,
    /// Interval lateness beyond which backlog is dropped.
    pub lag_threshold: Ticks,
    /// Backpressure added per dropped backlog.
    pub backpressure_step: u32,
    /// Backpressure level above which a sustained-lag warning fires.
    pub backpressure_warn: u32,
}

impl KernelConfig {
    pub const fn new() -> Self {
        Self {
            run_tolerance: 15,
            coarse_threshold: 16_383,
            coarse_margin: 8_000,
            fine_threshold: 5,
            idle_backoff: 1_000_000,
            far_wait: 67_108_864,
            lag_threshold: 1_000,
            backpressure_step: 10,
            backpressure_warn: 100,
        }
    }

    pub const fn with_run_tolerance(mut self, ticks: Ticks) -> Self {
        self.run_tolerance = ticks;
        self
    }

    pub const fn with_coarse_threshold(mut self, ticks: Ticks) -> Self {
        self.coarse_threshold = ticks;
        self
    }

    pub const fn with_coarse_margin(mut self, ticks: Ticks) -> Self {
        self.coarse_margin = ticks;
        self
    }

    pub const fn with_fine_threshold(mut self, ticks: Ticks) -> Self {
        self.fine_threshold = ticks;
        self
    }

    pub const fn with_idle_backoff(mut self, ticks: Ticks) -> Self {
        self.idle_backoff = ticks;
        self
    }

    pub const fn with_far_wait(mut self, ticks: Ticks) -> Self {
        self.far_wait = ticks;
        self
    }

    pub const fn with_lag_threshold(mut self, ticks: Ticks) -> Self {
        self.lag_threshold = ticks;
        self
    }

    pub const fn with_backpressure(mut self, step: u32, warn_above: u32) -> Self {
        self.backpressure_step = step;
        self.backpressure_warn = warn_above;
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
