// Timeout kernel: one-shot and interval callbacks on a wrapping clock
//
// Single owner, single thread, run-to-completion. The driver calls
// run_next() in a loop; it sleeps until the head entry is due, runs
// everything that is due, and re-arms intervals. Clock wraps are
// noticed whenever the kernel reads a value below the previous one.
// Callbacks reach the kernel through a KernelHandle.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use log::{debug, info, warn};

use super::backpressure::Backpressure;
use super::clock::{Clock, Ticks};
use super::config::KernelConfig;
use super::handle::{KernelHandle, Request, Shared};
use super::queue::TimeoutQueue;
use super::timeout::{TaskId, Timeout};

/// Default number of pending timeouts a kernel can hold.
pub const DEFAULT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// Queue is at capacity; nothing was scheduled.
    QueueFull { capacity: usize },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::QueueFull { capacity } => {
                write!(f, "timeout queue full ({} slots)", capacity)
            }
        }
    }
}

/// What a call to `run_next` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing scheduled; slept the idle backoff.
    Idle,
    /// Head entry is far away; slept coarsely without running anything.
    Deferred { slept: Ticks },
    /// Ran the due pass.
    Ran { executed: usize },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Idle => write!(f, "Idle"),
            Step::Deferred { slept } => write!(f, "Deferred({})", slept),
            Step::Ran { executed } => write!(f, "Ran({})", executed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KernelStats {
    pub executed: u32,
    pub rearmed: u32,
    pub dropped_backlogs: u32,
    pub wraps: u32,
    pub lag_warnings: u32,
    pub idle_polls: u32,
}

pub struct Kernel<C: Clock, const N: usize = DEFAULT_CAPACITY> {
    clock: C,
    config: KernelConfig,
    timeouts: TimeoutQueue<N>,
    // id counter and handle requests
    shared: Rc<RefCell<Shared>>,
    // scheduled from inside the current run_due pass
    held: Vec<Timeout>,
    last_check: Ticks,
    // start of the most recent callback
    last_run_at: Ticks,
    backpressure: Backpressure,
    stats: KernelStats,
}

impl<C: Clock, const N: usize> Kernel<C, N> {
    pub fn new(clock: C) -> Self {
        Self::with_config(clock, KernelConfig::new())
    }

    pub fn with_config(clock: C, config: KernelConfig) -> Self {
        let now = clock.now();
        Self {
            clock,
            config,
            timeouts: TimeoutQueue::new(),
            shared: Rc::new(RefCell::new(Shared::new())),
            held: Vec::new(),
            last_check: now,
            last_run_at: now,
            backpressure: Backpressure::new(),
            stats: KernelStats::default(),
        }
    }

    /// Run `f` once, `wait` ticks from now.
    pub fn schedule_once<F>(&mut self, wait: Ticks, f: F) -> Result<TaskId, ScheduleError>
    where
        F: FnMut() + 'static,
    {
        let now = self.sync_clock();
        let timeout =
            Timeout::once(self.peek_id(), now, wait, self.clock.domain(), Box::new(f));
        self.enqueue(timeout)
    }

    /// Run `f` every `period` ticks, first run one period from now.
    /// A zero period runs once.
    pub fn schedule_interval<F>(&mut self, period: Ticks, f: F) -> Result<TaskId, ScheduleError>
    where
        F: FnMut() + 'static,
    {
        let now = self.sync_clock();
        let timeout =
            Timeout::interval(self.peek_id(), now, period, self.clock.domain(), Box::new(f));
        self.enqueue(timeout)
    }

    /// Run `f` every `period` ticks, first run at the clock value `due`.
    /// A `due` behind the current reading means after the next wrap.
    pub fn schedule_interval_at<F>(
        &mut self,
        due: Ticks,
        period: Ticks,
        f: F,
    ) -> Result<TaskId, ScheduleError>
    where
        F: FnMut() + 'static,
    {
        let now = self.sync_clock();
        let timeout = Timeout::interval_at(
            self.peek_id(),
            now,
            due,
            period,
            self.clock.domain(),
            Box::new(f),
        );
        self.enqueue(timeout)
    }

    /// Remove a pending one-shot or interval. False if `id` is not queued.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let queued = self.timeouts.remove_first(|t| t.matches(id)).is_some();
        if queued {
            return true;
        }
        match self.held.iter().position(|t| t.matches(id)) {
            Some(at) => {
                self.held.remove(at);
                true
            }
            None => false,
        }
    }

    /// Drop every pending entry without running it.
    pub fn clear_all(&mut self) {
        self.timeouts.clear();
        self.held.clear();
    }

    /// Handle for scheduling and cancelling from inside callbacks.
    pub fn handle(&self) -> KernelHandle {
        KernelHandle::new(Rc::clone(&self.shared))
    }

    pub fn pending_count(&self) -> usize {
        self.timeouts.len()
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.timeouts.contains(id)
    }

    /// Earliest pending entry.
    pub fn peek(&self) -> Option<&Timeout> {
        self.timeouts.peek()
    }

    /// Pending entries in run order.
    pub fn pending(&self) -> impl Iterator<Item = &Timeout> {
        self.timeouts.iter()
    }

    pub fn now(&self) -> Ticks {
        self.clock.now()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn backpressure(&self) -> Backpressure {
        self.backpressure
    }

    pub fn stats(&self) -> KernelStats {
        self.stats
    }

    /// Run every entry due within the tolerance window, earliest first.
    /// Returns how many callbacks ran.
    ///
    /// Readiness is judged against the clock as read when the pass
    /// starts, so callbacks that outlast their own period cannot keep
    /// the pass going.
    pub fn run_due(&mut self) -> usize {
        self.apply_requests();

        let pass_now = self.sync_clock();
        let mut now = pass_now;
        let mut executed = 0;
        loop {
            let ready = match self.timeouts.peek() {
                Some(head) => head.is_ready(pass_now, self.config.run_tolerance),
                None => false,
            };
            if !ready {
                break;
            }
            let Some(mut timeout) = self.timeouts.pop() else {
                break;
            };

            self.last_run_at = now;
            timeout.run();
            executed += 1;
            self.stats.executed = self.stats.executed.saturating_add(1);

            self.rearm(timeout);
            self.drain_requests();

            if self.timeouts.is_empty() {
                info!("kernel: timeouts empty after run");
                break;
            }

            now = self.sync_clock();
            if now < pass_now {
                // wrapped mid-pass; pass_now belongs to the old cycle
                break;
            }
        }
        self.release_held();
        executed
    }

    /// One scheduling step. Call this in a loop.
    pub fn run_next(&mut self) -> Step {
        self.apply_requests();
        let now = self.sync_clock();

        let head = self
            .timeouts
            .peek()
            .map(|t| (t.wrap_distance(), self.remaining(t, now)));
        let Some((wrap_distance, wait)) = head else {
            info!("kernel: {} no tasks waiting", now);
            self.stats.idle_polls = self.stats.idle_polls.saturating_add(1);
            self.clock.sleep_coarse(self.config.idle_backoff);
            return Step::Idle;
        };

        if wait >= i64::from(self.config.coarse_threshold) {
            // wake early and re-evaluate rather than wait precisely for long
            let slept = self.coarse_span(wait);
            self.clock.sleep_coarse(slept);
            return Step::Deferred { slept };
        }

        // a head still behind a wrap is never runnable yet, so only a
        // current-cycle head skips the sleep
        if wait < i64::from(self.config.fine_threshold) && wrap_distance == 0 {
            return Step::Ran {
                executed: self.run_due(),
            };
        }

        // 0 <= wait < coarse_threshold here, fits in Ticks
        self.clock.sleep_fine(wait.max(1) as Ticks);
        let executed = self.run_due();

        if self.backpressure.settle(self.config.backpressure_warn) {
            warn!("kernel: cannot keep up, interval backlog dropped");
            self.stats.lag_warnings = self.stats.lag_warnings.saturating_add(1);
        }

        Step::Ran { executed }
    }

    /// Log every pending entry at debug level.
    pub fn dump(&self) {
        debug!(
            "kernel: stored {} real {}",
            self.timeouts.capacity(),
            self.timeouts.len()
        );
        for t in &self.timeouts {
            debug!(
                "kernel:   {} due {} wrap {}{}",
                t.id(),
                t.due(),
                t.wrap_distance(),
                if t.is_overdue() { " overdue" } else { "" }
            );
        }
    }

    fn peek_id(&self) -> TaskId {
        self.shared.borrow().peek_id()
    }

    fn enqueue(&mut self, timeout: Timeout) -> Result<TaskId, ScheduleError> {
        let id = timeout.id();
        self.timeouts
            .push(timeout)
            .map_err(|_| ScheduleError::QueueFull { capacity: N })?;
        self.shared.borrow_mut().take_id();
        Ok(id)
    }

    fn apply_requests(&mut self) {
        self.drain_requests();
        self.release_held();
    }

    // New entries go to `held` so a pass never runs what it scheduled.
    fn drain_requests(&mut self) {
        loop {
            let next = self.shared.borrow_mut().pop_request();
            let Some(request) = next else {
                break;
            };
            match request {
                Request::Once { id, wait, callback } => {
                    let now = self.sync_clock();
                    let domain = self.clock.domain();
                    self.held.push(Timeout::once(id, now, wait, domain, callback));
                }
                Request::Interval {
                    id,
                    period,
                    callback,
                } => {
                    let now = self.sync_clock();
                    let domain = self.clock.domain();
                    self.held
                        .push(Timeout::interval(id, now, period, domain, callback));
                }
                Request::Cancel(id) => {
                    if !self.cancel(id) {
                        debug!("kernel: cancel {} not pending", id);
                    }
                }
                Request::ClearAll => self.clear_all(),
            }
        }
    }

    fn release_held(&mut self) {
        for timeout in self.held.drain(..) {
            if let Err(lost) = self.timeouts.push(timeout) {
                warn!("kernel: queue full, dropped requested {}", lost.id());
            }
        }
    }

    // Read the clock; a reading below the last one means it wrapped.
    fn sync_clock(&mut self) -> Ticks {
        let now = self.clock.now();
        if now < self.last_check {
            let mut overdue = 0usize;
            self.timeouts.visit_mut(|t| {
                if t.observe_wrap() {
                    overdue += 1;
                }
            });
            for t in self.held.iter_mut() {
                t.observe_wrap();
            }
            self.timeouts.restore_order();
            self.stats.wraps = self.stats.wraps.saturating_add(1);
            debug!(
                "kernel: clock wrapped {} -> {}, {} overdue",
                self.last_check, now, overdue
            );
        }
        self.last_check = now;
        now
    }

    // Ticks until `head` is due, negative if already late.
    fn remaining(&self, head: &Timeout, now: Ticks) -> i64 {
        let domain = self.clock.domain();
        if head.is_overdue() {
            return -(head.lateness(now, domain) as i64);
        }
        let due = head.due();
        match head.wrap_distance() {
            0 => i64::from(due) - i64::from(now),
            1 => i64::from(domain.max().saturating_sub(now)) + i64::from(due),
            _ => i64::from(self.config.far_wait),
        }
    }

    // Never sleep past a whole clock period, or a wrap goes unseen.
    fn coarse_span(&self, wait: i64) -> Ticks {
        let max = i64::from(self.clock.domain().max());
        (wait - i64::from(self.config.coarse_margin)).clamp(1, max) as Ticks
    }

    fn rearm(&mut self, mut timeout: Timeout) {
        if !timeout.is_interval() {
            return;
        }

        let domain = self.clock.domain();
        let lag = timeout.lateness(self.last_run_at, domain);
        if lag > u64::from(self.config.lag_threshold) {
            let now = self.sync_clock();
            self.backpressure.bump(self.config.backpressure_step);
            self.stats.dropped_backlogs = self.stats.dropped_backlogs.saturating_add(1);
            debug!(
                "kernel: {} {} ticks late, backlog dropped",
                timeout.id(),
                lag
            );
            // re-base on the current time instead of replaying missed periods
            timeout.reset_to(now);
        }
        timeout.advance_period(domain);

        self.stats.rearmed = self.stats.rearmed.saturating_add(1);
        if let Err(lost) = self.timeouts.push(timeout) {
            warn!("kernel: no slot to re-arm {}", lost.id());
        }
    }
}
