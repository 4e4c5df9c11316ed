// A single scheduled callback
//
// Ordering key is (wrap_distance, overdue, due): an entry that still
// needs the clock to wrap N more times is always later than one that
// needs fewer, whatever the raw due values say. Overdue entries keep
// their due from the previous cycle and sort ahead of the current one.

use alloc::boxed::Box;
use core::cmp::Ordering;
use core::fmt;

use super::clock::{ClockDomain, Ticks};

/// Handle returned by the schedule calls, used to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u32);

impl TaskId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type Callback = Box<dyn FnMut()>;

pub struct Timeout {
    id: TaskId,
    due: Ticks,
    // 0 => one-shot
    period: Ticks,
    wrap_distance: u8,
    // due lies in the cycle before the current one
    overdue: bool,
    callback: Callback,
}

impl Timeout {
    /// One-shot due `wait` ticks after `now`.
    pub fn once(
        id: TaskId,
        now: Ticks,
        wait: Ticks,
        domain: ClockDomain,
        callback: Callback,
    ) -> Self {
        let (due, wraps) = domain.advance(now, wait);
        Self {
            id,
            due,
            period: 0,
            wrap_distance: saturate(wraps),
            overdue: false,
            callback,
        }
    }

    /// Interval whose first run is `period` ticks after `now`.
    pub fn interval(
        id: TaskId,
        now: Ticks,
        period: Ticks,
        domain: ClockDomain,
        callback: Callback,
    ) -> Self {
        let mut timeout = Self::once(id, now, period, domain, callback);
        timeout.period = period;
        timeout
    }

    /// Interval with a literal first due time. A due value behind `now`
    /// is taken to be on the far side of the next wrap.
    pub fn interval_at(
        id: TaskId,
        now: Ticks,
        due: Ticks,
        period: Ticks,
        domain: ClockDomain,
        callback: Callback,
    ) -> Self {
        let due = domain.reduce(due as u64);
        Self {
            id,
            due,
            period,
            wrap_distance: u8::from(due < now),
            overdue: false,
            callback,
        }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[inline]
    pub fn due(&self) -> Ticks {
        self.due
    }

    #[inline]
    pub fn period(&self) -> Option<Ticks> {
        (self.period != 0).then_some(self.period)
    }

    #[inline]
    pub fn wrap_distance(&self) -> u8 {
        self.wrap_distance
    }

    /// Left over from before the last wrap; `due` is in the previous cycle.
    #[inline]
    pub fn is_overdue(&self) -> bool {
        self.overdue
    }

    #[inline]
    pub fn is_interval(&self) -> bool {
        self.period != 0
    }

    /// Total order used by the queue.
    pub fn order(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }

    #[inline]
    pub fn key(&self) -> (u8, bool, Ticks) {
        (self.wrap_distance, !self.overdue, self.due)
    }

    /// Raw due-ness check, ignores wraps.
    #[inline]
    pub fn is_before(&self, time: Ticks) -> bool {
        self.due < time
    }

    /// Overdue, or in the current clock cycle and no later than
    /// `now + tolerance`.
    pub fn is_ready(&self, now: Ticks, tolerance: Ticks) -> bool {
        self.overdue
            || (self.wrap_distance == 0 && self.due as u64 <= now as u64 + tolerance as u64)
    }

    /// How far `now` is past the due time, zero if not yet due.
    pub fn lateness(&self, now: Ticks, domain: ClockDomain) -> u64 {
        if self.overdue {
            domain.period() - self.due as u64 + now as u64
        } else {
            (now as u64).saturating_sub(self.due as u64)
        }
    }

    #[inline]
    pub fn matches(&self, id: TaskId) -> bool {
        self.id == id
    }

    pub fn run(&mut self) {
        (self.callback)()
    }

    /// Account for one global clock wrap. Entries already in the
    /// current cycle were left over from the previous one; they keep
    /// their due and are marked overdue. Returns true for those.
    pub fn observe_wrap(&mut self) -> bool {
        if self.wrap_distance > 0 {
            self.wrap_distance -= 1;
            false
        } else {
            self.overdue = true;
            true
        }
    }

    /// Next occurrence, one period after the last due time.
    pub fn advance_period(&mut self, domain: ClockDomain) {
        let (due, wraps) = domain.advance(self.due, self.period);
        self.due = due;
        if !self.overdue {
            self.wrap_distance = self.wrap_distance.saturating_add(saturate(wraps));
        } else if wraps > 0 {
            // the first wrap only catches up with the current cycle
            self.overdue = false;
            self.wrap_distance = saturate(wraps - 1);
        }
    }

    /// Drop any backlog and make the entry due at `now`.
    pub fn reset_to(&mut self, now: Ticks) {
        self.due = now;
        self.wrap_distance = 0;
        self.overdue = false;
    }
}

impl PartialEq<TaskId> for Timeout {
    fn eq(&self, id: &TaskId) -> bool {
        self.matches(*id)
    }
}

impl fmt::Debug for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeout")
            .field("id", &self.id)
            .field("due", &self.due)
            .field("period", &self.period)
            .field("wrap_distance", &self.wrap_distance)
            .field("overdue", &self.overdue)
            .finish_non_exhaustive()
    }
}

fn saturate(wraps: u32) -> u8 {
    u8::try_from(wraps).unwrap_or(u8::MAX)
}
