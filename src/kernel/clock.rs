// Wrapping clock domain and the clock seam the kernel sleeps through
//
// All tick arithmetic is widened to u64 and reduced modulo (max + 1),
// so a 16-bit or 24-bit counter wraps exactly like the hardware one.
// One tick is one microsecond on the device; the kernel itself only
// cares that coarse and fine sleeps use the same unit.

use core::fmt;

/// Raw clock value.
pub type Ticks = u32;

/// The range a clock counts through before wrapping back to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDomain {
    max: Ticks,
}

impl ClockDomain {
    /// A full-width 32-bit counter (`micros()` on most MCUs).
    pub const FULL: Self = Self { max: Ticks::MAX };

    /// Clock counting `0..=max`. A zero max is bumped to 1.
    pub const fn new(max: Ticks) -> Self {
        Self {
            max: if max == 0 { 1 } else { max },
        }
    }

    /// Clock `bits` wide, clamped to 1..=32.
    pub const fn with_bits(bits: u32) -> Self {
        let bits = if bits == 0 {
            1
        } else if bits > Ticks::BITS {
            Ticks::BITS
        } else {
            bits
        };
        Self::new(((1u64 << bits) - 1) as Ticks)
    }

    #[inline]
    pub const fn max(self) -> Ticks {
        self.max
    }

    /// Number of distinct clock values, `max + 1`.
    #[inline]
    pub const fn period(self) -> u64 {
        self.max as u64 + 1
    }

    /// `start + delta` inside the domain, and how many times the sum
    /// passed the wrap point.
    pub const fn advance(self, start: Ticks, delta: Ticks) -> (Ticks, u32) {
        let sum = start as u64 + delta as u64;
        let period = self.period();
        ((sum % period) as Ticks, (sum / period) as u32)
    }

    /// Reduce a raw reading into the domain.
    #[inline]
    pub const fn reduce(self, raw: u64) -> Ticks {
        (raw % self.period()) as Ticks
    }
}

impl Default for ClockDomain {
    fn default() -> Self {
        Self::FULL
    }
}

impl fmt::Display for ClockDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0..={}", self.max)
    }
}

/// Time and sleep primitives the kernel is driven by.
pub trait Clock {
    /// Current reading, always inside `self.domain()`.
    fn now(&self) -> Ticks;

    /// Wrap point of this clock.
    fn domain(&self) -> ClockDomain {
        ClockDomain::FULL
    }

    /// Low resolution wait, may undershoot by up to one coarse unit.
    fn sleep_coarse(&mut self, ticks: Ticks);

    /// Precise wait.
    fn sleep_fine(&mut self, ticks: Ticks);
}

/// Deterministic clock for tests and host simulation.
///
/// Sleeping moves simulated time forward by exactly the requested
/// amount, wrapping inside the configured domain.
#[derive(Debug, Clone)]
pub struct SimClock {
    now: Ticks,
    domain: ClockDomain,
    coarse_slept: u64,
    fine_slept: u64,
}

impl SimClock {
    pub const fn new(domain: ClockDomain) -> Self {
        Self {
            now: 0,
            domain,
            coarse_slept: 0,
            fine_slept: 0,
        }
    }

    pub const fn starting_at(domain: ClockDomain, now: Ticks) -> Self {
        let mut clock = Self::new(domain);
        clock.now = domain.reduce(now as u64);
        clock
    }

    pub fn set(&mut self, now: Ticks) {
        self.now = self.domain.reduce(now as u64);
    }

    pub fn advance(&mut self, delta: Ticks) {
        self.now = self.domain.advance(self.now, delta).0;
    }

    /// Total ticks spent in coarse sleeps.
    pub fn coarse_slept(&self) -> u64 {
        self.coarse_slept
    }

    /// Total ticks spent in fine sleeps.
    pub fn fine_slept(&self) -> u64 {
        self.fine_slept
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(ClockDomain::FULL)
    }
}

impl Clock for SimClock {
    fn now(&self) -> Ticks {
        self.now
    }

    fn domain(&self) -> ClockDomain {
        self.domain
    }

    fn sleep_coarse(&mut self, ticks: Ticks) {
        self.coarse_slept += ticks as u64;
        self.advance(ticks);
    }

    fn sleep_fine(&mut self, ticks: Ticks) {
        self.fine_slept += ticks as u64;
        self.advance(ticks);
    }
}
