// Kernel clock on top of embedded-hal
//
// Time comes from any TimeSource (an ISR-fed TickSource or a free
// running hardware counter); sleeps go to a blocking DelayNs. Ticks
// are microseconds: coarse sleeps use whole milliseconds and round
// down, fine sleeps are microsecond delays.

use embedded_hal::delay::DelayNs;

use crate::kernel::clock::{Clock, ClockDomain, Ticks};
use crate::kernel::uptime::TimeSource;

const TICKS_PER_MS: Ticks = 1_000;

pub struct HalClock<D, S> {
    delay: D,
    source: S,
}

impl<D: DelayNs, S: TimeSource> HalClock<D, S> {
    pub fn new(delay: D, source: S) -> Self {
        Self { delay, source }
    }

    pub fn release(self) -> (D, S) {
        (self.delay, self.source)
    }
}

impl<D: DelayNs, S: TimeSource> Clock for HalClock<D, S> {
    fn now(&self) -> Ticks {
        self.source.now()
    }

    fn domain(&self) -> ClockDomain {
        self.source.domain()
    }

    fn sleep_coarse(&mut self, ticks: Ticks) {
        let ms = ticks / TICKS_PER_MS;
        if ms > 0 {
            self.delay.delay_ms(ms);
        }
    }

    fn sleep_fine(&mut self, ticks: Ticks) {
        self.delay.delay_us(ticks);
    }
}
