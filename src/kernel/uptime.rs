// Interrupt-fed uptime counter
//
// A periodic timer ISR calls tick(); the main loop reads now(). The
// count wraps inside its ClockDomain exactly like a narrow hardware
// counter. Critical section guards targets without atomic RMW
// (riscv32imc, AVR).

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;

use super::clock::{ClockDomain, Ticks};

/// Anything that can report the current clock reading.
pub trait TimeSource {
    fn now(&self) -> Ticks;

    fn domain(&self) -> ClockDomain {
        ClockDomain::FULL
    }
}

pub struct TickSource {
    ticks: Mutex<Cell<Ticks>>,
    // ticks added per interrupt; raised when the timer is slowed
    weight: AtomicU32,
    domain: ClockDomain,
}

impl TickSource {
    pub const fn new(domain: ClockDomain, weight: u32) -> Self {
        Self {
            ticks: Mutex::new(Cell::new(0)),
            weight: AtomicU32::new(weight),
            domain,
        }
    }

    /// Timer interrupt: advance by the current weight.
    #[inline]
    pub fn tick(&self) {
        let weight = self.weight.load(Ordering::Relaxed);
        self.advance(weight);
    }

    pub fn advance(&self, delta: Ticks) {
        let domain = self.domain;
        critical_section::with(|cs| {
            let ticks = self.ticks.borrow(cs);
            ticks.set(domain.advance(ticks.get(), delta).0);
        });
    }

    pub fn set_weight(&self, weight: u32) {
        self.weight.store(weight, Ordering::Release);
    }

    pub fn weight(&self) -> u32 {
        self.weight.load(Ordering::Acquire)
    }
}

impl TimeSource for TickSource {
    fn now(&self) -> Ticks {
        critical_section::with(|cs| self.ticks.borrow(cs).get())
    }

    fn domain(&self) -> ClockDomain {
        self.domain
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> Ticks {
        (**self).now()
    }

    fn domain(&self) -> ClockDomain {
        (**self).domain()
    }
}
