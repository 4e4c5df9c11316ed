// Cooperative timeout kernel
// Single core, no preemption. Callbacks run to completion inside
// run_next()/run_due() on the caller's stack.
//
// clock/uptime: wrapping time domain, ISR-fed tick counter
// timeout/queue: scheduled entries and their sorted store
// scheduler:     the Kernel run loop, re-arm and backpressure
// handle:        requests queued by callbacks

pub mod backpressure;
pub mod clock;
pub mod config;
pub mod handle;
pub mod queue;
pub mod scheduler;
pub mod timeout;
pub mod uptime;

pub use backpressure::Backpressure;
pub use clock::{Clock, ClockDomain, SimClock, Ticks};
pub use config::KernelConfig;
pub use handle::KernelHandle;
pub use scheduler::{Kernel, KernelStats, ScheduleError, Step};
pub use timeout::{TaskId, Timeout};
pub use uptime::{TickSource, TimeSource};
