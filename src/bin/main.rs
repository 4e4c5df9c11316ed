// Host simulator for the timeout kernel
//
// Drives a kernel on a 16-bit simulated clock so wraps happen every
// ~65ms of simulated time. One interval deliberately overruns its
// budget so backlog dropping and the lag warning show up in the log,
// until a one-shot cancels it through a KernelHandle.
//
// WRAP_KERNEL_LOG=debug cargo run --features std -- 400

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use log::{LevelFilter, Log, Metadata, Record, info};

use wrap_kernel::kernel::{Clock, ClockDomain, Kernel, KernelConfig, SimClock, Step, Ticks};

const DEFAULT_STEPS: u32 = 200;

struct StdoutLogger;

impl Log for StdoutLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("{:<5} {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StdoutLogger = StdoutLogger;

fn init_logger_from_env() {
    let level = std::env::var("WRAP_KERNEL_LOG")
        .ok()
        .and_then(|v| LevelFilter::from_str(&v).ok())
        .unwrap_or(LevelFilter::Info);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

// Callbacks burn simulated time through this handle.
#[derive(Clone)]
struct SharedClock(Rc<RefCell<SimClock>>);

impl SharedClock {
    fn burn(&self, ticks: Ticks) {
        self.0.borrow_mut().advance(ticks);
    }
}

impl Clock for SharedClock {
    fn now(&self) -> Ticks {
        self.0.borrow().now()
    }

    fn domain(&self) -> ClockDomain {
        self.0.borrow().domain()
    }

    fn sleep_coarse(&mut self, ticks: Ticks) {
        self.0.borrow_mut().sleep_coarse(ticks);
    }

    fn sleep_fine(&mut self, ticks: Ticks) {
        self.0.borrow_mut().sleep_fine(ticks);
    }
}

fn main() {
    init_logger_from_env();

    let steps = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_STEPS);

    let clock = SharedClock(Rc::new(RefCell::new(SimClock::starting_at(
        ClockDomain::with_bits(16),
        60_000,
    ))));
    let config = KernelConfig::new().with_coarse_threshold(4_000).with_coarse_margin(500);
    let mut kernel: Kernel<SharedClock> = Kernel::with_config(clock.clone(), config);

    let sim = clock.clone();
    let blink = kernel.schedule_interval(2_000, move || {
        info!("blink @ {}", sim.now());
    });

    // 600 ticks of work every 500 ticks: can never keep up
    let sim = clock.clone();
    let sampler = kernel.schedule_interval(500, move || sim.burn(600));

    // stops the sampler from inside a callback
    let sim = clock.clone();
    let handle = kernel.handle();
    let sampler_id = sampler.as_ref().ok().copied();
    let once = kernel.schedule_once(30_000, move || {
        info!("one-shot @ {}", sim.now());
        if let Some(id) = sampler_id {
            handle.cancel(id);
        }
    });

    for result in [blink, sampler, once] {
        if let Err(e) = result {
            log::error!("schedule failed: {}", e);
            return;
        }
    }

    for _ in 0..steps {
        if let Step::Idle = kernel.run_next() {
            break;
        }
    }

    kernel.dump();
    let stats = kernel.stats();
    println!(
        "executed {} rearmed {} dropped {} wraps {} lag warnings {} pending {}",
        stats.executed,
        stats.rearmed,
        stats.dropped_backlogs,
        stats.wraps,
        stats.lag_warnings,
        kernel.pending_count()
    );
}
