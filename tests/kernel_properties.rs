use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;

use wrap_kernel::kernel::{ClockDomain, Kernel, SimClock, Step, TaskId};

#[derive(Debug, Clone)]
enum Op {
    Once(u32),
    Interval(u32),
    Cancel(u32),
    Run(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u32..5_000).prop_map(Op::Once),
        (1u32..5_000).prop_map(Op::Interval),
        (0u32..48).prop_map(Op::Cancel),
        (0u32..3_000).prop_map(Op::Run),
    ]
}

proptest! {
    #[test]
    fn pending_count_tracks_inserts_cancels_and_one_shots(
        start in 0u32..=0xFFFF,
        ops in proptest::collection::vec(op(), 1..40),
    ) {
        let domain = ClockDomain::with_bits(16);
        let mut kernel: Kernel<SimClock, 64> = Kernel::new(SimClock::starting_at(domain, start));
        let one_shots_run = Rc::new(Cell::new(0usize));
        let mut inserted = 0usize;
        let mut canceled = 0usize;

        for op in ops {
            match op {
                Op::Once(wait) => {
                    let hits = one_shots_run.clone();
                    kernel.schedule_once(wait, move || hits.set(hits.get() + 1)).unwrap();
                    inserted += 1;
                }
                Op::Interval(period) => {
                    kernel.schedule_interval(period, || {}).unwrap();
                    inserted += 1;
                }
                Op::Cancel(raw) => {
                    if kernel.cancel(TaskId::new(raw)) {
                        canceled += 1;
                    }
                }
                Op::Run(delta) => {
                    kernel.clock_mut().advance(delta);
                    kernel.run_due();
                }
            }
            prop_assert_eq!(
                kernel.pending_count(),
                inserted - canceled - one_shots_run.get()
            );
        }
    }

    #[test]
    fn pending_entries_are_in_wrap_then_due_order(
        start in 0u32..1_000,
        waits in proptest::collection::vec(0u32..2_500, 1..16),
    ) {
        let domain = ClockDomain::new(999);
        let mut kernel: Kernel<SimClock> = Kernel::new(SimClock::starting_at(domain, start));
        for wait in &waits {
            kernel.schedule_once(*wait, || {}).unwrap();
        }
        let keys: Vec<(u8, u32)> = kernel.pending().map(|t| (t.wrap_distance(), t.due())).collect();
        for pair in keys.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
        for t in kernel.pending() {
            let wait = waits[t.id().get() as usize - 1];
            let absolute = start as u64 + wait as u64;
            prop_assert_eq!(t.due() as u64, absolute % 1_000);
            prop_assert_eq!(t.wrap_distance() as u64, absolute / 1_000);
        }
    }

    #[test]
    fn one_shots_run_in_elapsed_time_order_never_early(
        start in 0u32..1_000,
        waits in proptest::collection::vec(0u32..2_500, 1..12),
    ) {
        let domain = ClockDomain::new(999);
        let mut kernel: Kernel<SimClock> = Kernel::new(SimClock::starting_at(domain, start));
        let tolerance = kernel.config().run_tolerance as u64;
        let ran = Rc::new(RefCell::new(Vec::new()));

        for (i, wait) in waits.iter().enumerate() {
            let ran = ran.clone();
            kernel.schedule_once(*wait, move || ran.borrow_mut().push(i)).unwrap();
        }

        let mut seen = 0;
        let mut steps = 0;
        while kernel.pending_count() > 0 {
            steps += 1;
            prop_assert!(steps < 10_000, "kernel stalled");
            let step = kernel.run_next();
            prop_assert_ne!(step, Step::Idle);

            let elapsed = kernel.clock().coarse_slept() + kernel.clock().fine_slept();
            for &i in &ran.borrow()[seen..] {
                let wait = waits[i] as u64;
                prop_assert!(elapsed + tolerance >= wait, "ran {} early at {}", wait, elapsed);
                prop_assert!(elapsed <= wait, "ran {} late at {}", wait, elapsed);
            }
            seen = ran.borrow().len();
        }

        let mut expected: Vec<usize> = (0..waits.len()).collect();
        expected.sort_by_key(|&i| waits[i]);
        prop_assert_eq!(&*ran.borrow(), &expected);
    }
}
