// Deferred kernel access for callbacks
//
// Callbacks run while the driver holds the Kernel mutably, so they
// cannot call into it. A KernelHandle queues requests instead. The
// kernel applies them after every callback and at the start of each
// run_due()/run_next(). Entries scheduled from inside a run_due pass
// join the queue when that pass ends.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use core::cell::RefCell;

use log::warn;

use super::clock::Ticks;
use super::timeout::{Callback, TaskId};

pub(crate) enum Request {
    Once {
        id: TaskId,
        wait: Ticks,
        callback: Callback,
    },
    Interval {
        id: TaskId,
        period: Ticks,
        callback: Callback,
    },
    Cancel(TaskId),
    ClearAll,
}

// Id counter and request queue, shared by the kernel and its handles.
pub(crate) struct Shared {
    next_id: u32,
    requests: VecDeque<Request>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            requests: VecDeque::new(),
        }
    }

    pub(crate) fn peek_id(&self) -> TaskId {
        TaskId::new(self.next_id)
    }

    /// Hand out the next id and move the counter on.
    pub(crate) fn take_id(&mut self) -> TaskId {
        let id = self.peek_id();
        self.next_id = match self.next_id.checked_add(1) {
            Some(next) => next,
            None => {
                warn!("kernel: task ids exhausted, restarting at 1");
                1
            }
        };
        id
    }

    pub(crate) fn pop_request(&mut self) -> Option<Request> {
        self.requests.pop_front()
    }
}

/// Cloneable way to schedule and cancel from inside callbacks.
///
/// Requests are applied in the order they were made. Ids are handed
/// out immediately, so a callback can cancel what it just scheduled.
/// An entry that finds the queue full when its request is applied is
/// dropped with a warning.
#[derive(Clone)]
pub struct KernelHandle {
    shared: Rc<RefCell<Shared>>,
}

impl KernelHandle {
    pub(crate) fn new(shared: Rc<RefCell<Shared>>) -> Self {
        Self { shared }
    }

    /// Run `f` once, `wait` ticks after the kernel picks up the request.
    pub fn schedule_once<F>(&self, wait: Ticks, f: F) -> TaskId
    where
        F: FnMut() + 'static,
    {
        let mut shared = self.shared.borrow_mut();
        let id = shared.take_id();
        shared.requests.push_back(Request::Once {
            id,
            wait,
            callback: Box::new(f),
        });
        id
    }

    /// Run `f` every `period` ticks, counted from when the kernel picks
    /// up the request.
    pub fn schedule_interval<F>(&self, period: Ticks, f: F) -> TaskId
    where
        F: FnMut() + 'static,
    {
        let mut shared = self.shared.borrow_mut();
        let id = shared.take_id();
        shared.requests.push_back(Request::Interval {
            id,
            period,
            callback: Box::new(f),
        });
        id
    }

    /// Cancel `id`. An interval cancelling itself is not re-armed again.
    pub fn cancel(&self, id: TaskId) {
        self.shared.borrow_mut().requests.push_back(Request::Cancel(id));
    }

    pub fn clear_all(&self) {
        self.shared.borrow_mut().requests.push_back(Request::ClearAll);
    }

    /// Requests not yet applied by the kernel.
    pub fn queued(&self) -> usize {
        self.shared.borrow().requests.len()
    }
}
