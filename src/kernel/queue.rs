// Sorted timeout list with a fixed capacity
// NOTE: backing Vec is allocated once at N slots and never grows

use alloc::vec::Vec;
use core::slice;

use super::timeout::{TaskId, Timeout};

pub struct TimeoutQueue<const N: usize> {
    // ascending by Timeout::order, ties in insertion order
    items: Vec<Timeout>,
}

impl<const N: usize> TimeoutQueue<N> {
    pub fn new() -> Self {
        Self {
            items: Vec::with_capacity(N),
        }
    }

    /// Insert keeping order; hands the timeout back if the queue is full.
    pub fn push(&mut self, timeout: Timeout) -> Result<(), Timeout> {
        if self.items.len() >= N {
            return Err(timeout);
        }
        let key = timeout.key();
        let at = self.items.partition_point(|t| t.key() <= key);
        self.items.insert(at, timeout);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Timeout> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    pub fn peek(&self) -> Option<&Timeout> {
        self.items.first()
    }

    /// Remove the first entry matching `pred`.
    pub fn remove_first(&mut self, mut pred: impl FnMut(&Timeout) -> bool) -> Option<Timeout> {
        let at = self.items.iter().position(|t| pred(t))?;
        Some(self.items.remove(at))
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.items.iter().any(|t| t.matches(id))
    }

    /// Mutate every entry in place. Order may be broken afterwards;
    /// call `restore_order` once done.
    pub fn visit_mut(&mut self, mut f: impl FnMut(&mut Timeout)) {
        for t in self.items.iter_mut() {
            f(t);
        }
    }

    pub fn restore_order(&mut self) {
        // stable: equal keys keep their relative order
        self.items.sort_by(|a, b| a.order(b));
    }

    pub fn iter(&self) -> slice::Iter<'_, Timeout> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= N
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<const N: usize> Default for TimeoutQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const N: usize> IntoIterator for &'a TimeoutQueue<N> {
    type Item = &'a Timeout;
    type IntoIter = slice::Iter<'a, Timeout>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::clock::ClockDomain;
    use alloc::boxed::Box;

    fn once(id: u32, now: u32, wait: u32, domain: ClockDomain) -> Timeout {
        Timeout::once(TaskId::new(id), now, wait, domain, Box::new(|| {}))
    }

    fn ids<const N: usize>(q: &TimeoutQueue<N>) -> Vec<u32> {
        q.iter().map(|t| t.id().get()).collect()
    }

    #[test]
    fn push_keeps_sorted_and_stable() {
        let d = ClockDomain::FULL;
        let mut q: TimeoutQueue<8> = TimeoutQueue::new();
        q.push(once(1, 0, 300, d)).unwrap();
        q.push(once(2, 0, 100, d)).unwrap();
        q.push(once(3, 0, 300, d)).unwrap();
        q.push(once(4, 0, 200, d)).unwrap();
        assert_eq!(ids(&q), [2, 4, 1, 3]);
        assert_eq!(q.peek().map(|t| t.due()), Some(100));
    }

    #[test]
    fn wrapped_entries_sort_last() {
        let d = ClockDomain::new(999);
        let mut q: TimeoutQueue<4> = TimeoutQueue::new();
        q.push(once(1, 900, 200, d)).unwrap(); // due 100, wrapped
        q.push(once(2, 900, 50, d)).unwrap(); // due 950
        assert_eq!(ids(&q), [2, 1]);
    }

    #[test]
    fn full_queue_returns_timeout() {
        let d = ClockDomain::FULL;
        let mut q: TimeoutQueue<2> = TimeoutQueue::new();
        q.push(once(1, 0, 1, d)).unwrap();
        q.push(once(2, 0, 2, d)).unwrap();
        assert!(q.is_full());
        let rejected = q.push(once(3, 0, 3, d)).unwrap_err();
        assert_eq!(rejected.id(), TaskId::new(3));
        assert_eq!(q.len(), 2);
        assert_eq!(q.capacity(), 2);
    }

    #[test]
    fn remove_first_matching() {
        let d = ClockDomain::FULL;
        let mut q: TimeoutQueue<4> = TimeoutQueue::new();
        q.push(once(1, 0, 10, d)).unwrap();
        q.push(once(2, 0, 20, d)).unwrap();
        let removed = q.remove_first(|t| t.matches(TaskId::new(2)));
        assert_eq!(removed.map(|t| t.id()), Some(TaskId::new(2)));
        assert!(q.remove_first(|t| t.matches(TaskId::new(9))).is_none());
        assert!(!q.contains(TaskId::new(2)));
        assert!(q.contains(TaskId::new(1)));
    }

    #[test]
    fn visit_then_restore_order() {
        let d = ClockDomain::new(999);
        let mut q: TimeoutQueue<4> = TimeoutQueue::new();
        q.push(once(1, 0, 900, d)).unwrap(); // due 900, cycle 0
        q.push(once(2, 900, 200, d)).unwrap(); // due 100, cycle 1
        q.visit_mut(|t| {
            t.observe_wrap();
        });
        q.restore_order();
        // the overdue entry keeps due 900 but runs before the one now in cycle 0
        assert_eq!(ids(&q), [1, 2]);
        assert_eq!(q.peek().map(|t| (t.due(), t.is_overdue())), Some((900, true)));
    }

    #[test]
    fn pop_and_clear() {
        let d = ClockDomain::FULL;
        let mut q: TimeoutQueue<4> = TimeoutQueue::default();
        q.push(once(1, 0, 10, d)).unwrap();
        q.push(once(2, 0, 5, d)).unwrap();
        assert_eq!(q.pop().map(|t| t.id().get()), Some(2));
        q.clear();
        assert!(q.is_empty());
        assert!(q.pop().is_none());
    }
}
