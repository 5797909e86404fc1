//! Cooperative deferred-task queue
//!
//! All modem work runs on one logical context. Anything that "completes
//! later" (simulated latency, continuations, polling) is queued here as a
//! task and run one at a time by whoever drives the modem: the actor against
//! the wall clock, or tests through [`Modem::run_until_idle`], which jumps the
//! virtual clock straight to the next deadline.
//!
//! [`Modem::run_until_idle`]: crate::Modem::run_until_idle

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::Modem;

/// A unit of deferred work
pub type Task = Box<dyn FnOnce(&mut Modem) + Send>;

/// Deadline-ordered task queue with a monotonic virtual clock
pub struct Scheduler {
    queue: BTreeMap<(Instant, u64), Task>,
    next_seq: u64,
    clock: Instant,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            queue: BTreeMap::new(),
            next_seq: 0,
            clock: Instant::now(),
        }
    }

    /// Current virtual time
    pub fn now(&self) -> Instant {
        self.clock
    }

    /// Move the clock forward to `now` (never backwards)
    pub fn advance_to(&mut self, now: Instant) {
        if now > self.clock {
            self.clock = now;
        }
    }

    /// Queue a task to run as soon as possible
    pub fn defer(&mut self, task: Task) {
        self.defer_after(Duration::ZERO, task);
    }

    /// Queue a task to run `delay` after the current virtual time
    pub fn defer_after(&mut self, delay: Duration, task: Task) {
        let due = self.clock + delay;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.insert((due, seq), task);
    }

    /// Deadline of the earliest queued task
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    /// Remove the earliest task if it is due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<Task> {
        self.advance_to(now);
        let key = *self.queue.keys().next()?;
        if key.0 > self.clock {
            return None;
        }
        self.queue.remove(&key)
    }

    /// Remove the earliest task regardless of its deadline, advancing the
    /// clock to it
    pub fn pop_next(&mut self) -> Option<Task> {
        let (due, seq) = *self.queue.keys().next()?;
        self.advance_to(due);
        self.queue.remove(&(due, seq))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.queue.len())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Task {
        Box::new(|_| {})
    }

    #[test]
    fn test_deadline_order_then_fifo() {
        let mut scheduler = Scheduler::new();
        let start = scheduler.now();
        scheduler.defer_after(Duration::from_millis(50), noop());
        scheduler.defer(noop());
        scheduler.defer(noop());

        let keys: Vec<_> = scheduler.queue.keys().copied().collect();
        assert_eq!(keys[0], (start, 1));
        assert_eq!(keys[1], (start, 2));
        assert_eq!(keys[2], (start + Duration::from_millis(50), 0));
    }

    #[test]
    fn test_pop_due_respects_deadline() {
        let mut scheduler = Scheduler::new();
        let start = scheduler.now();
        scheduler.defer_after(Duration::from_secs(1), noop());

        assert!(scheduler.pop_due(start).is_none());
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.pop_due(start + Duration::from_secs(1)).is_some());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_pop_next_advances_virtual_clock() {
        let mut scheduler = Scheduler::new();
        let start = scheduler.now();
        scheduler.defer_after(Duration::from_secs(3), noop());

        assert!(scheduler.pop_next().is_some());
        assert_eq!(scheduler.now(), start + Duration::from_secs(3));

        // Work queued from a late task is ordered after it, not before
        scheduler.defer(noop());
        assert_eq!(scheduler.next_deadline(), Some(start + Duration::from_secs(3)));
    }

    #[test]
    fn test_clock_never_moves_backwards() {
        let mut scheduler = Scheduler::new();
        let start = scheduler.now();
        scheduler.advance_to(start + Duration::from_secs(5));
        scheduler.advance_to(start);
        assert_eq!(scheduler.now(), start + Duration::from_secs(5));
    }
}
