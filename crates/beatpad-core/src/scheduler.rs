//! Cancellable delayed actions on a logical millisecond timeline.
//!
//! A [`Scheduler`] holds actions registered with [`Scheduler::after`] in a
//! min-heap keyed by due time. Nothing ever fires from inside `after`: the
//! owner drains due entries with [`Scheduler::pop_due`] and routes each
//! action itself. Cancellation removes the pending action immediately, so a
//! cancelled entry can never be returned again; its heap slot is discarded
//! lazily.
//!
//! While an entry is being popped, logical time is set to its due instant.
//! Anything scheduled while handling that entry is therefore relative to
//! when it was *supposed* to fire, not to when the host loop got around to
//! it.

use crate::timing::Millis;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Token for one pending delayed action.
///
/// Handles are never reused within a scheduler, so a stale handle can be
/// cancelled safely at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Raw id, mostly useful for logging.
    pub fn id(self) -> u64 {
        self.0
    }
}

/// An action whose due time has been reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Fired<A> {
    /// Handle returned when the action was registered.
    pub handle: TimerHandle,
    /// Instant the action was due.
    pub due: Millis,
    /// The registered action.
    pub action: A,
}

#[derive(Debug)]
struct Pending<A> {
    due: Millis,
    action: A,
}

/// Logical-time timer queue.
#[derive(Debug)]
pub struct Scheduler<A> {
    now: Millis,
    next_id: u64,
    /// (due, id): ids grow monotonically, so equal due times pop in
    /// registration order.
    queue: BinaryHeap<Reverse<(Millis, u64)>>,
    pending: HashMap<u64, Pending<A>>,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Scheduler<A> {
    /// Create an empty scheduler at time 0.
    pub fn new() -> Self {
        Self {
            now: 0,
            next_id: 1,
            queue: BinaryHeap::new(),
            pending: HashMap::new(),
        }
    }

    /// Current logical time.
    pub fn now(&self) -> Millis {
        self.now
    }

    /// Register `action` to fire `delay_ms` after the current logical time.
    ///
    /// A zero delay is still deferred to the next [`pop_due`](Self::pop_due).
    pub fn after(&mut self, delay_ms: Millis, action: A) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        let due = self.now.saturating_add(delay_ms);
        self.queue.push(Reverse((due, id)));
        self.pending.insert(id, Pending { due, action });
        TimerHandle(id)
    }

    /// Cancel a pending action.
    ///
    /// Returns `false` when the handle already fired or was already
    /// cancelled; that case is not an error.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.pending.remove(&handle.0).is_some()
    }

    /// Whether the action behind `handle` is still waiting to fire.
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.contains_key(&handle.0)
    }

    /// Due time of a pending action.
    pub fn due_at(&self, handle: TimerHandle) -> Option<Millis> {
        self.pending.get(&handle.0).map(|p| p.due)
    }

    /// Number of actions waiting to fire.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Sorted due times of all pending actions.
    pub fn deadlines(&self) -> Vec<Millis> {
        let mut deadlines: Vec<Millis> = self.pending.values().map(|p| p.due).collect();
        deadlines.sort_unstable();
        deadlines
    }

    /// Earliest due time among pending actions.
    pub fn next_deadline(&mut self) -> Option<Millis> {
        self.discard_cancelled();
        self.queue.peek().map(|Reverse((due, _))| *due)
    }

    /// Pop the next action due at or before `until`.
    ///
    /// Logical time moves to the popped entry's due instant (never
    /// backwards). Returns `None` once nothing else is due; call
    /// [`advance_to`](Self::advance_to) afterwards to settle time at `until`.
    pub fn pop_due(&mut self, until: Millis) -> Option<Fired<A>> {
        loop {
            let Reverse((due, id)) = *self.queue.peek()?;
            if due > until {
                return None;
            }
            self.queue.pop();
            // Cancelled entries leave a stale heap slot behind.
            if let Some(pending) = self.pending.remove(&id) {
                self.now = self.now.max(pending.due);
                log::trace!("[SCHEDULER] timer {} fired at {}ms", id, pending.due);
                return Some(Fired {
                    handle: TimerHandle(id),
                    due: pending.due,
                    action: pending.action,
                });
            }
        }
    }

    /// Move logical time forward to `now` without firing anything.
    pub fn advance_to(&mut self, now: Millis) {
        self.now = self.now.max(now);
    }

    /// Cancel everything. Returns how many actions were still pending.
    pub fn clear(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        self.queue.clear();
        cancelled
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse((_, id))) = self.queue.peek() {
            if self.pending.contains_key(id) {
                break;
            }
            self.queue.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(scheduler: &mut Scheduler<&'static str>, until: Millis) -> Vec<(Millis, &'static str)> {
        let mut fired = Vec::new();
        while let Some(f) = scheduler.pop_due(until) {
            fired.push((f.due, f.action));
        }
        scheduler.advance_to(until);
        fired
    }

    #[test]
    fn test_fires_in_due_order() {
        let mut scheduler = Scheduler::new();
        scheduler.after(300, "c");
        scheduler.after(100, "a");
        scheduler.after(200, "b");

        assert_eq!(drain(&mut scheduler, 250), vec![(100, "a"), (200, "b")]);
        assert_eq!(scheduler.now(), 250);
        assert_eq!(drain(&mut scheduler, 1000), vec![(300, "c")]);
    }

    #[test]
    fn test_never_fires_early() {
        let mut scheduler = Scheduler::new();
        scheduler.advance_to(40);
        scheduler.after(100, "x");
        assert!(drain(&mut scheduler, 139).is_empty());
        assert_eq!(drain(&mut scheduler, 140), vec![(140, "x")]);
    }

    #[test]
    fn test_zero_delay_is_deferred() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.after(0, "now");
        // Registering does not run anything.
        assert!(scheduler.is_pending(handle));
        assert_eq!(drain(&mut scheduler, 0), vec![(0, "now")]);
        assert!(!scheduler.is_pending(handle));
    }

    #[test]
    fn test_same_due_time_keeps_registration_order() {
        let mut scheduler = Scheduler::new();
        scheduler.after(10, "first");
        scheduler.after(10, "second");
        scheduler.after(10, "third");
        let fired: Vec<_> = drain(&mut scheduler, 10).into_iter().map(|(_, a)| a).collect();
        assert_eq!(fired, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_cancelled_action_never_fires() {
        let mut scheduler = Scheduler::new();
        let keep = scheduler.after(50, "keep");
        let dropped = scheduler.after(50, "drop");
        assert!(scheduler.cancel(dropped));
        assert_eq!(drain(&mut scheduler, 100), vec![(50, "keep")]);
        assert!(!scheduler.is_pending(keep));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.after(10, "once");
        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        assert!(drain(&mut scheduler, 100).is_empty());

        let fired = scheduler.after(10, "fired");
        assert_eq!(drain(&mut scheduler, 200).len(), 1);
        // Cancelling after firing is a no-op as well.
        assert!(!scheduler.cancel(fired));
        assert!(!scheduler.cancel(fired));
    }

    #[test]
    fn test_time_follows_popped_entry() {
        let mut scheduler = Scheduler::new();
        scheduler.after(100, "tick");
        let fired = scheduler.pop_due(1000).unwrap();
        assert_eq!(fired.due, 100);
        assert_eq!(scheduler.now(), 100);

        // Scheduling from inside a fired action is relative to its due time.
        let next = scheduler.after(100, "tock");
        assert_eq!(scheduler.due_at(next), Some(200));
        assert_eq!(drain(&mut scheduler, 1000), vec![(200, "tock")]);
    }

    #[test]
    fn test_next_deadline_skips_cancelled() {
        let mut scheduler = Scheduler::new();
        let early = scheduler.after(10, "early");
        scheduler.after(20, "late");
        assert_eq!(scheduler.next_deadline(), Some(10));
        scheduler.cancel(early);
        assert_eq!(scheduler.next_deadline(), Some(20));
        assert_eq!(scheduler.deadlines(), vec![20]);
    }

    #[test]
    fn test_clear_cancels_everything() {
        let mut scheduler = Scheduler::new();
        scheduler.after(10, "a");
        scheduler.after(20, "b");
        assert_eq!(scheduler.clear(), 2);
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(scheduler.next_deadline(), None);
        assert!(drain(&mut scheduler, 100).is_empty());
    }
}
