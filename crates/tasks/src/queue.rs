//! The single in-memory queue ordering all pending work by release time.

use crate::{now_ms, WorkItem};
use parking_lot::Mutex;
use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    sync::atomic::{AtomicU64, Ordering as AtomicOrdering},
    time::Duration,
};

/// The sleep applied when the queue head is not yet due.
const NOT_DUE_SLEEP: Duration = Duration::from_secs(1);

struct Entry {
    time_lock: u64,
    seq: u64,
    item: WorkItem,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.time_lock == other.time_lock && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.time_lock, self.seq).cmp(&(other.time_lock, other.seq))
    }
}

/// A min-heap of work items keyed by `(time_lock, seq)`; the monotone
/// sequence breaks ties deterministically.
///
/// One mutex guards the heap: scanners and handlers push, the task manager
/// pops. Starvation is impossible since every item carries an absolute
/// release timestamp.
#[derive(Default)]
pub struct EventQueue {
    heap: Mutex<BinaryHeap<Reverse<Entry>>>,
    seq: AtomicU64,
}

impl EventQueue {
    /// Returns an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a work item, keyed by its current `time_lock`.
    pub fn push(&self, item: WorkItem) {
        let entry = Entry {
            time_lock: item.time_lock(),
            seq: self.seq.fetch_add(1, AtomicOrdering::Relaxed),
            item,
        };
        self.heap.lock().push(Reverse(entry));
    }

    /// Pops the next matured item, sleeping while the head is not yet due.
    ///
    /// A non-due head is re-inserted rather than held, so items pushed while
    /// sleeping can overtake it.
    pub async fn pop_matured(&self) -> WorkItem {
        loop {
            let head = {
                let mut heap = self.heap.lock();
                match heap.pop() {
                    Some(Reverse(entry)) if entry.time_lock <= now_ms() => Some(entry.item),
                    Some(entry) => {
                        heap.push(entry);
                        None
                    }
                    None => None,
                }
            };
            match head {
                Some(item) => return item,
                None => tokio::time::sleep(NOT_DUE_SLEEP).await,
            }
        }
    }

    /// Pops the head regardless of maturity. Test inspection only.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn pop_now(&self) -> Option<WorkItem> {
        self.heap.lock().pop().map(|Reverse(entry)| entry.item)
    }

    /// The number of pending items.
    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    /// Whether no item is pending.
    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len())
            .field("seq", &self.seq.load(AtomicOrdering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PeriodicKind, PeriodicTask};

    fn periodic_at(time_lock: u64) -> WorkItem {
        WorkItem::Periodic(PeriodicTask::new(PeriodicKind::Heartbeat, 30_000, time_lock))
    }

    #[tokio::test]
    async fn test_pop_orders_by_time_lock() {
        let queue = EventQueue::new();
        queue.push(periodic_at(30));
        queue.push(periodic_at(10));
        queue.push(periodic_at(20));

        assert_eq!(queue.pop_matured().await.time_lock(), 10);
        assert_eq!(queue.pop_matured().await.time_lock(), 20);
        assert_eq!(queue.pop_matured().await.time_lock(), 30);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_ties_break_by_insertion_order() {
        let queue = EventQueue::new();
        let mut a = PeriodicTask::new(PeriodicKind::Heartbeat, 1, 5);
        let b = PeriodicTask::new(PeriodicKind::RoundProbe, 1, 5);
        a.period_ms = 111;
        queue.push(WorkItem::Periodic(a));
        queue.push(WorkItem::Periodic(b));

        match queue.pop_matured().await {
            WorkItem::Periodic(task) => assert_eq!(task.period_ms, 111),
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pop_never_returns_unmatured_items() {
        let queue = EventQueue::new();
        let future = now_ms() + 60_000;
        queue.push(periodic_at(future));
        queue.push(periodic_at(0));

        let popped = queue.pop_matured().await;
        assert!(popped.time_lock() <= now_ms());
        // the future item stays queued.
        assert_eq!(queue.len(), 1);
    }
}
