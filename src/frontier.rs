//! Frontier queues holding states between breadth-first levels.
//!
//! The search driver only talks to the `Frontier` trait. `LevelQueue` is the implementation
//! used by the solver: a FIFO with a per-level barrier, safe to share between any number of
//! workers.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::engine::State;

/// How long a blocked `pop` sleeps before it looks at the stop flag again.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Something that belongs to a breadth-first level.
pub trait Leveled {
    fn level(&self) -> u32;
}

impl<const N: usize, const M: usize> Leveled for State<N, M> {
    fn level(&self) -> u32 {
        self.depth()
    }
}

/// A queue of pending search items shared by all workers.
///
/// Every item handed out by `pop` counts as in flight until the worker calls `task_done`
/// for it, after it has pushed all of that item's successors.
pub trait Frontier<T>: Sync {
    /// Adds an item at the back of the queue.
    fn push(&self, item: T);

    /// Takes the next item, blocking while none can be handed out yet.
    ///
    /// # Returns
    /// * `Some(item)` when an item is available.
    /// * `None` once `stop` has been set, or when the queue is empty with nothing in flight
    ///   (no further item can ever arrive).
    fn pop(&self, stop: &AtomicBool) -> Option<T>;

    /// Marks one previously popped item as fully processed.
    fn task_done(&self);

    /// Discards every pending item. Items already in flight are unaffected.
    fn clear(&self);

    /// Number of pending items.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct Inner<T> {
    items: VecDeque<T>,
    level: u32,
    in_flight: usize,
}

/// A FIFO frontier with a per-level barrier.
///
/// An item of a deeper level than the one currently being processed is not handed out until
/// every in-flight item has been marked done. With several workers this keeps the traversal in
/// strict level order: when a level opens, the previous one has been completely expanded, and
/// any solution found on it has already been reported.
///
/// # Examples
/// ```
/// use hanoi_solver::engine::State;
/// use hanoi_solver::frontier::{Frontier, LevelQueue};
/// use std::sync::atomic::AtomicBool;
///
/// let queue = LevelQueue::new();
/// let stop = AtomicBool::new(false);
/// queue.push(State::<3, 2>::initial());
///
/// let state = queue.pop(&stop).unwrap();
/// queue.push(state.transition(0, 1));
/// queue.task_done();
///
/// assert_eq!(queue.pop(&stop).unwrap().depth(), 1);
/// queue.task_done();
/// assert!(queue.pop(&stop).is_none()); // exhausted
/// ```
#[derive(Debug)]
pub struct LevelQueue<T> {
    inner: Mutex<Inner<T>>,
    changed: Condvar,
}

impl<T: Leveled> LevelQueue<T> {
    /// Creates an empty queue positioned at level 0.
    pub fn new() -> Self {
        LevelQueue {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                level: 0,
                in_flight: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// The deepest level handed out so far.
    pub fn level(&self) -> u32 {
        self.lock().level
    }

    /// Number of popped items not yet marked done.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // A worker that panics while holding the lock leaves the queue itself consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Leveled> Default for LevelQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Leveled + Send> Frontier<T> for LevelQueue<T> {
    fn push(&self, item: T) {
        self.lock().items.push_back(item);
        self.changed.notify_one();
    }

    fn pop(&self, stop: &AtomicBool) -> Option<T> {
        let mut inner = self.lock();
        loop {
            if stop.load(Ordering::Acquire) {
                return None;
            }
            match inner.items.front().map(Leveled::level) {
                Some(level) if level <= inner.level || inner.in_flight == 0 => {
                    inner.level = inner.level.max(level);
                    inner.in_flight += 1;
                    return inner.items.pop_front();
                }
                None if inner.in_flight == 0 => return None,
                _ => {}
            }
            inner = self
                .changed
                .wait_timeout(inner, STOP_POLL_INTERVAL)
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .0;
        }
    }

    fn task_done(&self) {
        let mut inner = self.lock();
        debug_assert!(inner.in_flight > 0, "task_done without a matching pop");
        inner.in_flight = inner.in_flight.saturating_sub(1);
        if inner.in_flight == 0 {
            // The barrier may open, or the queue may now be exhausted.
            self.changed.notify_all();
        }
    }

    fn clear(&self) {
        self.lock().items.clear();
        self.changed.notify_all();
    }

    fn len(&self) -> usize {
        self.lock().items.len()
    }
}
