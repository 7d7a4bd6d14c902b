//! History-recording wrapper for property checking.

use cstack_core::{StackHistory, StackProperties};

use crate::stack::ConcurrentStack;
use crate::sync::{lock, Mutex};

/// A `ConcurrentStack<u64>` that records every operation it performs.
///
/// The tracker lock is taken before the stack operation and released after
/// it is recorded, so the history is in the exact order the operations took
/// effect. This serializes tracked operations; use the plain
/// [`ConcurrentStack`] when measuring contention.
pub struct TrackedStack {
    stack: ConcurrentStack<u64>,
    tracker: Mutex<StackTracker>,
}

/// Tracking state for property verification.
#[derive(Default)]
struct StackTracker {
    pushed: Vec<u64>,
    popped: Vec<u64>,
    history: StackHistory,
}

impl TrackedStack {
    /// Create a new empty tracked stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stack: ConcurrentStack::new(),
            tracker: Mutex::new(StackTracker::default()),
        }
    }

    /// Push `value`, attributing the operation to `thread_id`.
    pub fn push(&self, thread_id: u64, value: u64) {
        let mut tracker = lock(&self.tracker);
        self.stack.push(value);
        tracker.pushed.push(value);
        tracker.history.record_push(thread_id, value);
    }

    /// Pop, attributing the operation to `thread_id`.
    pub fn pop(&self, thread_id: u64) -> Option<u64> {
        let mut tracker = lock(&self.tracker);
        let value = self.stack.pop();
        if let Some(v) = value {
            tracker.popped.push(v);
        }
        tracker.history.record_pop(thread_id, value);
        value
    }

    /// Peek, attributing the operation to `thread_id`.
    pub fn peek(&self, thread_id: u64) -> Option<u64> {
        let mut tracker = lock(&self.tracker);
        let value = self.stack.peek();
        tracker.history.record_peek(thread_id, value);
        value
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Number of operations recorded so far.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        lock(&self.tracker).history.operations.len()
    }
}

impl Default for TrackedStack {
    fn default() -> Self {
        Self::new()
    }
}

impl StackProperties for TrackedStack {
    fn pushed_elements(&self) -> Vec<u64> {
        lock(&self.tracker).pushed.clone()
    }

    fn popped_elements(&self) -> Vec<u64> {
        lock(&self.tracker).popped.clone()
    }

    fn current_contents(&self) -> Vec<u64> {
        self.stack.snapshot().1
    }

    fn recorded_len(&self) -> usize {
        self.stack.snapshot().0
    }

    fn history(&self) -> StackHistory {
        lock(&self.tracker).history.clone()
    }
}
