//! Mutex-guarded LIFO stack.
//!
//! # Invariants
//!
//! | Property | Enforced By |
//! |----------|-------------|
//! | len equals reachable nodes | `Inner::push`/`Inner::pop` are the only mutators |
//! | top is `None` iff len is 0 | same |
//! | No cycles, no sharing | each node owns its predecessor through a `Box` |
//! | Linearizability | every operation runs inside one critical section |
//! | At-most-once delivery | `pop` moves the value out of the unlinked node |
//!
//! # Locking
//!
//! One lock per stack, held for exactly the pointer/count update or read.
//! The guard is scoped, so it is released on every exit path, including
//! `pop`/`peek` on an empty stack. Tracing events are emitted after the
//! guard is dropped.

use std::fmt;

use tracing::trace;

use crate::error::StackError;
use crate::sync::{lock, Mutex};

/// A thread-safe, unbounded last-in-first-out stack.
///
/// Every operation acquires the stack's own lock, performs O(1) work, and
/// releases it. Operations never wait for another thread to push or pop:
/// an empty stack is reported immediately.
///
/// ```
/// use cstack::ConcurrentStack;
///
/// let stack = ConcurrentStack::new();
/// stack.push("a");
/// stack.push("b");
/// assert_eq!(stack.peek(), Some("b"));
/// assert_eq!(stack.pop(), Some("b"));
/// assert_eq!(stack.pop(), Some("a"));
/// assert_eq!(stack.pop(), None);
/// ```
pub struct ConcurrentStack<T> {
    inner: Mutex<Inner<T>>,
}

/// State guarded by the stack's lock.
struct Inner<T> {
    /// Most recently pushed node
    top: Option<Box<Node<T>>>,
    /// Number of nodes reachable from `top`
    len: usize,
}

/// Node in the stack.
struct Node<T> {
    value: T,
    /// Node pushed immediately before this one
    prev: Option<Box<Node<T>>>,
}

impl<T> Inner<T> {
    const fn new() -> Self {
        Self { top: None, len: 0 }
    }

    /// Only meaningful while the caller holds the lock.
    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push(&mut self, value: T) {
        let prev = self.top.take();
        self.top = Some(Box::new(Node { value, prev }));
        self.len += 1;
    }

    fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            debug_assert!(self.top.is_none(), "len is 0 but top is set");
            return None;
        }

        let node = self.top.take()?;
        let Node { value, prev } = *node;
        self.top = prev;
        self.len -= 1;
        Some(value)
    }

    fn top(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.top.as_deref().map(|node| &node.value)
    }

    /// Walk the chain from top to bottom.
    fn values(&self) -> impl Iterator<Item = &T> {
        std::iter::successors(self.top.as_deref(), |node| node.prev.as_deref())
            .map(|node| &node.value)
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        // Unlink iteratively: the default recursive drop of a long
        // `Box` chain overflows the thread's stack.
        let mut current = self.top.take();
        while let Some(mut node) = current {
            current = node.prev.take();
        }
    }
}

impl<T> ConcurrentStack<T> {
    /// Create a new empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Push a value onto the top of the stack.
    pub fn push(&self, value: T) {
        let len = {
            let mut inner = lock(&self.inner);
            inner.push(value);
            inner.len
        };
        trace!(len, "push");
    }

    /// Remove and return the top value, or `None` if the stack is empty.
    ///
    /// A value returned here is never returned by any other `pop` or `peek`.
    pub fn pop(&self) -> Option<T> {
        let (value, len) = {
            let mut inner = lock(&self.inner);
            let value = inner.pop();
            (value, inner.len)
        };

        if value.is_some() {
            trace!(len, "pop");
        } else {
            trace!("pop on empty stack");
        }
        value
    }

    /// Like [`pop`](Self::pop), reporting the empty condition as an error.
    pub fn try_pop(&self) -> Result<T, StackError> {
        self.pop().ok_or(StackError::Empty)
    }

    /// Run `f` on the top value without removing it.
    ///
    /// `f` runs while the lock is held, so it should be short and must not
    /// touch this stack.
    pub fn peek_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let (result, len) = {
            let inner = lock(&self.inner);
            (inner.top().map(f), inner.len)
        };

        if result.is_some() {
            trace!(len, "peek");
        } else {
            trace!("peek on empty stack");
        }
        result
    }

    /// Number of values currently stored.
    ///
    /// This is a snapshot: other threads may change it immediately after.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).len
    }

    /// Check if the stack is empty. Snapshot, like [`len`](Self::len).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }

    /// Consume the stack, returning the remaining values from top to bottom.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        let mut inner = self
            .inner
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut values = Vec::with_capacity(inner.len);
        while let Some(value) = inner.pop() {
            values.push(value);
        }
        values
    }

    /// The recorded length and the values reachable from top, read under
    /// one acquisition of the lock.
    pub(crate) fn snapshot(&self) -> (usize, Vec<T>)
    where
        T: Clone,
    {
        let inner = lock(&self.inner);
        (inner.len, inner.values().cloned().collect())
    }
}

impl<T: Clone> ConcurrentStack<T> {
    /// Return a clone of the top value, or `None` if the stack is empty.
    ///
    /// Does not change the stack.
    pub fn peek(&self) -> Option<T> {
        self.peek_with(T::clone)
    }

    /// Like [`peek`](Self::peek), reporting the empty condition as an error.
    pub fn try_peek(&self) -> Result<T, StackError> {
        self.peek().ok_or(StackError::Empty)
    }
}

impl<T> Default for ConcurrentStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ConcurrentStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentStack")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::thread;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<StdMutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_traces(f: impl FnOnce()) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .without_time()
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_every_operation_traces_its_length() {
        let logs = capture_traces(|| {
            let stack = ConcurrentStack::new();
            stack.push(1);
            stack.push(2);
            assert_eq!(stack.peek(), Some(2));
            assert_eq!(stack.pop(), Some(2));
            assert_eq!(stack.peek_with(|v| *v), Some(1));
        });

        let lines: Vec<&str> = logs.lines().collect();
        assert_eq!(lines.len(), 5, "{}", logs);
        assert!(lines[1].contains("push len=2"), "{}", logs);
        assert!(lines[2].contains("peek len=2"), "{}", logs);
        assert!(lines[3].contains("pop len=1"), "{}", logs);
        assert!(lines[4].contains("peek len=1"), "{}", logs);
    }

    #[test]
    fn test_basic_push_pop() {
        let stack = ConcurrentStack::new();

        stack.push(1);
        stack.push(2);
        stack.push(3);

        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn test_fresh_stack_is_always_empty() {
        let stack: ConcurrentStack<u64> = ConcurrentStack::default();

        for _ in 0..3 {
            assert_eq!(stack.pop(), None);
            assert_eq!(stack.peek(), None);
            assert_eq!(stack.try_pop(), Err(StackError::Empty));
            assert_eq!(stack.try_peek(), Err(StackError::Empty));
        }
        assert!(stack.is_empty());
        assert_eq!(stack.len(), 0);
    }

    #[test]
    fn test_peek_does_not_mutate() {
        let stack = ConcurrentStack::new();
        stack.push(10);
        stack.push(20);

        assert_eq!(stack.peek(), Some(20));
        assert_eq!(stack.peek(), Some(20));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop(), Some(20));
        assert_eq!(stack.peek(), Some(10));
    }

    #[test]
    fn test_size_transitions() {
        let stack = ConcurrentStack::new();
        const N: usize = 50;

        for i in 0..N {
            assert_eq!(stack.len(), i);
            stack.push(i);
        }
        assert_eq!(stack.len(), N);

        for i in (0..N).rev() {
            assert_eq!(stack.pop(), Some(i));
            assert_eq!(stack.len(), i);
        }
        assert!(stack.is_empty());
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn test_stored_none_is_not_empty() {
        let stack: ConcurrentStack<Option<u8>> = ConcurrentStack::new();
        stack.push(None);

        assert_eq!(stack.peek(), Some(None));
        assert_eq!(stack.pop(), Some(None));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn test_peek_with_non_clone_value() {
        struct Token(u32);

        let stack = ConcurrentStack::new();
        assert_eq!(stack.peek_with(|t: &Token| t.0), None);

        stack.push(Token(7));
        assert_eq!(stack.peek_with(|t| t.0), Some(7));
        assert_eq!(stack.pop().map(|t| t.0), Some(7));
    }

    #[test]
    fn test_try_ops_propagate_with_question_mark() {
        fn top_two(stack: &ConcurrentStack<u32>) -> Result<(u32, u32), StackError> {
            let a = stack.try_pop()?;
            let b = stack.try_peek()?;
            Ok((a, b))
        }

        let stack = ConcurrentStack::new();
        stack.push(1);
        assert_eq!(top_two(&stack), Err(StackError::Empty));

        stack.push(1);
        stack.push(2);
        assert_eq!(top_two(&stack), Ok((2, 1)));
        assert_eq!(StackError::Empty.to_string(), "stack is empty");
    }

    #[test]
    fn test_into_vec_top_to_bottom() {
        let stack = ConcurrentStack::new();
        for i in 1..=4 {
            stack.push(i);
        }
        assert_eq!(stack.into_vec(), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_snapshot_matches_len() {
        let stack = ConcurrentStack::new();
        stack.push('a');
        stack.push('b');

        let (len, values) = stack.snapshot();
        assert_eq!(len, 2);
        assert_eq!(values, vec!['b', 'a']);
    }

    #[test]
    fn test_drop_long_chain() {
        let stack = ConcurrentStack::new();
        for i in 0..200_000u64 {
            stack.push(i);
        }
        drop(stack);
    }

    #[test]
    fn test_drop_releases_values() {
        let marker = Arc::new(());
        let stack = ConcurrentStack::new();
        for _ in 0..10 {
            stack.push(Arc::clone(&marker));
        }
        assert_eq!(Arc::strong_count(&marker), 11);

        drop(stack.pop());
        assert_eq!(Arc::strong_count(&marker), 10);

        drop(stack);
        assert_eq!(Arc::strong_count(&marker), 1);
    }

    #[test]
    fn test_lock_released_after_empty_pop() {
        let stack = Arc::new(ConcurrentStack::new());
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.peek(), None);

        // Another thread must still be able to take the lock.
        let s = Arc::clone(&stack);
        thread::spawn(move || s.push(5)).join().unwrap();
        assert_eq!(stack.pop(), Some(5));
    }

    #[test]
    fn test_usable_after_panic_in_peek_closure() {
        let stack = Arc::new(ConcurrentStack::new());
        stack.push(1);

        let s = Arc::clone(&stack);
        let result = thread::spawn(move || {
            s.peek_with(|_| panic!("inspector failed"));
        })
        .join();
        assert!(result.is_err());

        stack.push(2);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = ConcurrentStack::new();
        let b = ConcurrentStack::new();
        a.push(1);

        // Holding a's lock through peek_with does not block b.
        a.peek_with(|_| {
            b.push(2);
            assert_eq!(b.pop(), Some(2));
        });
        assert_eq!(a.pop(), Some(1));
        assert!(b.is_empty());
    }

    #[test]
    fn test_concurrent_push_pop() {
        let stack = Arc::new(ConcurrentStack::new());
        let mut push_handles = vec![];
        let mut pop_handles = vec![];

        for i in 0..4u64 {
            let stack = Arc::clone(&stack);
            push_handles.push(thread::spawn(move || {
                for j in 0..100 {
                    stack.push(i * 1000 + j);
                }
            }));
        }

        for _ in 0..4 {
            let stack = Arc::clone(&stack);
            pop_handles.push(thread::spawn(move || {
                let mut popped = Vec::new();
                for _ in 0..100 {
                    if let Some(v) = stack.pop() {
                        popped.push(v);
                    }
                }
                popped
            }));
        }

        for handle in push_handles {
            handle.join().unwrap();
        }

        let mut all: Vec<u64> = Vec::new();
        for handle in pop_handles {
            all.extend(handle.join().unwrap());
        }
        while let Some(v) = stack.pop() {
            all.push(v);
        }

        all.sort_unstable();
        let mut expected: Vec<u64> = (0..4u64)
            .flat_map(|i| (0..100).map(move |j| i * 1000 + j))
            .collect();
        expected.sort_unstable();
        assert_eq!(all, expected, "Lost or duplicated elements");
    }
}

/// Loom tests - these exhaustively check all interleavings
#[cfg(loom)]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn test_push_push() {
        loom::model(|| {
            let stack = Arc::new(ConcurrentStack::new());

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);

            let h1 = thread::spawn(move || s1.push(1));
            let h2 = thread::spawn(move || s2.push(2));

            h1.join().unwrap();
            h2.join().unwrap();

            assert_eq!(stack.len(), 2);
            let mut values = vec![];
            while let Some(v) = stack.pop() {
                values.push(v);
            }
            values.sort_unstable();
            assert_eq!(values, vec![1, 2]);
        });
    }

    #[test]
    fn test_push_pop() {
        loom::model(|| {
            let stack = Arc::new(ConcurrentStack::new());
            stack.push(1);

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);

            let h1 = thread::spawn(move || s1.push(2));
            let h2 = thread::spawn(move || s2.pop());

            h1.join().unwrap();
            let popped = h2.join().unwrap();

            // Either value depending on interleaving, never empty
            assert!(matches!(popped, Some(1) | Some(2)));

            let remaining = stack.pop();
            assert!(remaining.is_some());
            assert_ne!(remaining, popped);
            assert_eq!(stack.pop(), None);
        });
    }

    #[test]
    fn test_concurrent_pop() {
        loom::model(|| {
            let stack = Arc::new(ConcurrentStack::new());
            stack.push(1);

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);

            let h1 = thread::spawn(move || s1.pop());
            let h2 = thread::spawn(move || s2.pop());

            let r1 = h1.join().unwrap();
            let r2 = h2.join().unwrap();

            // Exactly one should get the value
            match (r1, r2) {
                (Some(1), None) | (None, Some(1)) => {}
                other => panic!("Unexpected result: {:?}", other),
            }
        });
    }

    #[test]
    fn test_peek_sees_pushed_or_empty() {
        loom::model(|| {
            let stack = Arc::new(ConcurrentStack::new());

            let s1 = Arc::clone(&stack);
            let h1 = thread::spawn(move || s1.push(7));

            let peeked = stack.peek();
            h1.join().unwrap();

            assert!(matches!(peeked, None | Some(7)));
            assert_eq!(stack.peek(), Some(7));
            assert_eq!(stack.len(), 1);
        });
    }
}
