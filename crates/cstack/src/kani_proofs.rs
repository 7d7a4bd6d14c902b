//! Kani proof harnesses for the concurrent stack.
//!
//! These harnesses use bounded model checking to verify sequential
//! properties of the stack for all inputs up to a bound.
//!
//! ```bash
//! cargo kani -p cstack
//! cargo kani -p cstack --harness proof_pop_returns_pushed_value
//! ```
//!
//! Kani does not explore thread interleavings; the loom tests in
//! `stack.rs` cover concurrent behaviour.

#[cfg(kani)]
mod proofs {
    use crate::stack::ConcurrentStack;

    /// A pushed value is reachable and counted.
    #[kani::proof]
    #[kani::unwind(5)]
    fn proof_push_preserves_elements() {
        let stack = ConcurrentStack::new();
        let value: u64 = kani::any();

        stack.push(value);

        let (len, contents) = stack.snapshot();
        kani::assert(len == 1, "len must be 1 after one push");
        kani::assert(contents == [value], "Pushed value must be the only content");
    }

    /// Pop returns the value just pushed and leaves the stack empty.
    #[kani::proof]
    #[kani::unwind(5)]
    fn proof_pop_returns_pushed_value() {
        let stack = ConcurrentStack::new();
        let value: u64 = kani::any();

        stack.push(value);
        let popped = stack.pop();

        kani::assert(popped == Some(value), "Pop must return the pushed value");
        kani::assert(stack.is_empty(), "Stack must be empty after the pop");
        kani::assert(stack.pop().is_none(), "Second pop must report empty");
    }

    /// Two pushes pop in reverse order.
    #[kani::proof]
    #[kani::unwind(5)]
    fn proof_lifo_two_elements() {
        let stack = ConcurrentStack::new();
        let a: u64 = kani::any();
        let b: u64 = kani::any();

        stack.push(a);
        stack.push(b);

        kani::assert(stack.pop() == Some(b), "First pop must return b");
        kani::assert(stack.pop() == Some(a), "Second pop must return a");
    }

    /// Peek is idempotent and does not change the length.
    #[kani::proof]
    #[kani::unwind(5)]
    fn proof_peek_is_stable() {
        let stack = ConcurrentStack::new();
        let value: u64 = kani::any();
        let push: bool = kani::any();

        if push {
            stack.push(value);
        }

        let first = stack.peek();
        let second = stack.peek();
        kani::assert(first == second, "Consecutive peeks must agree");
        kani::assert(stack.len() == usize::from(push), "Peek must not change len");
    }
}
