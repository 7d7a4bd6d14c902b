//! Invariant traits for concurrent stacks.
//!
//! - `stack`: NoLostElements, NoDuplicates, CountConsistent, LIFO_Order, PeekConsistent

pub mod stack;
