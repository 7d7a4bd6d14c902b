//! # cstack
//!
//! A generic, thread-safe, unbounded LIFO stack guarded by a single mutex.
//!
//! - `ConcurrentStack<T>`: push / pop / peek, each one short critical section
//! - `StackError`: the empty-stack condition as a typed error
//! - `TrackedStack`: a `u64` stack that records its history so the
//!   properties in `cstack-core` can be checked against it
//!
//! Pop and peek on an empty stack return immediately with `None`
//! (or `Err(StackError::Empty)` from the `try_` variants); nothing blocks
//! waiting for a value.
//!
//! # Verification
//!
//! ```bash
//! cargo test -p cstack
//! RUSTFLAGS="--cfg loom" cargo test -p cstack --release --lib
//! cargo kani -p cstack
//! ```

pub mod error;
pub mod kani_proofs;
pub mod stack;
pub mod tracked;

mod sync;

pub use error::StackError;
pub use stack::ConcurrentStack;
pub use tracked::TrackedStack;
