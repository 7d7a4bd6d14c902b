//! Lock primitives, swapped for loom's model-checked versions under `--cfg loom`.

use std::sync::PoisonError;

#[cfg(loom)]
pub(crate) use loom::sync::{Mutex, MutexGuard};

#[cfg(not(loom))]
pub(crate) use std::sync::{Mutex, MutexGuard};

/// Acquire `mutex`, recovering the guard if a previous holder panicked.
///
/// Every critical section in this crate leaves the guarded state consistent
/// before anything that can panic runs, so a poisoned lock still guards a
/// valid stack.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
