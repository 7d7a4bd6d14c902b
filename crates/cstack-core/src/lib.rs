//! # cstack-core
//!
//! Property checking for the `cstack` concurrent stack.
//!
//! This crate provides:
//! - `PropertyResult` and `PropertyChecker` for verifying invariants
//! - `Counterexample` for rendering failure paths
//! - `StackProperties`, the view a stack exposes so its invariants can be checked
//!
//! The crate has no knowledge of any particular stack implementation. The
//! `cstack` crate implements `StackProperties` for its tracked stack, and
//! `cstack-dst` drives those checks from simulated and threaded workloads.

pub mod counterexample;
pub mod invariants;
pub mod property;

pub use counterexample::{Counterexample, StateSnapshot, ThreadAction};
pub use invariants::stack::{
    StackHistory, StackOpType, StackOperation, StackProperties, StackPropertyChecker,
};
pub use property::{PropertyChecker, PropertyResult};
