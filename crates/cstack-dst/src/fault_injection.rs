//! Fault injection at operation boundaries.
//!
//! DST injects faults BETWEEN operations, never inside a critical section.
//! The stack under test is unchanged; faults happen in the harness.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  DstRunner                                               │
//! │  ┌─────────────┐   ┌──────────────────┐   ┌───────────┐  │
//! │  │ FaultPoint  │──>│ push/pop/peek    │──>│FaultPoint │  │
//! │  │ (pre-op)    │   │ (stack untouched)│   │ (post-op) │  │
//! │  └─────────────┘   └──────────────────┘   └───────────┘  │
//! │        │                                        │        │
//! │        ▼                                        ▼        │
//! │ "Caller gives up before                "Caller drops the │
//! │  the op starts?"                        result?"         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! A value popped by an operation abandoned after the fact still counts as
//! delivered: the stack handed it out exactly once.

use std::fmt;

use tracing::{debug, info};

use cstack::TrackedStack;
use cstack_core::{
    PropertyChecker, PropertyResult, StackHistory, StackProperties, StackPropertyChecker,
};

use crate::env::DstEnv;
use crate::random::DeterministicRng;

/// Fault injection points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    BeforeOperation,
    AfterOperation,
}

/// What an injected fault did to an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    /// The caller gave up before the operation started; the stack is unchanged
    AbandonBefore,
    /// The operation completed but the caller never saw the result
    AbandonAfter,
}

/// Stacks the DST runner can drive.
///
/// MINIMAL interface: the implementation needs no knowledge of DST.
pub trait DstTestableStack: Send + Sync {
    fn new() -> Self;
    fn push(&self, value: u64);
    fn pop(&self) -> Option<u64>;
    fn peek(&self) -> Option<u64>;
    fn len(&self) -> usize;
    /// Contents from top to bottom. Only called while no operation is running.
    fn contents(&self) -> Vec<u64>;
}

impl DstTestableStack for TrackedStack {
    fn new() -> Self {
        TrackedStack::new()
    }

    fn push(&self, value: u64) {
        TrackedStack::push(self, 0, value);
    }

    fn pop(&self) -> Option<u64> {
        TrackedStack::pop(self, 0)
    }

    fn peek(&self) -> Option<u64> {
        TrackedStack::peek(self, 0)
    }

    fn len(&self) -> usize {
        TrackedStack::len(self)
    }

    fn contents(&self) -> Vec<u64> {
        self.current_contents()
    }
}

/// DST operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstOp {
    Push(u64),
    Pop,
    Peek,
}

impl DstOp {
    /// A random workload of `len` operations.
    ///
    /// Roughly half the operations are pushes; pushed values are distinct
    /// so a failure report names exactly one push.
    #[must_use]
    pub fn random_sequence(rng: &mut DeterministicRng, len: usize) -> Vec<DstOp> {
        let mut next_value: u64 = 1;
        (0..len)
            .map(|_| match rng.gen_range(0..6_u8) {
                0..=2 => {
                    let op = DstOp::Push(next_value);
                    next_value += 1;
                    op
                }
                3 | 4 => DstOp::Pop,
                _ => DstOp::Peek,
            })
            .collect()
    }
}

/// DST test runner.
///
/// Wraps a stack and injects faults at operation boundaries. It records
/// what it saw happen, so the `cstack-core` properties can be checked
/// against the runner itself.
pub struct DstRunner<S> {
    stack: S,
    env: DstEnv,
    pushed: Vec<u64>,
    popped: Vec<u64>,
    history: StackHistory,
    stats: DstStats,
}

/// Statistics from a DST run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DstStats {
    pub seed: u64,
    /// Operations that reached the stack
    pub operations_count: u64,
    pub faults_injected: u64,
    pub abandoned_before: u64,
    pub abandoned_after: u64,
    /// Pops and peeks that found the stack empty
    pub empty_results: u64,
}

impl fmt::Display for DstStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DST_SEED={} ops={} faults={} abandoned_before={} abandoned_after={} empty={}",
            self.seed,
            self.operations_count,
            self.faults_injected,
            self.abandoned_before,
            self.abandoned_after,
            self.empty_results
        )
    }
}

impl<S: DstTestableStack> DstRunner<S> {
    /// Runner over a fresh stack with the default fault configuration.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_env(S::new(), DstEnv::new(seed))
    }

    #[must_use]
    pub fn with_env(stack: S, env: DstEnv) -> Self {
        let seed = env.seed();
        Self {
            stack,
            env,
            pushed: Vec::new(),
            popped: Vec::new(),
            history: StackHistory::new(),
            stats: DstStats {
                seed,
                ..DstStats::default()
            },
        }
    }

    /// Get the seed for reproduction.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.env.seed()
    }

    /// The environment, for drawing workload from the same seed.
    pub fn env(&mut self) -> &mut DstEnv {
        &mut self.env
    }

    #[must_use]
    pub fn stack(&self) -> &S {
        &self.stack
    }

    /// Push with fault injection at boundaries.
    pub fn push(&mut self, value: u64) -> Result<(), FaultType> {
        self.maybe_abandon(FaultPoint::BeforeOperation)?;

        self.stack.push(value);
        self.stats.operations_count += 1;
        self.pushed.push(value);
        self.history.record_push(0, value);

        self.maybe_abandon(FaultPoint::AfterOperation)
    }

    /// Pop with fault injection at boundaries.
    pub fn pop(&mut self) -> Result<Option<u64>, FaultType> {
        self.maybe_abandon(FaultPoint::BeforeOperation)?;

        let result = self.stack.pop();
        self.stats.operations_count += 1;
        match result {
            Some(value) => self.popped.push(value),
            None => self.stats.empty_results += 1,
        }
        self.history.record_pop(0, result);

        self.maybe_abandon(FaultPoint::AfterOperation)?;
        Ok(result)
    }

    /// Peek with fault injection at boundaries.
    pub fn peek(&mut self) -> Result<Option<u64>, FaultType> {
        self.maybe_abandon(FaultPoint::BeforeOperation)?;

        let result = self.stack.peek();
        self.stats.operations_count += 1;
        if result.is_none() {
            self.stats.empty_results += 1;
        }
        self.history.record_peek(0, result);

        self.maybe_abandon(FaultPoint::AfterOperation)?;
        Ok(result)
    }

    /// Run one operation, discarding its result.
    pub fn apply(&mut self, op: DstOp) -> Result<(), FaultType> {
        match op {
            DstOp::Push(v) => self.push(v),
            DstOp::Pop => self.pop().map(|_| ()),
            DstOp::Peek => self.peek().map(|_| ()),
        }
    }

    fn maybe_abandon(&mut self, point: FaultPoint) -> Result<(), FaultType> {
        if !self.env.fault().should_fail() {
            return Ok(());
        }

        self.stats.faults_injected += 1;
        let fault = match point {
            FaultPoint::BeforeOperation => {
                self.stats.abandoned_before += 1;
                FaultType::AbandonBefore
            }
            FaultPoint::AfterOperation => {
                self.stats.abandoned_after += 1;
                FaultType::AbandonAfter
            }
        };
        debug!(seed = self.stats.seed, ?point, ?fault, "fault injected");
        Err(fault)
    }

    /// Check every stack property against what the runner observed.
    #[must_use]
    pub fn check(&self) -> Vec<PropertyResult> {
        StackPropertyChecker::new(self)
            .with_seed(self.stats.seed)
            .check_all()
    }

    #[must_use]
    pub fn stats(&self) -> DstStats {
        self.stats
    }
}

impl<S: DstTestableStack> StackProperties for DstRunner<S> {
    fn pushed_elements(&self) -> Vec<u64> {
        self.pushed.clone()
    }

    fn popped_elements(&self) -> Vec<u64> {
        self.popped.clone()
    }

    fn current_contents(&self) -> Vec<u64> {
        self.stack.contents()
    }

    fn recorded_len(&self) -> usize {
        self.stack.len()
    }

    fn history(&self) -> StackHistory {
        self.history.clone()
    }
}

/// DST result.
#[derive(Debug)]
pub struct DstResult {
    pub passed: bool,
    pub properties: Vec<PropertyResult>,
    pub stats: DstStats,
}

impl DstResult {
    #[must_use]
    pub fn format(&self) -> String {
        let status = if self.passed { "PASS" } else { "FAIL" };
        let mut result = format!("[{}] {}", status, self.stats);

        for property in self.properties.iter().filter(|p| !p.holds) {
            result.push_str("\n  VIOLATION: ");
            result.push_str(&property.to_string());
        }

        result
    }
}

/// Run a DST scenario. Faults are expected; invariants are checked at the end.
pub fn run_dst_scenario<S: DstTestableStack>(
    env: DstEnv,
    operations: impl IntoIterator<Item = DstOp>,
) -> DstResult {
    let mut runner: DstRunner<S> = DstRunner::with_env(S::new(), env);
    let fault_probability = runner.env().fault().config().probability;

    for op in operations {
        // An abandoned operation is part of the scenario, not a failure.
        let _ = runner.apply(op);
    }

    let properties = runner.check();
    let result = DstResult {
        passed: properties.iter().all(|p| p.holds),
        properties,
        stats: runner.stats(),
    };

    info!(
        passed = result.passed,
        fault_probability,
        stats = %result.stats,
        "DST scenario finished"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultConfig;
    use std::sync::Mutex;

    // Simple mock stack for testing the DST framework itself
    struct MockStack {
        values: Mutex<Vec<u64>>,
    }

    impl DstTestableStack for MockStack {
        fn new() -> Self {
            Self {
                values: Mutex::new(Vec::new()),
            }
        }

        fn push(&self, value: u64) {
            self.values.lock().unwrap().push(value);
        }

        fn pop(&self) -> Option<u64> {
            self.values.lock().unwrap().pop()
        }

        fn peek(&self) -> Option<u64> {
            self.values.lock().unwrap().last().copied()
        }

        fn len(&self) -> usize {
            self.values.lock().unwrap().len()
        }

        fn contents(&self) -> Vec<u64> {
            self.values.lock().unwrap().iter().rev().copied().collect()
        }
    }

    /// Queue posing as a stack.
    struct FifoStack(MockStack);

    impl DstTestableStack for FifoStack {
        fn new() -> Self {
            Self(MockStack::new())
        }

        fn push(&self, value: u64) {
            self.0.push(value);
        }

        fn pop(&self) -> Option<u64> {
            let mut values = self.0.values.lock().unwrap();
            if values.is_empty() {
                None
            } else {
                Some(values.remove(0))
            }
        }

        fn peek(&self) -> Option<u64> {
            self.0.peek()
        }

        fn len(&self) -> usize {
            self.0.len()
        }

        fn contents(&self) -> Vec<u64> {
            self.0.contents()
        }
    }

    #[test]
    fn test_dst_runner_basic() {
        let mut runner: DstRunner<MockStack> = DstRunner::new(12345);

        // These might fail due to fault injection, and that's OK
        let _ = runner.push(1);
        let _ = runner.push(2);
        let _ = runner.pop();
        let _ = runner.peek();

        assert!(runner.check().iter().all(|p| p.holds));
    }

    #[test]
    fn test_abandon_before_leaves_stack_untouched() {
        let env = DstEnv::with_fault_config(1, FaultConfig::with_probability(1.0));
        let mut runner = DstRunner::with_env(MockStack::new(), env);

        assert_eq!(runner.push(5), Err(FaultType::AbandonBefore));
        assert_eq!(runner.stack().len(), 0);
        assert_eq!(runner.stats().operations_count, 0);
        assert_eq!(runner.stats().abandoned_before, 1);
    }

    #[test]
    fn test_workload_drawn_from_runner_env() {
        let env = DstEnv::with_fault_config(11, FaultConfig::with_probability(0.25));
        let mut runner = DstRunner::with_env(MockStack::new(), env);
        assert_eq!(runner.env().fault().config(), FaultConfig::with_probability(0.25));

        let from_runner = DstOp::random_sequence(runner.env().rng(), 50);
        let expected = DstOp::random_sequence(DstEnv::new(11).rng(), 50);
        assert_eq!(from_runner, expected);
    }

    #[test]
    fn test_no_faults_returns_results() {
        let env = DstEnv::with_fault_config(1, FaultConfig::none());
        let mut runner = DstRunner::with_env(MockStack::new(), env);

        assert_eq!(runner.pop(), Ok(None));
        assert_eq!(runner.push(5), Ok(()));
        assert_eq!(runner.peek(), Ok(Some(5)));
        assert_eq!(runner.pop(), Ok(Some(5)));
        assert_eq!(runner.stats().empty_results, 1);
        assert_eq!(runner.stats().faults_injected, 0);
    }

    #[test]
    fn test_dst_scenario() {
        let ops = vec![
            DstOp::Push(100),
            DstOp::Push(200),
            DstOp::Pop,
            DstOp::Peek,
            DstOp::Push(300),
        ];

        let result = run_dst_scenario::<MockStack>(DstEnv::new(12345), ops);
        assert!(result.passed, "DST failed: {}", result.format());
    }

    #[test]
    fn test_fifo_stack_is_caught() {
        let ops = vec![DstOp::Push(1), DstOp::Push(2), DstOp::Pop];
        let env = DstEnv::with_fault_config(8, FaultConfig::none());

        let result = run_dst_scenario::<FifoStack>(env, ops);
        assert!(!result.passed);
        let report = result.format();
        assert!(report.contains("VIOLATION: [FAIL] LIFO_Order"), "{}", report);
        assert!(report.contains("DST_SEED=8"));
    }

    #[test]
    fn test_determinism() {
        let ops = DstOp::random_sequence(&mut DeterministicRng::new(42), 200);

        let result1 = run_dst_scenario::<MockStack>(DstEnv::new(42), ops.clone());
        let result2 = run_dst_scenario::<MockStack>(DstEnv::new(42), ops);

        // Same seed = same faults = same stats
        assert_eq!(result1.stats, result2.stats);
    }

    #[test]
    fn test_random_sequence_pushes_distinct_values() {
        let ops = DstOp::random_sequence(&mut DeterministicRng::new(3), 500);
        let pushes: Vec<u64> = ops
            .iter()
            .filter_map(|op| match op {
                DstOp::Push(v) => Some(*v),
                _ => None,
            })
            .collect();
        let mut unique = pushes.clone();
        unique.dedup();
        assert_eq!(pushes, unique);
        assert!(!pushes.is_empty());
    }
}
