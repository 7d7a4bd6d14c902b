//! Stack invariants.
//!
//! | Property | Description |
//! |----------|-------------|
//! | NoLostElements | Every pushed value is still in the stack or was popped |
//! | NoDuplicates | No value is delivered more often than it was pushed |
//! | CountConsistent | The live-node count equals the number of reachable nodes |
//! | LIFO_Order | Replaying the history against a model stack gives the same pops |
//! | PeekConsistent | Every peek observed the model top, and empty only when empty |
//!
//! All checks read a quiescent stack. Values are compared as multisets,
//! so a workload may push the same value more than once.

use std::collections::HashMap;

use crate::counterexample::{Counterexample, StateSnapshot, ThreadAction};
use crate::property::{PropertyChecker, PropertyResult};

/// Number of history entries shown in a counterexample.
const COUNTEREXAMPLE_OPS_MAX: usize = 16;

/// View a stack exposes for property checking.
///
/// Implementations provide access to their internal state. The checker
/// verifies invariants against this state.
pub trait StackProperties {
    /// Every value that was pushed, once per push.
    fn pushed_elements(&self) -> Vec<u64>;

    /// Every value that was popped, once per successful pop.
    fn popped_elements(&self) -> Vec<u64>;

    /// Current contents of the stack (top to bottom).
    fn current_contents(&self) -> Vec<u64>;

    /// The stack's own live-node count.
    fn recorded_len(&self) -> usize;

    /// Operation history in linearization order.
    /// Returns owned data to avoid lifetime issues with internal mutexes.
    fn history(&self) -> StackHistory;
}

/// History of stack operations for linearizability checking.
#[derive(Debug, Clone, Default)]
pub struct StackHistory {
    /// Sequence of operations in linearization order
    pub operations: Vec<StackOperation>,
}

/// A single stack operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOperation {
    /// Thread that performed the operation
    pub thread_id: u64,
    /// Type of operation
    pub op_type: StackOpType,
    /// Value pushed, popped, or peeked; `None` for the empty outcomes
    pub element: Option<u64>,
    /// Step number for ordering, starting at 1
    pub step: u64,
}

/// Type of stack operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOpType {
    Push,
    Pop,
    PopEmpty,
    Peek,
    PeekEmpty,
}

impl StackOperation {
    fn describe(&self) -> String {
        match (self.op_type, self.element) {
            (StackOpType::Push, Some(v)) => format!("push({})", v),
            (StackOpType::Pop, Some(v)) => format!("pop()={}", v),
            (StackOpType::Peek, Some(v)) => format!("peek()={}", v),
            (StackOpType::PopEmpty, _) => "pop()=empty".to_string(),
            (StackOpType::PeekEmpty, _) => "peek()=empty".to_string(),
            (op, None) => format!("{:?}(?)", op),
        }
    }
}

impl StackHistory {
    /// Create a new empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Step number the next recorded operation will get.
    #[must_use]
    pub fn next_step(&self) -> u64 {
        self.operations.len() as u64 + 1
    }

    /// Record a push operation.
    pub fn record_push(&mut self, thread_id: u64, element: u64) {
        self.record(thread_id, StackOpType::Push, Some(element));
    }

    /// Record a pop operation and its outcome.
    pub fn record_pop(&mut self, thread_id: u64, element: Option<u64>) {
        let op_type = if element.is_some() {
            StackOpType::Pop
        } else {
            StackOpType::PopEmpty
        };
        self.record(thread_id, op_type, element);
    }

    /// Record a peek operation and its outcome.
    pub fn record_peek(&mut self, thread_id: u64, element: Option<u64>) {
        let op_type = if element.is_some() {
            StackOpType::Peek
        } else {
            StackOpType::PeekEmpty
        };
        self.record(thread_id, op_type, element);
    }

    fn record(&mut self, thread_id: u64, op_type: StackOpType, element: Option<u64>) {
        let step = self.next_step();
        self.operations.push(StackOperation {
            thread_id,
            op_type,
            element,
            step,
        });
    }
}

/// Property checker for stack implementations.
pub struct StackPropertyChecker<'a, T: StackProperties> {
    stack: &'a T,
    dst_seed: Option<u64>,
}

fn multiset(values: &[u64]) -> HashMap<u64, usize> {
    let mut counts = HashMap::with_capacity(values.len());
    for &v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
}

impl<'a, T: StackProperties> StackPropertyChecker<'a, T> {
    /// Create a new checker for the given stack.
    #[must_use]
    pub fn new(stack: &'a T) -> Self {
        Self {
            stack,
            dst_seed: None,
        }
    }

    /// Set DST seed for counterexample reproduction.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.dst_seed = Some(seed);
        self
    }

    fn counterexample(&self) -> Counterexample {
        match self.dst_seed {
            Some(seed) => Counterexample::with_seed(seed),
            None => Counterexample::new(),
        }
    }

    /// Counterexample holding the last few operations up to and including
    /// `history.operations[failed]`.
    fn history_counterexample(
        &self,
        history: &StackHistory,
        failed: usize,
        model: &[u64],
        description: String,
    ) -> Counterexample {
        let mut ce = self.counterexample().with_description(description);
        let start = (failed + 1).saturating_sub(COUNTEREXAMPLE_OPS_MAX);

        for (idx, op) in history.operations[start..=failed].iter().enumerate() {
            ce.add_action(ThreadAction {
                thread_id: op.thread_id,
                step: op.step,
                action: op.describe(),
                success: start + idx != failed,
            });
        }

        let failed_step = history.operations[failed].step;
        ce.add_state(StateSnapshot {
            step: failed_step,
            description: format!("model top={:?} len={}", model.last(), model.len()),
            variables: vec![("model".to_string(), format!("{:?}", model))],
        });
        ce
    }

    /// NoLostElements
    ///
    /// Every pushed value is either still in the stack or was popped.
    fn check_no_lost_elements(&self) -> PropertyResult {
        let pushed = multiset(&self.stack.pushed_elements());
        let popped = multiset(&self.stack.popped_elements());
        let contents = multiset(&self.stack.current_contents());

        let mut lost: Vec<(u64, usize)> = pushed
            .iter()
            .filter_map(|(&value, &count)| {
                let accounted = popped.get(&value).copied().unwrap_or(0)
                    + contents.get(&value).copied().unwrap_or(0);
                (accounted < count).then_some((value, count - accounted))
            })
            .collect();

        if lost.is_empty() {
            return PropertyResult::pass("NoLostElements");
        }

        lost.sort_unstable();
        let (value, missing) = lost[0];
        let mut ce = self.counterexample();
        ce.add_state(StateSnapshot {
            step: 1,
            description: format!("{} value(s) lost", lost.len()),
            variables: vec![
                ("lost".to_string(), format!("{:?}", lost)),
                ("popped".to_string(), format!("{}", popped.values().sum::<usize>())),
                ("contents".to_string(), format!("{}", contents.values().sum::<usize>())),
            ],
        });

        PropertyResult::fail(
            "NoLostElements",
            format!(
                "Value {} was pushed but {} copy(ies) are neither in the stack nor popped",
                value, missing
            ),
            Some(ce),
        )
    }

    /// NoDuplicates
    ///
    /// A value is never observed (popped or still stored) more times than it
    /// was pushed. This covers both double delivery and fabricated values.
    fn check_no_duplicates(&self) -> PropertyResult {
        let pushed = multiset(&self.stack.pushed_elements());
        let mut observed = multiset(&self.stack.popped_elements());
        for (value, count) in multiset(&self.stack.current_contents()) {
            *observed.entry(value).or_insert(0) += count;
        }

        let mut extra: Vec<(u64, usize)> = observed
            .iter()
            .filter_map(|(&value, &count)| {
                let allowed = pushed.get(&value).copied().unwrap_or(0);
                (count > allowed).then_some((value, count - allowed))
            })
            .collect();

        if extra.is_empty() {
            return PropertyResult::pass("NoDuplicates");
        }

        extra.sort_unstable();
        let (value, surplus) = extra[0];
        PropertyResult::fail(
            "NoDuplicates",
            format!(
                "Value {} observed {} more time(s) than it was pushed",
                value, surplus
            ),
            None,
        )
    }

    /// CountConsistent
    ///
    /// The stack's count equals the number of nodes reachable from top.
    fn check_count_consistent(&self) -> PropertyResult {
        let recorded = self.stack.recorded_len();
        let reachable = self.stack.current_contents().len();

        if recorded == reachable {
            PropertyResult::pass("CountConsistent")
        } else {
            PropertyResult::fail(
                "CountConsistent",
                format!(
                    "Stack reports len {} but {} node(s) are reachable",
                    recorded, reachable
                ),
                None,
            )
        }
    }

    /// LIFO_Order
    ///
    /// Replays the history against a model stack and checks that every pop
    /// returns the model top, and that pops report empty only on an empty model.
    fn check_lifo_order(&self) -> PropertyResult {
        let history = self.stack.history();
        let mut model: Vec<u64> = Vec::new();

        for (idx, op) in history.operations.iter().enumerate() {
            let violation = match (op.op_type, op.element) {
                (StackOpType::Push, Some(v)) => {
                    model.push(v);
                    None
                }
                (StackOpType::Pop, Some(actual)) => match model.last().copied() {
                    Some(expected) if expected == actual => {
                        model.pop();
                        None
                    }
                    Some(expected) => Some(format!(
                        "LIFO violated: pop returned {} but model expected {} (step {})",
                        actual, expected, op.step
                    )),
                    None => Some(format!(
                        "LIFO violated: pop returned {} but model stack was empty (step {})",
                        actual, op.step
                    )),
                },
                (StackOpType::PopEmpty, _) if !model.is_empty() => Some(format!(
                    "LIFO violated: pop reported empty but model has {} elements (step {})",
                    model.len(),
                    op.step
                )),
                _ => None,
            };

            if let Some(msg) = violation {
                let ce = self.history_counterexample(&history, idx, &model, msg.clone());
                return PropertyResult::fail("LIFO_Order", msg, Some(ce));
            }
        }

        PropertyResult::pass("LIFO_Order")
    }

    /// PeekConsistent
    ///
    /// A peek observes the model top and leaves the model unchanged.
    fn check_peek_consistent(&self) -> PropertyResult {
        let history = self.stack.history();
        let mut model: Vec<u64> = Vec::new();

        for (idx, op) in history.operations.iter().enumerate() {
            let violation = match (op.op_type, op.element) {
                (StackOpType::Push, Some(v)) => {
                    model.push(v);
                    None
                }
                (StackOpType::Pop, Some(_)) => {
                    // Pop ordering is LIFO_Order's concern; only track length here.
                    model.pop();
                    None
                }
                (StackOpType::Peek, Some(actual)) => match model.last().copied() {
                    Some(expected) if expected == actual => None,
                    top => Some(format!(
                        "Peek returned {} but model top was {:?} (step {})",
                        actual, top, op.step
                    )),
                },
                (StackOpType::PeekEmpty, _) if !model.is_empty() => Some(format!(
                    "Peek reported empty but model has {} elements (step {})",
                    model.len(),
                    op.step
                )),
                _ => None,
            };

            if let Some(msg) = violation {
                let ce = self.history_counterexample(&history, idx, &model, msg.clone());
                return PropertyResult::fail("PeekConsistent", msg, Some(ce));
            }
        }

        PropertyResult::pass("PeekConsistent")
    }
}

impl<T: StackProperties> PropertyChecker for StackPropertyChecker<'_, T> {
    fn check_all(&self) -> Vec<PropertyResult> {
        vec![
            self.check_no_lost_elements(),
            self.check_no_duplicates(),
            self.check_count_consistent(),
            self.check_lifo_order(),
            self.check_peek_consistent(),
        ]
    }
}
