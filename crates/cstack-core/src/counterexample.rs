//! Counterexample representation and rendering.
//!
//! When a stack property is violated, a counterexample shows the
//! operations that led to the failure, per thread, in the order they
//! took effect on the stack.

use std::fmt::Write as _;

/// A counterexample showing the failure path.
#[derive(Debug, Clone, Default)]
pub struct Counterexample {
    /// Sequence of state snapshots
    pub states: Vec<StateSnapshot>,
    /// Operations in linearization order
    pub interleaving: Vec<ThreadAction>,
    /// DST seed for reproduction (if applicable)
    pub dst_seed: Option<u64>,
    /// What went wrong
    pub description: Option<String>,
}

/// Snapshot of stack state at a point in time.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// Step number in the execution
    pub step: u64,
    /// Description of the state
    pub description: String,
    /// Variable values at this point
    pub variables: Vec<(String, String)>,
}

/// An operation performed by a thread.
#[derive(Debug, Clone)]
pub struct ThreadAction {
    /// Thread identifier
    pub thread_id: u64,
    /// Step number when this action took effect
    pub step: u64,
    /// Description of the action, e.g. `push(7)`
    pub action: String,
    /// False when the action observed something the model forbids
    pub success: bool,
}

impl Counterexample {
    /// Create a new empty counterexample.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counterexample with DST seed for reproduction.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            dst_seed: Some(seed),
            ..Self::default()
        }
    }

    /// Set the description for this counterexample.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a state snapshot. Steps must be strictly increasing.
    pub fn add_state(&mut self, state: StateSnapshot) {
        debug_assert!(
            self.states.last().map_or(true, |last| state.step > last.step),
            "States must be added in order"
        );
        self.states.push(state);
    }

    /// Add a thread action.
    pub fn add_action(&mut self, action: ThreadAction) {
        self.interleaving.push(action);
    }

    /// Render the counterexample as a human-readable thread diagram.
    ///
    /// ```text
    /// DST_SEED=12345
    ///
    /// Step | Thread 0 | Thread 1 | State
    /// -----|----------|----------|------
    ///    1 | push(42) |          | len=1
    ///    2 |          | pop()=42 | len=0
    /// ```
    #[must_use]
    pub fn render_diagram(&self) -> String {
        let mut output = String::new();

        if let Some(seed) = self.dst_seed {
            let _ = writeln!(output, "DST_SEED={}\n", seed);
        }

        if let Some(desc) = &self.description {
            let _ = writeln!(output, "Failure: {}\n", desc);
        }

        let mut threads: Vec<u64> = self.interleaving.iter().map(|a| a.thread_id).collect();
        threads.sort_unstable();
        threads.dedup();

        if threads.is_empty() {
            output.push_str("(no thread actions recorded)\n");
            for state in &self.states {
                let _ = writeln!(output, "step {}: {}", state.step, state.description);
                for (name, value) in &state.variables {
                    let _ = writeln!(output, "  {} = {}", name, value);
                }
            }
            return output;
        }

        output.push_str("Step |");
        for tid in &threads {
            let _ = write!(output, " Thread {} |", tid);
        }
        output.push_str(" State\n");

        output.push_str("-----|");
        for _ in &threads {
            output.push_str("----------|");
        }
        output.push_str("------\n");

        // Only steps that carry an action or a state; windowed histories
        // start deep into a run.
        let mut steps: Vec<u64> = self
            .interleaving
            .iter()
            .map(|a| a.step)
            .chain(self.states.iter().map(|s| s.step))
            .collect();
        steps.sort_unstable();
        steps.dedup();

        for step in steps {
            let _ = write!(output, "{:4} |", step);

            for tid in &threads {
                let action = self
                    .interleaving
                    .iter()
                    .find(|a| a.step == step && a.thread_id == *tid);

                match action {
                    Some(a) => {
                        let status = if a.success { "" } else { " [FAIL]" };
                        let _ = write!(output, " {}{} |", a.action, status);
                    }
                    None => output.push_str("          |"),
                }
            }

            if let Some(state) = self.states.iter().find(|s| s.step == step) {
                let _ = write!(output, " {}", state.description);
            }

            output.push('\n');
        }

        output
    }
}
