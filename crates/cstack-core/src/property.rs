//! Property results and the checker trait.

use std::fmt;

use crate::counterexample::Counterexample;

/// Outcome of checking one named property.
#[derive(Debug, Clone)]
pub struct PropertyResult {
    /// Property name, e.g. `"NoLostElements"`
    pub name: &'static str,
    /// Whether the property holds
    pub holds: bool,
    /// Human-readable violation message (only set when `holds` is false)
    pub violation: Option<String>,
    /// Failure path, when one could be reconstructed
    pub counterexample: Option<Counterexample>,
}

impl PropertyResult {
    /// A property that holds.
    #[must_use]
    pub fn pass(name: &'static str) -> Self {
        Self {
            name,
            holds: true,
            violation: None,
            counterexample: None,
        }
    }

    /// A violated property.
    #[must_use]
    pub fn fail(
        name: &'static str,
        violation: impl Into<String>,
        counterexample: Option<Counterexample>,
    ) -> Self {
        let violation = violation.into();
        debug_assert!(!violation.is_empty(), "Violation message must not be empty");
        Self {
            name,
            holds: false,
            violation: Some(violation),
            counterexample,
        }
    }
}

impl fmt::Display for PropertyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.violation {
            None => write!(f, "[PASS] {}", self.name),
            Some(msg) => {
                write!(f, "[FAIL] {}: {}", self.name, msg)?;
                if let Some(ce) = &self.counterexample {
                    write!(f, "\n{}", ce.render_diagram())?;
                }
                Ok(())
            }
        }
    }
}

/// Something that can check a set of properties.
pub trait PropertyChecker {
    /// Check every property, in a fixed order.
    fn check_all(&self) -> Vec<PropertyResult>;

    /// True when every property holds.
    fn all_hold(&self) -> bool {
        self.check_all().iter().all(|r| r.holds)
    }

    /// Only the violated properties.
    fn violations(&self) -> Vec<PropertyResult> {
        self.check_all().into_iter().filter(|r| !r.holds).collect()
    }
}
