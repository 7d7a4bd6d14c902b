use thiserror::Error;

/// Errors reported by stack operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StackError {
    /// `pop` or `peek` found no values.
    #[error("stack is empty")]
    Empty,
}
