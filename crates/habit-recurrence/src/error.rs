use thiserror::Error;

/// Errors raised by the recurrence evaluator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("invalid recurrence pattern: {0}")]
    InvalidPattern(String),
}

pub type Result<T> = std::result::Result<T, RecurrenceError>;
