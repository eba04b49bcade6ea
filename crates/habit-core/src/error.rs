use thiserror::Error;

/// Errors raised while constructing or validating domain types.
///
/// This is the narrowest error type in the workspace: it only covers
/// violations of the data-model invariants described in the habit tracker
/// specification (question length, schedule bounds, pattern shape). Callers
/// further up the stack (`habit-engine`) wrap this into their own error
/// kind rather than propagating it directly to HTTP.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HabitError {
    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, HabitError>;
