use thiserror::Error;

use habit_notifier::NotifierError;
use habit_recurrence::RecurrenceError;
use habit_state::StateError;

/// Errors raised by `ReminderEngine` and `TrackingLifecycle` operations.
///
/// `TransientIo`/`PermanentIo` fold every store and notifier failure into a
/// single retry-or-surface axis; `SchedulingFailed` is deliberately distinct
/// from those two because it is never retried and never rolls back the
/// caller's state change (spec §7) -- the tracking is simply left without
/// an Upcoming reminder.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("scheduling failed: {0}")]
    SchedulingFailed(String),

    #[error("transient i/o error: {0}")]
    TransientIo(String),

    #[error("permanent i/o error: {0}")]
    PermanentIo(String),
}

impl From<StateError> for EngineError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotFound(msg) => EngineError::NotFound(msg),
            StateError::Connection(msg) | StateError::Backend(msg) => EngineError::TransientIo(msg),
            StateError::Serialization(msg) => EngineError::PermanentIo(msg),
        }
    }
}

impl From<RecurrenceError> for EngineError {
    fn from(err: RecurrenceError) -> Self {
        match err {
            RecurrenceError::InvalidPattern(msg) => EngineError::SchedulingFailed(msg),
        }
    }
}

impl From<NotifierError> for EngineError {
    fn from(err: NotifierError) -> Self {
        match err {
            NotifierError::Transient(msg) => EngineError::TransientIo(msg),
            NotifierError::Permanent(msg) => EngineError::PermanentIo(msg),
        }
    }
}

impl From<habit_core::HabitError> for EngineError {
    fn from(err: habit_core::HabitError) -> Self {
        match err {
            habit_core::HabitError::Validation(msg) => EngineError::Validation(msg),
        }
    }
}
