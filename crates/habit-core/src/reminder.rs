use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{HabitError, Result};

/// How the user responded to a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerValue {
    Completed,
    Dismissed,
}

/// Lifecycle state of a single reminder instance.
///
/// `Upcoming` covers every reminder scheduled in the future, whether or not
/// it has been snoozed; snoozing moves `scheduled_time` forward but never
/// changes the status. `Pending` is a reminder whose `scheduled_time` has
/// arrived and is waiting for an answer. `Answered` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Upcoming,
    Pending,
    Answered,
}

/// A single scheduled occurrence of a tracking's question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub tracking_id: Uuid,
    pub user_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub notes: Option<String>,
    pub answer_value: Option<AnswerValue>,
    pub status: ReminderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reminder {
    /// A reminder is only ever answered once it is `Answered`, and only
    /// `Answered` reminders carry an `answer_value` — this invariant is
    /// checked wherever a reminder is mutated in place rather than
    /// re-derived from the database on every read.
    pub fn validate(&self) -> Result<()> {
        match (self.status, self.answer_value) {
            (ReminderStatus::Answered, None) => Err(HabitError::Validation(
                "an answered reminder must carry an answer_value".into(),
            )),
            (ReminderStatus::Upcoming | ReminderStatus::Pending, Some(_)) => Err(
                HabitError::Validation("only an answered reminder may carry an answer_value".into()),
            ),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Reminder {
        let now = Utc::now();
        Reminder {
            id: Uuid::new_v4(),
            tracking_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            scheduled_time: now,
            notes: None,
            answer_value: None,
            status: ReminderStatus::Upcoming,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn upcoming_without_answer_is_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn answered_without_value_is_invalid() {
        let mut r = base();
        r.status = ReminderStatus::Answered;
        assert!(r.validate().is_err());
    }

    #[test]
    fn pending_with_value_is_invalid() {
        let mut r = base();
        r.status = ReminderStatus::Pending;
        r.answer_value = Some(AnswerValue::Completed);
        assert!(r.validate().is_err());
    }

    #[test]
    fn answered_with_value_is_valid() {
        let mut r = base();
        r.status = ReminderStatus::Answered;
        r.answer_value = Some(AnswerValue::Dismissed);
        assert!(r.validate().is_ok());
    }
}
