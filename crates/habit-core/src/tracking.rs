use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::days_pattern::DaysPattern;
use crate::error::{HabitError, Result};
use crate::schedule::Schedule;

/// Lifecycle state of a tracking. See the state-transition table in
/// `habit-engine` for which transitions are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    Running,
    Paused,
    Archived,
    Deleted,
}

/// A habit the user wants to be reminded about, on a schedule.
///
/// `days` is `None` for a one-shot tracking (fires its schedules once and
/// moves straight to `Archived`); `Some(pattern)` drives the recurrence
/// evaluator for repeating trackings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question: String,
    pub notes: Option<String>,
    pub icon: Option<String>,
    pub days: Option<DaysPattern>,
    pub schedules: Vec<Schedule>,
    pub state: TrackingState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tracking {
    /// Validate everything about a tracking that doesn't require looking at
    /// other trackings or the clock: question length, schedule list shape,
    /// and the recurrence pattern's own invariants.
    pub fn validate(&self) -> Result<()> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err(HabitError::Validation("question must not be empty".into()));
        }
        if question.chars().count() > 100 {
            return Err(HabitError::Validation(
                "question must be at most 100 characters".into(),
            ));
        }
        Schedule::validate_list(&self.schedules)?;
        if let Some(pattern) = &self.days {
            pattern.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Tracking {
        let now = Utc::now();
        Tracking {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            question: "Did you drink water?".into(),
            notes: None,
            icon: None,
            days: None,
            schedules: vec![Schedule::new(9, 0)],
            state: TrackingState::Running,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn rejects_blank_question() {
        let mut t = base();
        t.question = "   ".into();
        assert!(t.validate().is_err());
    }

    #[test]
    fn rejects_too_long_question() {
        let mut t = base();
        t.question = "a".repeat(101);
        assert!(t.validate().is_err());
    }

    #[test]
    fn accepts_valid_one_shot() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn propagates_schedule_errors() {
        let mut t = base();
        t.schedules = vec![];
        assert!(t.validate().is_err());
    }
}
