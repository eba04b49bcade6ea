use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{HabitError, Result};

/// Channel a user's reminders are delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPreference {
    Email,
    Telegram,
}

/// A registered user of the tracker.
///
/// `timezone` is an IANA zone name (`"America/Argentina/Buenos_Aires"`) used
/// by the recurrence evaluator to convert a tracking's schedule into an
/// absolute instant; it is validated against `chrono_tz` at construction
/// time rather than re-validated on every recurrence computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub timezone: String,
    pub locale: String,
    pub notification_preference: NotificationPreference,
}

impl User {
    /// Validate invariants that don't require any I/O: a parseable
    /// timezone and a non-empty email.
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() {
            return Err(HabitError::Validation("email must not be empty".into()));
        }
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| HabitError::Validation(format!("unknown timezone: {}", self.timezone)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(timezone: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: "person@example.com".into(),
            timezone: timezone.into(),
            locale: "en-US".into(),
            notification_preference: NotificationPreference::Email,
        }
    }

    #[test]
    fn accepts_known_iana_zone() {
        assert!(user("America/Argentina/Buenos_Aires").validate().is_ok());
    }

    #[test]
    fn rejects_unknown_zone() {
        assert!(user("Mars/Olympus_Mons").validate().is_err());
    }

    #[test]
    fn rejects_empty_email() {
        let mut u = user("UTC");
        u.email = "   ".into();
        assert!(u.validate().is_err());
    }
}
