use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{HabitError, Result};

/// A single time-of-day a tracking fires at, in the owning user's timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Schedule {
    pub hour: u8,
    pub minute: u8,
}

impl Schedule {
    pub fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hour > 23 {
            return Err(HabitError::Validation(format!(
                "hour {} out of range 0..23",
                self.hour
            )));
        }
        if self.minute > 59 {
            return Err(HabitError::Validation(format!(
                "minute {} out of range 0..59",
                self.minute
            )));
        }
        Ok(())
    }

    /// Validate a tracking's full list of schedules: 1 to 5 entries, each
    /// individually valid, and no duplicate times.
    pub fn validate_list(schedules: &[Schedule]) -> Result<()> {
        if schedules.is_empty() {
            return Err(HabitError::Validation(
                "a tracking needs at least one schedule".into(),
            ));
        }
        if schedules.len() > 5 {
            return Err(HabitError::Validation(
                "a tracking may have at most 5 schedules".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for s in schedules {
            s.validate()?;
            if !seen.insert((s.hour, s.minute)) {
                return Err(HabitError::Validation(format!(
                    "duplicate schedule {:02}:{:02}",
                    s.hour, s.minute
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_hour_out_of_range() {
        assert!(Schedule::new(24, 0).validate().is_err());
    }

    #[test]
    fn rejects_minute_out_of_range() {
        assert!(Schedule::new(10, 60).validate().is_err());
    }

    #[test]
    fn rejects_empty_list() {
        assert!(Schedule::validate_list(&[]).is_err());
    }

    #[test]
    fn rejects_more_than_five() {
        let schedules: Vec<_> = (0..6).map(|h| Schedule::new(h, 0)).collect();
        assert!(Schedule::validate_list(&schedules).is_err());
    }

    #[test]
    fn rejects_duplicates() {
        let schedules = vec![Schedule::new(9, 0), Schedule::new(9, 0)];
        assert!(Schedule::validate_list(&schedules).is_err());
    }

    #[test]
    fn accepts_valid_list() {
        let schedules = vec![Schedule::new(9, 0), Schedule::new(21, 30)];
        assert!(Schedule::validate_list(&schedules).is_ok());
    }
}
