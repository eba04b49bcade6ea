use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{HabitError, Result};

/// Unit of an [`DaysPattern::Interval`] recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Days,
    Weeks,
    Months,
    Years,
}

/// The `DayOfMonth` family of patterns (see spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subkind", rename_all = "snake_case")]
pub enum DayOfMonthPattern {
    /// Fire on these specific day-of-month numbers; numbers past the end of
    /// a short month are simply skipped for that month.
    DayNumber { day_numbers: BTreeSet<u8> },
    /// Fire on the last calendar day of every month.
    LastDay {},
    /// Fire on the Nth occurrence of `weekday` within the month (e.g. 2nd
    /// Tuesday). Months lacking that occurrence are skipped.
    WeekdayOrdinal { weekday: u8, ordinal: u8 },
}

/// The `DayOfYear` family of patterns (see spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subkind", rename_all = "snake_case")]
pub enum DayOfYearPattern {
    /// Fire on a fixed `(month, day)` once a year. `day=29, month=2` skips
    /// non-leap years.
    Date { month: u8, day: u8 },
    /// Fire on the Nth occurrence of `weekday` within the calendar year.
    WeekdayOrdinal { weekday: u8, ordinal: u8 },
}

/// The recurrence rule attached to a tracking. Absent on one-shot trackings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DaysPattern {
    Interval {
        value: u32,
        unit: IntervalUnit,
    },
    DayOfWeek {
        days: BTreeSet<u8>,
    },
    DayOfMonth {
        #[serde(flatten)]
        variant: DayOfMonthPattern,
    },
    DayOfYear {
        #[serde(flatten)]
        variant: DayOfYearPattern,
    },
}

impl DaysPattern {
    /// Validate structural invariants (value ranges, non-empty sets,
    /// duplicate-free weekday lists). Does not evaluate the pattern.
    pub fn validate(&self) -> Result<()> {
        match self {
            DaysPattern::Interval { value, .. } => {
                if *value < 1 {
                    return Err(HabitError::Validation(
                        "interval value must be >= 1".into(),
                    ));
                }
                Ok(())
            }
            DaysPattern::DayOfWeek { days } => {
                if days.is_empty() {
                    return Err(HabitError::Validation(
                        "day_of_week pattern must list at least one day".into(),
                    ));
                }
                for d in days {
                    if *d > 6 {
                        return Err(HabitError::Validation(format!(
                            "weekday {d} out of range 0..6"
                        )));
                    }
                }
                Ok(())
            }
            DaysPattern::DayOfMonth { variant } => match variant {
                DayOfMonthPattern::DayNumber { day_numbers } => {
                    if day_numbers.is_empty() {
                        return Err(HabitError::Validation(
                            "day_number pattern must list at least one day".into(),
                        ));
                    }
                    for d in day_numbers {
                        if !(1..=31).contains(d) {
                            return Err(HabitError::Validation(format!(
                                "day number {d} out of range 1..31"
                            )));
                        }
                    }
                    Ok(())
                }
                DayOfMonthPattern::LastDay {} => Ok(()),
                DayOfMonthPattern::WeekdayOrdinal { weekday, ordinal } => {
                    validate_weekday_ordinal(*weekday, *ordinal)
                }
            },
            DaysPattern::DayOfYear { variant } => match variant {
                DayOfYearPattern::Date { month, day } => {
                    if !(1..=12).contains(month) {
                        return Err(HabitError::Validation(format!(
                            "month {month} out of range 1..12"
                        )));
                    }
                    if !(1..=31).contains(day) {
                        return Err(HabitError::Validation(format!(
                            "day {day} out of range 1..31"
                        )));
                    }
                    Ok(())
                }
                DayOfYearPattern::WeekdayOrdinal { weekday, ordinal } => {
                    validate_weekday_ordinal(*weekday, *ordinal)
                }
            },
        }
    }
}

fn validate_weekday_ordinal(weekday: u8, ordinal: u8) -> Result<()> {
    if weekday > 6 {
        return Err(HabitError::Validation(format!(
            "weekday {weekday} out of range 0..6"
        )));
    }
    if !(1..=5).contains(&ordinal) {
        return Err(HabitError::Validation(format!(
            "ordinal {ordinal} out of range 1..5"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_requires_positive_value() {
        let p = DaysPattern::Interval {
            value: 0,
            unit: IntervalUnit::Days,
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn day_of_week_rejects_empty() {
        let p = DaysPattern::DayOfWeek {
            days: BTreeSet::new(),
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn day_of_week_rejects_out_of_range() {
        let mut days = BTreeSet::new();
        days.insert(7);
        let p = DaysPattern::DayOfWeek { days };
        assert!(p.validate().is_err());
    }

    #[test]
    fn weekday_ordinal_rejects_ordinal_zero() {
        let p = DaysPattern::DayOfMonth {
            variant: DayOfMonthPattern::WeekdayOrdinal {
                weekday: 2,
                ordinal: 0,
            },
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn date_pattern_accepts_feb_29() {
        let p = DaysPattern::DayOfYear {
            variant: DayOfYearPattern::Date { month: 2, day: 29 },
        };
        assert!(p.validate().is_ok());
    }

    #[test]
    fn serde_roundtrip_day_of_month_last_day() {
        let p = DaysPattern::DayOfMonth {
            variant: DayOfMonthPattern::LastDay {},
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: DaysPattern = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
