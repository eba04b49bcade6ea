use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use habit_core::{DayOfMonthPattern, DayOfYearPattern, DaysPattern, IntervalUnit, Schedule};

use crate::error::{RecurrenceError, Result};

/// Horizon bound: give up after this many candidate days without a match.
const HORIZON_DAYS: i64 = 3653;

/// Find the next instant a tracking's pattern and schedules fire at,
/// strictly after `now` and not equal to `excluded`.
///
/// `anchor_date` is the tracking's creation date, already converted to the
/// user's local timezone; it is the origin of `Interval` arithmetic and is
/// ignored by every other pattern kind.
pub fn next(
    pattern: &DaysPattern,
    schedules: &[Schedule],
    timezone: Tz,
    anchor_date: NaiveDate,
    now: DateTime<Utc>,
    excluded: Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>> {
    validate_schedules_nonempty(schedules)?;
    pattern
        .validate()
        .map_err(|e| RecurrenceError::InvalidPattern(e.to_string()))?;

    let mut sorted_schedules: Vec<Schedule> = schedules.to_vec();
    sorted_schedules.sort();

    let local_now = now.with_timezone(&timezone);
    let mut candidate = local_now.date_naive();

    for _ in 0..=HORIZON_DAYS {
        if pattern_matches_date(pattern, anchor_date, candidate)? {
            for schedule in &sorted_schedules {
                let Some(naive_time) =
                    candidate.and_hms_opt(schedule.hour as u32, schedule.minute as u32, 0)
                else {
                    continue;
                };
                let local_candidate = match timezone.from_local_datetime(&naive_time).earliest() {
                    Some(dt) => dt,
                    None => continue,
                };
                let instant = local_candidate.with_timezone(&Utc);
                if instant > now && Some(instant) != excluded {
                    return Ok(Some(instant));
                }
            }
        }
        candidate = candidate
            .succ_opt()
            .ok_or_else(|| RecurrenceError::InvalidPattern("calendar overflow".into()))?;
    }
    Ok(None)
}

fn validate_schedules_nonempty(schedules: &[Schedule]) -> Result<()> {
    if schedules.is_empty() {
        return Err(RecurrenceError::InvalidPattern(
            "at least one schedule is required".into(),
        ));
    }
    Ok(())
}

fn pattern_matches_date(pattern: &DaysPattern, anchor: NaiveDate, date: NaiveDate) -> Result<bool> {
    match pattern {
        DaysPattern::Interval { value, unit } => Ok(interval_matches(anchor, date, *value, *unit)),
        DaysPattern::DayOfWeek { days } => {
            let wd = weekday_index(date.weekday());
            Ok(days.contains(&wd))
        }
        DaysPattern::DayOfMonth { variant } => match variant {
            DayOfMonthPattern::DayNumber { day_numbers } => {
                Ok(day_numbers.contains(&(date.day() as u8)))
            }
            DayOfMonthPattern::LastDay {} => Ok(date.day() == days_in_month(date.year(), date.month())),
            DayOfMonthPattern::WeekdayOrdinal { weekday, ordinal } => {
                Ok(weekday_index(date.weekday()) == *weekday
                    && ordinal_of_weekday_in_month(date) == *ordinal as u32)
            }
        },
        DaysPattern::DayOfYear { variant } => match variant {
            DayOfYearPattern::Date { month, day } => {
                Ok(date.month() == *month as u32 && date.day() == *day as u32)
            }
            DayOfYearPattern::WeekdayOrdinal { weekday, ordinal } => {
                Ok(weekday_index(date.weekday()) == *weekday
                    && ordinal_of_weekday_in_year(date) == *ordinal as u32)
            }
        },
    }
}

/// 0 = Sunday, matching the wire representation in `habit-core`.
fn weekday_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_sunday() as u8
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1).expect("valid month");
    first_of_next
        .pred_opt()
        .expect("month has at least one day")
        .day()
}

fn ordinal_of_weekday_in_month(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

fn ordinal_of_weekday_in_year(date: NaiveDate) -> u32 {
    (date.ordinal() - 1) / 7 + 1
}

fn interval_matches(anchor: NaiveDate, date: NaiveDate, value: u32, unit: IntervalUnit) -> bool {
    if date < anchor {
        return false;
    }
    let value = value as i64;
    match unit {
        IntervalUnit::Days => (date - anchor).num_days() % value == 0,
        IntervalUnit::Weeks => (date - anchor).num_days() % (7 * value) == 0,
        IntervalUnit::Months => {
            let months_diff =
                (date.year() - anchor.year()) as i64 * 12 + (date.month() as i64 - anchor.month() as i64);
            if months_diff < 0 || months_diff % value != 0 {
                return false;
            }
            let expected_day = anchor.day().min(days_in_month(date.year(), date.month()));
            date.day() == expected_day
        }
        IntervalUnit::Years => {
            let years_diff = (date.year() - anchor.year()) as i64;
            if years_diff < 0 || years_diff % value != 0 {
                return false;
            }
            let (expected_month, expected_day) = if anchor.month() == 2 && anchor.day() == 29 {
                if is_leap_year(date.year()) {
                    (2, 29)
                } else {
                    (2, 28)
                }
            } else {
                (anchor.month(), anchor.day())
            };
            date.month() == expected_month && date.day() == expected_day
        }
    }
}

fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;
    use habit_core::{DayOfMonthPattern as DM, DayOfYearPattern as DY};
    use std::collections::BTreeSet;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn sched(h: u8, m: u8) -> Schedule {
        Schedule::new(h, m)
    }

    #[test]
    fn daily_interval_in_buenos_aires() {
        // Tracking "Drink water" zone America/Argentina/Buenos_Aires,
        // schedules [08:00, 20:00], Interval value=1 unit=days,
        // created 2025-01-10T10:00:00-03:00. chain_next at creation time
        // should yield 2025-01-10T20:00:00-03:00 == 23:00 UTC.
        let tz: Tz = "America/Argentina/Buenos_Aires".parse().unwrap();
        let anchor = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let now = utc(2025, 1, 10, 13, 0); // 10:00 -03:00
        let pattern = DaysPattern::Interval {
            value: 1,
            unit: IntervalUnit::Days,
        };
        let schedules = vec![sched(8, 0), sched(20, 0)];
        let result = next(&pattern, &schedules, tz, anchor, now, None).unwrap();
        assert_eq!(result, Some(utc(2025, 1, 10, 23, 0)));
    }

    #[test]
    fn day_of_week_sun_sat_from_wednesday() {
        let tz = Tz::UTC;
        let anchor = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut days = BTreeSet::new();
        days.insert(0u8);
        days.insert(6u8);
        let pattern = DaysPattern::DayOfWeek { days };
        let schedules = vec![sched(9, 0)];
        // 2025-01-08 is a Wednesday.
        let now = utc(2025, 1, 8, 9, 1);
        let result = next(&pattern, &schedules, tz, anchor, now, None).unwrap();
        // 2025-01-11 is a Saturday.
        assert_eq!(result, Some(utc(2025, 1, 11, 9, 0)));
    }

    #[test]
    fn last_day_of_month_skips_into_march() {
        let tz = Tz::UTC;
        let anchor = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let pattern = DaysPattern::DayOfMonth {
            variant: DM::LastDay {},
        };
        let schedules = vec![sched(12, 0)];
        let now = utc(2025, 2, 28, 13, 0);
        let result = next(&pattern, &schedules, tz, anchor, now, None).unwrap();
        assert_eq!(result, Some(utc(2025, 3, 31, 12, 0)));
    }

    #[test]
    fn day_number_31_skips_february() {
        let tz = Tz::UTC;
        let anchor = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut nums = BTreeSet::new();
        nums.insert(31u8);
        let pattern = DaysPattern::DayOfMonth {
            variant: DM::DayNumber { day_numbers: nums },
        };
        let schedules = vec![sched(9, 0)];
        let now = utc(2025, 1, 31, 10, 0);
        let result = next(&pattern, &schedules, tz, anchor, now, None).unwrap();
        assert_eq!(result, Some(utc(2025, 3, 31, 9, 0)));
    }

    #[test]
    fn date_feb_29_skips_to_next_leap_year() {
        let tz = Tz::UTC;
        let anchor = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let pattern = DaysPattern::DayOfYear {
            variant: DY::Date { month: 2, day: 29 },
        };
        let schedules = vec![sched(9, 0)];
        let now = utc(2025, 3, 1, 0, 0);
        let result = next(&pattern, &schedules, tz, anchor, now, None).unwrap();
        assert_eq!(result, Some(utc(2028, 2, 29, 9, 0)));
    }

    #[test]
    fn weekday_ordinal_fifth_occurrence_skips_short_months() {
        let tz = Tz::UTC;
        let anchor = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        // 5th Thursday (weekday=4) — occurs in 2025-01 (30th) but not 2025-02.
        let pattern = DaysPattern::DayOfMonth {
            variant: DM::WeekdayOrdinal {
                weekday: 4,
                ordinal: 5,
            },
        };
        let schedules = vec![sched(9, 0)];
        let now = utc(2025, 2, 1, 0, 0);
        let result = next(&pattern, &schedules, tz, anchor, now, None).unwrap();
        // Next month with a 5th Thursday is May 2025 (1,8,15,22,29).
        assert_eq!(result, Some(utc(2025, 5, 29, 9, 0)));
    }

    #[test]
    fn interval_months_clips_to_month_end() {
        let tz = Tz::UTC;
        let anchor = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let pattern = DaysPattern::Interval {
            value: 1,
            unit: IntervalUnit::Months,
        };
        let schedules = vec![sched(9, 0)];
        let now = utc(2025, 1, 31, 10, 0);
        let result = next(&pattern, &schedules, tz, anchor, now, None).unwrap();
        // February has no 31st; clips to 2025-02-28.
        assert_eq!(result, Some(utc(2025, 2, 28, 9, 0)));
    }

    #[test]
    fn excluded_instant_is_skipped() {
        let tz = Tz::UTC;
        let anchor = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let pattern = DaysPattern::Interval {
            value: 1,
            unit: IntervalUnit::Days,
        };
        let schedules = vec![sched(9, 0)];
        let now = utc(2025, 1, 1, 0, 0);
        let excluded = utc(2025, 1, 1, 9, 0);
        let result = next(&pattern, &schedules, tz, anchor, now, Some(excluded)).unwrap();
        assert_eq!(result, Some(utc(2025, 1, 2, 9, 0)));
    }

    #[test]
    fn rejects_empty_schedule_list() {
        let tz = Tz::UTC;
        let anchor = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let pattern = DaysPattern::Interval {
            value: 1,
            unit: IntervalUnit::Days,
        };
        let now = utc(2025, 1, 1, 0, 0);
        assert!(next(&pattern, &[], tz, anchor, now, None).is_err());
    }
}
