//! Domain types for the habit tracker's scheduling and reminder engine.
//!
//! This crate has no I/O and no knowledge of storage or transport; it only
//! describes the shape of the data and the invariants that hold on it in
//! isolation. `habit-recurrence`, `habit-state*`, and `habit-engine` build
//! on top of these types rather than redefining them.

pub mod days_pattern;
pub mod error;
pub mod reminder;
pub mod schedule;
pub mod tracking;
pub mod user;

pub use days_pattern::{DayOfMonthPattern, DayOfYearPattern, DaysPattern, IntervalUnit};
pub use error::{HabitError, Result};
pub use reminder::{AnswerValue, Reminder, ReminderStatus};
pub use schedule::Schedule;
pub use tracking::{Tracking, TrackingState};
pub use user::{NotificationPreference, User};
