use habit_core::{Reminder, Tracking, User};

/// A single row yielded by [`crate::Store::scan_upcoming_due`]: an
/// `Upcoming` reminder joined with its owning tracking and user, exactly
/// the shape the Ticker needs to promote and dispatch it without a second
/// round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct DueReminder {
    pub reminder: Reminder,
    pub tracking: Tracking,
    pub user: User,
}
