use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use habit_core::{Reminder, Schedule, Tracking, TrackingState, User};
use uuid::Uuid;

use crate::error::StateError;
use crate::types::DueReminder;

/// A transaction-scoped view of the subset of [`Store`] operations needed
/// for the "replace a tracking's Upcoming reminder" compound step (spec
/// invariant I1): deleting whatever Upcoming/Pending rows exist and
/// inserting the freshly computed one must be atomic, or a crash between
/// the two leaves either zero or two Upcoming rows for the same tracking.
pub trait Transaction: Send {
    fn delete_upcoming_for_tracking<'a>(
        &'a mut self,
        tracking_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'a, Result<u64, StateError>>;

    fn delete_pending_for_tracking<'a>(
        &'a mut self,
        tracking_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'a, Result<u64, StateError>>;

    fn insert_reminder<'a>(
        &'a mut self,
        reminder: &'a Reminder,
    ) -> BoxFuture<'a, Result<(), StateError>>;

    fn update_tracking_state<'a>(
        &'a mut self,
        tracking_id: Uuid,
        user_id: Uuid,
        state: TrackingState,
    ) -> BoxFuture<'a, Result<(), StateError>>;
}

pub type TransactionBody = Box<
    dyn for<'a> FnOnce(&'a mut dyn Transaction) -> BoxFuture<'a, Result<(), StateError>> + Send,
>;

/// Persistence boundary for the tracking/reminder relational model. Every
/// method is atomic; reads outside an explicit transaction observe the
/// last committed state.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read-only lookup used by the engine for timezone and notification
    /// preference; user profile CRUD lives outside this crate's scope.
    async fn load_user(&self, user_id: Uuid) -> Result<Option<User>, StateError>;

    /// Create or replace a user row. Used by the auth/profile collaborator
    /// stub and by test fixtures, never by `habit-engine` itself.
    async fn upsert_user(&self, user: &User) -> Result<(), StateError>;

    async fn insert_tracking(&self, tracking: &Tracking) -> Result<(), StateError>;
    async fn load_tracking(&self, id: Uuid, user_id: Uuid) -> Result<Option<Tracking>, StateError>;
    /// Excludes trackings in state `Deleted`.
    async fn load_trackings_for_user(&self, user_id: Uuid) -> Result<Vec<Tracking>, StateError>;
    async fn update_tracking_fields(&self, tracking: &Tracking) -> Result<(), StateError>;
    async fn update_tracking_state(
        &self,
        id: Uuid,
        user_id: Uuid,
        state: TrackingState,
    ) -> Result<(), StateError>;
    async fn delete_tracking_cascade(&self, id: Uuid, user_id: Uuid) -> Result<(), StateError>;

    async fn insert_schedules(&self, tracking_id: Uuid, schedules: &[Schedule]) -> Result<(), StateError>;
    async fn replace_schedules(&self, tracking_id: Uuid, schedules: &[Schedule]) -> Result<(), StateError>;

    async fn insert_reminder(&self, reminder: &Reminder) -> Result<(), StateError>;
    async fn load_reminder(&self, id: Uuid, user_id: Uuid) -> Result<Option<Reminder>, StateError>;
    /// All of a user's reminders across every tracking, newest `scheduled_time` first.
    async fn load_reminders_for_user(&self, user_id: Uuid) -> Result<Vec<Reminder>, StateError>;
    async fn update_reminder_fields(&self, reminder: &Reminder) -> Result<(), StateError>;
    async fn delete_reminder(&self, id: Uuid, user_id: Uuid) -> Result<(), StateError>;

    async fn load_upcoming_for_tracking(
        &self,
        tracking_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Reminder>, StateError>;
    async fn delete_upcoming_for_tracking(&self, tracking_id: Uuid, user_id: Uuid) -> Result<u64, StateError>;
    async fn delete_pending_for_tracking(&self, tracking_id: Uuid, user_id: Uuid) -> Result<u64, StateError>;

    /// Upcoming reminders due at or before `as_of`, ordered by
    /// `scheduled_time` ascending.
    async fn scan_upcoming_due(&self, as_of: DateTime<Utc>) -> Result<Vec<DueReminder>, StateError>;

    /// Run `body` against a transaction-scoped [`Transaction`], committing
    /// on `Ok` and rolling back on `Err`.
    async fn within_transaction(&self, body: TransactionBody) -> Result<(), StateError>;
}
