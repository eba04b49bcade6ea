use std::collections::HashMap;

use habit_core::{Reminder, Tracking, User};
use uuid::Uuid;

/// The whole in-memory dataset, cloned wholesale by [`crate::store::MemoryStore::within_transaction`]
/// to give transactions atomic all-or-nothing semantics without a real
/// write-ahead log.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryDb {
    pub(crate) users: HashMap<Uuid, User>,
    pub(crate) trackings: HashMap<Uuid, Tracking>,
    pub(crate) reminders: HashMap<Uuid, Reminder>,
}
