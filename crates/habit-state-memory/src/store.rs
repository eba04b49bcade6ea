use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use habit_core::{Reminder, ReminderStatus, Schedule, Tracking, TrackingState, User};
use habit_state::{DueReminder, StateError, Store, Transaction, TransactionBody};
use tokio::sync::Mutex as TokioMutex;
use uuid::Uuid;

use crate::db::MemoryDb;

/// An in-process [`Store`] backed by a single mutex-guarded dataset.
///
/// Transactions are optimistic: `within_transaction` clones the whole
/// dataset, runs the closure against the clone, and swaps it back in only
/// on success. This is adequate for the engine's single-writer, single-node
/// posture and keeps the backend dependency-free for local development and
/// tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<TokioMutex<MemoryDb>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryTransaction<'a> {
    db: &'a mut MemoryDb,
}

impl Transaction for MemoryTransaction<'_> {
    fn delete_upcoming_for_tracking<'a>(
        &'a mut self,
        tracking_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'a, Result<u64, StateError>> {
        Box::pin(async move {
            let ids: Vec<Uuid> = self
                .db
                .reminders
                .values()
                .filter(|r| {
                    r.tracking_id == tracking_id
                        && r.user_id == user_id
                        && r.status == ReminderStatus::Upcoming
                })
                .map(|r| r.id)
                .collect();
            let count = ids.len() as u64;
            for id in ids {
                self.db.reminders.remove(&id);
            }
            Ok(count)
        })
    }

    fn delete_pending_for_tracking<'a>(
        &'a mut self,
        tracking_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'a, Result<u64, StateError>> {
        Box::pin(async move {
            let ids: Vec<Uuid> = self
                .db
                .reminders
                .values()
                .filter(|r| {
                    r.tracking_id == tracking_id
                        && r.user_id == user_id
                        && r.status == ReminderStatus::Pending
                })
                .map(|r| r.id)
                .collect();
            let count = ids.len() as u64;
            for id in ids {
                self.db.reminders.remove(&id);
            }
            Ok(count)
        })
    }

    fn insert_reminder<'a>(&'a mut self, reminder: &'a Reminder) -> BoxFuture<'a, Result<(), StateError>> {
        Box::pin(async move {
            self.db.reminders.insert(reminder.id, reminder.clone());
            Ok(())
        })
    }

    fn update_tracking_state<'a>(
        &'a mut self,
        tracking_id: Uuid,
        user_id: Uuid,
        state: TrackingState,
    ) -> BoxFuture<'a, Result<(), StateError>> {
        Box::pin(async move {
            match self.db.trackings.get_mut(&tracking_id) {
                Some(t) if t.user_id == user_id => {
                    t.state = state;
                    t.updated_at = Utc::now();
                    Ok(())
                }
                _ => Err(StateError::NotFound(format!("tracking {tracking_id}"))),
            }
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_user(&self, user_id: Uuid) -> Result<Option<User>, StateError> {
        Ok(self.inner.lock().await.users.get(&user_id).cloned())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StateError> {
        self.inner.lock().await.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn insert_tracking(&self, tracking: &Tracking) -> Result<(), StateError> {
        self.inner
            .lock()
            .await
            .trackings
            .insert(tracking.id, tracking.clone());
        Ok(())
    }

    async fn load_tracking(&self, id: Uuid, user_id: Uuid) -> Result<Option<Tracking>, StateError> {
        Ok(self
            .inner
            .lock()
            .await
            .trackings
            .get(&id)
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    async fn load_trackings_for_user(&self, user_id: Uuid) -> Result<Vec<Tracking>, StateError> {
        Ok(self
            .inner
            .lock()
            .await
            .trackings
            .values()
            .filter(|t| t.user_id == user_id && t.state != TrackingState::Deleted)
            .cloned()
            .collect())
    }

    async fn update_tracking_fields(&self, tracking: &Tracking) -> Result<(), StateError> {
        let mut db = self.inner.lock().await;
        match db.trackings.get_mut(&tracking.id) {
            Some(existing) if existing.user_id == tracking.user_id => {
                *existing = tracking.clone();
                Ok(())
            }
            _ => Err(StateError::NotFound(format!("tracking {}", tracking.id))),
        }
    }

    async fn update_tracking_state(
        &self,
        id: Uuid,
        user_id: Uuid,
        state: TrackingState,
    ) -> Result<(), StateError> {
        let mut db = self.inner.lock().await;
        match db.trackings.get_mut(&id) {
            Some(t) if t.user_id == user_id => {
                t.state = state;
                t.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(StateError::NotFound(format!("tracking {id}"))),
        }
    }

    async fn delete_tracking_cascade(&self, id: Uuid, user_id: Uuid) -> Result<(), StateError> {
        let mut db = self.inner.lock().await;
        match db.trackings.get(&id) {
            Some(t) if t.user_id == user_id => {
                db.trackings.remove(&id);
                db.reminders.retain(|_, r| r.tracking_id != id);
                Ok(())
            }
            _ => Err(StateError::NotFound(format!("tracking {id}"))),
        }
    }

    async fn insert_schedules(&self, tracking_id: Uuid, schedules: &[Schedule]) -> Result<(), StateError> {
        self.replace_schedules(tracking_id, schedules).await
    }

    async fn replace_schedules(&self, tracking_id: Uuid, schedules: &[Schedule]) -> Result<(), StateError> {
        let mut db = self.inner.lock().await;
        match db.trackings.get_mut(&tracking_id) {
            Some(t) => {
                t.schedules = schedules.to_vec();
                t.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StateError::NotFound(format!("tracking {tracking_id}"))),
        }
    }

    async fn insert_reminder(&self, reminder: &Reminder) -> Result<(), StateError> {
        self.inner
            .lock()
            .await
            .reminders
            .insert(reminder.id, reminder.clone());
        Ok(())
    }

    async fn load_reminder(&self, id: Uuid, user_id: Uuid) -> Result<Option<Reminder>, StateError> {
        Ok(self
            .inner
            .lock()
            .await
            .reminders
            .get(&id)
            .filter(|r| r.user_id == user_id)
            .cloned())
    }

    async fn load_reminders_for_user(&self, user_id: Uuid) -> Result<Vec<Reminder>, StateError> {
        let mut reminders: Vec<Reminder> = self
            .inner
            .lock()
            .await
            .reminders
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        reminders.sort_by(|a, b| b.scheduled_time.cmp(&a.scheduled_time));
        Ok(reminders)
    }

    async fn update_reminder_fields(&self, reminder: &Reminder) -> Result<(), StateError> {
        let mut db = self.inner.lock().await;
        match db.reminders.get_mut(&reminder.id) {
            Some(existing) if existing.user_id == reminder.user_id => {
                *existing = reminder.clone();
                Ok(())
            }
            _ => Err(StateError::NotFound(format!("reminder {}", reminder.id))),
        }
    }

    async fn delete_reminder(&self, id: Uuid, user_id: Uuid) -> Result<(), StateError> {
        let mut db = self.inner.lock().await;
        match db.reminders.get(&id) {
            Some(r) if r.user_id == user_id => {
                db.reminders.remove(&id);
                Ok(())
            }
            _ => Err(StateError::NotFound(format!("reminder {id}"))),
        }
    }

    async fn load_upcoming_for_tracking(
        &self,
        tracking_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Reminder>, StateError> {
        Ok(self
            .inner
            .lock()
            .await
            .reminders
            .values()
            .find(|r| {
                r.tracking_id == tracking_id && r.user_id == user_id && r.status == ReminderStatus::Upcoming
            })
            .cloned())
    }

    async fn delete_upcoming_for_tracking(&self, tracking_id: Uuid, user_id: Uuid) -> Result<u64, StateError> {
        let mut db = self.inner.lock().await;
        let ids: Vec<Uuid> = db
            .reminders
            .values()
            .filter(|r| {
                r.tracking_id == tracking_id && r.user_id == user_id && r.status == ReminderStatus::Upcoming
            })
            .map(|r| r.id)
            .collect();
        let count = ids.len() as u64;
        for id in ids {
            db.reminders.remove(&id);
        }
        Ok(count)
    }

    async fn delete_pending_for_tracking(&self, tracking_id: Uuid, user_id: Uuid) -> Result<u64, StateError> {
        let mut db = self.inner.lock().await;
        let ids: Vec<Uuid> = db
            .reminders
            .values()
            .filter(|r| {
                r.tracking_id == tracking_id && r.user_id == user_id && r.status == ReminderStatus::Pending
            })
            .map(|r| r.id)
            .collect();
        let count = ids.len() as u64;
        for id in ids {
            db.reminders.remove(&id);
        }
        Ok(count)
    }

    async fn scan_upcoming_due(&self, as_of: DateTime<Utc>) -> Result<Vec<DueReminder>, StateError> {
        let db = self.inner.lock().await;
        let mut due: Vec<DueReminder> = db
            .reminders
            .values()
            .filter(|r| r.status == ReminderStatus::Upcoming && r.scheduled_time <= as_of)
            .filter_map(|r| {
                let tracking = db.trackings.get(&r.tracking_id)?;
                let user = db.users.get(&r.user_id)?;
                Some(DueReminder {
                    reminder: r.clone(),
                    tracking: tracking.clone(),
                    user: user.clone(),
                })
            })
            .collect();
        due.sort_by_key(|d| d.reminder.scheduled_time);
        Ok(due)
    }

    async fn within_transaction(&self, body: TransactionBody) -> Result<(), StateError> {
        let mut guard = self.inner.lock().await;
        let mut scratch = guard.clone();
        let mut txn = MemoryTransaction { db: &mut scratch };
        body(&mut txn).await?;
        *guard = scratch;
        Ok(())
    }
}
