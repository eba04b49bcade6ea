use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use habit_bus::{BusEvent, EventBus};
use habit_core::{AnswerValue, Reminder, ReminderStatus, Tracking, TrackingState};
use habit_notifier::{ActionSink, NotifierError, UserAction};
use habit_state::Store;
use tracing::warn;
use uuid::Uuid;

use crate::error::EngineError;

/// Owns the reminder lifecycle: creation, chaining the next occurrence,
/// snoozing, answering, and deletion. Every mutation here is what keeps
/// invariants I1-I6 true after commit -- at most one Upcoming reminder per
/// Running tracking, no duplicate instants, an Answered reminder always
/// carries a value.
pub struct ReminderEngine {
    store: Arc<dyn Store>,
    bus: Arc<EventBus>,
}

impl ReminderEngine {
    pub fn new(store: Arc<dyn Store>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    /// Seed a freshly created tracking with its first reminder: the
    /// caller-supplied one-shot instant, or the first recurrence hit.
    pub async fn create_tracking_initial(
        &self,
        tracking: &Tracking,
        one_shot_instant: Option<DateTime<Utc>>,
    ) -> Result<(), EngineError> {
        if let Some(instant) = one_shot_instant {
            let now = Utc::now();
            let reminder = Reminder {
                id: Uuid::new_v4(),
                tracking_id: tracking.id,
                user_id: tracking.user_id,
                scheduled_time: instant,
                notes: None,
                answer_value: None,
                status: ReminderStatus::Upcoming,
                created_at: now,
                updated_at: now,
            };
            self.store.insert_reminder(&reminder).await?;
            self.bus
                .publish(
                    tracking.user_id,
                    BusEvent::UpcomingReplaced {
                        tracking_id: tracking.id,
                        reminder_id: reminder.id,
                    },
                )
                .await;
        } else {
            self.chain_next_logged(tracking, None).await;
        }
        Ok(())
    }

    /// Compute the tracking's next firing instant and atomically replace
    /// its Upcoming reminder with it. `Ok(None)` covers both a one-shot
    /// tracking (no `days` pattern) and an evaluator search that found no
    /// match within its horizon -- neither is an error, the tracking is
    /// simply left without an Upcoming.
    pub async fn chain_next(
        &self,
        tracking: &Tracking,
        excluded: Option<DateTime<Utc>>,
    ) -> Result<Option<Reminder>, EngineError> {
        let Some(pattern) = &tracking.days else {
            return Ok(None);
        };

        let user = self
            .store
            .load_user(tracking.user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("user {}", tracking.user_id)))?;
        let tz: Tz = user
            .timezone
            .parse()
            .map_err(|_| EngineError::Validation(format!("unknown timezone: {}", user.timezone)))?;
        let anchor_date = tracking.created_at.with_timezone(&tz).date_naive();

        let next_instant =
            habit_recurrence::next(pattern, &tracking.schedules, tz, anchor_date, Utc::now(), excluded)?;
        let Some(instant) = next_instant else {
            return Ok(None);
        };

        let now = Utc::now();
        let reminder = Reminder {
            id: Uuid::new_v4(),
            tracking_id: tracking.id,
            user_id: tracking.user_id,
            scheduled_time: instant,
            notes: None,
            answer_value: None,
            status: ReminderStatus::Upcoming,
            created_at: now,
            updated_at: now,
        };

        let tracking_id = tracking.id;
        let user_id = tracking.user_id;
        let to_insert = reminder.clone();
        self.store
            .within_transaction(Box::new(move |txn| {
                Box::pin(async move {
                    txn.delete_upcoming_for_tracking(tracking_id, user_id).await?;
                    txn.insert_reminder(&to_insert).await
                })
            }))
            .await?;

        self.bus
            .publish(
                tracking.user_id,
                BusEvent::UpcomingReplaced {
                    tracking_id: tracking.id,
                    reminder_id: reminder.id,
                },
            )
            .await;
        Ok(Some(reminder))
    }

    /// Called after a tracking's schedule or pattern changes: recompute the
    /// next instant and replace the Upcoming reminder only if it differs
    /// from what is already stored.
    pub async fn ensure_upcoming_matches(&self, tracking: &Tracking) -> Result<(), EngineError> {
        let Some(pattern) = &tracking.days else {
            return Ok(());
        };
        let user = self
            .store
            .load_user(tracking.user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("user {}", tracking.user_id)))?;
        let tz: Tz = user
            .timezone
            .parse()
            .map_err(|_| EngineError::Validation(format!("unknown timezone: {}", user.timezone)))?;
        let anchor_date = tracking.created_at.with_timezone(&tz).date_naive();
        let next_instant =
            habit_recurrence::next(pattern, &tracking.schedules, tz, anchor_date, Utc::now(), None)?;

        let existing = self
            .store
            .load_upcoming_for_tracking(tracking.id, tracking.user_id)
            .await?;
        let already_matches = matches!(
            (&existing, next_instant),
            (Some(r), Some(instant)) if r.scheduled_time == instant
        ) || (existing.is_none() && next_instant.is_none());
        if already_matches {
            return Ok(());
        }
        self.chain_next(tracking, None).await?;
        Ok(())
    }

    /// Snooze a reminder by `minutes`. Valid from `Pending` or `Upcoming`.
    /// Snoozing a Pending reminder first drops whatever Upcoming the
    /// tracking already chained to, since the snoozed reminder becomes the
    /// tracking's one Upcoming entry (invariant I1).
    pub async fn snooze(&self, reminder_id: Uuid, user_id: Uuid, minutes: u32) -> Result<Reminder, EngineError> {
        let mut reminder = self
            .store
            .load_reminder(reminder_id, user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("reminder {reminder_id}")))?;

        if !matches!(reminder.status, ReminderStatus::Pending | ReminderStatus::Upcoming) {
            return Err(EngineError::InvalidTransition(format!(
                "cannot snooze a reminder in status {:?}",
                reminder.status
            )));
        }

        if reminder.status == ReminderStatus::Pending {
            self.store
                .delete_upcoming_for_tracking(reminder.tracking_id, user_id)
                .await?;
        }

        reminder.scheduled_time += Duration::minutes(i64::from(minutes));
        reminder.status = ReminderStatus::Upcoming;
        reminder.updated_at = Utc::now();
        self.store.update_reminder_fields(&reminder).await?;
        self.bus
            .publish(user_id, BusEvent::ReminderUpdated { reminder_id: reminder.id })
            .await;
        Ok(reminder)
    }

    /// Record the user's answer. Only valid from `Pending`. Chains the
    /// tracking's next occurrence, excluding the instant just answered.
    pub async fn answer(
        &self,
        reminder_id: Uuid,
        user_id: Uuid,
        value: AnswerValue,
        note: Option<String>,
    ) -> Result<Reminder, EngineError> {
        let mut reminder = self
            .store
            .load_reminder(reminder_id, user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("reminder {reminder_id}")))?;

        if reminder.status != ReminderStatus::Pending {
            return Err(EngineError::InvalidTransition(format!(
                "cannot answer a reminder in status {:?}",
                reminder.status
            )));
        }

        let old_scheduled = reminder.scheduled_time;
        reminder.status = ReminderStatus::Answered;
        reminder.answer_value = Some(value);
        if let Some(note) = note {
            reminder.notes = Some(note);
        }
        reminder.updated_at = Utc::now();
        self.store.update_reminder_fields(&reminder).await?;
        self.bus
            .publish(
                user_id,
                BusEvent::ReminderAnswered {
                    reminder_id: reminder.id,
                    answer_value: value,
                },
            )
            .await;

        if let Some(tracking) = self.store.load_tracking(reminder.tracking_id, user_id).await? {
            if tracking.state == TrackingState::Running {
                self.chain_next_logged(&tracking, Some(old_scheduled)).await;
            }
        }

        Ok(reminder)
    }

    /// Equivalent to `answer(..., Dismissed)`.
    pub async fn dismiss_current(&self, reminder_id: Uuid, user_id: Uuid) -> Result<Reminder, EngineError> {
        self.answer(reminder_id, user_id, AnswerValue::Dismissed, None).await
    }

    /// Attach or replace a reminder's free-text note without changing its
    /// status, used by the Telegram adapter's `/note` reply command.
    pub async fn add_note(&self, reminder_id: Uuid, user_id: Uuid, note: String) -> Result<Reminder, EngineError> {
        let mut reminder = self
            .store
            .load_reminder(reminder_id, user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("reminder {reminder_id}")))?;
        reminder.notes = Some(note);
        reminder.updated_at = Utc::now();
        self.store.update_reminder_fields(&reminder).await?;
        self.bus
            .publish(user_id, BusEvent::ReminderUpdated { reminder_id: reminder.id })
            .await;
        Ok(reminder)
    }

    /// Delete a reminder outright. If it was Upcoming or Pending for a
    /// Running tracking, chain the next occurrence so the tracking doesn't
    /// silently go dark.
    pub async fn delete(&self, reminder_id: Uuid, user_id: Uuid) -> Result<(), EngineError> {
        let reminder = self
            .store
            .load_reminder(reminder_id, user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("reminder {reminder_id}")))?;

        self.store.delete_reminder(reminder_id, user_id).await?;
        self.bus
            .publish(user_id, BusEvent::ReminderDeleted { reminder_id })
            .await;

        if matches!(reminder.status, ReminderStatus::Upcoming | ReminderStatus::Pending) {
            if let Some(tracking) = self.store.load_tracking(reminder.tracking_id, user_id).await? {
                if tracking.state == TrackingState::Running {
                    self.chain_next_logged(&tracking, Some(reminder.scheduled_time)).await;
                }
            }
        }

        Ok(())
    }

    /// `chain_next`, with a `SchedulingFailed` outcome logged and swallowed
    /// rather than propagated -- per spec, a scheduling failure never rolls
    /// back the state change that triggered it.
    pub(crate) async fn chain_next_logged(&self, tracking: &Tracking, excluded: Option<DateTime<Utc>>) {
        if let Err(err) = self.chain_next(tracking, excluded).await {
            warn!(
                tracking_id = %tracking.id,
                error = %err,
                "chain_next failed, tracking left without an upcoming reminder"
            );
        }
    }
}

fn engine_err_to_notifier_err(err: EngineError) -> NotifierError {
    match err {
        EngineError::TransientIo(msg) => NotifierError::Transient(msg),
        other => NotifierError::Permanent(other.to_string()),
    }
}

/// Lets chat-bot adapters (e.g. `habit-notifier-telegram`) route parsed
/// inbound actions straight at the engine without depending on it.
#[async_trait]
impl ActionSink for ReminderEngine {
    async fn handle_action(&self, user_id: Uuid, reminder_id: Uuid, action: UserAction) -> Result<(), NotifierError> {
        let result = match action {
            UserAction::Complete => self
                .answer(reminder_id, user_id, AnswerValue::Completed, None)
                .await
                .map(|_| ()),
            UserAction::Dismiss => self.dismiss_current(reminder_id, user_id).await.map(|_| ()),
            UserAction::Snooze(minutes) => self.snooze(reminder_id, user_id, minutes).await.map(|_| ()),
            UserAction::AddNote(text) => self.add_note(reminder_id, user_id, text).await.map(|_| ()),
        };
        result.map_err(engine_err_to_notifier_err)
    }
}

#[cfg(test)]
mod tests {
    use habit_core::{DaysPattern, IntervalUnit, NotificationPreference, Schedule, User};
    use habit_state_memory::MemoryStore;

    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            timezone: "UTC".into(),
            locale: "en-US".into(),
            notification_preference: NotificationPreference::Email,
        }
    }

    fn recurring_tracking(user_id: Uuid) -> Tracking {
        let now = Utc::now();
        Tracking {
            id: Uuid::new_v4(),
            user_id,
            question: "Did you stretch?".into(),
            notes: None,
            icon: None,
            days: Some(DaysPattern::Interval {
                value: 1,
                unit: IntervalUnit::Days,
            }),
            schedules: vec![Schedule::new(9, 0), Schedule::new(21, 0)],
            state: TrackingState::Running,
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup() -> (Arc<MemoryStore>, Arc<EventBus>, ReminderEngine) {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let bus = Arc::new(EventBus::new(16));
        let engine = ReminderEngine::new(store.clone(), bus.clone());
        (store, bus, engine)
    }

    #[tokio::test]
    async fn create_tracking_initial_with_one_shot_instant() {
        let (store, _bus, engine) = setup().await;
        let u = user();
        store.upsert_user(&u).await.unwrap();
        let mut t = recurring_tracking(u.id);
        t.days = None;
        store.insert_tracking(&t).await.unwrap();

        let instant = Utc::now() + Duration::hours(1);
        engine.create_tracking_initial(&t, Some(instant)).await.unwrap();

        let upcoming = store.load_upcoming_for_tracking(t.id, u.id).await.unwrap().unwrap();
        assert_eq!(upcoming.scheduled_time, instant);
        assert_eq!(upcoming.status, ReminderStatus::Upcoming);
    }

    #[tokio::test]
    async fn create_tracking_initial_chains_recurring_pattern() {
        let (store, _bus, engine) = setup().await;
        let u = user();
        store.upsert_user(&u).await.unwrap();
        let t = recurring_tracking(u.id);
        store.insert_tracking(&t).await.unwrap();

        engine.create_tracking_initial(&t, None).await.unwrap();

        let upcoming = store.load_upcoming_for_tracking(t.id, u.id).await.unwrap();
        assert!(upcoming.is_some());
    }

    #[tokio::test]
    async fn double_chain_next_is_idempotent() {
        let (store, _bus, engine) = setup().await;
        let u = user();
        store.upsert_user(&u).await.unwrap();
        let t = recurring_tracking(u.id);
        store.insert_tracking(&t).await.unwrap();

        let first = engine.chain_next(&t, None).await.unwrap().unwrap();
        let second = engine.chain_next(&t, None).await.unwrap().unwrap();
        assert_eq!(first.scheduled_time, second.scheduled_time);

        let remaining = store.load_upcoming_for_tracking(t.id, u.id).await.unwrap();
        assert_eq!(remaining.unwrap().scheduled_time, first.scheduled_time);
    }

    #[tokio::test]
    async fn snooze_then_snooze_again_accumulates() {
        let (store, _bus, engine) = setup().await;
        let u = user();
        store.upsert_user(&u).await.unwrap();
        let t = recurring_tracking(u.id);
        store.insert_tracking(&t).await.unwrap();
        let seeded = engine.chain_next(&t, None).await.unwrap().unwrap();
        let original = seeded.scheduled_time;

        engine.snooze(seeded.id, u.id, 10).await.unwrap();
        let twice = engine.snooze(seeded.id, u.id, 5).await.unwrap();

        assert_eq!(twice.scheduled_time, original + Duration::minutes(15));
        assert_eq!(twice.status, ReminderStatus::Upcoming);
    }

    #[tokio::test]
    async fn answer_then_reanswer_is_rejected() {
        let (store, _bus, engine) = setup().await;
        let u = user();
        store.upsert_user(&u).await.unwrap();
        let t = recurring_tracking(u.id);
        store.insert_tracking(&t).await.unwrap();

        let reminder = Reminder {
            id: Uuid::new_v4(),
            tracking_id: t.id,
            user_id: u.id,
            scheduled_time: Utc::now(),
            notes: None,
            answer_value: None,
            status: ReminderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.insert_reminder(&reminder).await.unwrap();

        let answered = engine
            .answer(reminder.id, u.id, AnswerValue::Completed, None)
            .await
            .unwrap();
        assert_eq!(answered.status, ReminderStatus::Answered);
        assert_eq!(answered.answer_value, Some(AnswerValue::Completed));

        let err = engine
            .answer(reminder.id, u.id, AnswerValue::Dismissed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn answer_chains_the_next_occurrence_excluding_old_instant() {
        let (store, _bus, engine) = setup().await;
        let u = user();
        store.upsert_user(&u).await.unwrap();
        let t = recurring_tracking(u.id);
        store.insert_tracking(&t).await.unwrap();

        let reminder = Reminder {
            id: Uuid::new_v4(),
            tracking_id: t.id,
            user_id: u.id,
            scheduled_time: Utc::now(),
            notes: None,
            answer_value: None,
            status: ReminderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.insert_reminder(&reminder).await.unwrap();

        engine
            .answer(reminder.id, u.id, AnswerValue::Completed, None)
            .await
            .unwrap();

        let upcoming = store.load_upcoming_for_tracking(t.id, u.id).await.unwrap().unwrap();
        assert_ne!(upcoming.scheduled_time, reminder.scheduled_time);
    }

    #[tokio::test]
    async fn delete_not_found_reports_not_found() {
        let (_store, _bus, engine) = setup().await;
        let err = engine.delete(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn one_shot_tracking_chain_next_is_none() {
        let (store, _bus, engine) = setup().await;
        let u = user();
        store.upsert_user(&u).await.unwrap();
        let mut t = recurring_tracking(u.id);
        t.days = None;
        store.insert_tracking(&t).await.unwrap();

        let result = engine.chain_next(&t, None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn action_sink_routes_complete_to_answer() {
        let (store, _bus, engine) = setup().await;
        let u = user();
        store.upsert_user(&u).await.unwrap();
        let t = recurring_tracking(u.id);
        store.insert_tracking(&t).await.unwrap();

        let reminder = Reminder {
            id: Uuid::new_v4(),
            tracking_id: t.id,
            user_id: u.id,
            scheduled_time: Utc::now(),
            notes: None,
            answer_value: None,
            status: ReminderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.insert_reminder(&reminder).await.unwrap();

        ActionSink::handle_action(&engine, u.id, reminder.id, UserAction::Complete)
            .await
            .unwrap();

        let answered = store.load_reminder(reminder.id, u.id).await.unwrap().unwrap();
        assert_eq!(answered.status, ReminderStatus::Answered);
    }
}
