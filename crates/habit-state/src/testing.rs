use chrono::Utc;
use habit_core::{
    DaysPattern, IntervalUnit, NotificationPreference, Reminder, ReminderStatus, Schedule,
    Tracking, TrackingState, User,
};
use uuid::Uuid;

use crate::error::StateError;
use crate::store::Store;

fn test_user() -> User {
    User {
        id: Uuid::new_v4(),
        email: "conformance@example.com".into(),
        timezone: "UTC".into(),
        locale: "en-US".into(),
        notification_preference: NotificationPreference::Email,
    }
}

fn test_tracking(user_id: Uuid) -> Tracking {
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
        schedules: vec![Schedule::new(9, 0)],
        state: TrackingState::Running,
        created_at: now,
        updated_at: now,
    }
}

fn test_reminder(tracking_id: Uuid, user_id: Uuid) -> Reminder {
    let now = Utc::now();
    Reminder {
        id: Uuid::new_v4(),
        tracking_id,
        user_id,
        scheduled_time: now,
        notes: None,
        answer_value: None,
        status: ReminderStatus::Upcoming,
        created_at: now,
        updated_at: now,
    }
}

/// Run the full store conformance test suite against a fresh backend
/// instance. Call this from each backend crate's own test module.
///
/// # Errors
///
/// Returns an error if any conformance check fails.
pub async fn run_store_conformance_tests(store: &dyn Store) -> Result<(), StateError> {
    test_user_roundtrip(store).await?;
    test_tracking_roundtrip(store).await?;
    test_load_trackings_excludes_deleted(store).await?;
    test_reminder_roundtrip(store).await?;
    test_upcoming_replace_is_atomic(store).await?;
    test_scan_upcoming_due_ordering(store).await?;
    test_load_reminders_for_user(store).await?;
    Ok(())
}

async fn test_user_roundtrip(store: &dyn Store) -> Result<(), StateError> {
    let user = test_user();
    store.upsert_user(&user).await?;
    let loaded = store.load_user(user.id).await?;
    assert_eq!(loaded, Some(user));
    Ok(())
}

async fn test_tracking_roundtrip(store: &dyn Store) -> Result<(), StateError> {
    let user = test_user();
    store.upsert_user(&user).await?;
    let tracking = test_tracking(user.id);
    store.insert_tracking(&tracking).await?;
    let loaded = store.load_tracking(tracking.id, user.id).await?;
    assert_eq!(loaded, Some(tracking.clone()));

    let mut updated = tracking.clone();
    updated.question = "Did you stretch today?".into();
    store.update_tracking_fields(&updated).await?;
    let loaded = store.load_tracking(tracking.id, user.id).await?;
    assert_eq!(loaded.map(|t| t.question), Some(updated.question));
    Ok(())
}

async fn test_load_trackings_excludes_deleted(store: &dyn Store) -> Result<(), StateError> {
    let user = test_user();
    store.upsert_user(&user).await?;
    let running = test_tracking(user.id);
    let mut deleted = test_tracking(user.id);
    deleted.state = TrackingState::Deleted;
    store.insert_tracking(&running).await?;
    store.insert_tracking(&deleted).await?;

    let loaded = store.load_trackings_for_user(user.id).await?;
    assert!(loaded.iter().any(|t| t.id == running.id));
    assert!(!loaded.iter().any(|t| t.id == deleted.id));
    Ok(())
}

async fn test_reminder_roundtrip(store: &dyn Store) -> Result<(), StateError> {
    let user = test_user();
    store.upsert_user(&user).await?;
    let tracking = test_tracking(user.id);
    store.insert_tracking(&tracking).await?;
    let reminder = test_reminder(tracking.id, user.id);
    store.insert_reminder(&reminder).await?;

    let loaded = store.load_reminder(reminder.id, user.id).await?;
    assert_eq!(loaded, Some(reminder.clone()));

    store.delete_reminder(reminder.id, user.id).await?;
    let loaded = store.load_reminder(reminder.id, user.id).await?;
    assert_eq!(loaded, None);
    Ok(())
}

async fn test_upcoming_replace_is_atomic(store: &dyn Store) -> Result<(), StateError> {
    let user = test_user();
    store.upsert_user(&user).await?;
    let tracking = test_tracking(user.id);
    store.insert_tracking(&tracking).await?;

    let first = test_reminder(tracking.id, user.id);
    store.insert_reminder(&first).await?;

    let second = test_reminder(tracking.id, user.id);
    let tracking_id = tracking.id;
    let user_id = user.id;
    let second_clone = second.clone();
    store
        .within_transaction(Box::new(move |txn| {
            Box::pin(async move {
                txn.delete_upcoming_for_tracking(tracking_id, user_id).await?;
                txn.insert_reminder(&second_clone).await?;
                Ok(())
            })
        }))
        .await?;

    let upcoming = store.load_upcoming_for_tracking(tracking.id, user.id).await?;
    assert_eq!(upcoming.as_ref().map(|r| r.id), Some(second.id));
    assert_ne!(upcoming.map(|r| r.id), Some(first.id));
    Ok(())
}

async fn test_scan_upcoming_due_ordering(store: &dyn Store) -> Result<(), StateError> {
    let user = test_user();
    store.upsert_user(&user).await?;
    let tracking = test_tracking(user.id);
    store.insert_tracking(&tracking).await?;

    let mut earlier = test_reminder(tracking.id, user.id);
    earlier.scheduled_time = Utc::now() - chrono::Duration::hours(2);
    let mut later = test_reminder(tracking.id, user.id);
    later.scheduled_time = Utc::now() - chrono::Duration::hours(1);
    store.insert_reminder(&later).await?;
    store.insert_reminder(&earlier).await?;

    let due = store.scan_upcoming_due(Utc::now()).await?;
    let ids: Vec<Uuid> = due.iter().map(|d| d.reminder.id).collect();
    let earlier_pos = ids.iter().position(|id| *id == earlier.id);
    let later_pos = ids.iter().position(|id| *id == later.id);
    if let (Some(e), Some(l)) = (earlier_pos, later_pos) {
        assert!(e < l, "scan_upcoming_due must order by scheduled_time ascending");
    }
    Ok(())
}

async fn test_load_reminders_for_user(store: &dyn Store) -> Result<(), StateError> {
    let user = test_user();
    store.upsert_user(&user).await?;
    let tracking = test_tracking(user.id);
    store.insert_tracking(&tracking).await?;

    let other_user = test_user();
    store.upsert_user(&other_user).await?;
    let other_tracking = test_tracking(other_user.id);
    store.insert_tracking(&other_tracking).await?;

    let mine = test_reminder(tracking.id, user.id);
    let theirs = test_reminder(other_tracking.id, other_user.id);
    store.insert_reminder(&mine).await?;
    store.insert_reminder(&theirs).await?;

    let loaded = store.load_reminders_for_user(user.id).await?;
    assert!(loaded.iter().any(|r| r.id == mine.id));
    assert!(!loaded.iter().any(|r| r.id == theirs.id));
    Ok(())
}
