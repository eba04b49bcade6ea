use async_trait::async_trait;
use habit_core::{Reminder, Tracking, User};

use crate::error::NotifierError;

/// Strongly-typed outbound notifier with native `async fn`.
///
/// Not object-safe (native `async fn` desugars to an opaque `impl Future`);
/// use [`DynNotifier`] for `Arc<dyn DynNotifier>` registries. Every
/// `Notifier` automatically implements `DynNotifier` via the blanket impl
/// below.
pub trait Notifier: Send + Sync {
    /// Adapter identity, e.g. `"email"` or `"telegram"`.
    fn name(&self) -> &str;

    /// Deliver a reminder notification. The adapter picks the channel from
    /// `user.notification_preference` — callers don't need to branch on it.
    fn deliver(
        &self,
        user: &User,
        tracking: &Tracking,
        reminder: &Reminder,
    ) -> impl std::future::Future<Output = Result<(), NotifierError>> + Send;
}

/// Object-safe counterpart of [`Notifier`] for `Arc<dyn DynNotifier>`
/// registries.
#[async_trait]
pub trait DynNotifier: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, user: &User, tracking: &Tracking, reminder: &Reminder) -> Result<(), NotifierError>;
}

#[async_trait]
impl<T: Notifier + Sync> DynNotifier for T {
    fn name(&self) -> &str {
        Notifier::name(self)
    }

    async fn deliver(&self, user: &User, tracking: &Tracking, reminder: &Reminder) -> Result<(), NotifierError> {
        Notifier::deliver(self, user, tracking, reminder).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::Utc;
    use habit_core::{NotificationPreference, ReminderStatus, Schedule, TrackingState};
    use uuid::Uuid;

    use super::*;

    struct CountingNotifier {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Notifier for CountingNotifier {
        fn name(&self) -> &str {
            "counting"
        }

        async fn deliver(&self, _user: &User, _tracking: &Tracking, _reminder: &Reminder) -> Result<(), NotifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(NotifierError::Permanent("nope".into()));
            }
            Ok(())
        }
    }

    fn fixtures() -> (User, Tracking, Reminder) {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            timezone: "UTC".into(),
            locale: "en-US".into(),
            notification_preference: NotificationPreference::Email,
        };
        let now = Utc::now();
        let tracking = Tracking {
            id: Uuid::new_v4(),
            user_id: user.id,
            question: "Did you stretch?".into(),
            notes: None,
            icon: None,
            days: None,
            schedules: vec![Schedule::new(9, 0)],
            state: TrackingState::Running,
            created_at: now,
            updated_at: now,
        };
        let reminder = Reminder {
            id: Uuid::new_v4(),
            tracking_id: tracking.id,
            user_id: user.id,
            scheduled_time: now,
            notes: None,
            answer_value: None,
            status: ReminderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        (user, tracking, reminder)
    }

    #[tokio::test]
    async fn blanket_dyn_notifier_impl() {
        let notifier: Arc<dyn DynNotifier> = Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        assert_eq!(notifier.name(), "counting");
        let (user, tracking, reminder) = fixtures();
        notifier.deliver(&user, &tracking, &reminder).await.unwrap();
    }

    #[tokio::test]
    async fn dyn_notifier_propagates_error() {
        let notifier: Arc<dyn DynNotifier> = Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let (user, tracking, reminder) = fixtures();
        let err = notifier.deliver(&user, &tracking, &reminder).await.unwrap_err();
        assert!(matches!(err, NotifierError::Permanent(_)));
    }
}
