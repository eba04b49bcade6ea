use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use habit_bus::{BusEvent, EventBus};
use habit_core::{Reminder, ReminderStatus, Tracking, User};
use habit_notifier::{retry::with_backoff, DynNotifier};
use habit_state::{DueReminder, Store};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::reminder::ReminderEngine;

/// Tuning knobs read from the process environment (spec §6):
/// `TICK_INTERVAL_SECONDS`, `NOTIFIER_MAX_CONCURRENCY`,
/// `SHUTDOWN_GRACE_SECONDS`.
#[derive(Debug, Clone)]
pub struct TickerConfig {
    pub tick_interval: Duration,
    pub notifier_max_concurrency: usize,
    pub shutdown_grace: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            notifier_max_concurrency: 16,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// The process-wide periodic scan that promotes due Upcoming reminders to
/// Pending and fans their delivery out to the notifier port. Runs on a
/// single task; ticks never overlap (a tick still in flight when the next
/// one is due is simply skipped, not queued).
pub struct Ticker {
    config: TickerConfig,
    store: Arc<dyn Store>,
    bus: Arc<EventBus>,
    engine: Arc<ReminderEngine>,
    notifier: Arc<dyn DynNotifier>,
    dispatch_semaphore: Arc<Semaphore>,
    dispatch_tracker: TaskTracker,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Ticker {
    /// Build a `Ticker` and return it alongside the sender half of its
    /// shutdown channel.
    pub fn new(
        config: TickerConfig,
        store: Arc<dyn Store>,
        bus: Arc<EventBus>,
        engine: Arc<ReminderEngine>,
        notifier: Arc<dyn DynNotifier>,
    ) -> (Self, mpsc::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let dispatch_semaphore = Arc::new(Semaphore::new(config.notifier_max_concurrency));
        let ticker = Self {
            config,
            store,
            bus,
            engine,
            notifier,
            dispatch_semaphore,
            dispatch_tracker: TaskTracker::new(),
            shutdown_rx,
        };
        (ticker, shutdown_tx)
    }

    /// Run until a shutdown signal arrives, then wait up to
    /// `shutdown_grace` for in-flight notifier dispatch jobs to finish.
    pub async fn run(&mut self) {
        info!(tick_interval_secs = self.config.tick_interval.as_secs(), "ticker starting");

        let mut tick = interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("ticker received shutdown signal");
                    break;
                }
                _ = tick.tick() => {
                    self.run_tick().await;
                }
            }
        }

        self.dispatch_tracker.close();
        if tokio::time::timeout(self.config.shutdown_grace, self.dispatch_tracker.wait())
            .await
            .is_err()
        {
            warn!(
                grace_secs = self.config.shutdown_grace.as_secs(),
                "shutdown grace period elapsed with notifier dispatch jobs still in flight"
            );
        }
        info!("ticker stopped");
    }

    /// A single scan-and-promote pass (spec §4.5). A failing reminder is
    /// logged and skipped; it never aborts the rest of the pass.
    async fn run_tick(&self) {
        let as_of = Utc::now();
        let due = match self.store.scan_upcoming_due(as_of).await {
            Ok(rows) => rows,
            Err(err) => {
                error!(error = %err, "scan_upcoming_due failed, skipping this tick");
                return;
            }
        };

        let mut touched: HashMap<Uuid, (Tracking, DateTime<Utc>)> = HashMap::new();

        for DueReminder { mut reminder, tracking, user } in due {
            let reminder_id = reminder.id;

            reminder.status = ReminderStatus::Pending;
            reminder.updated_at = Utc::now();
            if let Err(err) = self.store.update_reminder_fields(&reminder).await {
                error!(reminder_id = %reminder_id, error = %err, "failed to promote reminder to pending, skipping");
                continue;
            }

            self.bus
                .publish(
                    user.id,
                    BusEvent::ReminderDuePending {
                        tracking_id: tracking.id,
                        reminder_id,
                        scheduled_time: reminder.scheduled_time,
                    },
                )
                .await;

            touched.insert(tracking.id, (tracking.clone(), reminder.scheduled_time));
            self.spawn_dispatch(user, tracking, reminder);
        }

        for (tracking, excluded_instant) in touched.into_values() {
            self.engine.chain_next_logged(&tracking, Some(excluded_instant)).await;
        }
    }

    /// Fire-and-forget dispatch of a single reminder, bounded by
    /// `notifier_max_concurrency` in-flight jobs at a time.
    fn spawn_dispatch(&self, user: User, tracking: Tracking, reminder: Reminder) {
        let notifier = Arc::clone(&self.notifier);
        let semaphore = Arc::clone(&self.dispatch_semaphore);
        let reminder_id = reminder.id;

        self.dispatch_tracker.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            let attempt = || {
                let notifier = Arc::clone(&notifier);
                let user = user.clone();
                let tracking = tracking.clone();
                let reminder = reminder.clone();
                async move { notifier.deliver(&user, &tracking, &reminder).await }
            };
            if let Err(err) = with_backoff(attempt).await {
                warn!(reminder_id = %reminder_id, error = %err, "notifier delivery failed permanently");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use habit_core::{DaysPattern, IntervalUnit, NotificationPreference, Reminder as CoreReminder, Schedule};
    use habit_notifier::{Notifier, NotifierError};
    use habit_state_memory::MemoryStore;

    use super::*;

    struct CountingNotifier {
        calls: AtomicUsize,
    }

    impl Notifier for CountingNotifier {
        fn name(&self) -> &str {
            "counting"
        }

        async fn deliver(&self, _user: &User, _tracking: &Tracking, _reminder: &CoreReminder) -> Result<(), NotifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            timezone: "UTC".into(),
            locale: "en-US".into(),
            notification_preference: NotificationPreference::Email,
        }
    }

    fn tracking(user_id: Uuid) -> Tracking {
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
            state: habit_core::TrackingState::Running,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn promotes_due_reminder_and_chains_next() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let bus = Arc::new(EventBus::new(16));
        let engine = Arc::new(ReminderEngine::new(store.clone(), bus.clone()));
        let notifier: Arc<dyn DynNotifier> = Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
        });

        let u = user();
        store.upsert_user(&u).await.unwrap();
        let t = tracking(u.id);
        store.insert_tracking(&t).await.unwrap();

        let due_reminder = CoreReminder {
            id: Uuid::new_v4(),
            tracking_id: t.id,
            user_id: u.id,
            scheduled_time: Utc::now() - ChronoDuration::minutes(1),
            notes: None,
            answer_value: None,
            status: ReminderStatus::Upcoming,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.insert_reminder(&due_reminder).await.unwrap();

        let (mut ticker, _shutdown_tx) = Ticker::new(
            TickerConfig::default(),
            store.clone(),
            bus.clone(),
            engine,
            notifier,
        );
        ticker.run_tick().await;
        ticker.dispatch_tracker.close();
        ticker.dispatch_tracker.wait().await;

        let promoted = store.load_reminder(due_reminder.id, u.id).await.unwrap().unwrap();
        assert_eq!(promoted.status, ReminderStatus::Pending);

        let upcoming = store.load_upcoming_for_tracking(t.id, u.id).await.unwrap();
        assert!(upcoming.is_some());
        assert_ne!(upcoming.unwrap().scheduled_time, due_reminder.scheduled_time);
    }

    #[tokio::test]
    async fn shutdown_signal_stops_the_run_loop() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let bus = Arc::new(EventBus::new(16));
        let engine = Arc::new(ReminderEngine::new(store.clone(), bus.clone()));
        let notifier: Arc<dyn DynNotifier> = Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
        });

        let mut config = TickerConfig::default();
        config.tick_interval = Duration::from_secs(3600);
        let (mut ticker, shutdown_tx) = Ticker::new(config, store, bus, engine, notifier);

        let handle = tokio::spawn(async move {
            ticker.run().await;
        });
        shutdown_tx.send(()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("ticker did not stop after shutdown signal")
            .unwrap();
    }
}
