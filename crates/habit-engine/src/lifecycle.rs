use std::sync::Arc;

use habit_bus::{BusEvent, EventBus};
use habit_core::{Tracking, TrackingState};
use habit_state::Store;
use uuid::Uuid;

use crate::error::EngineError;
use crate::reminder::ReminderEngine;

/// Tracking's own state machine: Running / Paused / Archived / Deleted,
/// with the side effects on its reminders the transition table requires.
pub struct TrackingLifecycle {
    store: Arc<dyn Store>,
    bus: Arc<EventBus>,
    engine: Arc<ReminderEngine>,
}

impl TrackingLifecycle {
    pub fn new(store: Arc<dyn Store>, bus: Arc<EventBus>, engine: Arc<ReminderEngine>) -> Self {
        Self { store, bus, engine }
    }

    /// Transition a tracking to `new_state`, applying the side effects the
    /// transition table in spec §4.4 prescribes. Same-state transitions are
    /// a no-op; edges absent from the table return `InvalidTransition`.
    pub async fn transition(
        &self,
        tracking_id: Uuid,
        user_id: Uuid,
        new_state: TrackingState,
    ) -> Result<Tracking, EngineError> {
        let mut tracking = self
            .store
            .load_tracking(tracking_id, user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("tracking {tracking_id}")))?;

        let from = tracking.state;
        if from == new_state {
            return Ok(tracking);
        }
        if !is_allowed(from, new_state) {
            return Err(EngineError::InvalidTransition(format!(
                "{from:?} -> {new_state:?} is not allowed"
            )));
        }

        match (from, new_state) {
            (TrackingState::Running, TrackingState::Paused) => {
                self.store.delete_upcoming_for_tracking(tracking_id, user_id).await?;
            }
            (TrackingState::Paused, TrackingState::Archived) => {
                self.store.delete_upcoming_for_tracking(tracking_id, user_id).await?;
                self.store.delete_pending_for_tracking(tracking_id, user_id).await?;
            }
            (TrackingState::Archived, TrackingState::Deleted) => {
                self.store.delete_tracking_cascade(tracking_id, user_id).await?;
            }
            _ => {}
        }

        if new_state != TrackingState::Deleted {
            self.store.update_tracking_state(tracking_id, user_id, new_state).await?;
        }
        tracking.state = new_state;

        self.bus
            .publish(
                user_id,
                BusEvent::TrackingStateChanged {
                    tracking_id,
                    state: new_state,
                },
            )
            .await;

        if matches!(
            (from, new_state),
            (TrackingState::Paused, TrackingState::Running) | (TrackingState::Archived, TrackingState::Running)
        ) {
            self.engine.chain_next_logged(&tracking, None).await;
        }

        Ok(tracking)
    }

    /// Validate and persist a tracking's field updates (question, notes,
    /// icon, schedules, days). If the schedule or pattern changed and the
    /// tracking is Running, re-chain the Upcoming reminder to match.
    pub async fn update_fields(&self, tracking: Tracking) -> Result<Tracking, EngineError> {
        tracking.validate()?;

        let existing = self
            .store
            .load_tracking(tracking.id, tracking.user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("tracking {}", tracking.id)))?;

        let schedule_changed = existing.schedules != tracking.schedules || existing.days != tracking.days;

        self.store.update_tracking_fields(&tracking).await?;
        self.store
            .replace_schedules(tracking.id, &tracking.schedules)
            .await?;

        if schedule_changed && tracking.state == TrackingState::Running {
            self.engine.ensure_upcoming_matches(&tracking).await?;
        }

        Ok(tracking)
    }
}

fn is_allowed(from: TrackingState, to: TrackingState) -> bool {
    use TrackingState::{Archived, Deleted, Paused, Running};
    matches!(
        (from, to),
        (Running, Paused)
            | (Paused, Running)
            | (Paused, Archived)
            | (Archived, Running)
            | (Archived, Deleted)
    )
}
