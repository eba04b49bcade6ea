use chrono::{DateTime, Utc};
use habit_core::{AnswerValue, TrackingState};
use uuid::Uuid;

/// Event kinds published to a user's topic. `Connected` is emitted by the
/// bus itself the instant a subscriber attaches; it is not one of the
/// engine-originated kinds but subscribers need it to know the stream is
/// live before any real event arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    Connected,
    ReminderDuePending {
        tracking_id: Uuid,
        reminder_id: Uuid,
        scheduled_time: DateTime<Utc>,
    },
    ReminderAnswered {
        reminder_id: Uuid,
        answer_value: AnswerValue,
    },
    ReminderUpdated {
        reminder_id: Uuid,
    },
    ReminderDeleted {
        reminder_id: Uuid,
    },
    UpcomingReplaced {
        tracking_id: Uuid,
        reminder_id: Uuid,
    },
    TrackingStateChanged {
        tracking_id: Uuid,
        state: TrackingState,
    },
    TelegramConnected,
}

impl BusEvent {
    /// Stable tag used as the SSE `event:` field.
    pub fn tag(&self) -> &'static str {
        match self {
            BusEvent::Connected => "connected",
            BusEvent::ReminderDuePending { .. } => "reminder_due_pending",
            BusEvent::ReminderAnswered { .. } => "reminder_answered",
            BusEvent::ReminderUpdated { .. } => "reminder_updated",
            BusEvent::ReminderDeleted { .. } => "reminder_deleted",
            BusEvent::UpcomingReplaced { .. } => "upcoming_replaced",
            BusEvent::TrackingStateChanged { .. } => "tracking_state_changed",
            BusEvent::TelegramConnected => "telegram_connected",
        }
    }
}
