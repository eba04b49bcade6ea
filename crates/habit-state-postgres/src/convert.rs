use habit_core::{AnswerValue, NotificationPreference, ReminderStatus, TrackingState};
use habit_state::StateError;

pub(crate) fn preference_to_str(p: NotificationPreference) -> &'static str {
    match p {
        NotificationPreference::Email => "email",
        NotificationPreference::Telegram => "telegram",
    }
}

pub(crate) fn preference_from_str(s: &str) -> Result<NotificationPreference, StateError> {
    match s {
        "email" => Ok(NotificationPreference::Email),
        "telegram" => Ok(NotificationPreference::Telegram),
        other => Err(StateError::Serialization(format!(
            "unknown notification_preference: {other}"
        ))),
    }
}

pub(crate) fn tracking_state_to_str(s: TrackingState) -> &'static str {
    match s {
        TrackingState::Running => "running",
        TrackingState::Paused => "paused",
        TrackingState::Archived => "archived",
        TrackingState::Deleted => "deleted",
    }
}

pub(crate) fn tracking_state_from_str(s: &str) -> Result<TrackingState, StateError> {
    match s {
        "running" => Ok(TrackingState::Running),
        "paused" => Ok(TrackingState::Paused),
        "archived" => Ok(TrackingState::Archived),
        "deleted" => Ok(TrackingState::Deleted),
        other => Err(StateError::Serialization(format!(
            "unknown tracking state: {other}"
        ))),
    }
}

pub(crate) fn reminder_status_to_str(s: ReminderStatus) -> &'static str {
    match s {
        ReminderStatus::Upcoming => "upcoming",
        ReminderStatus::Pending => "pending",
        ReminderStatus::Answered => "answered",
    }
}

pub(crate) fn reminder_status_from_str(s: &str) -> Result<ReminderStatus, StateError> {
    match s {
        "upcoming" => Ok(ReminderStatus::Upcoming),
        "pending" => Ok(ReminderStatus::Pending),
        "answered" => Ok(ReminderStatus::Answered),
        other => Err(StateError::Serialization(format!(
            "unknown reminder status: {other}"
        ))),
    }
}

pub(crate) fn answer_value_to_str(v: AnswerValue) -> &'static str {
    match v {
        AnswerValue::Completed => "completed",
        AnswerValue::Dismissed => "dismissed",
    }
}

pub(crate) fn answer_value_from_str(s: &str) -> Result<AnswerValue, StateError> {
    match s {
        "completed" => Ok(AnswerValue::Completed),
        "dismissed" => Ok(AnswerValue::Dismissed),
        other => Err(StateError::Serialization(format!(
            "unknown answer_value: {other}"
        ))),
    }
}
