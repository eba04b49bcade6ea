use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use habit_core::{AnswerValue, Reminder, ReminderStatus};
use habit_engine::EngineError;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ServerError;
use crate::identity::CallerIdentity;

use super::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct ListRemindersQuery {
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub value: AnswerValue,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SnoozeRequest {
    pub minutes: u32,
}

pub async fn list_reminders(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Query(query): Query<ListRemindersQuery>,
) -> Result<Json<Vec<Reminder>>, ServerError> {
    let mut reminders = state
        .store
        .load_reminders_for_user(identity.user_id)
        .await
        .map_err(EngineError::from)?;

    if query.active {
        reminders.retain(|r| r.status != ReminderStatus::Answered);
    }

    Ok(Json(reminders))
}

pub async fn answer_reminder(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<Uuid>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<Reminder>, ServerError> {
    let reminder = state
        .engine
        .answer(id, identity.user_id, req.value, req.note)
        .await?;
    Ok(Json(reminder))
}

pub async fn snooze_reminder(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<Uuid>,
    Json(req): Json<SnoozeRequest>,
) -> Result<Json<Reminder>, ServerError> {
    if req.minutes < 1 {
        return Err(ServerError::Engine(EngineError::Validation(
            "minutes must be at least 1".into(),
        )));
    }
    let reminder = state.engine.snooze(id, identity.user_id, req.minutes).await?;
    Ok(Json(reminder))
}

pub async fn delete_reminder(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete(id, identity.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
