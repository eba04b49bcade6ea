use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use habit_bus::BusEvent;
use habit_core::{DaysPattern, Reminder, Schedule, Tracking, TrackingState};
use habit_engine::EngineError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServerError;
use crate::identity::CallerIdentity;

use super::AppState;

/// A tracking together with its currently Upcoming reminder, if any --
/// exactly what `GET /api/trackings` and the create/update endpoints hand
/// back to the client.
#[derive(Debug, Serialize)]
pub struct TrackingWithUpcoming {
    #[serde(flatten)]
    pub tracking: Tracking,
    pub upcoming: Option<Reminder>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTrackingRequest {
    pub question: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub days: Option<DaysPattern>,
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub one_time_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTrackingRequest {
    pub question: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub days: Option<DaysPattern>,
    pub schedules: Vec<Schedule>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStateRequest {
    pub state: TrackingState,
}

async fn with_upcoming(state: &AppState, tracking: Tracking, user_id: Uuid) -> Result<TrackingWithUpcoming, ServerError> {
    let upcoming = state.store.load_upcoming_for_tracking(tracking.id, user_id).await.map_err(EngineError::from)?;
    Ok(TrackingWithUpcoming { tracking, upcoming })
}

pub async fn list_trackings(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
) -> Result<Json<Vec<TrackingWithUpcoming>>, ServerError> {
    let trackings = state
        .store
        .load_trackings_for_user(identity.user_id)
        .await
        .map_err(EngineError::from)?;

    let mut out = Vec::with_capacity(trackings.len());
    for tracking in trackings {
        out.push(with_upcoming(&state, tracking, identity.user_id).await?);
    }
    Ok(Json(out))
}

pub async fn create_tracking(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Json(req): Json<CreateTrackingRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let now = Utc::now();
    let tracking = Tracking {
        id: Uuid::new_v4(),
        user_id: identity.user_id,
        question: req.question,
        notes: req.notes,
        icon: req.icon,
        days: req.days,
        schedules: req.schedules,
        state: TrackingState::Running,
        created_at: now,
        updated_at: now,
    };
    tracking.validate().map_err(EngineError::from)?;

    state.store.insert_tracking(&tracking).await.map_err(EngineError::from)?;
    state
        .engine
        .create_tracking_initial(&tracking, req.one_time_date)
        .await?;

    let body = with_upcoming(&state, tracking, identity.user_id).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn update_tracking(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTrackingRequest>,
) -> Result<Json<TrackingWithUpcoming>, ServerError> {
    let existing = state
        .store
        .load_tracking(id, identity.user_id)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| ServerError::Engine(EngineError::NotFound(format!("tracking {id}"))))?;

    let tracking = Tracking {
        question: req.question,
        notes: req.notes,
        icon: req.icon,
        days: req.days,
        schedules: req.schedules,
        updated_at: Utc::now(),
        ..existing
    };

    let updated = state.lifecycle.update_fields(tracking).await?;
    let body = with_upcoming(&state, updated, identity.user_id).await?;
    Ok(Json(body))
}

pub async fn change_state(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeStateRequest>,
) -> Result<Json<Tracking>, ServerError> {
    let tracking = state.lifecycle.transition(id, identity.user_id, req.state).await?;
    Ok(Json(tracking))
}

/// Cascade-deletes a tracking regardless of its current state, unlike the
/// `state` endpoint's transition table (only `Archived -> Deleted` is a
/// valid transition there). Both paths converge on the same bus event so
/// SSE subscribers see a `tracking_state_changed` event either way.
pub async fn delete_tracking(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .store
        .load_tracking(id, identity.user_id)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| ServerError::Engine(EngineError::NotFound(format!("tracking {id}"))))?;

    state
        .store
        .delete_tracking_cascade(id, identity.user_id)
        .await
        .map_err(EngineError::from)?;

    state
        .bus
        .publish(
            identity.user_id,
            BusEvent::TrackingStateChanged {
                tracking_id: id,
                state: TrackingState::Deleted,
            },
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}
