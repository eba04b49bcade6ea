pub mod health;
pub mod reminders;
pub mod stream;
pub mod trackings;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use habit_bus::EventBus;
use habit_engine::{ReminderEngine, TrackingLifecycle};
use habit_state::Store;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::identity::require_identity;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub bus: Arc<EventBus>,
    pub engine: Arc<ReminderEngine>,
    pub lifecycle: Arc<TrackingLifecycle>,
}

/// Build the full axum router: the documented `/api/*` surface plus the
/// ambient health endpoint, behind request tracing, permissive CORS, and
/// the caller-identity stand-in.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/trackings", get(trackings::list_trackings).post(trackings::create_tracking))
        .route(
            "/api/trackings/{id}",
            patch(trackings::update_tracking).delete(trackings::delete_tracking),
        )
        .route("/api/trackings/{id}/state", post(trackings::change_state))
        .route("/api/reminders", get(reminders::list_reminders))
        .route("/api/reminders/{id}/answer", post(reminders::answer_reminder))
        .route("/api/reminders/{id}/snooze", post(reminders::snooze_reminder))
        .route("/api/reminders/{id}", delete(reminders::delete_reminder))
        .route("/api/events", get(stream::stream_events))
        .layer(middleware::from_fn(require_identity))
        .route("/healthz", get(health::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
