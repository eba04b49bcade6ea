use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::Extension;
use futures::stream::{Stream, StreamExt};
use habit_bus::{BusEvent, BusStreamItem};
use tokio_stream::wrappers::IntervalStream;
use uuid::Uuid;

use crate::identity::CallerIdentity;

use super::AppState;

/// `GET /api/events` -- a per-user SSE stream of tracking/reminder change
/// notifications plus a `heartbeat` event every 30 seconds. Wire payloads
/// mirror the JSON shape of the entity's own HTTP GET response; a `Lagged`
/// notice from the bus (the subscriber fell behind the broadcast queue)
/// surfaces as an `event: lagged` frame rather than closing the stream.
pub async fn stream_events(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let user_id = identity.user_id;
    let bus_stream = state.bus.subscribe(user_id).await;

    let events = bus_stream.then(move |item| {
        let state = state.clone();
        async move {
            let event = match item {
                BusStreamItem::Event(event) => {
                    let tag = event.tag();
                    let payload = event_payload(&state, user_id, &event).await;
                    Event::default().event(tag).data(payload.to_string())
                }
                BusStreamItem::Lagged(n) => Event::default().event("lagged").data(n.to_string()),
            };
            Ok(event)
        }
    });

    let heartbeats = IntervalStream::new(tokio::time::interval(Duration::from_secs(30)))
        .map(|_| Ok(Event::default().event("heartbeat").data("{}")));

    Sse::new(futures::stream::select(events, heartbeats))
}

async fn event_payload(state: &AppState, user_id: Uuid, event: &BusEvent) -> serde_json::Value {
    match event {
        BusEvent::Connected | BusEvent::TelegramConnected => serde_json::json!({}),
        BusEvent::ReminderDuePending { reminder_id, .. }
        | BusEvent::ReminderAnswered { reminder_id, .. }
        | BusEvent::ReminderUpdated { reminder_id }
        | BusEvent::ReminderDeleted { reminder_id }
        | BusEvent::UpcomingReplaced { reminder_id, .. } => {
            match state.store.load_reminder(*reminder_id, user_id).await {
                Ok(Some(reminder)) => serde_json::to_value(reminder).unwrap_or_default(),
                _ => serde_json::json!({ "id": reminder_id }),
            }
        }
        BusEvent::TrackingStateChanged { tracking_id, state: tracking_state } => {
            match state.store.load_tracking(*tracking_id, user_id).await {
                Ok(Some(tracking)) => serde_json::to_value(tracking).unwrap_or_default(),
                _ => serde_json::json!({ "id": tracking_id, "state": tracking_state }),
            }
        }
    }
}
