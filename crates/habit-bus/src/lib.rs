//! Per-user event bus: `ReminderEngine`, `TrackingLifecycle`, and `Ticker`
//! publish here; `habit-server`'s SSE endpoint subscribes here. No
//! persistence -- a disconnected client loses events and must reconcile by
//! re-reading state through the regular HTTP API.

mod event;
mod registry;

pub use event::BusEvent;
pub use registry::{BusStreamItem, EventBus};
