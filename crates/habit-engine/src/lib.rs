//! The reminder lifecycle engine: `ReminderEngine` (C3) owns reminder
//! creation, chaining, snoozing, and answering; `TrackingLifecycle` (C4)
//! owns the tracking state machine; `Ticker` (C5) is the periodic process
//! that promotes due Upcoming reminders to Pending and dispatches them
//! through the notifier port.

mod error;
mod lifecycle;
mod reminder;
mod ticker;

pub use error::EngineError;
pub use lifecycle::TrackingLifecycle;
pub use reminder::ReminderEngine;
pub use ticker::{Ticker, TickerConfig};
