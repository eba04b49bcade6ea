//! Outbound notification port shared by every adapter crate
//! (`habit-notifier-email`, `habit-notifier-telegram`).
//!
//! `habit-engine` depends only on this crate's traits, never on a specific
//! adapter, so swapping delivery channels never touches the engine.

mod callback;
mod error;
mod port;
pub mod retry;

pub use callback::{ActionSink, UserAction};
pub use error::NotifierError;
pub use port::{DynNotifier, Notifier};
