//! Persistence trait abstraction for trackings, reminders, and the users
//! that own them. `habit-state-memory` and `habit-state-postgres` provide
//! implementations; `habit-engine` only ever depends on this crate.

pub mod error;
pub mod store;
pub mod testing;
pub mod types;

pub use error::StateError;
pub use store::{Store, Transaction, TransactionBody};
pub use types::DueReminder;
