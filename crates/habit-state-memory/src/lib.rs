//! In-memory [`habit_state::Store`] implementation. The default backend
//! when no `[store] backend = "postgres"` is configured, and the backend
//! every other crate's unit tests run against.

mod db;
mod store;

pub use store::MemoryStore;
