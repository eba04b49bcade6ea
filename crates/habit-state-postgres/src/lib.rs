//! Postgres-backed [`habit_state::Store`] implementation.

mod config;
mod convert;
mod migrations;
mod store;

pub use config::PostgresConfig;
pub use store::PostgresStore;
