//! PostgreSQL driver implementation

mod connection;
mod values;

pub use connection::{PostgresCancelHandle, PostgresConnection, PostgresTransaction};
