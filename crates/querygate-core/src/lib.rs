//! QueryGate Core - shared abstractions for the SQL safety sandbox
//!
//! This crate provides the traits and types every other QueryGate crate
//! depends on:
//!
//! - `Connection` / `Transaction` - a session bound to one target database
//! - `QueryCancelHandle` - best-effort server-side cancellation
//! - `SandboxConfig` - timeouts, plan capture and database targets
//! - Common types like `Value`, `Row`, `ColumnMeta` and `QueryResult`

mod config;
mod connection;
mod error;
mod types;

pub use config::*;
pub use connection::*;
pub use error::*;
pub use types::*;
