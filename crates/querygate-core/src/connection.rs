//! Connection trait and transaction handling

use crate::{QueryResult, Result, StatementResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Handle for cancelling a running query from any thread.
///
/// The handle is safe to call from any thread and can be called multiple
/// times (subsequent calls are no-ops). Cancellation is a request: the
/// backing store may still finish the statement before it notices.
pub trait QueryCancelHandle: Send + Sync {
    /// Cancel the currently running query on the associated session.
    fn cancel(&self);
}

/// Anything a single SQL statement can be submitted to: a bare connection or
/// a transaction opened on one.
///
/// Statements are sent as plain text without bound parameters.
#[async_trait]
pub trait Queryable: Send + Sync {
    /// Execute a query that returns rows
    async fn query(&self, sql: &str) -> Result<QueryResult>;

    /// Execute a statement that does not return rows
    async fn execute(&self, sql: &str) -> Result<StatementResult>;

    /// Get a handle that can be used to cancel the statement in flight.
    ///
    /// Returns `None` if the driver does not support query cancellation.
    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        None
    }
}

/// A database connection bound to one target database
#[async_trait]
pub trait Connection: Queryable {
    /// Get the driver name (e.g., "postgresql")
    fn driver_name(&self) -> &str;

    /// Begin a transaction
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Close the connection.
    ///
    /// A closed connection is never handed out again; any transaction still
    /// open on it ends without a commit.
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A database transaction
#[async_trait]
pub trait Transaction: Queryable {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}
