//! Read-only execution wrapper
//!
//! Every statement passes the safety validator first, then runs inside a
//! transaction switched to READ ONLY that is always rolled back. Validation
//! alone is a heuristic; the transaction mode is what the backing store
//! actually enforces.

use crate::error::{SandboxError, SandboxResult};
use crate::executor::{ExecutionResult, QueryExecutor, discard_connection};
use crate::validator::{QueryValidator, SafetyValidator, ValidationVerdict};
use futures::FutureExt;
use querygate_core::{Connection, Transaction};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

const SET_READ_ONLY: &str = "SET TRANSACTION READ ONLY";

#[derive(Clone)]
pub struct ReadOnlyExecutor {
    validator: Arc<dyn QueryValidator>,
    executor: QueryExecutor,
}

impl Default for ReadOnlyExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReadOnlyExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyExecutor")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl ReadOnlyExecutor {
    pub fn new() -> Self {
        Self {
            validator: Arc::new(SafetyValidator::new()),
            executor: QueryExecutor::default(),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn QueryValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_executor(mut self, executor: QueryExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Runs the validator, treating a panic inside it as a rejection.
    fn check(&self, sql: &str) -> ValidationVerdict {
        match panic::catch_unwind(AssertUnwindSafe(|| self.validator.validate(sql))) {
            Ok(verdict) => verdict,
            Err(_) => {
                tracing::error!("validator panicked; rejecting statement");
                ValidationVerdict::rejected("validation could not be completed")
            }
        }
    }

    /// Validates `sql` and runs it inside a rolled-back READ ONLY transaction.
    ///
    /// Nothing is sent to the connection when validation fails. The
    /// transaction is never committed; after a timeout the connection is
    /// closed instead of rolled back.
    #[tracing::instrument(skip(self, sql, conn), fields(
        driver = conn.driver_name(),
        sql_preview = %sql.chars().take(100).collect::<String>(),
    ))]
    pub async fn execute_read_only(
        &self,
        sql: &str,
        conn: &dyn Connection,
        timeout_ms: u64,
    ) -> SandboxResult<ExecutionResult> {
        self.gate(sql)?;
        self.run_validated(sql, conn, timeout_ms).await
    }

    /// Rejects `sql` unless the validator passes it.
    pub(crate) fn gate(&self, sql: &str) -> SandboxResult<()> {
        tracing::debug!("validating statement");
        let verdict = self.check(sql);
        if !verdict.is_safe {
            tracing::warn!(warnings = ?verdict.warnings, "statement rejected by safety validation");
            return Err(SandboxError::ValidationFailed(verdict.rejection_message()));
        }
        Ok(())
    }

    /// Transaction lifecycle for a statement that already passed [`Self::gate`].
    pub(crate) async fn run_validated(
        &self,
        sql: &str,
        conn: &dyn Connection,
        timeout_ms: u64,
    ) -> SandboxResult<ExecutionResult> {
        if timeout_ms == 0 {
            return Err(SandboxError::InvalidRequest(
                "timeout must be greater than zero".to_string(),
            ));
        }

        tracing::debug!("beginning transaction");
        let tx = conn.begin_transaction().await?;
        tracing::debug!("switching transaction to read-only");
        if let Err(e) = tx.execute(SET_READ_ONLY).await {
            tracing::error!(error = %e, "failed to switch transaction to read-only");
            release(tx, conn).await;
            return Err(SandboxError::ExecutionFailed(e));
        }

        let outcome = AssertUnwindSafe(self.executor.run(sql, tx.as_ref(), timeout_ms))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(completed)) if completed.plan_cancelled => {
                discard_connection(conn).await;
                drop(tx);
                Ok(completed.execution)
            }
            Ok(Err(timeout @ SandboxError::Timeout { .. })) => {
                discard_connection(conn).await;
                drop(tx);
                Err(timeout)
            }
            Ok(result) => {
                release(tx, conn).await;
                result.map(|completed| completed.execution)
            }
            Err(payload) => {
                tracing::error!("statement execution panicked; discarding connection");
                discard_connection(conn).await;
                drop(tx);
                panic::resume_unwind(payload)
            }
        }
    }
}

/// Rolls the transaction back, discarding the connection if that fails.
async fn release(tx: Box<dyn Transaction>, conn: &dyn Connection) {
    tracing::debug!("rolling back read-only transaction");
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "rollback failed; discarding connection");
        discard_connection(conn).await;
    }
}
