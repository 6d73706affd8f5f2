//! Execution engine: one statement, raced against a wall-clock budget
//!
//! The statement future and a spawned timer task race; whichever finishes
//! first decides the outcome. A statement that loses is dropped, the backing
//! store is asked to cancel it and the connection it ran on is closed so it
//! can never be reused.

use crate::error::{SandboxError, SandboxResult};
use indexmap::IndexMap;
use querygate_core::{
    Connection, PlanMode, QueryCancelHandle, QueryResult, Queryable, SandboxConfig, Value,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// One map per row, keys in result-set column order
    pub rows: Vec<IndexMap<String, serde_json::Value>>,
    pub columns: Vec<String>,
    /// Always `rows.len()`
    pub row_count: usize,
    /// Wall-clock time of the statement itself, excluding plan retrieval
    pub execution_time_ms: f64,
    /// Raw `EXPLAIN (FORMAT JSON)` text when it could be retrieved
    pub query_plan: Option<String>,
}

impl ExecutionResult {
    fn from_query_result(result: QueryResult, execution_time_ms: f64) -> Self {
        let columns: Vec<String> = result.columns.into_iter().map(|c| c.name).collect();
        let rows: Vec<IndexMap<String, serde_json::Value>> = result
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .cloned()
                    .zip(row.values.iter().map(Value::to_json))
                    .collect()
            })
            .collect();

        Self {
            row_count: rows.len(),
            rows,
            columns,
            execution_time_ms,
            query_plan: None,
        }
    }
}

/// A statement that produced rows. `plan_cancelled` is set when the plan
/// request lost its race and was cancelled server-side, which leaves the
/// session unfit for reuse.
#[derive(Debug)]
pub(crate) struct Completed {
    pub(crate) execution: ExecutionResult,
    pub(crate) plan_cancelled: bool,
}

/// Builds the plan request for a statement, dropping trailing terminators.
pub fn plan_statement(sql: &str, mode: PlanMode) -> String {
    let stripped = sql.trim_end().trim_end_matches(';').trim_end();
    match mode {
        PlanMode::Estimate => format!("EXPLAIN (FORMAT JSON) {}", stripped),
        PlanMode::Analyze => format!("EXPLAIN (ANALYZE, FORMAT JSON) {}", stripped),
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Races `work` against a timer task firing after `timeout_ms`.
///
/// Returns `None` when the timer wins. `work` has been dropped by then and
/// `cancel` (when given) has been asked to stop the statement server-side.
async fn race_deadline<T>(
    work: impl Future<Output = T>,
    timeout_ms: u64,
    cancel: Option<Arc<dyn QueryCancelHandle>>,
) -> Option<T> {
    let deadline = CancellationToken::new();
    let timer = tokio::spawn({
        let deadline = deadline.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
            deadline.cancel();
        }
    });

    let outcome = tokio::select! {
        biased;
        result = work => Some(result),
        () = deadline.cancelled() => None,
    };
    timer.abort();

    if outcome.is_none()
        && let Some(handle) = cancel
    {
        handle.cancel();
    }
    outcome
}

/// Closes a connection whose session can no longer be trusted.
pub(crate) async fn discard_connection(conn: &dyn Connection) {
    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "failed to close discarded connection");
    }
}

/// Runs single statements under a timeout and captures their plan.
#[derive(Debug, Clone, Copy)]
pub struct QueryExecutor {
    capture_plan: bool,
    plan_mode: PlanMode,
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self {
            capture_plan: true,
            plan_mode: PlanMode::Estimate,
        }
    }
}

impl QueryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            capture_plan: config.capture_plan,
            plan_mode: config.plan_mode,
        }
    }

    pub fn with_capture_plan(mut self, capture_plan: bool) -> Self {
        self.capture_plan = capture_plan;
        self
    }

    pub fn with_plan_mode(mut self, plan_mode: PlanMode) -> Self {
        self.plan_mode = plan_mode;
        self
    }

    pub fn plan_mode(&self) -> PlanMode {
        self.plan_mode
    }

    /// Executes `sql` directly on `conn`. On timeout the connection is
    /// closed before the error is returned.
    #[tracing::instrument(skip(self, sql, conn), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    pub async fn execute(
        &self,
        sql: &str,
        conn: &dyn Connection,
        timeout_ms: u64,
    ) -> SandboxResult<ExecutionResult> {
        match self.run(sql, conn, timeout_ms).await {
            Ok(completed) => {
                if completed.plan_cancelled {
                    discard_connection(conn).await;
                }
                Ok(completed.execution)
            }
            Err(e) => {
                if matches!(e, SandboxError::Timeout { .. }) {
                    discard_connection(conn).await;
                }
                Err(e)
            }
        }
    }

    /// Statement, then plan, on an arbitrary session. The caller owns
    /// discarding the session after a timeout, including a plan request
    /// that was cancelled after the rows came back.
    pub(crate) async fn run<S>(
        &self,
        sql: &str,
        session: &S,
        timeout_ms: u64,
    ) -> SandboxResult<Completed>
    where
        S: Queryable + ?Sized,
    {
        if timeout_ms == 0 {
            return Err(SandboxError::InvalidRequest(
                "timeout must be greater than zero".to_string(),
            ));
        }

        tracing::debug!(timeout_ms, "executing statement");
        let started = Instant::now();
        let result = race_deadline(session.query(sql), timeout_ms, session.cancel_handle()).await;
        let execution_time_ms = elapsed_ms(started);

        let result = match result {
            Some(Ok(result)) => result,
            Some(Err(e)) => {
                tracing::error!(error = %e, "statement failed");
                return Err(SandboxError::ExecutionFailed(e));
            }
            None => {
                tracing::warn!(timeout_ms, elapsed_ms = execution_time_ms, "statement timed out");
                return Err(SandboxError::Timeout {
                    timeout_ms,
                    elapsed_ms: execution_time_ms,
                });
            }
        };

        let mut execution = ExecutionResult::from_query_result(result, execution_time_ms);
        tracing::info!(
            row_count = execution.row_count,
            execution_time_ms,
            "statement completed"
        );

        let mut plan_cancelled = false;
        if self.capture_plan {
            execution.query_plan = match self.fetch_plan(sql, session, timeout_ms).await {
                Ok(plan) => Some(plan),
                Err(SandboxError::Timeout { timeout_ms, .. }) => {
                    tracing::warn!(timeout_ms, "plan request timed out; session will be discarded");
                    plan_cancelled = true;
                    None
                }
                Err(e) => {
                    tracing::debug!(error = %e, "continuing without execution plan");
                    None
                }
            };
        }

        Ok(Completed {
            execution,
            plan_cancelled,
        })
    }

    async fn fetch_plan<S>(&self, sql: &str, session: &S, timeout_ms: u64) -> SandboxResult<String>
    where
        S: Queryable + ?Sized,
    {
        let explain_sql = plan_statement(sql, self.plan_mode);
        tracing::debug!(plan_mode = self.plan_mode.as_str(), "fetching execution plan");
        let started = Instant::now();
        let plan_result =
            race_deadline(session.query(&explain_sql), timeout_ms, session.cancel_handle())
                .await
                .ok_or_else(|| SandboxError::Timeout {
                    timeout_ms,
                    elapsed_ms: elapsed_ms(started),
                })?
                .map_err(|e| SandboxError::PlanUnavailable(e.to_string()))?;

        let cell = plan_result
            .rows
            .first()
            .and_then(|row| row.get(0))
            .ok_or_else(|| SandboxError::PlanUnavailable("EXPLAIN returned no rows".to_string()))?;

        match cell {
            Value::Json(plan) => Ok(plan.to_string()),
            Value::String(plan) => Ok(plan.clone()),
            Value::Null => Err(SandboxError::PlanUnavailable(
                "EXPLAIN returned NULL".to_string(),
            )),
            other => Ok(other.to_string()),
        }
    }
}
