//! Read-only wrapper: validation gate and transaction discipline

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockConnection, seq_scan_plan};
use futures::FutureExt;
use pretty_assertions::assert_eq;
use querygate_sandbox::{
    QueryExecutor, QueryValidator, ReadOnlyExecutor, SandboxError, ValidationVerdict,
};
use rstest::rstest;

struct PanickingValidator;

impl QueryValidator for PanickingValidator {
    fn validate(&self, _sql: &str) -> ValidationVerdict {
        panic!("validator bug")
    }
}

#[rstest]
#[case::delete("delete from students;", "Query not safe: Query contains DELETE operation")]
#[case::drop_and_delete(
    "DROP TABLE t; DELETE FROM t",
    "Query not safe: Query contains DELETE operation; Query contains DROP operation"
)]
#[case::update("UPDATE students SET name = 'x'", "Query not safe: Query contains UPDATE operation")]
#[tokio::test(start_paused = true)]
async fn test_unsafe_sql_never_reaches_connection(#[case] sql: &str, #[case] message: &str) {
    let conn = MockConnection::new();
    let err = ReadOnlyExecutor::new()
        .execute_read_only(sql, &conn, 1_000)
        .await
        .unwrap_err();

    assert!(matches!(err, SandboxError::ValidationFailed(_)));
    assert_eq!(err.to_string(), message);
    assert_eq!(err.status_code(), 400);

    let state = conn.state();
    assert_eq!(state.begins, 0);
    assert!(state.statements.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_panicking_validator_fails_closed() {
    let conn = MockConnection::new();
    let err = ReadOnlyExecutor::new()
        .with_validator(Arc::new(PanickingValidator))
        .execute_read_only("SELECT 1", &conn, 1_000)
        .await
        .unwrap_err();

    assert!(matches!(err, SandboxError::ValidationFailed(_)));
    assert_eq!(conn.state().begins, 0);
    assert!(conn.state().statements.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_success_runs_inside_rolled_back_read_only_transaction() {
    let conn = MockConnection::new().with_plan(seq_scan_plan());
    let result = ReadOnlyExecutor::new()
        .execute_read_only("SELECT * FROM students", &conn, 1_000)
        .await
        .unwrap();

    assert_eq!(result.row_count, 2);
    assert!(result.query_plan.is_some());

    let state = conn.state();
    assert_eq!(
        state.statements,
        vec![
            "SET TRANSACTION READ ONLY".to_string(),
            "SELECT * FROM students".to_string(),
            "EXPLAIN (FORMAT JSON) SELECT * FROM students".to_string(),
        ]
    );
    assert_eq!(state.begins, 1);
    assert_eq!(state.rollbacks, 1);
    assert_eq!(state.commits, 0);
    assert!(!state.closed);
}

#[tokio::test(start_paused = true)]
async fn test_execution_error_still_rolls_back() {
    let conn = MockConnection::new().failing_on(
        "nextval",
        "read-only transaction violation: cannot execute nextval() in a read-only transaction",
    );
    let err = ReadOnlyExecutor::new()
        .execute_read_only("SELECT nextval('students_id_seq')", &conn, 1_000)
        .await
        .unwrap_err();

    assert!(matches!(err, SandboxError::ExecutionFailed(_)));
    assert!(err.to_string().contains("read-only transaction"));

    let state = conn.state();
    assert_eq!(state.rollbacks, 1);
    assert_eq!(state.commits, 0);
    assert!(!state.closed);
}

#[tokio::test(start_paused = true)]
async fn test_read_only_directive_failure_releases_transaction() {
    let conn = MockConnection::new().failing_on("SET TRANSACTION", "permission denied");
    let err = ReadOnlyExecutor::new()
        .execute_read_only("SELECT 1", &conn, 1_000)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "permission denied");
    let state = conn.state();
    assert_eq!(state.rollbacks, 1);
    assert!(state.executed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_returns_promptly_without_commit() {
    let conn = MockConnection::new().with_delay(Duration::from_secs(30));
    let started = tokio::time::Instant::now();
    let err = ReadOnlyExecutor::new()
        .execute_read_only("SELECT pg_sleep(30)", &conn, 200)
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(
        err.to_string(),
        "Query execution exceeded 200ms timeout"
    );

    let state = conn.state();
    assert_eq!(state.commits, 0);
    assert_eq!(state.rollbacks, 0);
    assert_eq!(state.cancels, 1);
    assert_eq!(state.closes, 1);
    assert!(state.closed);
}

#[tokio::test(start_paused = true)]
async fn test_slow_plan_keeps_rows_and_discards_connection() {
    let conn = MockConnection::new()
        .with_plan(seq_scan_plan())
        .with_explain_delay(Duration::from_secs(60));
    let started = tokio::time::Instant::now();
    let result = ReadOnlyExecutor::new()
        .execute_read_only("SELECT * FROM students", &conn, 200)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(result.row_count, 2);
    assert_eq!(result.query_plan, None);

    let state = conn.state();
    assert_eq!(state.explains().len(), 1);
    assert_eq!(state.cancels, 1);
    assert_eq!(state.closes, 1);
    assert_eq!(state.rollbacks, 0);
    assert_eq!(state.commits, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_rollback_discards_connection() {
    let conn = MockConnection::new()
        .with_plan(seq_scan_plan())
        .with_failing_rollback();
    let result = ReadOnlyExecutor::new()
        .execute_read_only("SELECT * FROM students", &conn, 1_000)
        .await;

    assert!(result.is_ok());
    let state = conn.state();
    assert_eq!(state.rollbacks, 1);
    assert_eq!(state.closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_driver_panic_discards_connection_and_propagates() {
    let conn = MockConnection::new().panicking_on("students");
    let executor = ReadOnlyExecutor::new();
    let outcome = std::panic::AssertUnwindSafe(executor.execute_read_only(
        "SELECT * FROM students",
        &conn,
        1_000,
    ))
    .catch_unwind()
    .await;

    assert!(outcome.is_err());
    let state = conn.state();
    assert_eq!(state.commits, 0);
    assert_eq!(state.closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_analyze_plan_runs_inside_transaction() {
    let conn = MockConnection::new().with_plan(seq_scan_plan());
    ReadOnlyExecutor::new()
        .with_executor(QueryExecutor::new().with_plan_mode(querygate_core::PlanMode::Analyze))
        .execute_read_only("SELECT * FROM students;", &conn, 1_000)
        .await
        .unwrap();

    let state = conn.state();
    assert_eq!(
        state.statements.last().map(String::as_str),
        Some("EXPLAIN (ANALYZE, FORMAT JSON) SELECT * FROM students")
    );
    assert_eq!(state.rollbacks, 1);
}
