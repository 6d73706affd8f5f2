//! Timeout tests against a real server

use crate::fixtures::{sandbox, test_connection};
use anyhow::Result;
use querygate_core::Connection;
use querygate_sandbox::SandboxError;
use std::time::{Duration, Instant};

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_pg_sleep_times_out_promptly() -> Result<()> {
    let conn = test_connection().await?;

    let started = Instant::now();
    let err = sandbox()
        .execute_read_only("SELECT pg_sleep(10)", &conn, Some(500))
        .await
        .expect_err("pg_sleep(10) must exceed a 500ms budget");
    let elapsed = started.elapsed();

    match err {
        SandboxError::Timeout {
            timeout_ms,
            elapsed_ms,
        } => {
            assert_eq!(timeout_ms, 500);
            assert!(elapsed_ms >= 500.0, "elapsed_ms {elapsed_ms}");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
    assert!(conn.is_closed(), "timed-out connection must be discarded");
    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_fresh_connection_works_after_timeout() -> Result<()> {
    let conn = test_connection().await?;
    let _ = sandbox()
        .execute_read_only("SELECT pg_sleep(5)", &conn, Some(200))
        .await;
    assert!(conn.is_closed());

    let conn = test_connection().await?;
    let result = sandbox()
        .execute_read_only("SELECT 1 AS one", &conn, Some(2_000))
        .await?;
    assert_eq!(result.rows[0]["one"], serde_json::json!(1));
    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_fast_query_within_budget() -> Result<()> {
    let conn = test_connection().await?;
    let result = sandbox()
        .execute_read_only("SELECT pg_sleep(0.05)", &conn, Some(5_000))
        .await?;

    assert_eq!(result.row_count, 1);
    assert!(result.execution_time_ms >= 50.0);
    assert!(!conn.is_closed());
    Ok(())
}
