//! Shared fixtures: connections, seed data and table fingerprints.
//!
//! Every test gets its own connection. The `students` table is created and
//! filled once per test process; tests must leave it unchanged, which is
//! exactly what the read-only tests verify.

use anyhow::{Context, Result};
use querygate_core::{Connection, Queryable, SandboxConfig, Value};
use querygate_driver_postgres::PostgresConnection;
use querygate_sandbox::SandboxService;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::test_containers::postgres_database;

static SEEDED: OnceCell<()> = OnceCell::const_new();

const SEED_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS students (
        id SERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        marks INTEGER NOT NULL,
        department TEXT NOT NULL
    )",
    "INSERT INTO students (name, marks, department)
     SELECT v.name, v.marks, v.department
     FROM (VALUES
        ('Ada', 91, 'math'),
        ('Grace', 88, 'cs'),
        ('Alan', 79, 'cs'),
        ('Emmy', 95, 'math'),
        ('Kurt', 64, 'logic')
     ) AS v(name, marks, department)
     WHERE NOT EXISTS (SELECT 1 FROM students)",
    "ANALYZE students",
];

/// Opens a fresh connection to the seeded test database.
///
/// # Errors
///
/// Returns an error if Docker is unavailable, the container fails to start
/// or the database does not accept connections after several attempts.
pub async fn test_connection() -> Result<PostgresConnection> {
    initialize_logging();

    let database = postgres_database().await?;
    let conn = connect_with_retry(&database.url, 8).await?;
    SEEDED
        .get_or_try_init(|| seed(&conn))
        .await
        .context("failed to seed students table")?;
    Ok(conn)
}

async fn connect_with_retry(url: &str, max_attempts: u32) -> Result<PostgresConnection> {
    let mut attempt = 1;
    loop {
        match PostgresConnection::connect(url).await {
            Ok(conn) => return Ok(conn),
            Err(e) if attempt < max_attempts => {
                let delay = Duration::from_millis(250 * 2u64.pow(attempt.min(4)));
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "PostgreSQL connection failed, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to connect to PostgreSQL after {} attempts", max_attempts)
                });
            }
        }
    }
}

async fn seed(conn: &PostgresConnection) -> Result<()> {
    tracing::info!("seeding students table");
    for statement in SEED_STATEMENTS {
        conn.execute(statement)
            .await
            .with_context(|| format!("seed statement failed: {}", statement))?;
    }
    Ok(())
}

/// A sandbox with default configuration.
pub fn sandbox() -> SandboxService {
    SandboxService::new(SandboxConfig::default())
}

/// Order-independent fingerprint of every row in `students`.
pub async fn students_checksum(conn: &dyn Connection) -> Result<String> {
    let result = conn
        .query(
            "SELECT md5(COALESCE(string_agg(id::text || ':' || name || ':' || marks::text || ':' || department, ',' ORDER BY id), '')) AS checksum FROM students",
        )
        .await
        .context("failed to checksum students")?;
    match result.rows.first().and_then(|row| row.get(0)) {
        Some(Value::String(checksum)) => Ok(checksum.clone()),
        other => anyhow::bail!("unexpected checksum value: {:?}", other),
    }
}

/// Current state of the `students` id sequence.
pub async fn sequence_state(conn: &dyn Connection) -> Result<(i64, bool)> {
    let result = conn
        .query("SELECT last_value, is_called FROM students_id_seq")
        .await
        .context("failed to read students_id_seq")?;
    let row = result.rows.first().context("sequence returned no rows")?;
    let last_value = row
        .get(0)
        .and_then(Value::as_i64)
        .context("missing last_value")?;
    let is_called = matches!(row.get(1), Some(Value::Bool(true)));
    Ok((last_value, is_called))
}

/// Initialize logging for tests if not already initialized
fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("warn,querygate_sandbox=debug,querygate_driver_tests=debug")
        });
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
