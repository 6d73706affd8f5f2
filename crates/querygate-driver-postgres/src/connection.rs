//! PostgreSQL connection implementation

use async_trait::async_trait;
use querygate_core::{
    ColumnMeta, Connection, QueryCancelHandle, QueryGateError, QueryResult, Queryable, Result,
    Row, StatementResult, Transaction,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tokio_postgres::{CancelToken, Client, NoTls};

use crate::values::postgres_to_value;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// `None` once the connection has been closed.
type SharedClient = Arc<Mutex<Option<Client>>>;

/// Cancel handle for PostgreSQL queries.
///
/// Wraps the tokio-postgres `CancelToken`. The cancel request travels over a
/// separate socket, so it works while the session itself is busy.
pub struct PostgresCancelHandle {
    cancel_token: CancelToken,
}

impl QueryCancelHandle for PostgresCancelHandle {
    fn cancel(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no Tokio runtime available, PostgreSQL cancel request not sent");
            return;
        };

        tracing::debug!("sending cancel request to PostgreSQL server");
        let cancel_token = self.cancel_token.clone();
        runtime.spawn(async move {
            if let Err(e) = cancel_token.cancel_query(NoTls).await {
                tracing::warn!(error = %e, "failed to cancel PostgreSQL query");
            } else {
                tracing::debug!("PostgreSQL cancel request sent");
            }
        });
    }
}

/// Renders a driver error, keeping the server message intact and appending
/// whatever detail, hint and column the server supplied.
fn describe_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();
    for (label, part) in [
        ("detail", db_error.detail()),
        ("hint", db_error.hint()),
        ("column", db_error.column()),
    ] {
        if let Some(text) = part.filter(|t| !t.trim().is_empty()) {
            message.push_str(&format!(" ({}: {})", label, text));
        }
    }

    let code = db_error.code().code();
    match code {
        "25006" => format!("read-only transaction violation: {}", message),
        "57014" => format!("statement cancelled: {}", message),
        _ => format!("{} (SQLSTATE {})", message, code),
    }
}

fn query_error(error: tokio_postgres::Error) -> QueryGateError {
    QueryGateError::Query(describe_error(&error))
}

fn live_client(slot: &Option<Client>) -> Result<&Client> {
    slot.as_ref()
        .ok_or_else(|| QueryGateError::Connection("connection is closed".to_string()))
}

/// Prepare, run and materialize one statement.
///
/// Column metadata comes from the prepared statement, so an empty result
/// still reports its columns.
async fn run_query(client: &Client, sql: &str) -> Result<QueryResult> {
    let statement = client.prepare(sql).await.map_err(query_error)?;
    let pg_rows = client.query(&statement, &[]).await.map_err(query_error)?;

    let columns: Vec<ColumnMeta> = statement
        .columns()
        .iter()
        .enumerate()
        .map(|(ordinal, col)| ColumnMeta::new(col.name(), col.type_().name(), ordinal))
        .collect();
    let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let rows = pg_rows
        .iter()
        .map(|pg_row| {
            let values = (0..columns.len())
                .map(|idx| postgres_to_value(pg_row, idx))
                .collect();
            Row::new(names.clone(), values)
        })
        .collect();

    tracing::debug!(row_count = pg_rows.len(), "query executed");
    Ok(QueryResult::new(columns, rows))
}

async fn run_statement(client: &Client, sql: &str) -> Result<StatementResult> {
    let affected_rows = client.execute(sql, &[]).await.map_err(query_error)?;
    tracing::debug!(affected_rows, "statement executed");
    Ok(StatementResult { affected_rows })
}

/// PostgreSQL connection wrapper
pub struct PostgresConnection {
    client: SharedClient,
    cancel_token: CancelToken,
    closed: Arc<AtomicBool>,
    connection_task: AbortHandle,
}

impl PostgresConnection {
    /// Connect using a libpq-style URL or key/value string.
    ///
    /// The connection task is spawned on the current Tokio runtime.
    pub async fn connect(url: &str) -> Result<Self> {
        let mut config: tokio_postgres::Config = url
            .parse()
            .map_err(|e| QueryGateError::Configuration(format!("invalid PostgreSQL URL: {}", e)))?;
        if config.get_application_name().is_none() {
            config.application_name("querygate");
        }
        if config.get_connect_timeout().is_none() {
            config.connect_timeout(DEFAULT_CONNECT_TIMEOUT);
        }

        tracing::info!(
            hosts = ?config.get_hosts(),
            database = ?config.get_dbname(),
            user = ?config.get_user(),
            "connecting to PostgreSQL database"
        );

        let (client, connection) = config.connect(NoTls).await.map_err(|e| {
            QueryGateError::Connection(format!(
                "Failed to connect to PostgreSQL: {}",
                describe_error(&e)
            ))
        })?;

        let closed = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn({
            let closed = Arc::clone(&closed);
            async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
                closed.store(true, Ordering::Release);
            }
        });

        tracing::info!("PostgreSQL connection established");
        Ok(Self {
            cancel_token: client.cancel_token(),
            client: Arc::new(Mutex::new(Some(client))),
            closed,
            connection_task: task.abort_handle(),
        })
    }
}

#[async_trait]
impl Queryable for PostgresConnection {
    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let slot = self.client.lock().await;
        run_query(live_client(&slot)?, sql).await
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str) -> Result<StatementResult> {
        let slot = self.client.lock().await;
        run_statement(live_client(&slot)?, sql).await
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(PostgresCancelHandle {
            cancel_token: self.cancel_token.clone(),
        }))
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        tracing::debug!("beginning PostgreSQL transaction");

        let slot = self.client.lock().await;
        live_client(&slot)?
            .batch_execute("BEGIN")
            .await
            .map_err(query_error)?;

        Ok(Box::new(PostgresTransaction {
            client: Arc::clone(&self.client),
            cancel_token: self.cancel_token.clone(),
            finished: false,
        }))
    }

    /// Drops the client and tears down the socket. Anything still open on
    /// the session (including an uncommitted transaction) is discarded by
    /// the server.
    async fn close(&self) -> Result<()> {
        tracing::info!("closing PostgreSQL connection");
        self.closed.store(true, Ordering::Release);
        drop(self.client.lock().await.take());
        self.connection_task.abort();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// PostgreSQL transaction wrapper
///
/// Shares the connection's client; statements go through the same session
/// that issued `BEGIN`.
pub struct PostgresTransaction {
    client: SharedClient,
    cancel_token: CancelToken,
    finished: bool,
}

impl PostgresTransaction {
    async fn finish(&mut self, command: &str) -> Result<()> {
        tracing::debug!(command, "finishing PostgreSQL transaction");
        let slot = self.client.lock().await;
        live_client(&slot)?
            .batch_execute(command)
            .await
            .map_err(query_error)?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // A closed connection has already discarded the transaction
        let still_open = self
            .client
            .try_lock()
            .map(|slot| slot.is_some())
            .unwrap_or(true);
        if still_open {
            tracing::warn!("PostgreSQL transaction dropped without commit or rollback");
        }
    }
}

#[async_trait]
impl Queryable for PostgresTransaction {
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing query in transaction");
        let slot = self.client.lock().await;
        run_query(live_client(&slot)?, sql).await
    }

    async fn execute(&self, sql: &str) -> Result<StatementResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement in transaction");
        let slot = self.client.lock().await;
        run_statement(live_client(&slot)?, sql).await
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(PostgresCancelHandle {
            cancel_token: self.cancel_token.clone(),
        }))
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}
