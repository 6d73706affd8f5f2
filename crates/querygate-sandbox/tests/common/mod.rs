//! Scripted in-memory connection for sandbox behaviour tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use querygate_core::{
    ColumnMeta, Connection, QueryCancelHandle, QueryGateError, QueryResult, Queryable, Result,
    Row, StatementResult, Transaction, Value,
};

/// Everything the mock has seen, shared by the connection, its transactions
/// and its cancel handles.
#[derive(Debug, Default)]
pub struct MockState {
    pub statements: Vec<String>,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub cancels: usize,
    pub closes: usize,
    pub closed: bool,

    result: Option<QueryResult>,
    delay: Option<Duration>,
    explain_delay: Option<Duration>,
    failures: Vec<(String, String)>,
    panics_on: Option<String>,
    plan: Option<serde_json::Value>,
    rollback_fails: bool,
}

impl MockState {
    /// Statements other than the read-only directive and plan requests.
    pub fn executed(&self) -> Vec<String> {
        self.statements
            .iter()
            .filter(|sql| !sql.starts_with("EXPLAIN") && !sql.starts_with("SET TRANSACTION"))
            .cloned()
            .collect()
    }

    pub fn explains(&self) -> Vec<String> {
        self.statements
            .iter()
            .filter(|sql| sql.starts_with("EXPLAIN"))
            .cloned()
            .collect()
    }
}

pub fn students_result() -> QueryResult {
    let columns = vec!["id".to_string(), "name".to_string()];
    QueryResult::new(
        vec![
            ColumnMeta::new("id", "int4", 0),
            ColumnMeta::new("name", "text", 1),
        ],
        vec![
            Row::new(
                columns.clone(),
                vec![Value::Int32(1), Value::String("Ada".to_string())],
            ),
            Row::new(
                columns,
                vec![Value::Int32(2), Value::String("Grace".to_string())],
            ),
        ],
    )
}

pub fn seq_scan_plan() -> serde_json::Value {
    serde_json::json!([{
        "Plan": {
            "Node Type": "Seq Scan",
            "Relation Name": "students",
            "Alias": "students",
            "Startup Cost": 0.0,
            "Total Cost": 22.7,
            "Plan Rows": 1270,
            "Plan Width": 36
        },
        "Planning Time": 0.05,
        "Execution Time": 0.1
    }])
}

async fn respond(state: &Arc<Mutex<MockState>>, sql: &str) -> Result<QueryResult> {
    let (delay, panics) = {
        let mut state = state.lock();
        state.statements.push(sql.to_string());
        let panics = state
            .panics_on
            .as_deref()
            .is_some_and(|pattern| sql.contains(pattern));
        let delay = if sql.starts_with("EXPLAIN") {
            state.explain_delay
        } else {
            state.delay
        };
        (delay, panics)
    };

    if panics {
        panic!("mock driver panicked");
    }
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let state = state.lock();
    if let Some((_, message)) = state
        .failures
        .iter()
        .find(|(pattern, _)| sql.contains(pattern.as_str()))
    {
        return Err(QueryGateError::Query(message.clone()));
    }
    if sql.starts_with("EXPLAIN") {
        return match &state.plan {
            Some(plan) => Ok(QueryResult::new(
                vec![ColumnMeta::new("QUERY PLAN", "json", 0)],
                vec![Row::new(
                    vec!["QUERY PLAN".to_string()],
                    vec![Value::Json(plan.clone())],
                )],
            )),
            None => Err(QueryGateError::Query(
                "EXPLAIN is not supported by this mock".to_string(),
            )),
        };
    }
    Ok(state.result.clone().unwrap_or_else(students_result))
}

struct MockCancelHandle {
    state: Arc<Mutex<MockState>>,
}

impl QueryCancelHandle for MockCancelHandle {
    fn cancel(&self) {
        self.state.lock().cancels += 1;
    }
}

fn cancel_handle(state: &Arc<Mutex<MockState>>) -> Option<Arc<dyn QueryCancelHandle>> {
    Some(Arc::new(MockCancelHandle {
        state: state.clone(),
    }))
}

#[derive(Clone, Default)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(self, result: QueryResult) -> Self {
        self.state.lock().result = Some(result);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().delay = Some(delay);
        self
    }

    /// Delays plan requests only; the statement itself answers at once.
    pub fn with_explain_delay(self, delay: Duration) -> Self {
        self.state.lock().explain_delay = Some(delay);
        self
    }

    /// Any statement containing `pattern` fails with `message`.
    pub fn failing_on(self, pattern: &str, message: &str) -> Self {
        self.state
            .lock()
            .failures
            .push((pattern.to_string(), message.to_string()));
        self
    }

    pub fn panicking_on(self, pattern: &str) -> Self {
        self.state.lock().panics_on = Some(pattern.to_string());
        self
    }

    pub fn with_plan(self, plan: serde_json::Value) -> Self {
        self.state.lock().plan = Some(plan);
        self
    }

    pub fn with_failing_rollback(self) -> Self {
        self.state.lock().rollback_fails = true;
        self
    }

    pub fn state(&self) -> parking_lot::MutexGuard<'_, MockState> {
        self.state.lock()
    }
}

#[async_trait]
impl Queryable for MockConnection {
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        respond(&self.state, sql).await
    }

    async fn execute(&self, sql: &str) -> Result<StatementResult> {
        respond(&self.state, sql).await?;
        Ok(StatementResult::default())
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        cancel_handle(&self.state)
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueryGateError::Connection("connection is closed".to_string()));
        }
        state.begins += 1;
        Ok(Box::new(MockTransaction {
            state: self.state.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.closes += 1;
        state.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

pub struct MockTransaction {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl Queryable for MockTransaction {
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        respond(&self.state, sql).await
    }

    async fn execute(&self, sql: &str) -> Result<StatementResult> {
        respond(&self.state, sql).await?;
        Ok(StatementResult::default())
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        cancel_handle(&self.state)
    }
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.state.lock().commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut state = self.state.lock();
        state.rollbacks += 1;
        if state.rollback_fails {
            return Err(QueryGateError::Connection("server closed the connection".to_string()));
        }
        Ok(())
    }
}
