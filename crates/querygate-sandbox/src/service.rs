//! Entry points exposed to the transport layer
//!
//! `SandboxService` owns the configuration and the shared components and is
//! handed in by its caller; there is no global instance. Everything it
//! returns is a plain serializable value.

use crate::error::SandboxResult;
use crate::executor::{ExecutionResult, QueryExecutor};
use crate::read_only::ReadOnlyExecutor;
use crate::validator::{QueryValidator, SafetyValidator, ValidationVerdict};
use querygate_analyzer::{
    ComplexityLabel, ExplainPlan, OptimizationReport, OptimizationSuggestion, PlanMetrics,
    QueryOptimizer, QueryStructure, extract_metrics, generate_explanation, parse_plan,
};
use querygate_core::{Connection, SandboxConfig};
use serde::Serialize;
use std::sync::Arc;

/// Result of [`SandboxService::explain_query`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainReport {
    pub explanation: String,
    pub complexity: ComplexityLabel,
    pub plan: ExplainPlan,
    pub metrics: Option<PlanMetrics>,
    pub structure: QueryStructure,
    pub execution_time_ms: f64,
    pub row_count: usize,
}

#[derive(Clone)]
pub struct SandboxService {
    config: SandboxConfig,
    validator: Arc<dyn QueryValidator>,
    read_only: ReadOnlyExecutor,
    explainer: ReadOnlyExecutor,
    optimizer: QueryOptimizer,
}

impl std::fmt::Debug for SandboxService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxService")
            .field("config", &self.config)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl SandboxService {
    pub fn new(config: SandboxConfig) -> Self {
        Self::with_validator(config, Arc::new(SafetyValidator::new()))
    }

    pub fn with_validator(config: SandboxConfig, validator: Arc<dyn QueryValidator>) -> Self {
        let executor = QueryExecutor::from_config(&config);
        let read_only = ReadOnlyExecutor::new()
            .with_validator(validator.clone())
            .with_executor(executor);
        // Explain needs a plan regardless of the capture setting.
        let explainer = ReadOnlyExecutor::new()
            .with_validator(validator.clone())
            .with_executor(executor.with_capture_plan(true));

        Self {
            config,
            validator,
            read_only,
            explainer,
            optimizer: QueryOptimizer::new(),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Pure safety check, no I/O.
    pub fn validate(&self, sql: &str) -> ValidationVerdict {
        self.validator.validate(sql)
    }

    /// Validates and runs `sql` read-only. `timeout_ms` falls back to
    /// `max_execution_ms` when `None`; it is only checked once the
    /// statement has passed validation.
    pub async fn execute_read_only(
        &self,
        sql: &str,
        conn: &dyn Connection,
        timeout_ms: Option<u64>,
    ) -> SandboxResult<ExecutionResult> {
        self.read_only.gate(sql)?;
        let timeout_ms = self.config.resolve_timeout(timeout_ms)?;
        self.read_only.run_validated(sql, conn, timeout_ms).await
    }

    /// Optimization suggestions for `sql`, most urgent first.
    pub fn analyze(&self, sql: &str) -> Vec<OptimizationSuggestion> {
        self.optimizer.analyze(sql)
    }

    pub fn optimization_report(&self, sql: &str) -> OptimizationReport {
        self.optimizer.report(sql)
    }

    /// Runs `sql` through the read-only path and explains its plan.
    ///
    /// A plan that cannot be fetched or parsed yields an `unknown`
    /// complexity and the fallback explanation; it never fails the call.
    #[tracing::instrument(skip(self, sql, conn), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    pub async fn explain_query(
        &self,
        sql: &str,
        conn: &dyn Connection,
        timeout_ms: Option<u64>,
    ) -> SandboxResult<ExplainReport> {
        self.explainer.gate(sql)?;
        let timeout_ms = self.config.resolve_timeout(timeout_ms)?;
        let execution = self.explainer.run_validated(sql, conn, timeout_ms).await?;

        let plan = execution
            .query_plan
            .as_deref()
            .map(parse_plan)
            .unwrap_or_default();
        let metrics = extract_metrics(&plan);
        let complexity = ComplexityLabel::score(metrics.as_ref());
        let explanation = generate_explanation(metrics.as_ref());

        tracing::info!(
            duration_ms = execution.execution_time_ms,
            complexity = complexity.as_str(),
            node_count = plan.node_count(),
            "EXPLAIN completed"
        );

        Ok(ExplainReport {
            explanation,
            complexity,
            plan,
            metrics,
            structure: QueryStructure::from_sql(sql),
            execution_time_ms: execution.execution_time_ms,
            row_count: execution.row_count,
        })
    }
}
