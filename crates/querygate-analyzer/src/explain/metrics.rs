//! Plan metrics, complexity scoring and explanation text
//!
//! Only the top-level plan node is projected into [`TopLevelPlan`]. Child
//! nodes (join inputs, nested scans) are kept in the [`ExplainPlan`] but are
//! not aggregated into the metrics.

use crate::explain::plan::{ExplainPlan, PlanNode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized projection of a plan's root node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopLevelPlan {
    pub node_type: Option<String>,
    /// Actual rows when measured, otherwise the planner estimate
    pub rows: f64,
    /// Actual total time when measured, otherwise the planner total cost
    pub duration_ms: f64,
    pub filter: Option<String>,
    pub index_name: Option<String>,
    pub scan_direction: Option<String>,
}

impl TopLevelPlan {
    fn from_node(node: &PlanNode) -> Self {
        Self {
            node_type: node.node_type.clone(),
            rows: node.actual_rows.or(node.rows).unwrap_or(0.0),
            duration_ms: node
                .actual_total_time_ms
                .or(node.cost.map(|c| c.total))
                .unwrap_or(0.0),
            filter: node.filter.clone(),
            index_name: node.index_name.clone(),
            scan_direction: node.scan_direction.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanMetrics {
    /// `planning_time_ms + execution_time_ms` as reported by the plan
    pub total_time_ms: f64,
    pub planning_time_ms: f64,
    pub execution_time_ms: f64,
    pub top_level_plan: TopLevelPlan,
}

/// Projects a plan into metrics. Returns `None` for an empty plan.
pub fn extract_metrics(plan: &ExplainPlan) -> Option<PlanMetrics> {
    if plan.is_empty() {
        return None;
    }

    let planning_time_ms = plan.planning_time_ms.unwrap_or(0.0);
    let execution_time_ms = plan.execution_time_ms.unwrap_or(0.0);

    Some(PlanMetrics {
        total_time_ms: planning_time_ms + execution_time_ms,
        planning_time_ms,
        execution_time_ms,
        top_level_plan: plan
            .root
            .as_ref()
            .map(TopLevelPlan::from_node)
            .unwrap_or_default(),
    })
}

/// Coarse bucket derived from total reported plan time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLabel {
    VerySimple,
    Simple,
    Moderate,
    Complex,
    VeryComplex,
    Unknown,
}

impl ComplexityLabel {
    /// Buckets are closed on their lower bound: exactly 1.0ms is `Simple`.
    pub fn score(metrics: Option<&PlanMetrics>) -> Self {
        let Some(metrics) = metrics else {
            return Self::Unknown;
        };

        match metrics.total_time_ms {
            t if t < 1.0 => Self::VerySimple,
            t if t < 10.0 => Self::Simple,
            t if t < 100.0 => Self::Moderate,
            t if t < 1000.0 => Self::Complex,
            _ => Self::VeryComplex,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VerySimple => "very_simple",
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
            Self::VeryComplex => "very_complex",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ComplexityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders the fixed plain-text explanation for a set of metrics.
pub fn generate_explanation(metrics: Option<&PlanMetrics>) -> String {
    let mut explanation = String::from("Query Execution Analysis:\n\n");

    let Some(metrics) = metrics else {
        explanation.push_str("Unable to parse execution plan.");
        return explanation;
    };

    explanation.push_str(&format!("Total Time: {:.2}ms\n", metrics.total_time_ms));
    explanation.push_str(&format!("  - Planning: {:.2}ms\n", metrics.planning_time_ms));
    explanation.push_str(&format!("  - Execution: {:.2}ms\n\n", metrics.execution_time_ms));

    let top = &metrics.top_level_plan;
    if let Some(node_type) = non_empty(&top.node_type) {
        explanation.push_str(&format!("Scan Type: {}\n", node_type));
        if top.rows != 0.0 {
            explanation.push_str(&format!("Rows Returned: {}\n", format_count(top.rows)));
        }
        if let Some(filter) = non_empty(&top.filter) {
            explanation.push_str(&format!("Filter: {}\n", filter));
        }
        if let Some(index) = non_empty(&top.index_name) {
            explanation.push_str(&format!("Index Used: {}\n", index));
        }
    }

    explanation
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Whole row counts print without a fractional part.
fn format_count(rows: f64) -> String {
    if rows.fract() == 0.0 && rows.abs() < 1e15 {
        format!("{}", rows as i64)
    } else {
        format!("{}", rows)
    }
}
