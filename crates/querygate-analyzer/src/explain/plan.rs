//! Structured execution plan
//!
//! Plan JSON varies between PostgreSQL versions, so every node field is
//! optional and unrecognised keys are kept in `extra` rather than dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Planner cost estimate for a node, in arbitrary planner units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeCost {
    pub startup: f64,
    pub total: f64,
}

impl NodeCost {
    pub fn new(startup: f64, total: f64) -> Self {
        Self { startup, total }
    }
}

/// A single node of the plan tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    /// Raw backend operator name, e.g. `"Seq Scan"` or `"Hash Join"`
    pub node_type: Option<String>,
    pub relation: Option<String>,
    pub alias: Option<String>,
    pub cost: Option<NodeCost>,
    /// Estimated row count (`Plan Rows`)
    pub rows: Option<f64>,
    /// Actual row count, only present with `EXPLAIN ANALYZE`
    pub actual_rows: Option<f64>,
    pub actual_startup_time_ms: Option<f64>,
    pub actual_total_time_ms: Option<f64>,
    pub loops: Option<u64>,
    pub filter: Option<String>,
    pub index_name: Option<String>,
    pub index_cond: Option<String>,
    pub scan_direction: Option<String>,
    pub children: Vec<PlanNode>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl PlanNode {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: Some(node_type.into()),
            ..Self::default()
        }
    }

    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    pub fn with_cost(mut self, startup: f64, total: f64) -> Self {
        self.cost = Some(NodeCost::new(startup, total));
        self
    }

    pub fn with_rows(mut self, rows: f64) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first, pre-order walk over this node and its descendants
    pub fn iter(&self) -> PlanNodeIter<'_> {
        PlanNodeIter { stack: vec![self] }
    }
}

pub struct PlanNodeIter<'a> {
    stack: Vec<&'a PlanNode>,
}

impl<'a> Iterator for PlanNodeIter<'a> {
    type Item = &'a PlanNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// A decoded `EXPLAIN` document.
///
/// `ExplainPlan::default()` is the empty plan produced for input that could
/// not be decoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplainPlan {
    pub root: Option<PlanNode>,
    pub planning_time_ms: Option<f64>,
    pub execution_time_ms: Option<f64>,
    /// Top-level keys other than the plan and its timings (`Triggers`, `JIT`, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ExplainPlan {
    pub fn new(root: PlanNode) -> Self {
        Self {
            root: Some(root),
            ..Self::default()
        }
    }

    /// True when the source document carried nothing at all
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
            && self.planning_time_ms.is_none()
            && self.execution_time_ms.is_none()
            && self.extra.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.root.as_ref().map_or(0, |root| root.iter().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn join_plan() -> PlanNode {
        PlanNode::new("Hash Join")
            .with_child(PlanNode::new("Seq Scan").with_relation("orders"))
            .with_child(
                PlanNode::new("Hash").with_child(PlanNode::new("Seq Scan").with_relation("users")),
            )
    }

    #[test]
    fn test_iter_is_preorder() {
        let root = join_plan();
        let order: Vec<_> = root
            .iter()
            .map(|n| n.node_type.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(order, vec!["Hash Join", "Seq Scan", "Hash", "Seq Scan"]);
    }

    #[test]
    fn test_empty_plan() {
        let plan = ExplainPlan::default();
        assert!(plan.is_empty());
        assert_eq!(plan.node_count(), 0);

        let plan = ExplainPlan::new(join_plan());
        assert!(!plan.is_empty());
        assert_eq!(plan.node_count(), 4);
    }

    #[test]
    fn test_timings_alone_are_not_empty() {
        let plan = ExplainPlan {
            planning_time_ms: Some(0.05),
            ..ExplainPlan::default()
        };
        assert!(!plan.is_empty());
    }
}
