//! PostgreSQL EXPLAIN parser
//!
//! Decodes `EXPLAIN (FORMAT JSON)` output. PostgreSQL wraps the document in a
//! single-element array; a bare object is accepted too.
//!
//! ```
//! use querygate_analyzer::explain::postgres::parse_plan;
//!
//! let plan = parse_plan(r#"[{"Plan": {"Node Type": "Seq Scan", "Relation Name": "users"}}]"#);
//! assert_eq!(plan.root.unwrap().relation.as_deref(), Some("users"));
//!
//! assert!(parse_plan("not json").is_empty());
//! ```

use crate::explain::plan::{ExplainPlan, NodeCost, PlanNode};
use serde_json::{Map, Value};

const NODE_KEYS: &[&str] = &[
    "Node Type",
    "Relation Name",
    "Alias",
    "Startup Cost",
    "Total Cost",
    "Plan Rows",
    "Actual Rows",
    "Actual Startup Time",
    "Actual Total Time",
    "Actual Loops",
    "Filter",
    "Index Name",
    "Index Cond",
    "Scan Direction",
    "Plans",
];

const DOCUMENT_KEYS: &[&str] = &["Plan", "Planning Time", "Execution Time"];

/// Parses raw plan text.
///
/// Never fails: malformed JSON or an unexpected shape yields an empty plan.
pub fn parse_plan(raw: &str) -> ExplainPlan {
    let value: Value = match serde_json::from_str(raw.trim()) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "plan is not valid JSON");
            return ExplainPlan::default();
        }
    };

    let document = match &value {
        Value::Array(items) => items.first(),
        other => Some(other),
    };

    match document.and_then(Value::as_object) {
        Some(obj) => parse_document(obj),
        None => {
            tracing::debug!("plan document is not a JSON object");
            ExplainPlan::default()
        }
    }
}

fn parse_document(obj: &Map<String, Value>) -> ExplainPlan {
    let mut plan = ExplainPlan {
        root: obj.get("Plan").and_then(Value::as_object).map(parse_node),
        planning_time_ms: obj.get("Planning Time").and_then(Value::as_f64),
        execution_time_ms: obj.get("Execution Time").and_then(Value::as_f64),
        ..ExplainPlan::default()
    };

    for (key, val) in obj {
        if !DOCUMENT_KEYS.contains(&key.as_str()) {
            plan.extra.insert(key.clone(), val.clone());
        }
    }

    plan
}

fn parse_node(obj: &Map<String, Value>) -> PlanNode {
    let text = |key: &str| obj.get(key).and_then(Value::as_str).map(String::from);
    let number = |key: &str| obj.get(key).and_then(Value::as_f64);

    let mut node = PlanNode {
        node_type: text("Node Type"),
        relation: text("Relation Name"),
        alias: text("Alias"),
        rows: number("Plan Rows"),
        actual_rows: number("Actual Rows"),
        actual_startup_time_ms: number("Actual Startup Time"),
        actual_total_time_ms: number("Actual Total Time"),
        loops: obj.get("Actual Loops").and_then(Value::as_u64),
        filter: text("Filter"),
        index_name: text("Index Name"),
        index_cond: text("Index Cond"),
        scan_direction: text("Scan Direction"),
        ..PlanNode::default()
    };

    if let (Some(startup), Some(total)) = (number("Startup Cost"), number("Total Cost")) {
        node.cost = Some(NodeCost::new(startup, total));
    } else if let Some(total) = number("Total Cost") {
        node.cost = Some(NodeCost::new(0.0, total));
    }

    // Children that are not objects are skipped
    if let Some(plans) = obj.get("Plans").and_then(Value::as_array) {
        node.children = plans
            .iter()
            .filter_map(Value::as_object)
            .map(parse_node)
            .collect();
    }

    for (key, val) in obj {
        if !NODE_KEYS.contains(&key.as_str()) {
            node.extra.insert(key.clone(), val.clone());
        }
    }

    node
}
