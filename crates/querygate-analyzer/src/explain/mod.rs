//! Query EXPLAIN module
//!
//! - [`postgres`] decodes raw `EXPLAIN (FORMAT JSON)` text into an [`ExplainPlan`]
//! - [`metrics`] projects a plan into [`PlanMetrics`], scores it and renders
//!   a human-readable explanation
//!
//! # Example
//!
//! ```
//! use querygate_analyzer::explain::{ComplexityLabel, extract_metrics, parse_plan};
//!
//! let raw = r#"[{"Plan": {"Node Type": "Seq Scan"}, "Planning Time": 0.1, "Execution Time": 0.2}]"#;
//! let plan = parse_plan(raw);
//! let metrics = extract_metrics(&plan);
//! assert_eq!(ComplexityLabel::score(metrics.as_ref()), ComplexityLabel::VerySimple);
//! ```

pub mod metrics;
pub mod plan;
pub mod postgres;

pub use metrics::{ComplexityLabel, PlanMetrics, TopLevelPlan, extract_metrics, generate_explanation};
pub use plan::{ExplainPlan, NodeCost, PlanNode};
pub use postgres::parse_plan;
