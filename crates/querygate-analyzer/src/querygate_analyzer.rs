//! QueryGate Analyzer - advisory analysis of SQL text and execution plans
//!
//! This crate provides functionality for:
//! - Tolerant parsing of PostgreSQL `EXPLAIN (FORMAT JSON)` output
//! - Plan metrics, complexity scoring and plain-text explanations
//! - Rule-based optimization suggestions over the SQL text
//! - Lightweight structural facts (tables, columns, joins, aggregates)
//!
//! Nothing in here fails: malformed input degrades to an empty or default
//! result.

pub mod explain;
pub mod structure;
pub mod suggestions;

pub use explain::*;
pub use structure::QueryStructure;
pub use suggestions::*;
