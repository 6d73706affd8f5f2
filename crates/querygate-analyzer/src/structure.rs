//! Structural facts about a SQL statement
//!
//! Plain token scans, not a parser: names inside string literals, comments
//! or quoted identifiers can produce false positives and negatives.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TABLE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bFROM\s+(\w+)|JOIN\s+(\w+)").expect("valid regex"));
static SELECT_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)SELECT\s+(.*?)\s+FROM").expect("valid regex"));
static JOIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bJOIN\b").expect("valid regex"));
static AGGREGATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(COUNT|SUM|AVG|MIN|MAX|GROUP_CONCAT)\s*\(").expect("valid regex")
});
static SUBQUERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(\s*SELECT\b").expect("valid regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStructure {
    /// Names following `FROM` or `JOIN`, deduplicated in order of appearance
    pub tables: Vec<String>,
    /// Comma-separated items of the first select list
    pub columns: Vec<String>,
    pub has_joins: bool,
    pub has_aggregates: bool,
    pub has_subquery: bool,
}

impl QueryStructure {
    pub fn from_sql(sql: &str) -> Self {
        Self {
            tables: extract_tables(sql),
            columns: extract_columns(sql),
            has_joins: JOIN.is_match(sql),
            has_aggregates: AGGREGATE.is_match(sql),
            has_subquery: SUBQUERY.is_match(sql),
        }
    }
}

pub fn extract_tables(sql: &str) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();
    for caps in TABLE_REF.captures_iter(sql) {
        let Some(name) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        if !tables.iter().any(|t| t == name.as_str()) {
            tables.push(name.as_str().to_string());
        }
    }
    tables
}

pub fn extract_columns(sql: &str) -> Vec<String> {
    SELECT_LIST
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|list| list.as_str().split(',').map(|c| c.trim().to_string()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests;
