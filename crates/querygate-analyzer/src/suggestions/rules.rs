//! Query Optimizer - rule scan over SQL text
//!
//! Every rule is matched against the uppercased SQL. Rules are independent
//! and several may fire for the same query; each firing rule contributes one
//! suggestion with fixed wording.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static WILDCARD_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SELECT\s+\*").expect("valid regex"));
static FILTERED_COLUMN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"WHERE\s+\w+\s*[=<>]").expect("valid regex"));
static POINT_LOOKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SELECT.*FROM.*WHERE\s+ID\s*=").expect("valid regex"));
static LIMIT_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"LIMIT\s+\d+").expect("valid regex"));
static ORDER_BY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"ORDER\s+BY").expect("valid regex"));
static GROUP_BY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"GROUP\s+BY").expect("valid regex"));
static AGGREGATE_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(COUNT|SUM|AVG|MIN|MAX)\s*\(").expect("valid regex"));
static SELECT_DISTINCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SELECT\s+DISTINCT").expect("valid regex"));
static LEADING_WILDCARD_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"LIKE\s+'%").expect("valid regex"));

/// Suggestion priority. Declaration order is sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Category tag of an optimization suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    ColumnSelection,
    Index,
    QueryPattern,
    Sorting,
    Grouping,
    Performance,
    Search,
}

impl SuggestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ColumnSelection => "column_selection",
            Self::Index => "index",
            Self::QueryPattern => "query_pattern",
            Self::Sorting => "sorting",
            Self::Grouping => "grouping",
            Self::Performance => "performance",
            Self::Search => "search",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub suggested_change: String,
    pub estimated_improvement: String,
}

impl OptimizationSuggestion {
    fn new(
        suggestion_type: SuggestionType,
        priority: Priority,
        title: &str,
        description: &str,
        suggested_change: &str,
        estimated_improvement: &str,
    ) -> Self {
        Self {
            suggestion_type,
            priority,
            title: title.to_string(),
            description: description.to_string(),
            suggested_change: suggested_change.to_string(),
            estimated_improvement: estimated_improvement.to_string(),
        }
    }
}

/// Suggestions plus per-priority counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub suggestions: Vec<OptimizationSuggestion>,
    pub total: usize,
    pub high_priority_count: usize,
    pub medium_priority_count: usize,
    pub low_priority_count: usize,
}

impl OptimizationReport {
    pub fn new(suggestions: Vec<OptimizationSuggestion>) -> Self {
        let count = |priority: Priority| suggestions.iter().filter(|s| s.priority == priority).count();
        Self {
            total: suggestions.len(),
            high_priority_count: count(Priority::High),
            medium_priority_count: count(Priority::Medium),
            low_priority_count: count(Priority::Low),
            suggestions,
        }
    }
}

/// Rule-based optimizer over SQL text
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptimizer;

impl QueryOptimizer {
    pub fn new() -> Self {
        Self
    }

    /// Runs every rule and returns the suggestions ordered by priority.
    ///
    /// The sort is stable, so suggestions of equal priority keep rule order.
    pub fn analyze(&self, sql: &str) -> Vec<OptimizationSuggestion> {
        let sql = sql.to_uppercase();
        let mut suggestions = Vec::new();

        self.check_wildcard_select(&sql, &mut suggestions);
        self.check_filtered_columns(&sql, &mut suggestions);
        self.check_point_lookup(&sql, &mut suggestions);
        self.check_unordered_limit(&sql, &mut suggestions);
        self.check_grouping_without_aggregate(&sql, &mut suggestions);
        self.check_distinct(&sql, &mut suggestions);
        self.check_leading_wildcard(&sql, &mut suggestions);

        suggestions.sort_by_key(|s| s.priority);
        suggestions
    }

    pub fn report(&self, sql: &str) -> OptimizationReport {
        OptimizationReport::new(self.analyze(sql))
    }

    fn check_wildcard_select(&self, sql: &str, out: &mut Vec<OptimizationSuggestion>) {
        if WILDCARD_SELECT.is_match(sql) {
            out.push(OptimizationSuggestion::new(
                SuggestionType::ColumnSelection,
                Priority::Medium,
                "Specify columns instead of SELECT *",
                "Using SELECT * fetches all columns which may be unnecessary and increases network traffic",
                "Replace SELECT * with specific columns: SELECT id, name, email FROM customers",
                "10-20% reduction in data transfer",
            ));
        }
    }

    fn check_filtered_columns(&self, sql: &str, out: &mut Vec<OptimizationSuggestion>) {
        if FILTERED_COLUMN.is_match(sql) {
            out.push(OptimizationSuggestion::new(
                SuggestionType::Index,
                Priority::High,
                "Consider adding indexes on filtered columns",
                "Queries with WHERE clauses benefit from indexes on frequently filtered columns",
                "CREATE INDEX idx_customers_email ON customers(email);",
                "50-100% faster lookups",
            ));
        }
    }

    fn check_point_lookup(&self, sql: &str, out: &mut Vec<OptimizationSuggestion>) {
        if POINT_LOOKUP.is_match(sql) {
            out.push(OptimizationSuggestion::new(
                SuggestionType::QueryPattern,
                Priority::High,
                "Potential N+1 query pattern detected",
                "Single-row lookups in loops should be batched or replaced with JOINs",
                "Use JOIN instead of multiple queries: SELECT * FROM customers JOIN orders",
                "100-1000% improvement with batching",
            ));
        }
    }

    fn check_unordered_limit(&self, sql: &str, out: &mut Vec<OptimizationSuggestion>) {
        if LIMIT_CLAUSE.is_match(sql) && !ORDER_BY.is_match(sql) {
            out.push(OptimizationSuggestion::new(
                SuggestionType::Sorting,
                Priority::Low,
                "Consider adding ORDER BY with LIMIT",
                "LIMIT without ORDER BY returns arbitrary rows; specify ORDER BY for consistency",
                "Add ORDER BY: SELECT * FROM students ORDER BY marks DESC LIMIT 10;",
                "Better result predictability",
            ));
        }
    }

    fn check_grouping_without_aggregate(&self, sql: &str, out: &mut Vec<OptimizationSuggestion>) {
        if GROUP_BY.is_match(sql) && !AGGREGATE_CALL.is_match(sql) {
            out.push(OptimizationSuggestion::new(
                SuggestionType::Grouping,
                Priority::Medium,
                "GROUP BY without aggregate functions",
                "GROUP BY is typically used with aggregate functions like COUNT, SUM, AVG",
                "Add aggregate: SELECT department, COUNT(*) FROM students GROUP BY department;",
                "Clarifies query intent",
            ));
        }
    }

    fn check_distinct(&self, sql: &str, out: &mut Vec<OptimizationSuggestion>) {
        if SELECT_DISTINCT.is_match(sql) {
            out.push(OptimizationSuggestion::new(
                SuggestionType::Performance,
                Priority::Medium,
                "DISTINCT can be expensive",
                "DISTINCT removes duplicates but may be slow on large datasets",
                "Consider using GROUP BY instead or ensure your data model eliminates duplicates",
                "Varies by data, may reduce overhead",
            ));
        }
    }

    fn check_leading_wildcard(&self, sql: &str, out: &mut Vec<OptimizationSuggestion>) {
        if LEADING_WILDCARD_LIKE.is_match(sql) {
            out.push(OptimizationSuggestion::new(
                SuggestionType::Search,
                Priority::High,
                "LIKE with leading wildcard prevents index usage",
                "Patterns like '%text' cannot use indexes and require full table scans",
                "Avoid leading wildcards if possible: WHERE name LIKE 'A%' instead of '%son'",
                "100-1000% faster with proper indexes",
            ));
        }
    }
}
