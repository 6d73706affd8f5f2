//! Destructive-keyword validator
//!
//! A fast pre-filter: the uppercased SQL is scanned for whole-word
//! destructive keywords. It has no notion of string literals or comments, so
//! `SELECT 'DROP'` is rejected too. The read-only transaction, not this
//! check, is what keeps data unchanged.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DestructiveKeyword {
    Delete,
    Drop,
    Truncate,
    Alter,
    Update,
    Insert,
    Create,
}

impl DestructiveKeyword {
    /// Check order, which is also warning order.
    pub const ALL: [DestructiveKeyword; 7] = [
        Self::Delete,
        Self::Drop,
        Self::Truncate,
        Self::Alter,
        Self::Update,
        Self::Insert,
        Self::Create,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Drop => "DROP",
            Self::Truncate => "TRUNCATE",
            Self::Alter => "ALTER",
            Self::Update => "UPDATE",
            Self::Insert => "INSERT",
            Self::Create => "CREATE",
        }
    }

    pub fn warning(&self) -> String {
        format!("Query contains {} operation", self.as_str())
    }
}

static KEYWORD_PATTERNS: LazyLock<Vec<(DestructiveKeyword, Regex)>> = LazyLock::new(|| {
    DestructiveKeyword::ALL
        .iter()
        .map(|kw| {
            let pattern = format!(r"\b{}\b", kw.as_str());
            (*kw, Regex::new(&pattern).expect("valid regex"))
        })
        .collect()
});

/// Outcome of validating one statement. `is_safe` holds exactly when
/// `warnings` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub is_safe: bool,
    pub warnings: Vec<String>,
    #[serde(skip)]
    keywords: Vec<DestructiveKeyword>,
}

impl ValidationVerdict {
    pub fn safe() -> Self {
        Self::from_keywords(Vec::new())
    }

    pub fn from_keywords(keywords: Vec<DestructiveKeyword>) -> Self {
        Self {
            is_safe: keywords.is_empty(),
            warnings: keywords.iter().map(DestructiveKeyword::warning).collect(),
            keywords,
        }
    }

    /// A rejection not tied to any keyword.
    pub fn rejected(warning: impl Into<String>) -> Self {
        Self {
            is_safe: false,
            warnings: vec![warning.into()],
            keywords: Vec::new(),
        }
    }

    pub fn keywords(&self) -> &[DestructiveKeyword] {
        &self.keywords
    }

    /// Remediation hints shown alongside the warnings.
    pub fn hints(&self) -> Vec<&'static str> {
        let mut hints = Vec::new();
        if self.keywords.contains(&DestructiveKeyword::Delete) {
            hints.push("Use SELECT with WHERE clause to preview rows first");
        }
        if self.keywords.contains(&DestructiveKeyword::Drop) {
            hints.push("This operation cannot be executed in read-only mode");
        }
        hints
    }

    /// Warnings joined the way a rejection reports them.
    pub fn rejection_message(&self) -> String {
        self.warnings.join("; ")
    }
}

/// Decides whether SQL may enter the execution path.
pub trait QueryValidator: Send + Sync {
    fn validate(&self, sql: &str) -> ValidationVerdict;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyValidator;

impl SafetyValidator {
    pub fn new() -> Self {
        Self
    }
}

impl QueryValidator for SafetyValidator {
    /// Never fails. Empty input is vacuously safe.
    fn validate(&self, sql: &str) -> ValidationVerdict {
        let normalized = sql.trim().to_uppercase();
        let keywords: Vec<DestructiveKeyword> = KEYWORD_PATTERNS
            .iter()
            .filter(|(_, pattern)| pattern.is_match(&normalized))
            .map(|(kw, _)| *kw)
            .collect();

        if !keywords.is_empty() {
            tracing::debug!(
                sql_preview = %sql.chars().take(100).collect::<String>(),
                keywords = ?keywords,
                "destructive keywords detected"
            );
        }
        ValidationVerdict::from_keywords(keywords)
    }
}
