//! Sandbox configuration
//!
//! Settings come from an optional TOML file and are then overridden by the
//! environment, mirroring how the service is deployed:
//!
//! ```toml
//! max_execution_ms = 5000
//! plan_mode = "analyze"
//!
//! [databases]
//! students_db = "postgres://reader@localhost/students"
//! ```

use crate::{QueryGateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default wall-clock budget for a single statement.
pub const DEFAULT_MAX_EXECUTION_MS: u64 = 10_000;

/// Identifier under which `DATABASE_URL` is registered.
pub const DEFAULT_DATABASE_ID: &str = "default";

/// How the execution plan is captured after a successful statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// `EXPLAIN (FORMAT JSON)`: planner estimates only.
    #[default]
    Estimate,
    /// `EXPLAIN (ANALYZE, FORMAT JSON)`: runs the statement a second time to
    /// collect actual timings. Only safe inside the read-only transaction.
    Analyze,
}

impl PlanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanMode::Estimate => "estimate",
            PlanMode::Analyze => "analyze",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "estimate" => Some(PlanMode::Estimate),
            "analyze" => Some(PlanMode::Analyze),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Timeout applied when the caller does not choose one.
    pub max_execution_ms: u64,
    /// Whether a plan is fetched after each successful statement.
    pub capture_plan: bool,
    pub plan_mode: PlanMode,
    /// Default `tracing` filter directive when `RUST_LOG` is unset.
    pub log_level: String,
    /// Target database identifier to connection URL.
    pub databases: BTreeMap<String, String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_execution_ms: DEFAULT_MAX_EXECUTION_MS,
            capture_plan: true,
            plan_mode: PlanMode::Estimate,
            log_level: "info".to_string(),
            databases: BTreeMap::new(),
        }
    }
}

impl SandboxConfig {
    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("querygate").join("config.toml"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| QueryGateError::Configuration(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loaded sandbox configuration");
        Self::from_toml_str(&contents)
    }

    /// Load the file at `path` (or the default location when it exists) and
    /// apply environment overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`Self::load`] with an explicit environment lookup.
    pub fn load_with(path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        base.with_env_overrides(lookup)
    }

    /// Apply `MAX_EXECUTION_MS`, `QUERYGATE_CAPTURE_PLAN`,
    /// `QUERYGATE_PLAN_MODE`, `LOG_LEVEL` and `DATABASE_URL`.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup("MAX_EXECUTION_MS") {
            self.max_execution_ms = raw.trim().parse().map_err(|_| {
                QueryGateError::Configuration(format!("MAX_EXECUTION_MS is not a number: {}", raw))
            })?;
        }
        if let Some(raw) = lookup("QUERYGATE_CAPTURE_PLAN") {
            self.capture_plan = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(QueryGateError::Configuration(format!(
                        "QUERYGATE_CAPTURE_PLAN is not a boolean: {}",
                        raw
                    )));
                }
            };
        }
        if let Some(raw) = lookup("QUERYGATE_PLAN_MODE") {
            self.plan_mode = PlanMode::parse(&raw).ok_or_else(|| {
                QueryGateError::Configuration(format!("unknown plan mode: {}", raw))
            })?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.databases.insert(DEFAULT_DATABASE_ID.to_string(), url);
        }
        self.validate()?;
        Ok(self)
    }

    /// The caller's timeout, or the configured default when unspecified.
    pub fn resolve_timeout(&self, requested_ms: Option<u64>) -> Result<u64> {
        match requested_ms.unwrap_or(self.max_execution_ms) {
            0 => Err(QueryGateError::Configuration(
                "timeout must be greater than zero".to_string(),
            )),
            ms => Ok(ms),
        }
    }

    /// Connection URL for a target database identifier.
    pub fn database_url(&self, database_id: &str) -> Result<&str> {
        self.databases
            .get(database_id)
            .map(String::as_str)
            .ok_or_else(|| {
                QueryGateError::Configuration(format!("unknown database: {}", database_id))
            })
    }

    fn validate(&self) -> Result<()> {
        if self.max_execution_ms == 0 {
            return Err(QueryGateError::Configuration(
                "max_execution_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
