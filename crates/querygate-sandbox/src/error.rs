//! Sandbox errors

use querygate_core::QueryGateError;
use thiserror::Error;

pub type SandboxResult<T> = Result<T, SandboxError>;

#[derive(Debug, Error)]
pub enum SandboxError {
    /// Rejected before any execution attempt. Carries the joined warnings.
    #[error("Query not safe: {0}")]
    ValidationFailed(String),

    /// The request itself was unusable (for example a zero timeout).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Query execution exceeded {timeout_ms}ms timeout")]
    Timeout { timeout_ms: u64, elapsed_ms: f64 },

    /// Backing-store failure; the driver message is kept verbatim.
    #[error(transparent)]
    ExecutionFailed(QueryGateError),

    /// Only ever logged; a missing plan never fails a call.
    #[error("Execution plan unavailable: {0}")]
    PlanUnavailable(String),
}

impl SandboxError {
    /// HTTP status the caller should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ValidationFailed(_) | Self::InvalidRequest(_) => 400,
            Self::Timeout { .. } => 408,
            Self::ExecutionFailed(_) | Self::PlanUnavailable(_) => 500,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) => "validation_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Timeout { .. } => "timeout",
            Self::ExecutionFailed(_) => "execution_failed",
            Self::PlanUnavailable(_) => "plan_unavailable",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<QueryGateError> for SandboxError {
    fn from(error: QueryGateError) -> Self {
        match error {
            QueryGateError::Configuration(message) => Self::InvalidRequest(message),
            other => Self::ExecutionFailed(other),
        }
    }
}
