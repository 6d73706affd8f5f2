//! QueryGate Sandbox - guarded, read-only execution of caller SQL
//!
//! Entry points:
//! - [`SafetyValidator::validate`] - keyword pre-filter, no I/O
//! - [`ReadOnlyExecutor::execute_read_only`] - validate, then run inside a
//!   read-only transaction that is never committed, under a wall-clock budget
//! - [`SandboxService`] - bundles the above with optimization hints and
//!   `EXPLAIN`-based reports

mod error;
mod executor;
mod read_only;
mod service;
mod validator;

pub use error::{SandboxError, SandboxResult};
pub use executor::{ExecutionResult, QueryExecutor, plan_statement};
pub use read_only::ReadOnlyExecutor;
pub use service::{ExplainReport, SandboxService};
pub use validator::{DestructiveKeyword, QueryValidator, SafetyValidator, ValidationVerdict};
