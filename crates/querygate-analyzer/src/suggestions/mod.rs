//! Optimization Suggestions Module
//!
//! Rule-based hints derived from the SQL text alone. The rules never consult
//! an execution plan, so the same SQL always yields the same suggestions.

mod rules;

pub use rules::*;
