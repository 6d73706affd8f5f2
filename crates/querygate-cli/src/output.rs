//! Rendering of command results

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use querygate_analyzer::OptimizationReport;
use querygate_sandbox::{ExecutionResult, ExplainReport, SandboxError, ValidationVerdict};
use serde::Serialize;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Serialize)]
struct VerdictOutput<'a> {
    is_safe: bool,
    warnings: &'a [String],
    hints: Vec<&'static str>,
}

#[derive(Serialize)]
struct ErrorOutput {
    error: String,
    kind: &'static str,
    status: u16,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Cell text for a materialized value; strings print without quotes.
fn cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn print_verdict(format: OutputFormat, verdict: &ValidationVerdict) -> anyhow::Result<()> {
    let output = VerdictOutput {
        is_safe: verdict.is_safe,
        warnings: &verdict.warnings,
        hints: verdict.hints(),
    };
    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => {
            println!("{}", if verdict.is_safe { "safe" } else { "NOT SAFE" });
            for warning in output.warnings {
                println!("  warning: {}", warning);
            }
            for hint in &output.hints {
                println!("  hint: {}", hint);
            }
            Ok(())
        }
    }
}

pub fn print_report(format: OutputFormat, report: &OptimizationReport) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(vec!["Priority", "Type", "Title", "Suggested change"]);
            for s in &report.suggestions {
                table.add_row(vec![
                    s.priority.as_str(),
                    s.suggestion_type.as_str(),
                    s.title.as_str(),
                    s.suggested_change.as_str(),
                ]);
            }
            println!("{table}");
            println!(
                "{} suggestion(s): {} high, {} medium, {} low",
                report.total,
                report.high_priority_count,
                report.medium_priority_count,
                report.low_priority_count
            );
            Ok(())
        }
    }
}

pub fn print_execution(format: OutputFormat, result: &ExecutionResult) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(result),
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(result.columns.clone());
            for row in &result.rows {
                table.add_row(row.values().map(cell).collect::<Vec<_>>());
            }
            println!("{table}");
            println!(
                "({} row{}, {:.2}ms)",
                result.row_count,
                if result.row_count == 1 { "" } else { "s" },
                result.execution_time_ms
            );
            Ok(())
        }
    }
}

pub fn print_explain(format: OutputFormat, report: &ExplainReport) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            println!("{}", report.explanation.trim_end());
            println!();
            let mut table = new_table();
            table.set_header(vec!["Property", "Value"]);
            table.add_row(vec!["Complexity".to_string(), report.complexity.to_string()]);
            table.add_row(vec!["Tables".to_string(), report.structure.tables.join(", ")]);
            table.add_row(vec!["Columns".to_string(), report.structure.columns.join(", ")]);
            table.add_row(vec!["Joins".to_string(), report.structure.has_joins.to_string()]);
            table.add_row(vec![
                "Aggregates".to_string(),
                report.structure.has_aggregates.to_string(),
            ]);
            table.add_row(vec![
                "Subquery".to_string(),
                report.structure.has_subquery.to_string(),
            ]);
            table.add_row(vec!["Rows".to_string(), report.row_count.to_string()]);
            table.add_row(vec![
                "Execution time".to_string(),
                format!("{:.2}ms", report.execution_time_ms),
            ]);
            println!("{table}");
            Ok(())
        }
    }
}

/// Sandbox failures are always JSON so callers can branch on `kind`.
pub fn print_error(error: &SandboxError) -> anyhow::Result<()> {
    let output = ErrorOutput {
        error: error.to_string(),
        kind: error.kind(),
        status: error.status_code(),
    };
    eprintln!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
