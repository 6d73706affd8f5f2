//! QueryGate CLI: guarded, read-only SQL against configured databases.
//!
//! # Commands
//!
//! - `validate`: destructive-keyword check, no database access
//! - `analyze`: rule-based optimization suggestions, no database access
//! - `execute`: run a statement inside a rolled-back READ ONLY transaction
//! - `explain`: execute, then summarize the captured `EXPLAIN` plan
//!
//! SQL is taken from the positional argument, or from stdin when it is
//! omitted or `-`.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use querygate_core::{Connection, DEFAULT_DATABASE_ID, SandboxConfig};
use querygate_driver_postgres::PostgresConnection;
use querygate_sandbox::SandboxService;

mod logging;
mod output;

use output::OutputFormat;

#[derive(Parser)]
#[command(name = "querygate")]
#[command(about = "Validate, analyze and safely execute SQL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (defaults to the user config directory)
    #[arg(long, global = true, env = "QUERYGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also write JSON logs to daily files in this directory
    #[arg(long, global = true, env = "QUERYGATE_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Debug-level console logging with span timings
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a statement for destructive keywords
    Validate {
        /// SQL text, or `-` for stdin
        sql: Option<String>,
    },
    /// Suggest optimizations from the SQL text alone
    Analyze {
        /// SQL text, or `-` for stdin
        sql: Option<String>,
    },
    /// Execute a statement read-only
    Execute(TargetArgs),
    /// Execute a statement read-only and explain its plan
    Explain(TargetArgs),
}

#[derive(Args)]
struct TargetArgs {
    /// SQL text, or `-` for stdin
    sql: Option<String>,

    /// Target database identifier from the configuration
    #[arg(long, short, default_value = DEFAULT_DATABASE_ID)]
    database: String,

    /// Timeout in milliseconds (defaults to max_execution_ms)
    #[arg(long)]
    timeout_ms: Option<u64>,
}

fn read_sql(arg: Option<String>) -> anyhow::Result<String> {
    match arg {
        Some(sql) if sql != "-" => Ok(sql),
        _ => {
            let mut sql = String::new();
            std::io::stdin()
                .read_to_string(&mut sql)
                .context("failed to read SQL from stdin")?;
            Ok(sql)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config =
        SandboxConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    let logging = if cli.verbose {
        logging::LoggingConfig::development()
    } else {
        logging::LoggingConfig::with_level(&config.log_level)
    };
    let _log_guard = logging::init(logging.with_log_dir(cli.log_dir))?;

    let service = SandboxService::new(config);
    let format = cli.format;

    match cli.command {
        Commands::Validate { sql } => {
            let verdict = service.validate(&read_sql(sql)?);
            output::print_verdict(format, &verdict)?;
            Ok(if verdict.is_safe {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
        Commands::Analyze { sql } => {
            output::print_report(format, &service.optimization_report(&read_sql(sql)?))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Execute(target) => {
            let sql = read_sql(target.sql)?;
            let conn = connect(&service, &target.database).await?;
            let outcome = service
                .execute_read_only(&sql, &conn, target.timeout_ms)
                .await;
            close(&conn).await;
            match outcome {
                Ok(result) => {
                    output::print_execution(format, &result)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    output::print_error(&e)?;
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Explain(target) => {
            let sql = read_sql(target.sql)?;
            let conn = connect(&service, &target.database).await?;
            let outcome = service.explain_query(&sql, &conn, target.timeout_ms).await;
            close(&conn).await;
            match outcome {
                Ok(report) => {
                    output::print_explain(format, &report)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    output::print_error(&e)?;
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

async fn connect(service: &SandboxService, database: &str) -> anyhow::Result<PostgresConnection> {
    let url = service.config().database_url(database)?;
    PostgresConnection::connect(url)
        .await
        .with_context(|| format!("failed to connect to database '{}'", database))
}

async fn close(conn: &PostgresConnection) {
    if conn.is_closed() {
        return;
    }
    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "failed to close connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_execute_defaults() {
        let cli = Cli::try_parse_from(["querygate", "execute", "SELECT 1"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Execute(target) => {
                assert_eq!(target.sql.as_deref(), Some("SELECT 1"));
                assert_eq!(target.database, "default");
                assert_eq!(target.timeout_ms, None);
            }
            _ => panic!("expected execute"),
        }
    }

    #[test]
    fn test_explain_flags() {
        let cli = Cli::try_parse_from([
            "querygate",
            "explain",
            "--database",
            "reporting",
            "--timeout-ms",
            "250",
            "--format",
            "table",
            "SELECT * FROM orders",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Table);
        match cli.command {
            Commands::Explain(target) => {
                assert_eq!(target.database, "reporting");
                assert_eq!(target.timeout_ms, Some(250));
            }
            _ => panic!("expected explain"),
        }
    }

    #[test]
    fn test_sql_argument_is_used_verbatim() {
        assert_eq!(read_sql(Some("SELECT 1".to_string())).unwrap(), "SELECT 1");
    }
}
