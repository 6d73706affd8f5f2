//! Logging and tracing setup for the `querygate` binary
//!
//! - Console output on stderr, pretty for development or compact otherwise
//! - Optional JSON lines written to daily rolling files
//! - `RUST_LOG` takes precedence over the configured level

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStyle {
    Pretty,
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for JSON log files; `None` disables file output
    pub log_dir: Option<PathBuf>,

    /// Whether to write to stderr at all
    pub enable_console_logs: bool,

    pub console_style: ConsoleStyle,

    /// Whether to include file/line information in logs
    pub include_location: bool,

    /// Whether to log span open/close (for performance tracing)
    pub enable_spans: bool,

    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            enable_console_logs: true,
            console_style: if cfg!(debug_assertions) {
                ConsoleStyle::Pretty
            } else {
                ConsoleStyle::Compact
            },
            include_location: cfg!(debug_assertions),
            enable_spans: false,
            default_filter: default_filter("info"),
        }
    }
}

impl LoggingConfig {
    /// Console at `level` for the querygate crates, warnings for everything else.
    pub fn with_level(level: &str) -> Self {
        Self {
            default_filter: default_filter(level),
            ..Self::default()
        }
    }

    pub fn with_log_dir(mut self, log_dir: Option<PathBuf>) -> Self {
        self.log_dir = log_dir;
        self
    }

    /// Verbose console output including span timings
    pub fn development() -> Self {
        Self {
            console_style: ConsoleStyle::Pretty,
            include_location: true,
            enable_spans: true,
            default_filter: default_filter("debug"),
            ..Self::default()
        }
    }
}

fn default_filter(level: &str) -> String {
    format!(
        "warn,querygate={level},querygate_core={level},querygate_analyzer={level},querygate_driver_postgres={level},querygate_sandbox={level}"
    )
}

/// Installs the global subscriber.
///
/// The returned guard flushes the file writer and must be held until exit.
pub fn init(config: LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    // NEW fires once per span; ENTER would repeat on every re-poll of an
    // awaited future.
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events.clone());
        let console_layer = match config.console_style {
            ConsoleStyle::Pretty => console_layer
                .pretty()
                .with_filter(env_filter.clone())
                .boxed(),
            ConsoleStyle::Compact => console_layer
                .compact()
                .with_filter(env_filter.clone())
                .boxed(),
        };
        layers.push(console_layer);
    }

    let mut guard = None;
    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;
        let file_appender = tracing_appender::rolling::daily(log_dir, "querygate.log");
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();
        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(
        log_dir = ?config.log_dir,
        console_enabled = config.enable_console_logs,
        "logging initialized"
    );

    Ok(guard)
}
