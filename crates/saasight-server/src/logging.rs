//! Structured logging for the saasight server
//!
//! Human-readable output for development, JSON for production, optional
//! daily-rotated log files.

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "saasight-server.log";

pub type InitError = Box<dyn std::error::Error + Send + Sync>;

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format for development
    Pretty,
    /// JSON format for production (structured logging)
    Json,
    /// Compact format for testing
    Compact,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    File,
    Both,
}

impl LogOutput {
    pub fn from_env() -> Self {
        match std::env::var("LOG_OUTPUT").as_deref() {
            Ok("file") => LogOutput::File,
            Ok("both") => LogOutput::Both,
            _ => LogOutput::Stdout,
        }
    }
}

/// Install the global subscriber.
///
/// Environment variables:
/// - `RUST_LOG`: Log level (e.g., "debug", "info", "saasight_ask=debug")
/// - `LOG_FORMAT`: Output format ("pretty", "json", "compact")
/// - `LOG_OUTPUT`: Where to write logs ("stdout", "file", "both")
/// - `LOG_DIR`: Directory for log files (default: "./logs")
///
/// ```bash
/// # Production: JSON to file with info level
/// RUST_LOG=info LOG_FORMAT=json LOG_OUTPUT=file LOG_DIR=/var/log/saasight saasight-server
/// ```
pub fn init() -> Result<(), InitError> {
    let format = LogFormat::from_env();
    let output = LogOutput::from_env();

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?
        // Filter out noisy third-party crates
        .add_directive("hyper=warn".parse()?)
        .add_directive("tokio=warn".parse()?)
        .add_directive("runtime=warn".parse()?)
        .add_directive("tower=warn".parse()?)
        .add_directive("h2=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    match (output, format) {
        (LogOutput::Stdout, LogFormat::Pretty) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_thread_ids(true).with_target(true))
                .try_init()?;
        }
        (LogOutput::Stdout, LogFormat::Json) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_current_span(true))
                .try_init()?;
        }
        (LogOutput::Stdout, LogFormat::Compact) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact())
                .try_init()?;
        }
        (LogOutput::File, _) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(file_appender()?).with_ansi(false))
                .try_init()?;
        }
        // Both stdout and file - boxed layers for dynamic dispatch
        (LogOutput::Both, format) => {
            let stdout_layer = match format {
                LogFormat::Pretty => fmt::layer()
                    .pretty()
                    .with_thread_ids(true)
                    .with_target(true)
                    .boxed(),
                LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
                LogFormat::Compact => fmt::layer().compact().boxed(),
            };

            let file_layer = fmt::layer()
                .with_writer(file_appender()?)
                .with_ansi(false)
                .boxed();

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .with(file_layer)
                .try_init()?;
        }
    }

    tracing::info!(format = ?format, output = ?output, "Logging initialized");
    if matches!(output, LogOutput::File | LogOutput::Both) {
        tracing::debug!(dir = %log_dir(), "Writing log files");
    }
    Ok(())
}

fn log_dir() -> String {
    std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string())
}

fn file_appender() -> Result<RollingFileAppender, std::io::Error> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX))
}
