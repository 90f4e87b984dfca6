//! Structured logging infrastructure, built on `tracing`.
//!
//! Supports a handful of output formats, optional file output alongside or
//! instead of stdout, and 1-in-N sampling of sub-warning events via
//! [`filters::SamplingFilter`].

mod filters;
mod formatters;

pub use filters::SamplingFilter;
#[cfg(feature = "dynamic-logging")]
pub use filters::DynamicTargetFilter;
pub use formatters::{DetailedJsonFormatter, DevelopmentFormatter};

use crate::config::{LogFormat, LogLevel, LoggingConfig};
use std::path::Path;
use std::sync::OnceLock;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer, Registry};

/// Error type for logging operations.
#[derive(Debug)]
pub enum LogError {
    IoError(std::io::Error),
    InvalidLogLevel(String),
    SubscriberError(Box<dyn std::error::Error + Send + Sync>),
    Other(String),
}

impl From<std::io::Error> for LogError {
    fn from(err: std::io::Error) -> Self {
        LogError::IoError(err)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for LogError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        LogError::SubscriberError(err)
    }
}

pub type Result<T> = std::result::Result<T, LogError>;

/// Holds the file appender's worker guard for the process lifetime; dropping
/// it stops flushing, so it must outlive every subscriber using it.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize the global `tracing` subscriber from `config`. Calling this
/// more than once is harmless; the second call is ignored.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let level: Level = config.level.into();
    let writer = build_writer(config)?;
    let sampling = SamplingFilter::<Registry>::new(config.sampling_rate);

    let result: std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(sampling)
            .with(fmt::layer().event_format(DetailedJsonFormatter).with_writer(writer).with_filter(level_filter(level)))
            .try_init()
            .map_err(Box::from),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(sampling)
            .with(fmt::layer().compact().with_writer(writer).with_filter(level_filter(level)))
            .try_init()
            .map_err(Box::from),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(sampling)
            .with(fmt::layer().pretty().with_writer(writer).with_filter(level_filter(level)))
            .try_init()
            .map_err(Box::from),
        LogFormat::Default => tracing_subscriber::registry()
            .with(sampling)
            .with(fmt::layer().event_format(DevelopmentFormatter).with_writer(writer).with_filter(level_filter(level)))
            .try_init()
            .map_err(Box::from),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.to_string().contains("SetGlobalDefaultError") => Ok(()),
        Err(e) => Err(LogError::SubscriberError(e)),
    }
}

fn level_filter(level: Level) -> tracing_subscriber::filter::LevelFilter {
    tracing_subscriber::filter::LevelFilter::from_level(level)
}

/// Resolve the configured destination into a single writer: stdout if
/// requested, the log file otherwise, stdout taking priority when both are
/// set (matching the rest of this module's preference for simple, explicit
/// behavior over fanning out to two sinks).
fn build_writer(config: &LoggingConfig) -> Result<BoxMakeWriter> {
    if config.stdout {
        if config.file.is_some() {
            tracing::warn!("configured for stdout and file; file logging ignored");
        }
        return Ok(BoxMakeWriter::new(std::io::stdout));
    }

    if let Some(file_path) = &config.file {
        let (writer, _guard) = create_non_blocking_file(file_path)?;
        return Ok(BoxMakeWriter::new(writer));
    }

    Ok(BoxMakeWriter::new(std::io::sink))
}

/// Create a non-blocking file writer, ensuring the parent directory exists.
fn create_non_blocking_file(path: impl AsRef<Path>) -> Result<(NonBlocking, &'static WorkerGuard)> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender =
        tracing_appender::rolling::never(path.parent().unwrap_or_else(|| Path::new(".")), path.file_name().unwrap_or_default());
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let guard_ref = FILE_GUARD.get_or_init(|| guard);

    Ok((non_blocking, guard_ref))
}

/// Parse a log level string into a [`LogLevel`].
pub fn parse_log_level(level: &str) -> Result<LogLevel> {
    level.parse().map_err(LogError::InvalidLogLevel)
}

/// Convert a `tracing::Level` to a [`LogLevel`].
pub fn level_to_log_level(level: Level) -> LogLevel {
    match level {
        Level::TRACE => LogLevel::Trace,
        Level::DEBUG => LogLevel::Debug,
        Level::INFO => LogLevel::Info,
        Level::WARN => LogLevel::Warn,
        Level::ERROR => LogLevel::Error,
    }
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogError::IoError(e) => write!(f, "IO error: {e}"),
            LogError::SubscriberError(e) => write!(f, "subscriber error: {e}"),
            LogError::InvalidLogLevel(s) => write!(f, "invalid log level: {s}"),
            LogError::Other(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for LogError {}

impl From<LogError> for crate::EngramError {
    fn from(err: LogError) -> Self {
        crate::EngramError::Logging(err.to_string())
    }
}

/// Structured logging with additional fields, e.g.
/// `log_with_fields!(tracing::Level::INFO, memory_id = %id, "stored")`.
#[macro_export]
macro_rules! log_with_fields {
    ($level:expr, $($fields:tt)+) => {
        tracing::event!($level, $($fields)+)
    };
}

/// Log an error with a human message and any extra fields.
#[macro_export]
macro_rules! log_error {
    ($err:expr, $msg:expr $(, $fields:tt)*) => {
        tracing::error!(
            error = %$err,
            message = $msg,
            $($fields)*
        )
    };
}
