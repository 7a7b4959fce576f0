//! # Logging Utilities
//!
//! Logging infrastructure for Vista using `tracing`.
//!
//! The engine itself only emits events (`trace!` for rule selection, `debug!`
//! for degraded decodes). This module installs the subscriber that shows them:
//! - Pretty output for terminals, JSON for machine consumption
//! - Console output on stdout or stderr
//! - Optional file output through a non-blocking appender
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vista_utils::LoggingConfig;
//!
//! // Keep the guard alive so buffered file output is flushed on exit
//! let _guard = LoggingConfig::from_env().init().expect("Failed to initialize logging");
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Filter directives (e.g., `RUST_LOG=debug`, `RUST_LOG=vista_core=trace`)
//! - `VISTA_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `VISTA_LOG_FILE`: Optional log file path; a directory gets a dated file name
//!
//! ## Examples
//!
//! ```rust,no_run
//! use vista_utils::{LogFormat, LogLevel, LogTarget, LoggingConfig};
//!
//! // CLI tools log to stderr so stdout carries only their output
//! let _guard = LoggingConfig::from_env()
//!     .with_level(LogLevel::Debug)
//!     .with_target(LogTarget::Stderr)
//!     .init()
//!     .expect("Failed to initialize logging");
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Boxed layer so console and file layers of either format share one type
type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format
    #[default]
    Pretty,
    /// JSON lines
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "text" => Ok(LogFormat::Pretty),
            "json" | "prod" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    Error,
    Warn,
    /// Default when nothing is configured
    Info,
    Debug,
    /// Includes every dispatch decision
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Where console output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogTarget
{
    #[default]
    Stdout,
    Stderr,
    /// File output only
    None,
}

/// Subscriber settings
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig
{
    /// Explicit level; overrides `RUST_LOG` when set
    pub level: Option<LogLevel>,
    pub format: LogFormat,
    pub target: LogTarget,
    pub file: Option<PathBuf>,
}

impl LoggingConfig
{
    /// Settings from `VISTA_LOG_FORMAT` and `VISTA_LOG_FILE`.
    ///
    /// An unknown format falls back to pretty output.
    #[must_use]
    pub fn from_env() -> Self
    {
        Self {
            level: None,
            format: env::var("VISTA_LOG_FORMAT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            target: LogTarget::Stdout,
            file: env::var_os("VISTA_LOG_FILE").map(PathBuf::from),
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self
    {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self
    {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self
    {
        self.target = target;
        self
    }

    #[must_use]
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self
    {
        self.file = Some(file.into());
        self
    }

    /// Filter priority: explicit level, then `RUST_LOG`, then `info`.
    fn filter(&self) -> EnvFilter
    {
        match self.level {
            Some(level) => EnvFilter::new(Level::from(level).to_string()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
        }
    }

    /// Install the global subscriber.
    ///
    /// Returns the file appender's guard when file output is enabled; buffered
    /// lines are flushed when it is dropped.
    ///
    /// ## Errors
    ///
    /// - `FileError`: the log directory cannot be created
    /// - `InitializationFailed`: a global subscriber is already installed
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError>
    {
        let mut layers: Vec<BoxedLayer> = Vec::new();
        match self.target {
            LogTarget::Stdout => layers.push(self.layer(io::stdout, true)),
            LogTarget::Stderr => layers.push(self.layer(io::stderr, true)),
            LogTarget::None => {}
        }

        let guard = match &self.file {
            Some(path) => {
                let path = log_file_path(path)?;
                let directory = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
                let appender = tracing_appender::rolling::never(directory, path.file_name().unwrap_or_default());
                let (writer, guard) = tracing_appender::non_blocking(appender);
                layers.push(self.layer(writer, false));
                Some(guard)
            }
            None => None,
        };

        Registry::default()
            .with(layers)
            .try_init()
            .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;
        Ok(guard)
    }

    fn layer<W>(&self, writer: W, ansi: bool) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let base = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339());
        match self.format {
            LogFormat::Pretty => base.with_ansi(ansi).with_filter(self.filter()).boxed(),
            LogFormat::Json => base
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_filter(self.filter())
                .boxed(),
        }
    }
}

/// A directory gets a dated `vista` log file inside it.
fn log_file_path(path: &Path) -> Result<PathBuf, LoggingError>
{
    if path.is_dir() {
        return Ok(path.join(format!("{}-vista.log", Utc::now().format("%Y-%m-%d"))));
    }
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(path.to_path_buf())
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    #[error("Invalid log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    #[error("Invalid log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
