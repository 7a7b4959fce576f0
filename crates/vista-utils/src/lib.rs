//! # Vista Utilities
//!
//! Shared helpers for the Vista workspace, chiefly the `tracing` subscriber
//! setup used by the CLI.

pub mod logging;

// Re-export commonly used logging types for convenience
pub use logging::{LogFormat, LogLevel, LogTarget, LoggingConfig, LoggingError};
pub use tracing::{debug, error, info, trace, warn};
