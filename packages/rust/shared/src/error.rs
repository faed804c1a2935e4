//! Error types for hostlink.
//!
//! Library crates use [`HostlinkError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all hostlink operations.
#[derive(Debug, thiserror::Error)]
pub enum HostlinkError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad template, malformed pipeline config, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The path belongs to no known pipeline installation, or matches none
    /// of its templates.
    #[error("unrecognized location {path:?}: {reason}")]
    UnrecognizedLocation { path: PathBuf, reason: String },

    /// The context was recognized but the engine could not start for it.
    #[error("engine cannot be started: {0}")]
    EngineInit(String),

    /// A host application call failed.
    #[error("host error: {0}")]
    Host(String),

    /// A queued job failed.
    #[error("job error: {0}")]
    Job(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HostlinkError>;

impl HostlinkError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an unrecognized-location error for `path`.
    pub fn unrecognized(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnrecognizedLocation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an engine initialization error with a human-readable explanation.
    pub fn engine_init(msg: impl Into<String>) -> Self {
        Self::EngineInit(msg.into())
    }

    /// Whether this is one of the two recoverable kinds that lead to the
    /// disabled state (`UnrecognizedLocation`, `EngineInit`).
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::UnrecognizedLocation { .. } | Self::EngineInit(_)
        )
    }

    /// Short, stable name of the variant, used in diagnostics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "Config",
            Self::Io { .. } => "Io",
            Self::Validation { .. } => "Validation",
            Self::UnrecognizedLocation { .. } => "UnrecognizedLocation",
            Self::EngineInit(_) => "EngineInit",
            Self::Host(_) => "Host",
            Self::Job(_) => "Job",
        }
    }
}
