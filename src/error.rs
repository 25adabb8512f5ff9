//! Custom error types for seminar.
//!
//! The taxonomy mirrors how the upstream study service fails: transient
//! conditions worth retrying, rate limits carrying a server-suggested delay,
//! permanent rejections, and user-initiated cancellation (which is a pause,
//! not a failure).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for seminar operations
#[derive(Error, Debug)]
pub enum SeminarError {
    // =========================================================================
    // Service Errors
    // =========================================================================
    /// Transient service failure (network error, 5xx, timeout)
    #[error("Transient service failure: {message}")]
    Transient {
        message: String,
        status: Option<u16>,
    },

    /// Service signaled throttling (HTTP 429)
    #[error("Rate limited by service: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Request rejected by the service (4xx other than 429, validation)
    #[error("Request rejected: {message}")]
    Permanent {
        message: String,
        status: Option<u16>,
    },

    /// Operation cancelled at an await point
    #[error("Operation cancelled")]
    Cancelled,

    // =========================================================================
    // Workflow Errors
    // =========================================================================
    /// Workflow driven into an invalid transition
    #[error("Workflow error: {message}")]
    Workflow { message: String },

    /// Step index outside the pipeline
    #[error("No step at index {index} (pipeline has {count} steps)")]
    StepIndex { index: usize, count: usize },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// Session store or persistence failure
    #[error("Session error: {message}")]
    Session { message: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SeminarError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a transient error without an HTTP status (network-level failure)
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            status: None,
        }
    }

    /// Create a rate-limit error with an optional Retry-After hint
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after,
        }
    }

    /// Create a permanent error without an HTTP status
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
            status: None,
        }
    }

    /// Create a workflow error
    pub fn workflow(message: impl Into<String>) -> Self {
        Self::Workflow {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create a session error
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Classify an HTTP response status into the service error taxonomy.
    ///
    /// 429 becomes `RateLimited` (keeping any `Retry-After` hint), 408 and
    /// 5xx become `Transient`, and the remaining 4xx become `Permanent`.
    pub fn from_status(
        status: u16,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        let message = message.into();
        match status {
            429 => Self::RateLimited {
                message,
                retry_after,
            },
            408 | 500..=599 => Self::Transient {
                message,
                status: Some(status),
            },
            _ => Self::Permanent {
                message,
                status: Some(status),
            },
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// The HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } | Self::Permanent { status, .. } => *status,
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Check if this error is a transient service failure
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Check if this error is a rate-limit condition
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Check if this error is user-initiated cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The server-suggested retry delay, if this is a rate-limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Permanent { .. } => 2,
            Self::RateLimited { .. } => 3,
            Self::Transient { .. } => 4,
            Self::Cancelled => 5,
            Self::Workflow { .. } | Self::StepIndex { .. } => 6,
            Self::Config { .. } | Self::InvalidConfig { .. } => 7,
            _ => 1,
        }
    }
}

/// Type alias for seminar results
pub type Result<T> = std::result::Result<T, SeminarError>;

/// Extension trait for converting foreign errors to SeminarError
pub trait IntoSeminarError<T> {
    fn into_seminar_config(self) -> Result<T>;
    fn into_seminar_session(self) -> Result<T>;
    fn into_seminar_transient(self) -> Result<T>;
}

impl<T, E: Into<anyhow::Error>> IntoSeminarError<T> for std::result::Result<T, E> {
    fn into_seminar_config(self) -> Result<T> {
        self.map_err(|e| SeminarError::config(e.into().to_string()))
    }

    fn into_seminar_session(self) -> Result<T> {
        self.map_err(|e| SeminarError::session(e.into().to_string()))
    }

    fn into_seminar_transient(self) -> Result<T> {
        self.map_err(|e| SeminarError::transient(e.into().to_string()))
    }
}
