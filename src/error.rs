// src/error.rs

//! Unified error handling for jobsweep.
//!
//! Only configuration and profile errors are fatal to a run. Everything a
//! single source can go wrong with is reported as an `AppError` by the
//! fetchers and then downgraded to a skip by the orchestrator.

use std::fmt;

use thiserror::Error;

/// Result type alias for jobsweep operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// SQLite operation failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Rate-limit store is closed or its handle is unusable
    #[error("Rate-limit store unavailable: {0}")]
    Store(String),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Candidate profile is unreadable or invalid
    #[error("Profile error: {0}")]
    Profile(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A single source failed to produce listings
    #[error("Fetch error for {source_id}: {message}")]
    Fetch { source_id: String, message: String },

    /// Upstream answered with a non-success status
    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// Tracker key not present in the store
    #[error("Unknown tracker key: {0}")]
    UnknownKey(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a profile error.
    pub fn profile(message: impl Into<String>) -> Self {
        Self::Profile(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error for a given source.
    pub fn fetch(source_id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            source_id: source_id.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error aborts the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Profile(_) | Self::Toml(_))
    }

    /// Whether a retry of the same HTTP request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
