//! Error types for Rentaldesk
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Rentaldesk operations
///
/// This enum covers configuration loading, request validation, provider
/// interactions, tool-server calls, and tool manifest problems.
#[derive(Error, Debug)]
pub enum RentaldeskError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or missing request fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Provider-related errors (API calls, response parsing, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Upstream throttling signal (HTTP 429 or equivalent)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Tool server connectivity or protocol errors
    #[error("Toolbox error: {0}")]
    Toolbox(String),

    /// Tool manifest loading or validation errors
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Agent exceeded maximum iteration limit
    #[error("Agent exceeded maximum iterations: limit={limit}, {message}")]
    MaxIterationsExceeded {
        /// The configured iteration limit
        limit: usize,
        /// Additional context about the failure
        message: String,
    },

    /// Request deadline exceeded
    #[error("Timed out: {0}")]
    Timeout(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Rentaldesk operations
///
/// Uses `anyhow::Error` so callers can attach context while still being
/// able to downcast to [`RentaldeskError`] for classification.
pub type Result<T> = anyhow::Result<T>;
