//! Error types for the Mandrill builder.

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Send error: {0}")]
    Send(#[from] SendError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Errors reported by a send, whether direct or intercepted.
///
/// Cloneable so a single failure can be handed to the aggregate callback
/// while the dispatch task that produced it logs its own copy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The request never produced an HTTP response.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The provider answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The HTTP call succeeded but the provider rejected a recipient.
    #[error("{reason}")]
    Rejected {
        email: Option<String>,
        reason: String,
    },

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    /// A dispatch task died before reporting a result.
    #[error("Dispatch failed: {0}")]
    Dispatch(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
