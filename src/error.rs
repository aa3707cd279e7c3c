//! Top-level error types for replybot.

use std::sync::Arc;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("failed to parse config from {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Completion service errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no API token configured, completion client is unavailable")]
    MissingToken,

    #[error("provider request failed: {0}")]
    ProviderRequest(String),

    #[error("provider returned {status}: {message}")]
    ProviderStatus { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("provider returned no choices")]
    EmptyResponse,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Formula rendering errors.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("formula render request failed: {0}")]
    Request(String),

    #[error("formula renderer returned {status} for {formula:?}")]
    Status { status: u16, formula: String },

    #[error("formula renderer returned an empty URL for {formula:?}")]
    EmptyUrl { formula: String },
}

/// Messaging adapter errors.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("no messaging adapter registered for source {0:?}")]
    UnknownAdapter(String),

    #[error("adapter {adapter} failed to send: {message}")]
    SendFailed { adapter: String, message: String },

    #[error("adapter {0} is not running")]
    NotStarted(String),
}
