//! Error types for endpoint operations

use thiserror::Error;

/// Result type for endpoint operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur while talking to a vendor endpoint
#[derive(Error, Debug)]
pub enum LLMError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Configuration error, including capabilities the vendor does not serve
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A single stream record could not be interpreted.
    ///
    /// Decoders swallow this per line; it never ends a stream.
    #[error("Malformed stream record: {0}")]
    MalformedRecord(String),

    /// The response body failed or closed while a stream was being read
    #[error("Transport error: {0}")]
    Transport(String),

    /// The stream was stopped through its cancellation token
    #[error("Stream canceled")]
    Canceled,
}

impl LLMError {
    /// Whether the error terminated a stream early (transport fault or cancellation)
    pub fn is_stream_interruption(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Canceled)
    }
}
