use thiserror::Error;

/// Errors surfaced by the pipeline and its policies.
///
/// Transport-level variants ([`Transport`](StratusError::Transport) and
/// [`Request`](StratusError::Request)) are the retriable class; everything
/// else aborts the call. HTTP error status codes are *not* represented
/// here: the pipeline returns a response for any status.
#[derive(Error, Debug)]
pub enum StratusError {
    /// The transport failed before a response was produced.
    #[error("transport error: {0}")]
    Transport(String),

    /// The HTTP request failed inside the reqwest transport.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// A URL could not be parsed or joined.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A header name or value was malformed.
    #[error("invalid header: {0}")]
    Header(String),

    /// A payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A policy failed during pre-send or post-send processing.
    #[error("policy {policy} failed: {message}")]
    Policy {
        policy: &'static str,
        message: String,
    },

    /// The redirect policy gave up following redirects.
    #[error("exceeded maximum of {0} redirects")]
    TooManyRedirects(u32),

    /// A multipart bundle could not be prepared or serialized.
    #[error("multipart error: {0}")]
    Multipart(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),
}

impl StratusError {
    /// Create a transport-level error from a message.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a policy failure attributed to `policy`.
    pub fn policy(policy: &'static str, message: impl Into<String>) -> Self {
        Self::Policy {
            policy,
            message: message.into(),
        }
    }

    /// Create a multipart preparation/serialization error.
    pub fn multipart(message: impl Into<String>) -> Self {
        Self::Multipart(message.into())
    }
}

impl From<reqwest::header::InvalidHeaderName> for StratusError {
    fn from(err: reqwest::header::InvalidHeaderName) -> Self {
        Self::Header(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for StratusError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        Self::Header(err.to_string())
    }
}

/// Result type alias for pipeline operations.
pub type StratusResult<T> = std::result::Result<T, StratusError>;
