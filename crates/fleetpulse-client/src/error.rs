use thiserror::Error;

/// Failures on the subscriber side.
///
/// These drive [`ConnectionSupervisor`](crate::ConnectionSupervisor)
/// state transitions; they are never surfaced to the update consumer
/// except as a connectivity tag.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP transport failure (connection refused, DNS, timeout, ...).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Bad base URL or endpoint path.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The push channel did not open within the connect timeout.
    #[error("push channel open timed out after {timeout_ms}ms")]
    ConnectTimeout { timeout_ms: u64 },

    /// The push channel failed after it was open.
    #[error("push channel failed: {0}")]
    Channel(String),

    /// The server answered with something that is not the stats shape.
    #[error("unexpected response payload: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Returns `true` for failures a retry might resolve.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.status().is_some(),
            Self::ConnectTimeout { .. } | Self::Channel(_) => true,
            Self::InvalidUrl(_) | Self::Protocol(_) => false,
        }
    }
}
