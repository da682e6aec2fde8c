use thiserror::Error;

use crate::config::ConfigError;

/// Top-level CLI error. Every variant renders as a one-line diagnostic;
/// the user never sees a raw backtrace.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Store(#[from] fleetpulse_core::StoreError),

    #[error(transparent)]
    Core(#[from] fleetpulse_core::CoreError),

    #[error(transparent)]
    Server(#[from] fleetpulse_server::ServerError),

    #[error(transparent)]
    Client(#[from] fleetpulse_client::ClientError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}
