//! Client error types.

use reqwest::StatusCode;
use thiserror::Error;

use crate::relay::RelayError;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("no token configured. Use 'unrg config set-token <token>' first")]
    MissingToken,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Any non-success response; `body` is the raw response body.
    #[error("server returned {status}: {body}")]
    Server { status: StatusCode, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Encoder task failed: {0}")]
    Encoder(String),

    #[error("Command failed: {0}")]
    Command(String),
}

impl ClientError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// HTTP status for server-side failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}
