//! Error types for the push agent.

use thiserror::Error;

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors surfaced by the agent's public API.
///
/// Network failures inside the registration and sync loops are never
/// surfaced: they are retried forever with backoff. [`AgentError::Network`]
/// only appears on the transport seam, where registration and sync treat
/// every variant of it identically (unreachable host, timeout, non-2xx
/// status, unparseable body) when deciding to retry.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Request failed, returned a non-success status, or the response body
    /// could not be parsed.
    #[error("network error: {0}")]
    Network(String),

    /// Persistent store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// `initialize` was called on an agent that is already running.
    #[error("agent is already initialized")]
    AlreadyInitialized,
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Network(err.to_string())
    }
}

/// Errors from the key-value instance store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read key '{key}': {message}")]
    Read { key: String, message: String },

    #[error("failed to write key '{key}': {message}")]
    Write { key: String, message: String },
}

impl StoreError {
    pub fn read(key: impl Into<String>, message: impl ToString) -> Self {
        Self::Read {
            key: key.into(),
            message: message.to_string(),
        }
    }

    pub fn write(key: impl Into<String>, message: impl ToString) -> Self {
        Self::Write {
            key: key.into(),
            message: message.to_string(),
        }
    }
}
