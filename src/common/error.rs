//! Error types for imdg

use thiserror::Error;

use crate::common::parser::ParseError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Request Errors ===
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("No storages connected")]
    NoStorageAvailable,

    #[error("Storage {0} not available")]
    NodeUnavailable(u64),

    #[error("Unknown command kind: {0}")]
    UnknownCommandKind(String),

    // === Log Errors ===
    #[error("WAL error: {0}")]
    Wal(String),

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    // === Network Errors ===
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Is this a failure of a storage node rather than of the request?
    pub fn is_node_failure(&self) -> bool {
        matches!(
            self,
            Error::NodeUnavailable(_)
                | Error::ConnectionFailed(_)
                | Error::Timeout(_)
                | Error::Io(_)
                | Error::Codec(_)
        )
    }

    /// Text returned to a client for a request that failed with this error.
    ///
    /// Parse errors are surfaced verbatim; node failures collapse to a single
    /// message so the caller knows to retry.
    pub fn client_message(&self) -> String {
        match self {
            Error::Parse(e) => e.to_string(),
            Error::NoStorageAvailable => self.to_string(),
            e if e.is_node_failure() => "Error: node unavailable".to_string(),
            e => format!("Error: {}", e),
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
