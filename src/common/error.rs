//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// RCON endpoint errors.
#[derive(Debug, Error)]
pub enum RconError {
    #[error("Failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out connecting to {host}:{port}")]
    Timeout { host: String, port: u16 },

    #[error("RCON password rejected by {host}:{port}")]
    AuthRejected { host: String, port: u16 },

    #[error("Invalid packet: {message}")]
    InvalidPacket { message: String },

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RconError {
    /// Whether the endpoint could not be reached or refused the credentials.
    ///
    /// These are reported to the user as a failed connection instead of
    /// an internal error.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::Resolve { .. }
                | Self::ConnectFailed { .. }
                | Self::Timeout { .. }
                | Self::AuthRejected { .. }
        )
    }
}

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors while sending chat messages.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message is {length} characters long, limit is {limit}")]
    MessageTooLong { length: usize, limit: usize },

    #[error("Failed to send message: {message}")]
    SendFailed { message: String },
}

/// Errors from the external service manager.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Restarting '{service}' failed with exit code {code:?}")]
    Failed { service: String, code: Option<i32> },
}

/// Result type alias for RCON operations.
pub type RconResult<T> = std::result::Result<T, RconError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for chat operations.
pub type ChatResult<T> = std::result::Result<T, ChatError>;
