use thiserror::Error;

/// Main error type for EXOsocket operations
#[derive(Error, Debug)]
pub enum ExoError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Not connected")]
    NotConnected,

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Handshake error: {0}")]
    Handshake(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExoError {
    /// Check if the error means the underlying socket is gone
    ///
    /// After such an error the session has to be re-established from scratch.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            ExoError::Connection(_)
                | ExoError::NotConnected
                | ExoError::ConnectionClosed(_)
                | ExoError::Transport(_)
        )
    }

    /// Check if the error is a deadline expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExoError::Timeout(_))
    }
}

/// Result type alias for EXOsocket operations
pub type ExoResult<T> = Result<T, ExoError>;
