use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Caller contract violations. Transport failures never show up here; they
/// end the session and are only observable through the disconnected
/// notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A field was written before the handshake completed.
    #[error("session is not connected yet; wait for the connected notification")]
    NotConnected,
}

/// Failure reported by a [`Transport`](crate::Transport) write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("response stream is closed")]
    Closed,

    #[error("response stream error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
