use std::fmt;

use http::{HeaderName, HeaderValue, StatusCode};

use crate::error::TransportError;

/// Why the underlying response stream stopped accepting writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client went away.
    Closed,
    /// The server ended the response.
    Finished,
    /// The stream failed.
    Error(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Closed => f.write_str("closed by client"),
            CloseReason::Finished => f.write_str("finished"),
            CloseReason::Error(message) => write!(f, "error: {message}"),
        }
    }
}

impl From<TransportError> for CloseReason {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Closed => CloseReason::Closed,
            TransportError::Io(message) => CloseReason::Error(message),
        }
    }
}

/// Listener installed by the session through [`Transport::on_close`].
pub type CloseListener = Box<dyn FnOnce(CloseReason) + Send>;

/// The narrow slice of an HTTP response a session needs.
///
/// A session takes exclusive ownership of its transport: nothing else may
/// write to the response once it is handed over.
pub trait Transport: Send + 'static {
    fn set_status(&mut self, status: StatusCode);

    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Appends raw text to the response body. The first write flushes the
    /// status line and headers.
    fn write(&mut self, chunk: &str) -> Result<(), TransportError>;

    /// Ends the response body. Further writes fail with
    /// [`TransportError::Closed`].
    fn end(&mut self);

    /// Registers the listener to call once when the client disconnects or
    /// the stream fails.
    ///
    /// Implementations must not call the listener from inside
    /// [`write`](Transport::write) or [`end`](Transport::end): the session
    /// handles those outcomes itself.
    fn on_close(&mut self, listener: CloseListener);
}
