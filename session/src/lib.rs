//! Server-side Server-Sent Events sessions.
//!
//! A [`Session`] turns one open HTTP response into a long-lived
//! `text/event-stream` that an `EventSource` client can consume and
//! reconnect to.
//!
//! # Features
//!
//! - **Handshake**: status 200, the three protocol headers plus any extra
//!   headers, then a `retry:` directive, all deferred to a spawned task so
//!   listeners can be attached first
//! - **Field encoding**: `id`, `event`, `data`, comments and dispatch, one
//!   newline-terminated write per line, in call order
//! - **Lifecycle**: `connecting -> connected -> disconnected`, each
//!   notification fired at most once
//! - **Reconnection**: the last event id, seeded from `Last-Event-ID`
//!
//! The session only needs the small [`Transport`] capability, so it runs
//! against any HTTP server or an in-memory fake.
//!
//! # Example
//!
//! ```no_run
//! use sse_session::{Message, Session, SessionOptions, Transport};
//!
//! fn serve<T: Transport>(headers: &http::HeaderMap, response: T) {
//!     let session = Session::new(headers, response, SessionOptions::new().retry(5000));
//!     let handle = session.clone();
//!     session.on_connected(move || {
//!         let _ = handle.push(&Message::new("hello").event("greeting"));
//!     });
//! }
//! ```

pub mod error;
pub mod field;
mod lifecycle;
pub mod options;
mod session;
pub mod transport;

pub use error::{Result, SessionError, TransportError};
pub use field::Message;
pub use lifecycle::SessionState;
pub use options::{DEFAULT_RETRY_MS, SessionOptions};
pub use session::{LAST_EVENT_ID, Session};
pub use transport::{CloseListener, CloseReason, Transport};
