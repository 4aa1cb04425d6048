//! HTTP Server Library for Server-Sent Events sessions
//!
//! This library hosts [`sse_session::Session`]s on an axum server: every
//! `GET /events` request becomes one session, driven by a [`SessionHandler`].
//!
//! # Features
//!
//! - **Channel transport**: streams session writes into the response body and
//!   reports client disconnects back to the session
//! - **Reconnection**: the `Last-Event-ID` request header seeds the session's
//!   last event id
//! - **Keep-alive**: the demo [`TickHandler`] sends heartbeat comments between
//!   events
//!
//! # Example
//!
//! ```no_run
//! use sse_http_server::{ChannelTransport, HttpServer, SessionHandler};
//! use sse_session::{Message, Session, SessionOptions};
//! use std::net::SocketAddr;
//! use anyhow::Result;
//!
//! struct Hello;
//!
//! #[async_trait::async_trait]
//! impl SessionHandler for Hello {
//!     async fn handle_session(&self, session: Session<ChannelTransport>) -> Result<()> {
//!         session.push(&Message::new("hello").event("greeting"))?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let addr: SocketAddr = "127.0.0.1:8080".parse()?;
//!     let server = HttpServer::new(addr, Hello, SessionOptions::default());
//!     server.run().await
//! }
//! ```

pub mod message;
pub mod server;
pub mod ticker;
pub mod transport;

// Re-export main types for convenience
pub use message::TickMessage;
pub use server::{HttpServer, SessionHandler};
pub use ticker::TickHandler;
pub use transport::{ChannelTransport, PendingResponse};
