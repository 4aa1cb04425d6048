use crate::transport::ChannelTransport;
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use sse_session::{Session, SessionOptions};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

/// HTTP server that opens an event stream session per request
pub struct HttpServer {
    /// Address to bind the server to
    addr: SocketAddr,
    /// Drives each connected session
    session_handler: Arc<dyn SessionHandler>,
    /// Options every session is created with
    options: SessionOptions,
}

/// Trait for driving a connected event stream
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// Called once the session has completed its handshake. The server ends
    /// the response when this returns.
    async fn handle_session(&self, session: Session<ChannelTransport>) -> Result<()>;
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    handler: Arc<dyn SessionHandler>,
    options: SessionOptions,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new<H>(addr: SocketAddr, handler: H, options: SessionOptions) -> Self
    where
        H: SessionHandler + 'static,
    {
        Self {
            addr,
            session_handler: Arc::new(handler),
            options,
        }
    }

    /// Routes served by this server
    pub fn router(&self) -> Router {
        let state = AppState {
            handler: Arc::clone(&self.session_handler),
            options: self.options.clone(),
        };

        // EventSource clients are often served from another origin
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/events", get(handle_events))
            .route("/health", get(health_check))
            .layer(cors)
            .with_state(state)
    }

    /// Start the HTTP server with graceful shutdown
    pub async fn run(self) -> Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .context("Failed to bind to address")?;

        info!("SSE HTTP server listening on {}", self.addr);
        info!("Endpoint: GET /events");

        // Set up graceful shutdown signal
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        // Spawn a task to listen for Ctrl+C
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received, starting graceful shutdown...");
            shutdown_tx.send(()).ok();
        });

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .context("Server error")?;

        info!("Server stopped gracefully");
        Ok(())
    }
}

/// Handle GET /events - opens an event stream
async fn handle_events(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("session", %request_id);

    let (transport, pending) = ChannelTransport::channel();
    let session = Session::new(&headers, transport, state.options);

    if !session.connected().instrument(span.clone()).await {
        debug!("Session {request_id} closed during handshake");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "event stream closed during handshake",
        )
            .into_response();
    }

    let handler = state.handler;
    tokio::spawn(
        async move {
            debug!("Starting session, last event id: {:?}", session.last_id());
            if let Err(e) = handler.handle_session(session.clone()).await {
                error!("Session handler error: {e}");
            }
            session.end();
            info!("Session closed");
        }
        .instrument(span),
    );

    pending.into_response().await
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
