use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::stream::StreamExt;
use sse_session::{CloseListener, CloseReason, Transport, TransportError};
use std::convert::Infallible;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Status line and headers, handed to axum on the first write.
struct Head {
    status: StatusCode,
    headers: HeaderMap,
}

/// Chunks a [`ChannelTransport`] buffers before treating the client as gone.
pub const DEFAULT_CAPACITY: usize = 256;

/// [`Transport`] over a streaming axum response body.
///
/// Writes go into a bounded channel whose receiving end is the body of
/// the [`PendingResponse`]. A client that stops reading while keeping its
/// socket open fills the buffer; the next write then fails with
/// [`TransportError::Closed`] and the session disconnects. When hyper drops
/// the body (the client went away) the session's close listener fires.
pub struct ChannelTransport {
    head: Head,
    head_tx: Option<oneshot::Sender<Head>>,
    body_tx: Option<mpsc::Sender<Bytes>>,
    alive_rx: Option<oneshot::Receiver<()>>,
}

/// The response side of a [`ChannelTransport`], for the request handler to
/// return.
pub struct PendingResponse {
    head_rx: oneshot::Receiver<Head>,
    body_rx: mpsc::Receiver<Bytes>,
    alive_tx: oneshot::Sender<()>,
}

impl ChannelTransport {
    pub fn channel() -> (Self, PendingResponse) {
        Self::channel_with_capacity(DEFAULT_CAPACITY)
    }

    /// Like [`channel`](Self::channel), buffering at most `capacity`
    /// chunks. A zero capacity is raised to one.
    pub fn channel_with_capacity(capacity: usize) -> (Self, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(capacity.max(1));
        let (alive_tx, alive_rx) = oneshot::channel();

        let transport = Self {
            head: Head {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
            },
            head_tx: Some(head_tx),
            body_tx: Some(body_tx),
            alive_rx: Some(alive_rx),
        };
        let pending = PendingResponse {
            head_rx,
            body_rx,
            alive_tx,
        };
        (transport, pending)
    }

    fn flush_head(&mut self) {
        if let Some(head_tx) = self.head_tx.take() {
            let head = Head {
                status: self.head.status,
                headers: std::mem::take(&mut self.head.headers),
            };
            if head_tx.send(head).is_err() {
                debug!("response was dropped before its headers were sent");
            }
        }
    }
}

impl Transport for ChannelTransport {
    fn set_status(&mut self, status: StatusCode) {
        if self.head_tx.is_none() {
            warn!("status {status} set after headers were sent");
            return;
        }
        self.head.status = status;
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.head_tx.is_none() {
            warn!("header {name} set after headers were sent");
            return;
        }
        self.head.headers.insert(name, value);
    }

    fn write(&mut self, chunk: &str) -> Result<(), TransportError> {
        self.flush_head();
        let body_tx = self.body_tx.as_ref().ok_or(TransportError::Closed)?;
        body_tx
            .try_send(Bytes::copy_from_slice(chunk.as_bytes()))
            .map_err(|e| {
                if matches!(e, TrySendError::Full(_)) {
                    warn!("client is not reading; dropping the event stream");
                }
                TransportError::Closed
            })
    }

    fn end(&mut self) {
        self.flush_head();
        // Dropping the sender ends the body stream.
        self.body_tx = None;
    }

    fn on_close(&mut self, listener: CloseListener) {
        let Some(alive_rx) = self.alive_rx.take() else {
            warn!("close listener already installed");
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    // Resolves once the body, and with it `alive_tx`, is dropped.
                    let _ = alive_rx.await;
                    listener(CloseReason::Closed);
                });
            }
            Err(e) => warn!("cannot watch for client disconnects: {e}"),
        }
    }
}

impl PendingResponse {
    /// Waits for the head and builds the streaming response. Answers 503
    /// if the transport went away without ever sending headers.
    pub async fn into_response(self) -> Response {
        let Ok(head) = self.head_rx.await else {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "event stream closed before it started",
            )
                .into_response();
        };

        let alive_tx = self.alive_tx;
        let body = ReceiverStream::new(self.body_rx).map(move |chunk| {
            let _alive = &alive_tx;
            Ok::<_, Infallible>(chunk)
        });

        let mut response = Response::new(Body::from_stream(body));
        *response.status_mut() = head.status;
        *response.headers_mut() = head.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use axum::body::to_bytes;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn first_write_flushes_head_and_body_streams() {
        let (mut transport, pending) = ChannelTransport::channel();
        transport.set_status(StatusCode::OK);
        transport.set_header(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("text/event-stream"),
        );
        transport.write("retry:2000\n").unwrap();
        transport.set_header(
            HeaderName::from_static("x-late"),
            HeaderValue::from_static("1"),
        );
        transport.write("\n").unwrap();
        transport.end();
        assert_eq!(transport.write("data:x\n"), Err(TransportError::Closed));

        let response = pending.into_response().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
        assert!(response.headers().get("x-late").is_none());

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"retry:2000\n\n");
    }

    #[tokio::test]
    async fn dropped_response_reports_close() {
        let (mut transport, pending) = ChannelTransport::channel();
        let (tx, rx) = oneshot::channel();
        transport.on_close(Box::new(move |reason| {
            let _ = tx.send(reason);
        }));

        drop(pending);
        assert_eq!(rx.await.unwrap(), CloseReason::Closed);
        assert_eq!(transport.write("data:x\n"), Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn stalled_client_fails_writes_once_buffer_is_full() {
        let (mut transport, pending) = ChannelTransport::channel_with_capacity(2);
        transport.write("retry:2000\n").unwrap();
        transport.write("\n").unwrap();
        assert_eq!(transport.write(": keep-alive\n"), Err(TransportError::Closed));

        transport.end();
        let response = pending.into_response().await;
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"retry:2000\n\n");
    }

    #[tokio::test]
    async fn response_without_head_is_unavailable() {
        let (transport, pending) = ChannelTransport::channel();
        drop(transport);
        let response = pending.into_response().await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
