//! End-to-end tests: a real axum server on a loopback socket, read with
//! reqwest.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use sse_http_server::{ChannelTransport, HttpServer, SessionHandler, TickHandler, TickMessage};
use sse_session::{Session, SessionOptions};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn start_server<H>(handler: H, options: SessionOptions) -> SocketAddr
where
    H: SessionHandler + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    let router = HttpServer::new(addr, handler, options).router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}

#[tokio::test]
async fn health_check() {
    let addr = start_server(
        TickHandler::new(Duration::from_secs(1), Duration::from_secs(60)),
        SessionOptions::new(),
    )
    .await;

    let body = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn streams_ticks_resuming_after_last_event_id() {
    let handler =
        TickHandler::new(Duration::from_millis(10), Duration::from_secs(60)).with_max_ticks(2);
    let options = SessionOptions::new().retry(3000).header("x-test-header-1", "123");
    let addr = start_server(handler, options).await;

    let response = reqwest::Client::new()
        .get(format!("http://{addr}/events"))
        .header("Last-Event-ID", "41")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "text/event-stream");
    assert_eq!(headers["cache-control"], "no-cache, no-transform");
    assert_eq!(headers["x-test-header-1"], "123");

    let body = timeout(Duration::from_secs(5), response.text())
        .await
        .expect("stream ended")
        .unwrap();

    assert!(body.starts_with("retry:3000\n\n"), "unexpected body: {body:?}");
    let events: Vec<&str> = body["retry:3000\n\n".len()..]
        .split_terminator("\n\n")
        .collect();
    assert_eq!(events.len(), 2, "unexpected body: {body:?}");

    for (event, expected_id) in events.iter().zip([42u64, 43]) {
        let lines: Vec<&str> = event.lines().collect();
        assert_eq!(lines[0], "event:tick");
        assert_eq!(lines[1], format!("id:{expected_id}"));
        let data = lines[2].strip_prefix("data:").unwrap();
        assert_eq!(TickMessage::from_json(data).unwrap().sequence, expected_id);
    }
}

/// Reports when its session disconnects.
struct DisconnectWatcher {
    disconnected: mpsc::UnboundedSender<()>,
}

#[async_trait]
impl SessionHandler for DisconnectWatcher {
    async fn handle_session(&self, session: Session<ChannelTransport>) -> Result<()> {
        // Keep writing so the server notices the closed socket.
        loop {
            session.comment("ping")?;
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(10)) => {}
                _ = session.disconnected() => break,
            }
        }
        self.disconnected.send(()).ok();
        Ok(())
    }
}

#[tokio::test]
async fn client_disconnect_ends_session() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let addr = start_server(DisconnectWatcher { disconnected: tx }, SessionOptions::new()).await;

    let response = reqwest::get(format!("http://{addr}/events")).await.unwrap();
    let mut body = response.bytes_stream();
    let first = body.next().await.unwrap().unwrap();
    assert!(first.starts_with(b"retry:2000\n"));
    drop(body);

    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("session never saw the client leave")
        .unwrap();
}
