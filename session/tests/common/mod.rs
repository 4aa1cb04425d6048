#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex, MutexGuard};

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use sse_session::{CloseListener, CloseReason, Transport, TransportError};

#[derive(Default)]
struct Recorded {
    status: Option<StatusCode>,
    headers: HeaderMap,
    writes: Vec<String>,
    ended: bool,
    broken: bool,
    close_listener: Option<CloseListener>,
}

/// In-memory response that records everything the session does to it.
pub struct FakeTransport {
    recorded: Arc<Mutex<Recorded>>,
}

/// Test-side view of a [`FakeTransport`].
#[derive(Clone)]
pub struct FakeResponse {
    recorded: Arc<Mutex<Recorded>>,
}

pub fn fake_transport() -> (FakeTransport, FakeResponse) {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    (
        FakeTransport {
            recorded: Arc::clone(&recorded),
        },
        FakeResponse { recorded },
    )
}

pub fn last_event_id(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("last-event-id", HeaderValue::from_str(value).unwrap());
    headers
}

impl Transport for FakeTransport {
    fn set_status(&mut self, status: StatusCode) {
        self.lock().status = Some(status);
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.lock().headers.insert(name, value);
    }

    fn write(&mut self, chunk: &str) -> Result<(), TransportError> {
        let mut recorded = self.lock();
        if recorded.ended {
            return Err(TransportError::Closed);
        }
        if recorded.broken {
            return Err(TransportError::Io("connection reset".to_string()));
        }
        recorded.writes.push(chunk.to_string());
        Ok(())
    }

    fn end(&mut self) {
        self.lock().ended = true;
    }

    fn on_close(&mut self, listener: CloseListener) {
        self.lock().close_listener = Some(listener);
    }
}

impl FakeTransport {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }
}

impl FakeResponse {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.lock().status
    }

    pub fn headers(&self) -> HeaderMap {
        self.lock().headers.clone()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.lock()
            .headers
            .get(name)
            .map(|value| value.to_str().unwrap().to_string())
    }

    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    pub fn last_write(&self) -> Option<String> {
        self.lock().writes.last().cloned()
    }

    pub fn ended(&self) -> bool {
        self.lock().ended
    }

    /// Makes every following write fail.
    pub fn break_stream(&self) {
        self.lock().broken = true;
    }

    /// Simulates the client going away. Returns whether a listener was
    /// installed to hear about it.
    pub fn client_close(&self) -> bool {
        self.signal(CloseReason::Closed)
    }

    pub fn signal(&self, reason: CloseReason) -> bool {
        let listener = self.lock().close_listener.take();
        match listener {
            Some(listener) => {
                listener(reason);
                true
            }
            None => false,
        }
    }
}
