use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::stream::{Stream, StreamExt};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::field::{self, DISPATCH, Message};
use crate::lifecycle::{Lifecycle, SessionState};
use crate::options::{SessionOptions, protocol_headers};
use crate::transport::{CloseReason, Transport};

/// Request header a reconnecting client uses to report the last id it saw.
pub const LAST_EVENT_ID: &str = "last-event-id";

/// One event stream over one HTTP response.
///
/// Construction never fails and never writes: the handshake (status,
/// headers, `retry:` directive, blank line) runs on a spawned tokio task so
/// callers can register [`on_connected`](Session::on_connected) first.
/// The handle is cheap to clone; every clone drives the same stream.
///
/// Field methods called before the session is connected return
/// [`SessionError::NotConnected`] and write nothing. Once the session is
/// disconnected they are silently dropped.
pub struct Session<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<T> {
    writer: Mutex<Writer<T>>,
    lifecycle: Lifecycle,
    retry: u64,
}

struct Writer<T> {
    transport: T,
    last_id: String,
}

/// What the deferred handshake needs from construction time.
struct Handshake {
    headers: Vec<(HeaderName, HeaderValue)>,
    client_last_id: Option<String>,
}

impl<T: Transport> Session<T> {
    pub fn new(request_headers: &HeaderMap, transport: T, options: SessionOptions) -> Self {
        let options = options.resolve();

        let client_last_id = if options.trust_client_event_id {
            request_headers
                .get(LAST_EVENT_ID)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        } else {
            None
        };

        let shared = Arc::new(Shared {
            writer: Mutex::new(Writer {
                transport,
                last_id: String::new(),
            }),
            lifecycle: Lifecycle::new(),
            retry: options.retry,
        });

        let weak: Weak<Shared<T>> = Arc::downgrade(&shared);
        shared.lock_writer().transport.on_close(Box::new(move |reason| {
            if let Some(shared) = weak.upgrade() {
                shared.disconnect(reason);
            }
        }));

        let handshake = Handshake {
            headers: options.headers,
            client_last_id,
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let shared = Arc::clone(&shared);
                runtime.spawn(async move { shared.handshake(handshake) });
            }
            Err(e) => {
                warn!("cannot run the event stream handshake outside a tokio runtime: {e}");
                shared.disconnect(CloseReason::Error(e.to_string()));
            }
        }

        Self { shared }
    }

    /// Writes `id:<value>\n` and makes `value` the last event id. `None`
    /// writes an empty id, which resets it.
    pub fn id(&self, value: Option<&str>) -> Result<()> {
        let last_id = field::strip_line_breaks(value.unwrap_or_default());
        self.shared.write(&[field::id(value)], Some(last_id))
    }

    /// Writes `event:<name>\n`. Takes effect on the next dispatch.
    pub fn event(&self, name: &str) -> Result<()> {
        self.shared.write(&[field::event(name)], None)
    }

    /// Writes one `data:` line per line of `payload`.
    pub fn data(&self, payload: &str) -> Result<()> {
        self.shared.write(&field::data(payload), None)
    }

    /// Writes a comment. Useful as a heartbeat; scheduling one is up to the
    /// caller.
    pub fn comment(&self, text: &str) -> Result<()> {
        self.shared.write(&field::comment(text), None)
    }

    /// Writes the blank line that makes the client dispatch what it has
    /// buffered so far.
    pub fn dispatch(&self) -> Result<()> {
        self.shared.write(&[DISPATCH.to_string()], None)
    }

    /// Writes a whole event and dispatches it.
    pub fn push(&self, message: &Message) -> Result<()> {
        let last_id = message.id.as_deref().map(field::strip_line_breaks);
        self.shared.write(&message.encode(), last_id)
    }

    /// Pushes every message from `messages` until the stream runs dry or
    /// the session disconnects. Returns `true` if the stream was drained
    /// with the session still connected.
    pub async fn stream<S>(&self, messages: S) -> Result<bool>
    where
        S: Stream<Item = Message>,
    {
        let mut messages = pin!(messages.take_until(self.disconnected()));
        while let Some(message) = messages.next().await {
            self.push(&message)?;
        }
        Ok(self.state() == SessionState::Connected)
    }

    /// Ends the response. The session becomes disconnected.
    pub fn end(&self) {
        self.shared.lock_writer().transport.end();
        self.shared.disconnect(CloseReason::Finished);
    }

    /// The id of the last `id` field written, or the one the client
    /// reported on reconnect if none has been written yet.
    pub fn last_id(&self) -> String {
        self.shared.lock_writer().last_id.clone()
    }

    pub fn state(&self) -> SessionState {
        self.shared.lifecycle.state()
    }

    /// Reconnection delay announced in the handshake, in milliseconds.
    pub fn retry(&self) -> u64 {
        self.shared.retry
    }

    /// Calls `listener` once the handshake completes. Called immediately if
    /// it already has; never called if the session died during the
    /// handshake.
    pub fn on_connected<F>(&self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.lifecycle.on_connected(Box::new(listener));
    }

    /// Calls `listener` once the session disconnects, or immediately if it
    /// already has.
    pub fn on_disconnected<F>(&self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.lifecycle.on_disconnected(Box::new(listener));
    }

    /// Waits for the handshake outcome. `false` means the session
    /// disconnected before it could connect.
    pub async fn connected(&self) -> bool {
        self.shared.lifecycle.connected().await
    }

    pub async fn disconnected(&self) {
        self.shared.lifecycle.disconnected().await;
    }
}

impl<T: Transport> Shared<T> {
    fn handshake(&self, handshake: Handshake) {
        {
            let mut writer = self.lock_writer();
            if self.lifecycle.state() != SessionState::Connecting {
                debug!("stream closed before the handshake ran");
                return;
            }

            writer.transport.set_status(StatusCode::OK);
            for (name, value) in protocol_headers().into_iter().chain(handshake.headers) {
                writer.transport.set_header(name, value);
            }

            writer.last_id = handshake.client_last_id.unwrap_or_default();

            for chunk in [field::retry(self.retry), DISPATCH.to_string()] {
                if let Err(e) = writer.transport.write(&chunk) {
                    drop(writer);
                    self.disconnect(e.into());
                    return;
                }
            }
        }

        if self.lifecycle.transition(SessionState::Connected) {
            info!("event stream connected (retry {}ms)", self.retry);
        }
    }

    fn write(&self, chunks: &[String], last_id: Option<String>) -> Result<()> {
        match self.lifecycle.state() {
            SessionState::Connecting => return Err(SessionError::NotConnected),
            SessionState::Disconnected => {
                debug!("dropping write to a disconnected event stream");
                return Ok(());
            }
            SessionState::Connected => {}
        }

        let failure = {
            let mut writer = self.lock_writer();
            if let Some(last_id) = last_id {
                writer.last_id = last_id;
            }
            chunks
                .iter()
                .find_map(|chunk| writer.transport.write(chunk).err())
        };

        if let Some(e) = failure {
            self.disconnect(e.into());
        }
        Ok(())
    }

    fn disconnect(&self, reason: CloseReason) {
        if self.lifecycle.transition(SessionState::Disconnected) {
            info!("event stream disconnected: {reason}");
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, Writer<T>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
