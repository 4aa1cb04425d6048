//! Connection state machine and its one-shot notifications.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

/// Where a session is in its life. Only ever moves forward:
/// `Connecting -> Connected -> Disconnected`, or straight from
/// `Connecting` to `Disconnected` when the stream dies during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Connected,
    Disconnected,
}

impl SessionState {
    fn can_become(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Connecting, SessionState::Connected)
                | (SessionState::Connecting, SessionState::Disconnected)
                | (SessionState::Connected, SessionState::Disconnected)
        )
    }
}

pub(crate) type Listener = Box<dyn FnOnce() + Send>;

struct Inner {
    state: SessionState,
    was_connected: bool,
    connected: Vec<Listener>,
    disconnected: Vec<Listener>,
    /// Listener batches not yet called, oldest first.
    pending: VecDeque<Vec<Listener>>,
    /// Set while some caller is draining `pending`.
    delivering: bool,
}

/// Owns the state and the registered listeners.
///
/// Notifications are delivered one batch at a time, in transition order:
/// every connected listener has returned before the first disconnected
/// listener runs, even when a connected listener ends the session or another
/// thread closes it mid-delivery. A transition or late registration made
/// while a batch is running is queued and drained by the caller already
/// delivering.
///
/// A listener registered after its notification already fired is called
/// right away unless a delivery is in progress. Connected listeners of a
/// session that died before finishing its handshake are dropped without
/// being called. Listeners are never called while the lock is held, so they
/// may freely call back into the session.
pub(crate) struct Lifecycle {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<SessionState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SessionState::Connecting);
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::Connecting,
                was_connected: false,
                connected: Vec::new(),
                disconnected: Vec::new(),
                pending: VecDeque::new(),
                delivering: false,
            }),
            state_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Moves to `next` and fires its listeners. Returns `false`, firing
    /// nothing, if the move is not a forward transition.
    pub fn transition(&self, next: SessionState) -> bool {
        {
            let mut inner = self.lock();
            if !inner.state.can_become(next) {
                return false;
            }
            debug!("session state {} -> {next}", inner.state);
            inner.state = next;
            self.state_tx.send_replace(next);

            let batch = match next {
                SessionState::Connected => {
                    inner.was_connected = true;
                    std::mem::take(&mut inner.connected)
                }
                SessionState::Disconnected => {
                    inner.connected.clear();
                    std::mem::take(&mut inner.disconnected)
                }
                SessionState::Connecting => Vec::new(),
            };
            inner.pending.push_back(batch);
        }

        self.deliver();
        true
    }

    pub fn on_connected(&self, listener: Listener) {
        let mut inner = self.lock();
        if inner.was_connected {
            inner.pending.push_back(vec![listener]);
            drop(inner);
            self.deliver();
        } else if inner.state == SessionState::Connecting {
            inner.connected.push(listener);
        }
    }

    pub fn on_disconnected(&self, listener: Listener) {
        let mut inner = self.lock();
        if inner.state == SessionState::Disconnected {
            inner.pending.push_back(vec![listener]);
            drop(inner);
            self.deliver();
        } else {
            inner.disconnected.push(listener);
        }
    }

    /// Calls queued batches until none are left. Returns at once if another
    /// caller, possibly further up this stack, is already delivering.
    fn deliver(&self) {
        {
            let mut inner = self.lock();
            if inner.delivering {
                return;
            }
            inner.delivering = true;
        }

        loop {
            let batch = {
                let mut inner = self.lock();
                match inner.pending.pop_front() {
                    Some(batch) => batch,
                    None => {
                        inner.delivering = false;
                        return;
                    }
                }
            };
            for listener in batch {
                listener();
            }
        }
    }

    /// Resolves once the handshake outcome is known: `true` if the session
    /// reached `Connected`, `false` if it died first.
    pub async fn connected(&self) -> bool {
        let mut rx = self.state_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|state| *state != SessionState::Connecting).await;
        self.lock().was_connected
    }

    pub async fn disconnected(&self) {
        let mut rx = self.state_tx.subscribe();
        let _ = rx
            .wait_for(|state| *state == SessionState::Disconnected)
            .await;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
