use std::collections::BTreeMap;

use http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use http::{HeaderName, HeaderValue};
use serde::Deserialize;
use tracing::warn;

/// Reconnection delay sent to clients when none is configured.
pub const DEFAULT_RETRY_MS: u64 = 2000;

/// Headers every event stream response carries. Caller-supplied headers
/// never replace these.
pub fn protocol_headers() -> [(HeaderName, HeaderValue); 3] {
    [
        (CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
        (CACHE_CONTROL, HeaderValue::from_static("no-cache, no-transform")),
        (CONNECTION, HeaderValue::from_static("keep-alive")),
    ]
}

/// Caller-facing configuration. Every field is optional, and nothing in
/// here can make session construction fail: bad values fall back to the
/// defaults when the session resolves them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Extra response headers merged in at handshake time.
    pub headers: BTreeMap<String, String>,
    /// Reconnection delay in milliseconds. `None` or `0` means
    /// [`DEFAULT_RETRY_MS`].
    pub retry: Option<u64>,
    /// Seed the last event id from the client's `Last-Event-ID` header.
    /// Defaults to `true`.
    #[serde(alias = "trustClientEventId")]
    pub trust_client_event_id: Option<bool>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn retry(mut self, ms: u64) -> Self {
        self.retry = Some(ms);
        self
    }

    pub fn trust_client_event_id(mut self, trust: bool) -> Self {
        self.trust_client_event_id = Some(trust);
        self
    }

    pub(crate) fn resolve(&self) -> ResolvedOptions {
        let retry = match self.retry {
            Some(0) => {
                warn!("retry must be positive; using {DEFAULT_RETRY_MS}ms");
                DEFAULT_RETRY_MS
            }
            Some(ms) => ms,
            None => DEFAULT_RETRY_MS,
        };

        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| resolve_header(name, value))
            .collect();

        ResolvedOptions {
            headers,
            retry,
            trust_client_event_id: self.trust_client_event_id.unwrap_or(true),
        }
    }
}

fn resolve_header(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    let Ok(name) = HeaderName::try_from(name) else {
        warn!("dropping header with invalid name: {name:?}");
        return None;
    };
    if [CONTENT_TYPE, CACHE_CONTROL, CONNECTION].contains(&name) {
        warn!("ignoring caller-supplied {name} header; it is fixed by the protocol");
        return None;
    }
    match HeaderValue::try_from(value) {
        Ok(value) => Some((name, value)),
        Err(_) => {
            warn!("dropping header {name} with invalid value");
            None
        }
    }
}

/// Options after normalization, fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedOptions {
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub retry: u64,
    pub trust_client_event_id: bool,
}
