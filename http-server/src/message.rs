use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of a `tick` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickMessage {
    /// Position in the stream; also sent as the event id
    pub sequence: u64,

    /// When the tick was produced
    pub timestamp: DateTime<Utc>,
}

impl TickMessage {
    /// Create a tick stamped with the current time
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            timestamp: Utc::now(),
        }
    }

    /// Convert the message to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a tick from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
