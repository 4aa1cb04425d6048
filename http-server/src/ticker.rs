use crate::{SessionHandler, message::TickMessage, transport::ChannelTransport};
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::Stream;
use sse_session::{Message, Session};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Demo handler: pushes a numbered `tick` event on a fixed interval and
/// resumes numbering after the id a reconnecting client reports.
pub struct TickHandler {
    interval: Duration,
    heartbeat: Duration,
    max_ticks: Option<u64>,
}

impl TickHandler {
    pub fn new(interval: Duration, heartbeat: Duration) -> Self {
        // tokio intervals must be non-zero
        Self {
            interval: interval.max(MIN_PERIOD),
            heartbeat: heartbeat.max(MIN_PERIOD),
            max_ticks: None,
        }
    }

    /// End each connection after `max_ticks` events, leaving the client to
    /// reconnect.
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    fn ticks(
        first: u64,
        interval: Duration,
        max_ticks: Option<u64>,
    ) -> Pin<Box<dyn Stream<Item = Message> + Send>> {
        let stream = async_stream::stream! {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut sent = 0;

            for sequence in first.. {
                if max_ticks.is_some_and(|max| sent >= max) {
                    break;
                }
                ticker.tick().await;

                match TickMessage::new(sequence).to_json() {
                    Ok(json) => {
                        yield Message::new(json).event("tick").id(sequence.to_string());
                        sent += 1;
                    }
                    Err(e) => {
                        error!("Failed to serialize tick: {e}");
                        break;
                    }
                }
            }
        };

        Box::pin(stream)
    }
}

/// Sequence number to continue from, given the client's last event id.
pub fn resume_from(last_id: &str) -> u64 {
    last_id
        .parse::<u64>()
        .map(|last| last.saturating_add(1))
        .unwrap_or(1)
}

#[async_trait]
impl SessionHandler for TickHandler {
    async fn handle_session(&self, session: Session<ChannelTransport>) -> Result<()> {
        let first = resume_from(&session.last_id());
        info!("Streaming ticks from {first}");

        // Keep intermediaries from timing out the connection between ticks.
        let heartbeat = {
            let session = session.clone();
            let mut interval = tokio::time::interval(self.heartbeat);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tokio::spawn(async move {
                interval.tick().await;
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if session.comment("keep-alive").is_err() {
                                break;
                            }
                        }
                        _ = session.disconnected() => break,
                    }
                }
            })
        };

        let drained = session
            .stream(Self::ticks(first, self.interval, self.max_ticks))
            .await;
        heartbeat.abort();

        if drained? {
            debug!("Tick limit reached, ending stream");
        }
        Ok(())
    }
}
