//! The publish and subscribe halves of the relay.
//!
//! Both halves handle their input one item at a time, in arrival order, and
//! share no state with each other.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tracing::{debug, error, info, warn};

use crate::error::{RelayError, RelayResult};
use crate::message::Message;
use crate::session::{InboundEvent, PairingDisplay, SessionEvent, SessionEventReceiver};
use crate::sink::MessageSink;
use crate::transport::{PayloadStream, Publisher};
use crate::RAW_TOPIC;

/// How often a failed publish is retried before the message is given up.
///
/// ```
/// use std::time::Duration;
/// use promozap_relay::RetryPolicy;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(100));
/// assert_eq!(policy.delay_before(1), Duration::from_millis(100));
/// assert_eq!(policy.delay_before(3), Duration::from_millis(400));
/// assert_eq!(RetryPolicy::default().max_retries, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self::default()
    }

    /// Delay before retry number `retry` (1-based), doubling each time.
    pub fn delay_before(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1u32 << exponent)
    }
}

/// Turns inbound chat events into messages on the raw topic.
#[derive(Clone)]
pub struct PublishPath {
    publisher: Arc<dyn Publisher>,
    retry: RetryPolicy,
}

impl PublishPath {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn on_inbound_event(&self, event: InboundEvent) -> RelayResult<()> {
        let message = Message::from(event);
        let payload = message.to_payload()?;

        self.publish_with_retry(&payload).await?;
        info!(message_id = message.id(), topic = RAW_TOPIC, "message published");
        Ok(())
    }

    async fn publish_with_retry(&self, payload: &str) -> RelayResult<()> {
        let mut retry = 0;
        loop {
            match self.publisher.publish(RAW_TOPIC, payload).await {
                Ok(()) => return Ok(()),
                Err(err) if retry < self.retry.max_retries => {
                    retry += 1;
                    let delay = self.retry.delay_before(retry);
                    warn!(error = %err, retry, ?delay, "publish failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Counters reported when a subscription stream ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    pub forwarded: u64,
    pub ignored: u64,
    pub rejected: u64,
}

/// Outcome of handling one raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Forwarded,
    /// Null or empty payload.
    Ignored,
}

/// Turns raw payloads from the subscription back into messages for the sink.
#[derive(Clone)]
pub struct SubscribePath {
    sink: Arc<dyn MessageSink>,
}

impl SubscribePath {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self { sink }
    }

    pub async fn on_raw_payload(&self, payload: Option<&[u8]>) -> RelayResult<Delivery> {
        let payload = match payload {
            Some(payload) if !payload.is_empty() => payload,
            _ => return Ok(Delivery::Ignored),
        };

        let message = Message::from_payload(payload)?;
        debug!(message_id = message.id(), from = message.sender(), "payload decoded");
        self.sink.forward(message).await?;
        Ok(Delivery::Forwarded)
    }

    /// Drain `payloads` until the stream ends. A bad payload is logged and
    /// skipped; it never ends the loop.
    pub async fn run(&self, mut payloads: PayloadStream) -> SubscriptionStats {
        let mut stats = SubscriptionStats::default();
        info!(topic = RAW_TOPIC, "processing subscribed messages");

        while let Some(payload) = payloads.next().await {
            match self.on_raw_payload(payload.as_deref()).await {
                Ok(Delivery::Forwarded) => stats.forwarded += 1,
                Ok(Delivery::Ignored) => stats.ignored += 1,
                Err(err) => {
                    stats.rejected += 1;
                    if err.is_per_message() {
                        warn!(error = %err, "skipping subscribed payload");
                    } else {
                        error!(error = %err, "failed to process subscribed payload");
                    }
                }
            }
        }

        info!(
            forwarded = stats.forwarded,
            ignored = stats.ignored,
            rejected = stats.rejected,
            "subscription ended"
        );
        stats
    }
}

/// The one handler registered for every [`SessionEvent`] kind.
#[derive(Clone)]
pub struct SessionEventHandler {
    publish: PublishPath,
    pairing: Arc<dyn PairingDisplay>,
}

impl SessionEventHandler {
    pub fn new(publish: PublishPath, pairing: Arc<dyn PairingDisplay>) -> Self {
        Self { publish, pairing }
    }

    pub async fn handle(&self, event: SessionEvent) -> RelayResult<()> {
        match event {
            SessionEvent::PairingTokenIssued { token } => {
                info!("pairing token received, scan it with the chat client");
                self.pairing.show(&token);
                Ok(())
            }
            SessionEvent::Authenticated => {
                info!("chat session authenticated");
                Ok(())
            }
            SessionEvent::AuthFailed { reason } => Err(RelayError::auth(reason)),
            SessionEvent::Ready => {
                info!("chat session ready to receive messages");
                Ok(())
            }
            SessionEvent::MessageReceived(inbound) => self.publish.on_inbound_event(inbound).await,
        }
    }

    /// Handle events until the session drops its sender.
    pub async fn run(self, mut events: SessionEventReceiver) {
        while let Some(event) = events.recv().await {
            let kind = event.kind();
            match self.handle(event).await {
                Ok(()) => {}
                Err(err) if err.is_per_message() => {
                    warn!(error = %err, kind, "session event dropped");
                }
                Err(err @ RelayError::Auth { .. }) => {
                    error!(error = %err, "chat session authentication failed");
                }
                Err(err) => error!(error = %err, kind, "failed to handle session event"),
            }
        }
        debug!("session event stream closed");
    }
}
