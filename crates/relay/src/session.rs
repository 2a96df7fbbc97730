//! Contract with the chat session adapter.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RelayResult;

/// Raw fields of one inbound chat message, as reported by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub id: String,
    pub body: String,
    pub from: String,
    pub timestamp: i64,
}

impl InboundEvent {
    pub fn new(
        id: impl Into<String>,
        body: impl Into<String>,
        from: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            from: from.into(),
            timestamp,
        }
    }
}

/// Everything a chat session can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A pairing token must be shown to the operator.
    PairingTokenIssued { token: String },
    Authenticated,
    AuthFailed { reason: String },
    Ready,
    MessageReceived(InboundEvent),
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::PairingTokenIssued { .. } => "pairing_token_issued",
            SessionEvent::Authenticated => "authenticated",
            SessionEvent::AuthFailed { .. } => "auth_failed",
            SessionEvent::Ready => "ready",
            SessionEvent::MessageReceived(_) => "message_received",
        }
    }
}

pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;
pub type SessionEventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// A single authenticated chat session.
///
/// `connect` starts the session and returns once it is running. Pairing,
/// readiness and inbound messages then arrive through `events` in the order
/// the adapter observes them. `disconnect` must be safe to call repeatedly.
#[async_trait]
pub trait ChatSession: Send {
    fn name(&self) -> &str;

    async fn connect(&mut self, events: SessionEventSender) -> RelayResult<()>;

    async fn disconnect(&mut self) -> RelayResult<()>;
}

/// Surfaces a pairing token to the human operator.
pub trait PairingDisplay: Send + Sync {
    fn show(&self, token: &str);
}

/// Writes the token to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPairingDisplay;

impl PairingDisplay for LogPairingDisplay {
    fn show(&self, token: &str) {
        tracing::info!(token, "pairing token issued, link the session from the chat client");
    }
}
