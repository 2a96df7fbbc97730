use async_trait::async_trait;
use tracing::info;

use crate::error::RelayResult;
use crate::message::Message;

/// Downstream consumer of messages read back from the raw topic.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn forward(&self, message: Message) -> RelayResult<()>;
}

/// Logs each message and drops it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

#[async_trait]
impl MessageSink for LoggingSink {
    async fn forward(&self, message: Message) -> RelayResult<()> {
        info!(
            message_id = message.id(),
            from = message.sender(),
            timestamp = message.timestamp(),
            body = message.body(),
            "message received"
        );
        Ok(())
    }
}
