//! Publish/subscribe transport seams.

mod redis_pubsub;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::RelayResult;

pub use self::redis_pubsub::{RedisPublisher, RedisSubscriber};

/// One delivery from a subscription, as the broker handed it over. `None`
/// stands for a null payload.
pub type RawPayload = Option<Vec<u8>>;

pub type PayloadStream = BoxStream<'static, RawPayload>;

/// The publish side of the broker.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn ping(&self) -> RelayResult<()>;

    async fn publish(&self, topic: &str, payload: &str) -> RelayResult<()>;

    /// Release the connection. Calling it again is a no-op.
    async fn close(&self) -> RelayResult<()>;
}

/// The subscribe side of the broker.
#[async_trait]
pub trait Subscriber: Send {
    async fn ping(&mut self) -> RelayResult<()>;

    /// Subscribe to `topic`. The stream yields payloads in delivery order and
    /// ends once [`Subscriber::close`] is called.
    async fn subscribe(&mut self, topic: &str) -> RelayResult<PayloadStream>;

    async fn close(&mut self) -> RelayResult<()>;
}
