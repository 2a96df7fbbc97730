//! # PromoZap Relay
//!
//! Moves inbound chat messages onto a pub/sub topic and reads them back for
//! downstream processing.
//!
//! ## Architecture
//!
//! - **Session**: the chat client contract ([`ChatSession`], [`SessionEvent`])
//! - **Transport**: broker seams ([`Publisher`], [`Subscriber`]) and their Redis implementations
//! - **Pipeline**: the publish path and the subscribe path
//! - **Relay**: owns every connection and drives startup and teardown
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut relay = Relay::new(publisher, subscriber, session).with_sink(sink);
//! relay.start().await?;
//! shutdown_signal().await;
//! relay.shutdown().await;
//! ```

pub mod error;
pub mod message;
pub mod pipeline;
pub mod relay;
pub mod session;
pub mod sink;
pub mod transport;

#[doc(hidden)]
pub mod test_support;

/// Topic carrying every inbound chat message.
pub const RAW_TOPIC: &str = "whatsapp_in_raw";

pub use error::{RelayError, RelayResult};
pub use message::Message;
pub use pipeline::{
    Delivery, PublishPath, RetryPolicy, SessionEventHandler, SubscribePath, SubscriptionStats,
};
pub use relay::{Relay, TeardownReport};
pub use session::{
    ChatSession, InboundEvent, LogPairingDisplay, PairingDisplay, SessionEvent,
    SessionEventReceiver, SessionEventSender,
};
pub use sink::{LoggingSink, MessageSink};
pub use transport::{
    PayloadStream, Publisher, RawPayload, RedisPublisher, RedisSubscriber, Subscriber,
};
