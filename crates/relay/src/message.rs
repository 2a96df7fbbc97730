//! The canonical message record exchanged over the raw topic.

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayResult};
use crate::session::InboundEvent;

/// A chat message as it travels through the broker.
///
/// Serialises to exactly `{"id","body","from","timestamp"}` in that order and
/// refuses payloads carrying any other key.
///
/// ```
/// use promozap_relay::Message;
///
/// let message = Message::new("A1", "hello", "+1555", 1_700_000_000);
/// assert_eq!(
///     message.to_payload().unwrap(),
///     r#"{"id":"A1","body":"hello","from":"+1555","timestamp":1700000000}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    id: String,
    body: String,
    from: String,
    timestamp: i64,
}

impl Message {
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

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Originating party, carried on the wire as `from`.
    pub fn sender(&self) -> &str {
        &self.from
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn to_payload(&self) -> RelayResult<String> {
        serde_json::to_string(self).map_err(|err| RelayError::encode(err.to_string()))
    }

    /// Decode a payload exactly as delivered. Bytes that are not valid UTF-8
    /// are a parse error, never replaced.
    pub fn from_payload(payload: impl AsRef<[u8]>) -> RelayResult<Self> {
        Ok(serde_json::from_slice(payload.as_ref())?)
    }
}

impl From<InboundEvent> for Message {
    fn from(event: InboundEvent) -> Self {
        Self {
            id: event.id,
            body: event.body,
            from: event.from,
            timestamp: event.timestamp,
        }
    }
}
