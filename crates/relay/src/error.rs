//! Error taxonomy for the relay.

use thiserror::Error;

/// Result type alias for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Broker or chat-session connection failure. Fatal during startup.
    #[error("connection to {target} failed: {message}")]
    Connection { target: String, message: String },

    /// Chat-session pairing or authentication failure.
    #[error("authentication failed: {reason}")]
    Auth { reason: String },

    /// A payload on the subscribe path was not a valid message.
    #[error("malformed payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("message could not be encoded: {message}")]
    Encode { message: String },

    #[error("publish to {topic} failed: {message}")]
    Publish { topic: String, message: String },

    #[error("teardown of {resource} failed: {message}")]
    Teardown { resource: String, message: String },
}

impl RelayError {
    pub fn connection(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    pub fn publish(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.into(),
        }
    }

    pub fn teardown(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Teardown {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Errors that only affect a single message and must not stop a relay loop.
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            Self::Parse(_) | Self::Encode { .. } | Self::Publish { .. }
        )
    }
}

impl From<redis::RedisError> for RelayError {
    fn from(err: redis::RedisError) -> Self {
        Self::Connection {
            target: "redis".to_string(),
            message: err.to_string(),
        }
    }
}
