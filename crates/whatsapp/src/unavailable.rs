use async_trait::async_trait;
use promozap_relay::{ChatSession, RelayError, RelayResult, SessionEventSender};

/// Stand-in session for builds without the `web` feature. Connecting always
/// fails, so the relay tears down and the process exits non-zero.
#[derive(Debug, Default)]
pub struct UnavailableSession;

#[async_trait]
impl ChatSession for UnavailableSession {
    fn name(&self) -> &str {
        "whatsapp-unavailable"
    }

    async fn connect(&mut self, _events: SessionEventSender) -> RelayResult<()> {
        Err(RelayError::connection(
            "whatsapp",
            "WhatsApp Web support is not compiled in; rebuild with the `web` feature",
        ))
    }

    async fn disconnect(&mut self) -> RelayResult<()> {
        Ok(())
    }
}
