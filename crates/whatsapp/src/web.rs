//! Live WhatsApp Web session backed by `whatsapp-rust`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use promozap_relay::{
    ChatSession, InboundEvent, RelayError, RelayResult, SessionEvent, SessionEventSender,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wacore::types::events::Event;
use waproto::whatsapp as wa;
use whatsapp_rust::bot::Bot;
use whatsapp_rust_sqlite_storage::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

type EventSlot = Arc<Mutex<Option<SessionEventSender>>>;

/// WhatsApp Web client persisting its device credentials in a SQLite file.
///
/// An existing store reconnects without pairing; an empty one triggers a
/// pairing token.
pub struct WhatsAppSession {
    store_path: PathBuf,
    events: EventSlot,
    bot: Option<Bot>,
    task: Option<JoinHandle<()>>,
}

impl WhatsAppSession {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            events: Arc::new(Mutex::new(None)),
            bot: None,
            task: None,
        }
    }
}

fn emit(slot: &EventSlot, event: SessionEvent) {
    let guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(sender) = guard.as_ref() {
        if sender.send(event).is_err() {
            debug!("session event dropped, relay is no longer listening");
        }
    }
}

fn message_text(message: &wa::Message) -> String {
    message
        .conversation
        .clone()
        .or_else(|| {
            message
                .extended_text_message
                .as_ref()
                .and_then(|extended| extended.text.clone())
        })
        .unwrap_or_default()
}

fn translate(event: Event) -> Option<SessionEvent> {
    match event {
        Event::PairingQrCode { code, .. } => Some(SessionEvent::PairingTokenIssued { token: code }),
        Event::PairSuccess(_) => Some(SessionEvent::Authenticated),
        Event::Connected(_) => Some(SessionEvent::Ready),
        Event::LoggedOut(_) => Some(SessionEvent::AuthFailed {
            reason: "device was logged out".to_string(),
        }),
        Event::Message(message, info) => Some(SessionEvent::MessageReceived(InboundEvent::new(
            info.id.clone(),
            message_text(&message),
            info.source.sender.to_string(),
            info.timestamp.timestamp(),
        ))),
        Event::Disconnected(_) => {
            warn!("whatsapp connection dropped");
            None
        }
        _ => None,
    }
}

#[async_trait]
impl ChatSession for WhatsAppSession {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn connect(&mut self, events: SessionEventSender) -> RelayResult<()> {
        if let Some(parent) = self.store_path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                RelayError::connection("whatsapp-store", format!("{}: {err}", parent.display()))
            })?;
        }

        let store_path = self.store_path.to_string_lossy().into_owned();
        let backend = SqliteStore::new(&store_path)
            .await
            .map_err(|err| RelayError::connection("whatsapp-store", err.to_string()))?;

        *self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(events);

        let slot = self.events.clone();
        let mut bot = Bot::builder()
            .with_backend(Arc::new(backend))
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .on_event(move |event, _client| {
                let slot = slot.clone();
                async move {
                    if let Some(event) = translate(event) {
                        emit(&slot, event);
                    }
                }
            })
            .build()
            .await
            .map_err(|err| RelayError::connection("whatsapp", err.to_string()))?;

        let task = bot
            .run()
            .await
            .map_err(|err| RelayError::connection("whatsapp", err.to_string()))?;

        info!(store = %self.store_path.display(), "whatsapp client started");
        self.bot = Some(bot);
        self.task = Some(task);
        Ok(())
    }

    async fn disconnect(&mut self) -> RelayResult<()> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.bot.take();
        Ok(())
    }
}
