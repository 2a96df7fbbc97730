//! WhatsApp side of the PromoZap relay: the chat session and the terminal
//! pairing display.
//!
//! The live client is only compiled with the `web` feature. Without it,
//! [`open_session`] returns an [`UnavailableSession`] whose connect fails.

use std::path::Path;

use promozap_relay::ChatSession;

mod pairing;
mod unavailable;
#[cfg(feature = "web")]
mod web;

pub use pairing::{render_pairing_code, TerminalPairingDisplay};
pub use unavailable::UnavailableSession;
#[cfg(feature = "web")]
pub use web::WhatsAppSession;

/// Session persisting its credentials at `store_path`.
#[cfg(feature = "web")]
pub fn open_session(store_path: &Path) -> Box<dyn ChatSession> {
    Box::new(WhatsAppSession::new(store_path))
}

/// Session persisting its credentials at `store_path`.
#[cfg(not(feature = "web"))]
pub fn open_session(store_path: &Path) -> Box<dyn ChatSession> {
    tracing::warn!(
        store = %store_path.display(),
        "built without WhatsApp Web support, the session cannot connect"
    );
    Box::new(UnavailableSession)
}
