use promozap_relay::PairingDisplay;
use qrcode::render::unicode::Dense1x2;
use qrcode::types::QrError;
use qrcode::QrCode;
use tracing::{info, warn};

/// Render a pairing token as a terminal QR code, two modules per character
/// row.
pub fn render_pairing_code(token: &str) -> Result<String, QrError> {
    let code = QrCode::new(token.as_bytes())?;
    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Prints each pairing token to the terminal as a scannable QR code.
///
/// Falls back to logging the raw token when it cannot be encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPairingDisplay;

impl PairingDisplay for TerminalPairingDisplay {
    fn show(&self, token: &str) {
        match render_pairing_code(token) {
            Ok(rendered) => {
                info!("scan the QR code below with WhatsApp to pair");
                println!("{rendered}");
            }
            Err(err) => {
                warn!(error = %err, "pairing token could not be rendered as a QR code");
                info!(token, "pairing token issued");
            }
        }
    }
}
