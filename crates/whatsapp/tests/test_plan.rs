use std::path::Path;
use std::sync::Arc;

use promozap_relay::test_support::{RecordingPublisher, ScriptedSubscriber};
use promozap_relay::{ChatSession, Relay, RelayError};
use promozap_whatsapp::{open_session, render_pairing_code, UnavailableSession};
use tokio::sync::mpsc;

#[tokio::test]
async fn unavailable_session_refuses_to_connect() {
    let mut session = UnavailableSession;
    let (events, _receiver) = mpsc::unbounded_channel();

    let err = session.connect(events).await.unwrap_err();
    assert!(matches!(err, RelayError::Connection { .. }));
    session.disconnect().await.expect("disconnect is a no-op");
}

#[cfg(not(feature = "web"))]
#[tokio::test]
async fn relay_without_web_support_fails_start_and_tears_down_cleanly() {
    let publisher = Arc::new(RecordingPublisher::new());
    let mut relay = Relay::new(
        publisher.clone(),
        Box::new(ScriptedSubscriber::empty()),
        open_session(Path::new("whatsapp/session.db")),
    );

    let err = relay.start().await.unwrap_err();
    assert!(matches!(err, RelayError::Connection { .. }));

    let report = relay.shutdown().await;
    assert!(report.is_clean());
    assert!(publisher.is_closed());
}

#[test]
fn pairing_code_contains_only_block_characters() {
    let rendered = render_pairing_code("2@ABCDEF,123456,zyx").unwrap();
    assert!(rendered
        .chars()
        .all(|c| matches!(c, ' ' | '\u{2580}' | '\u{2584}' | '\u{2588}' | '\n')));
}
