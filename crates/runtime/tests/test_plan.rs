use std::time::Duration;

use promozap_config::{AppConfig, SinkKind};
use promozap_relay::RelayError;
use promozap_runtime::build_relay;
use tokio::net::TcpListener;

fn config_with_url(url: impl Into<String>) -> AppConfig {
    let mut config = AppConfig::default();
    config.redis.url = url.into();
    config.redis.connect_timeout_seconds = 2;
    config
}

async fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_broker_url_is_a_connection_error() {
    let config = config_with_url("definitely not a url");

    let err = match build_relay(&config).await {
        Ok(_) => panic!("expected an invalid url to be rejected"),
        Err(err) => err,
    };
    assert!(matches!(err, RelayError::Connection { .. }), "got {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_broker_fails_before_any_session_work() {
    let port = refused_port().await;
    let mut config = config_with_url(format!("redis://127.0.0.1:{port}"));
    config.relay.sink = SinkKind::Classify;

    let started = tokio::time::Instant::now();
    let err = match build_relay(&config).await {
        Ok(_) => panic!("expected the refused port to fail"),
        Err(err) => err,
    };

    assert!(matches!(err, RelayError::Connection { .. }), "got {err}");
    assert!(started.elapsed() < Duration::from_secs(10));
}
