use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use promozap_classifier::ClassifyingSink;
use promozap_config::{AppConfig, SinkKind};
use promozap_relay::{
    LogPairingDisplay, LoggingSink, MessageSink, PairingDisplay, Publisher, RedisPublisher,
    RedisSubscriber, Relay, RelayResult, RetryPolicy,
};
use promozap_whatsapp::{open_session, TerminalPairingDisplay};
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Install the global subscriber. `RUST_LOG` takes precedence over
    /// `default_filter`.
    pub fn init_tracing(default_filter: &str) -> Result<()> {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(default_filter)
                .map_err(|error| anyhow::anyhow!("invalid log filter {default_filter:?}: {error}"))?,
        };

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

fn retry_policy(config: &AppConfig) -> RetryPolicy {
    RetryPolicy::new(
        config.relay.publish_retries,
        Duration::from_millis(config.relay.retry_backoff_ms),
    )
}

fn sink_for(config: &AppConfig, publisher: Arc<dyn Publisher>) -> Arc<dyn MessageSink> {
    match config.relay.sink {
        SinkKind::Log => Arc::new(LoggingSink),
        SinkKind::Classify => Arc::new(ClassifyingSink::new(publisher)),
    }
}

fn pairing_display_for(config: &AppConfig) -> Arc<dyn PairingDisplay> {
    if config.whatsapp.render_qr {
        Arc::new(TerminalPairingDisplay)
    } else {
        Arc::new(LogPairingDisplay)
    }
}

/// Open both broker connections and assemble a relay around the WhatsApp
/// session. Nothing is started yet.
pub async fn build_relay(config: &AppConfig) -> RelayResult<Relay> {
    let connect_timeout = Duration::from_secs(config.redis.connect_timeout_seconds);

    let publisher: Arc<dyn Publisher> =
        Arc::new(RedisPublisher::connect(&config.redis.url, connect_timeout).await?);
    let subscriber = RedisSubscriber::connect(&config.redis.url, connect_timeout).await?;
    let session = open_session(Path::new(&config.whatsapp.store_path));

    info!(
        sink = config.relay.sink.as_str(),
        publish_retries = config.relay.publish_retries,
        "relay assembled"
    );

    let relay = Relay::new(publisher, Box::new(subscriber), session);
    let sink = sink_for(config, relay.publisher());

    Ok(relay
        .with_sink(sink)
        .with_pairing_display(pairing_display_for(config))
        .with_retry_policy(retry_policy(config))
        .with_shutdown_timeout(Duration::from_secs(config.relay.shutdown_timeout_seconds)))
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(?error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::warn!(?error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
