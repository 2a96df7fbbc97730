use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{RelayError, RelayResult};
use crate::pipeline::{
    PublishPath, RetryPolicy, SessionEventHandler, SubscribePath, SubscriptionStats,
};
use crate::session::{ChatSession, LogPairingDisplay, PairingDisplay};
use crate::sink::{LoggingSink, MessageSink};
use crate::transport::{Publisher, Subscriber};
use crate::RAW_TOPIC;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Failures collected while tearing the relay down.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub errors: Vec<RelayError>,
    pub subscription: Option<SubscriptionStats>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Owns both broker connections and the chat session for the lifetime of
/// the process.
pub struct Relay {
    publisher: Arc<dyn Publisher>,
    subscriber: Box<dyn Subscriber>,
    session: Box<dyn ChatSession>,
    sink: Arc<dyn MessageSink>,
    pairing: Arc<dyn PairingDisplay>,
    retry: RetryPolicy,
    shutdown_timeout: Duration,
    subscription: Option<JoinHandle<SubscriptionStats>>,
    event_loop: Option<JoinHandle<()>>,
}

impl Relay {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        subscriber: Box<dyn Subscriber>,
        session: Box<dyn ChatSession>,
    ) -> Self {
        Self {
            publisher,
            subscriber,
            session,
            sink: Arc::new(LoggingSink),
            pairing: Arc::new(LogPairingDisplay),
            retry: RetryPolicy::none(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            subscription: None,
            event_loop: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_pairing_display(mut self, pairing: Arc<dyn PairingDisplay>) -> Self {
        self.pairing = pairing;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Shared handle to the publish connection, for sinks that publish too.
    pub fn publisher(&self) -> Arc<dyn Publisher> {
        self.publisher.clone()
    }

    pub fn is_running(&self) -> bool {
        self.event_loop.is_some() || self.subscription.is_some()
    }

    /// Check the broker, start consuming the raw topic, then connect the chat
    /// session. Nothing touches the session when the broker is unreachable.
    pub async fn start(&mut self) -> RelayResult<()> {
        self.publisher.ping().await?;
        self.subscriber.ping().await?;
        info!("connected to broker");

        let payloads = self.subscriber.subscribe(RAW_TOPIC).await?;
        let subscribe_path = SubscribePath::new(self.sink.clone());
        self.subscription = Some(tokio::spawn(async move { subscribe_path.run(payloads).await }));

        let (events, receiver) = mpsc::unbounded_channel();
        let publish_path = PublishPath::new(self.publisher.clone()).with_retry_policy(self.retry);
        let handler = SessionEventHandler::new(publish_path, self.pairing.clone());
        self.event_loop = Some(tokio::spawn(handler.run(receiver)));

        self.session.connect(events).await?;
        info!(session = self.session.name(), "chat session started");
        Ok(())
    }

    /// Close the publish connection, the subscribe connection and the chat
    /// session, in that order. Every step runs even if an earlier one fails.
    /// Safe to call more than once.
    pub async fn shutdown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();

        if let Err(err) = self.publisher.close().await {
            warn!(error = %err, "failed to close publish connection");
            report.errors.push(err);
        }

        if let Err(err) = self.subscriber.close().await {
            warn!(error = %err, "failed to close subscribe connection");
            report.errors.push(err);
        }

        if let Err(err) = self.session.disconnect().await {
            warn!(error = %err, session = self.session.name(), "failed to disconnect chat session");
            report.errors.push(err);
        }

        if let Some(handle) = self.subscription.take() {
            report.subscription = join_within(handle, self.shutdown_timeout, "subscription").await;
        }
        if let Some(handle) = self.event_loop.take() {
            join_within(handle, self.shutdown_timeout, "session events").await;
        }

        info!(errors = report.errors.len(), "relay torn down");
        report
    }
}

async fn join_within<T>(mut handle: JoinHandle<T>, limit: Duration, name: &str) -> Option<T> {
    match tokio::time::timeout(limit, &mut handle).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            warn!(error = %err, task = name, "relay task ended abnormally");
            None
        }
        Err(_) => {
            warn!(task = name, ?limit, "relay task did not stop in time, aborting");
            handle.abort();
            None
        }
    }
}
