//! In-memory doubles for the relay seams, shared by the workspace's tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, FutureExt, StreamExt};
use tokio::sync::oneshot;

use crate::error::{RelayError, RelayResult};
use crate::message::Message;
use crate::session::{ChatSession, PairingDisplay, SessionEvent, SessionEventSender};
use crate::sink::MessageSink;
use crate::transport::{PayloadStream, Publisher, RawPayload, Subscriber};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Poll `condition` until it holds or `limit` elapses.
pub async fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Records every publish; failures can be injected per operation.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, String)>>,
    fail_ping: AtomicBool,
    fail_close: AtomicBool,
    failures_remaining: AtomicU32,
    attempts: AtomicU32,
    close_calls: AtomicU32,
    closed: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_ping() -> Self {
        let publisher = Self::default();
        publisher.fail_ping.store(true, Ordering::SeqCst);
        publisher
    }

    /// Make the next `count` publish calls fail.
    pub fn fail_next_publishes(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, String)> {
        lock(&self.published).clone()
    }

    pub fn payloads_on(&self, topic: &str) -> Vec<String> {
        lock(&self.published)
            .iter()
            .filter(|(published_topic, _)| published_topic == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn ping(&self) -> RelayResult<()> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(RelayError::connection("recording-broker", "ping refused"));
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &str) -> RelayResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.is_closed() {
            return Err(RelayError::publish(topic, "publish connection is closed"));
        }

        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RelayError::publish(topic, "injected publish failure"));
        }

        lock(&self.published).push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    async fn close(&self) -> RelayResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(RelayError::teardown("publisher", "injected close failure"));
        }
        Ok(())
    }
}

/// Observes a [`ScriptedSubscriber`] after it has been handed to a relay.
#[derive(Clone, Default)]
pub struct SubscriberProbe {
    topics: Arc<Mutex<Vec<String>>>,
    close_calls: Arc<AtomicU32>,
}

impl SubscriberProbe {
    pub fn topics(&self) -> Vec<String> {
        lock(&self.topics).clone()
    }

    pub fn close_calls(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }
}

/// Delivers a fixed list of payloads, then stays open until closed.
pub struct ScriptedSubscriber {
    payloads: Vec<RawPayload>,
    fail_ping: bool,
    fail_close: bool,
    stop: Option<oneshot::Sender<()>>,
    probe: SubscriberProbe,
}

impl ScriptedSubscriber {
    pub fn new(payloads: impl IntoIterator<Item = RawPayload>) -> Self {
        Self {
            payloads: payloads.into_iter().collect(),
            fail_ping: false,
            fail_close: false,
            stop: None,
            probe: SubscriberProbe::default(),
        }
    }

    /// No payloads at all; the stream stays open until closed.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn from_texts<I, S>(payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            payloads
                .into_iter()
                .map(|payload| Some(payload.into().into_bytes())),
        )
    }

    pub fn failing_ping(mut self) -> Self {
        self.fail_ping = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn probe(&self) -> SubscriberProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl Subscriber for ScriptedSubscriber {
    async fn ping(&mut self) -> RelayResult<()> {
        if self.fail_ping {
            return Err(RelayError::connection("scripted-broker", "ping refused"));
        }
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> RelayResult<PayloadStream> {
        lock(&self.probe.topics).push(topic.to_string());

        let (stop, stopped) = oneshot::channel();
        self.stop = Some(stop);

        let payloads = std::mem::take(&mut self.payloads);
        Ok(stream::iter(payloads)
            .chain(stream::pending())
            .take_until(stopped.map(|_| ()))
            .boxed())
    }

    async fn close(&mut self) -> RelayResult<()> {
        self.probe.close_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if self.fail_close {
            return Err(RelayError::teardown("subscriber", "injected close failure"));
        }
        Ok(())
    }
}

/// Observes a [`ScriptedSession`] and can push further events into it.
#[derive(Clone, Default)]
pub struct SessionProbe {
    connects: Arc<AtomicU32>,
    disconnects: Arc<AtomicU32>,
    sender: Arc<Mutex<Option<SessionEventSender>>>,
}

impl SessionProbe {
    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Emit an event as if the chat client produced it. Returns `false` when
    /// the session is not connected.
    pub fn emit(&self, event: SessionEvent) -> bool {
        lock(&self.sender)
            .as_ref()
            .map(|sender| sender.send(event).is_ok())
            .unwrap_or(false)
    }
}

/// Emits a scripted sequence of events as soon as it is connected.
pub struct ScriptedSession {
    script: Vec<SessionEvent>,
    fail_connect: bool,
    fail_disconnect: bool,
    probe: SessionProbe,
}

impl ScriptedSession {
    pub fn new(script: impl IntoIterator<Item = SessionEvent>) -> Self {
        Self {
            script: script.into_iter().collect(),
            fail_connect: false,
            fail_disconnect: false,
            probe: SessionProbe::default(),
        }
    }

    /// Connects without emitting anything.
    pub fn idle() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    pub fn probe(&self) -> SessionProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl ChatSession for ScriptedSession {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn connect(&mut self, events: SessionEventSender) -> RelayResult<()> {
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(RelayError::connection("scripted-session", "connect refused"));
        }

        for event in self.script.drain(..) {
            let _ = events.send(event);
        }
        *lock(&self.probe.sender) = Some(events);
        Ok(())
    }

    async fn disconnect(&mut self) -> RelayResult<()> {
        self.probe.disconnects.fetch_add(1, Ordering::SeqCst);
        lock(&self.probe.sender).take();
        if self.fail_disconnect {
            return Err(RelayError::teardown("scripted-session", "injected disconnect failure"));
        }
        Ok(())
    }
}

/// Keeps every forwarded message; can reject messages by id.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<Message>>,
    reject_ids: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(ids: impl IntoIterator<Item = &'static str>) -> Self {
        let sink = Self::default();
        lock(&sink.reject_ids).extend(ids.into_iter().map(str::to_string));
        sink
    }

    pub fn messages(&self) -> Vec<Message> {
        lock(&self.messages).clone()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn forward(&self, message: Message) -> RelayResult<()> {
        if lock(&self.reject_ids).iter().any(|id| id == message.id()) {
            return Err(RelayError::publish("recording-sink", "message rejected"));
        }
        lock(&self.messages).push(message);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPairingDisplay {
    tokens: Mutex<Vec<String>>,
}

impl RecordingPairingDisplay {
    pub fn tokens(&self) -> Vec<String> {
        lock(&self.tokens).clone()
    }
}

impl PairingDisplay for RecordingPairingDisplay {
    fn show(&self, token: &str) {
        lock(&self.tokens).push(token.to_string());
    }
}
