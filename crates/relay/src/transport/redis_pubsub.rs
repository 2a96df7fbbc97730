use std::time::Duration;

use async_trait::async_trait;
use futures_util::{FutureExt, StreamExt};
use redis::aio::{ConnectionManager, PubSub};
use redis::{AsyncCommands, Client};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info};

use super::{PayloadStream, Publisher, Subscriber};
use crate::error::{RelayError, RelayResult};

const TARGET: &str = "redis";

fn open_client(url: &str) -> RelayResult<Client> {
    Client::open(url).map_err(|err| RelayError::connection(TARGET, format!("invalid url: {err}")))
}

async fn with_timeout<T>(
    limit: Duration,
    future: impl std::future::Future<Output = redis::RedisResult<T>>,
) -> RelayResult<T> {
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result.map_err(RelayError::from),
        Err(_) => Err(RelayError::connection(
            TARGET,
            format!("timed out after {}s", limit.as_secs_f32()),
        )),
    }
}

/// Publish connection backed by a reconnecting [`ConnectionManager`].
pub struct RedisPublisher {
    connection: Mutex<Option<ConnectionManager>>,
}

impl RedisPublisher {
    pub async fn connect(url: &str, connect_timeout: Duration) -> RelayResult<Self> {
        let client = open_client(url)?;
        let manager = with_timeout(connect_timeout, ConnectionManager::new(client)).await?;
        info!("redis publish connection established");

        Ok(Self {
            connection: Mutex::new(Some(manager)),
        })
    }

    // The lock only guards handing out a handle; commands run on the clone.
    async fn acquire(&self) -> Option<ConnectionManager> {
        self.connection.lock().await.clone()
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn ping(&self) -> RelayResult<()> {
        let mut connection = self
            .acquire()
            .await
            .ok_or_else(|| RelayError::connection(TARGET, "publish connection is closed"))?;
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &str) -> RelayResult<()> {
        let mut connection = self
            .acquire()
            .await
            .ok_or_else(|| RelayError::publish(topic, "publish connection is closed"))?;

        let receivers: i64 = connection
            .publish(topic, payload)
            .await
            .map_err(|err| RelayError::publish(topic, err.to_string()))?;

        debug!(topic, receivers, "payload published");
        Ok(())
    }

    async fn close(&self) -> RelayResult<()> {
        if self.connection.lock().await.take().is_some() {
            debug!("redis publish connection released");
        }
        Ok(())
    }
}

/// Subscribe connection. The pub/sub socket is opened eagerly so connection
/// problems surface at startup rather than on the first delivery.
pub struct RedisSubscriber {
    client: Client,
    connect_timeout: Duration,
    pubsub: Option<PubSub>,
    stop: Option<oneshot::Sender<()>>,
}

impl RedisSubscriber {
    pub async fn connect(url: &str, connect_timeout: Duration) -> RelayResult<Self> {
        let client = open_client(url)?;
        let pubsub = with_timeout(connect_timeout, client.get_async_pubsub()).await?;
        info!("redis subscribe connection established");

        Ok(Self {
            client,
            connect_timeout,
            pubsub: Some(pubsub),
            stop: None,
        })
    }
}

#[async_trait]
impl Subscriber for RedisSubscriber {
    async fn ping(&mut self) -> RelayResult<()> {
        // A socket in subscribe mode cannot answer PING, so check the broker
        // through a short-lived command connection.
        let mut connection = with_timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await?;
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> RelayResult<PayloadStream> {
        let mut pubsub = self
            .pubsub
            .take()
            .ok_or_else(|| RelayError::connection(TARGET, "subscribe connection is not available"))?;
        pubsub.subscribe(topic).await?;
        debug!(topic, "subscribed");

        let (stop, stopped) = oneshot::channel();
        self.stop = Some(stop);

        let stream = pubsub
            .into_on_message()
            .map(|message| Some(message.get_payload_bytes().to_vec()))
            .take_until(stopped.map(|_| ()))
            .boxed();

        Ok(stream)
    }

    async fn close(&mut self) -> RelayResult<()> {
        if let Some(stop) = self.stop.take() {
            // The receiver is gone when the stream was already dropped.
            let _ = stop.send(());
            debug!("redis subscription stopped");
        }
        if self.pubsub.take().is_some() {
            debug!("unused redis subscribe connection released");
        }
        Ok(())
    }
}
