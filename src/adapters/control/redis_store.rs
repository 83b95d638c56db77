//! Redis-backed control store shared by every process instance.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{MultiplexedConnection, PubSub};
use redis::AsyncCommands;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{ControlStore, ControlSubscription};

fn control_err(e: redis::RedisError) -> DomainError {
    DomainError::ControlPlane(e.to_string())
}

/// Commands go over one multiplexed connection; every subscription opens
/// its own pub/sub connection.
#[derive(Clone)]
pub struct RedisControlStore {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisControlStore {
    /// Connect to `url`.
    pub async fn connect(url: &str) -> DomainResult<Self> {
        let client = redis::Client::open(url).map_err(control_err)?;
        let conn = client.get_multiplexed_async_connection().await.map_err(control_err)?;
        tracing::info!("connected to redis control store");
        Ok(Self { client, conn })
    }

    /// Round-trip check used by health checks.
    pub async fn ping(&self) -> DomainResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await.map_err(control_err)?;
        Ok(())
    }
}

#[async_trait]
impl ControlStore for RedisControlStore {
    async fn push(&self, key: &str, value: &str) -> DomainResult<u64> {
        let mut conn = self.conn.clone();
        conn.rpush(key, value).await.map_err(control_err)
    }

    async fn range(&self, key: &str, start: i64, stop: i64) -> DomainResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.lrange(key, start as isize, stop as isize).await.map_err(control_err)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> DomainResult<()> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(key, ttl.as_secs() as i64).await.map_err(control_err)
    }

    async fn delete(&self, key: &str) -> DomainResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(control_err)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> DomainResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await.map_err(control_err)
    }

    async fn keys_matching(&self, pattern: &str) -> DomainResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let iter = conn.scan_match::<_, String>(pattern).await.map_err(control_err)?;
        // SCAN may return a key more than once.
        let mut keys: Vec<String> = iter.collect().await;
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn publish(&self, channel: &str, message: &str) -> DomainResult<()> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(channel, message).await.map_err(control_err)
    }

    async fn subscribe(&self, channel: &str) -> DomainResult<Box<dyn ControlSubscription>> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(control_err)?;
        pubsub.subscribe(channel).await.map_err(control_err)?;
        Ok(Box::new(RedisSubscription {
            channel: channel.to_string(),
            pubsub: Some(pubsub),
        }))
    }
}

struct RedisSubscription {
    channel: String,
    pubsub: Option<PubSub>,
}

#[async_trait]
impl ControlSubscription for RedisSubscription {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn next_message(&mut self) -> Option<String> {
        let pubsub = self.pubsub.as_mut()?;
        loop {
            let msg = pubsub.on_message().next().await?;
            match msg.get_payload::<String>() {
                Ok(payload) => return Some(payload),
                Err(e) => tracing::warn!(channel = %self.channel, error = %e, "undecodable pub/sub payload"),
            }
        }
    }

    async fn unsubscribe(&mut self) -> DomainResult<()> {
        if let Some(pubsub) = self.pubsub.as_mut() {
            pubsub.unsubscribe(&self.channel).await.map_err(control_err)?;
        }
        Ok(())
    }

    async fn close(mut self: Box<Self>) {
        self.pubsub.take();
    }
}
