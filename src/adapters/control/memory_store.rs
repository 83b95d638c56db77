//! In-process control store.
//!
//! Lists and TTL keys live in a mutex-guarded map; each pub/sub channel is
//! a tokio broadcast channel. Like Redis pub/sub, a message published while
//! nobody is subscribed is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;

use super::glob_matches;
use crate::domain::errors::DomainResult;
use crate::domain::ports::{ControlStore, ControlSubscription};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
enum Entry {
    List(Vec<String>),
    Value(String),
}

#[derive(Debug)]
struct Slot {
    entry: Entry,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
struct State {
    slots: HashMap<String, Slot>,
    channels: HashMap<String, broadcast::Sender<String>>,
}

impl State {
    fn purge_expired(&mut self) {
        let now = Instant::now();
        self.slots.retain(|_, slot| !slot.is_expired(now));
    }

    /// Drop channels nobody listens on; catches subscriptions dropped without unsubscribing.
    fn prune_idle_channels(&mut self) {
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
    }

    fn release_channel(&mut self, channel: &str) {
        if self.channels.get(channel).is_some_and(|sender| sender.receiver_count() == 0) {
            self.channels.remove(channel);
        }
    }
}

/// Control store for a single process (tests, local development).
#[derive(Clone, Default)]
pub struct MemoryControlStore {
    state: Arc<Mutex<State>>,
}

impl MemoryControlStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribers on a channel.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        let state = self.state.lock().await;
        state.channels.get(channel).map_or(0, broadcast::Sender::receiver_count)
    }

    /// Number of channels currently held open.
    pub async fn channel_count(&self) -> usize {
        self.state.lock().await.channels.len()
    }
}

/// Resolve Redis-style inclusive, possibly negative, range bounds.
fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl ControlStore for MemoryControlStore {
    async fn push(&self, key: &str, value: &str) -> DomainResult<u64> {
        let mut state = self.state.lock().await;
        state.purge_expired();
        let slot = state.slots.entry(key.to_string()).or_insert_with(|| Slot {
            entry: Entry::List(Vec::new()),
            expires_at: None,
        });
        if let Entry::Value(_) = slot.entry {
            slot.entry = Entry::List(Vec::new());
        }
        match &mut slot.entry {
            Entry::List(items) => {
                items.push(value.to_string());
                Ok(items.len() as u64)
            }
            Entry::Value(_) => Ok(0),
        }
    }

    async fn range(&self, key: &str, start: i64, stop: i64) -> DomainResult<Vec<String>> {
        let mut state = self.state.lock().await;
        state.purge_expired();
        let Some(Slot { entry: Entry::List(items), .. }) = state.slots.get(key) else {
            return Ok(Vec::new());
        };
        Ok(resolve_range(items.len(), start, stop)
            .map(|(from, to)| items[from..=to].to_vec())
            .unwrap_or_default())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> DomainResult<()> {
        let mut state = self.state.lock().await;
        if let Some(slot) = state.slots.get_mut(key) {
            slot.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> DomainResult<()> {
        self.state.lock().await.slots.remove(key);
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> DomainResult<()> {
        let mut state = self.state.lock().await;
        state.slots.insert(
            key.to_string(),
            Slot {
                entry: Entry::Value(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn keys_matching(&self, pattern: &str) -> DomainResult<Vec<String>> {
        let mut state = self.state.lock().await;
        state.purge_expired();
        let mut keys: Vec<String> = state
            .slots
            .keys()
            .filter(|key| glob_matches(pattern, key))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn publish(&self, channel: &str, message: &str) -> DomainResult<()> {
        let state = self.state.lock().await;
        if let Some(sender) = state.channels.get(channel) {
            // No receivers is not an error.
            let _ = sender.send(message.to_string());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> DomainResult<Box<dyn ControlSubscription>> {
        let mut state = self.state.lock().await;
        state.prune_idle_channels();
        let receiver = state
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();
        Ok(Box::new(MemorySubscription {
            channel: channel.to_string(),
            receiver: Some(receiver),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemorySubscription {
    channel: String,
    receiver: Option<broadcast::Receiver<String>>,
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl ControlSubscription for MemorySubscription {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn next_message(&mut self) -> Option<String> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %self.channel, skipped, "control subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn unsubscribe(&mut self) -> DomainResult<()> {
        if self.receiver.take().is_some() {
            self.state.lock().await.release_channel(&self.channel);
        }
        Ok(())
    }

    async fn close(mut self: Box<Self>) {
        let _ = self.unsubscribe().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_range_follows_redis_semantics() {
        let store = MemoryControlStore::new();
        for item in ["a", "b", "c", "d"] {
            store.push("list", item).await.unwrap();
        }

        assert_eq!(store.range("list", 0, -1).await.unwrap(), vec!["a", "b", "c", "d"]);
        assert_eq!(store.range("list", 2, -1).await.unwrap(), vec!["c", "d"]);
        assert_eq!(store.range("list", -1, -1).await.unwrap(), vec!["d"]);
        assert!(store.range("list", 4, -1).await.unwrap().is_empty());
        assert!(store.range("missing", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ttl_keys_expire() {
        let store = MemoryControlStore::new();
        store.set_with_ttl("active_run:a:r", "running", Duration::from_millis(20)).await.unwrap();
        assert_eq!(store.keys_matching("active_run:*:r").await.unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.keys_matching("active_run:*:r").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_reaches_only_current_subscribers() {
        let store = MemoryControlStore::new();
        store.publish("chan", "early").await.unwrap();

        let mut sub = store.subscribe("chan").await.unwrap();
        store.publish("chan", "STOP").await.unwrap();

        assert_eq!(sub.next_message().await.as_deref(), Some("STOP"));
        sub.unsubscribe().await.unwrap();
        assert_eq!(sub.next_message().await, None);
    }

    #[tokio::test]
    async fn test_idle_channels_are_released() {
        let store = MemoryControlStore::new();
        let mut first = store.subscribe("agent_run:a:control").await.unwrap();
        let second = store.subscribe("agent_run:a:control").await.unwrap();
        assert_eq!(store.channel_count().await, 1);

        first.unsubscribe().await.unwrap();
        assert_eq!(store.channel_count().await, 1);
        second.close().await;
        assert_eq!(store.channel_count().await, 0);

        // A subscription dropped without unsubscribing is pruned on the next subscribe.
        drop(store.subscribe("agent_run:b:control").await.unwrap());
        let _live = store.subscribe("agent_run:c:control").await.unwrap();
        assert_eq!(store.channel_count().await, 1);
        assert_eq!(store.subscriber_count("agent_run:c:control").await, 1);
    }
}
