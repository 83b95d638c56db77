//! Port for the shared list + pub/sub store that backs the run control plane.
//!
//! Every process talks to the same store; nothing else is shared. Lists are
//! the source of truth, pub/sub messages are hints.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Shared list, TTL key and pub/sub store coordinating run control across processes.
#[async_trait]
pub trait ControlStore: Send + Sync {
    /// Append to a list, returning the new length.
    async fn push(&self, key: &str, value: &str) -> DomainResult<u64>;

    /// Inclusive range read; negative indices count from the end.
    async fn range(&self, key: &str, start: i64, stop: i64) -> DomainResult<Vec<String>>;

    /// Set a TTL on an existing key.
    async fn expire(&self, key: &str, ttl: Duration) -> DomainResult<()>;

    /// Delete a key.
    async fn delete(&self, key: &str) -> DomainResult<()>;

    /// Set a value with a TTL.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> DomainResult<()>;

    /// Keys matching a glob pattern (`*` wildcards).
    async fn keys_matching(&self, pattern: &str) -> DomainResult<Vec<String>>;

    /// Publish to a channel. Messages with no subscriber are dropped.
    async fn publish(&self, channel: &str, message: &str) -> DomainResult<()>;

    /// Subscribe to one channel.
    async fn subscribe(&self, channel: &str) -> DomainResult<Box<dyn ControlSubscription>>;
}

/// A live subscription to one channel.
#[async_trait]
pub trait ControlSubscription: Send {
    /// Channel this subscription listens on.
    fn channel(&self) -> &str;

    /// Next message payload; `None` once the subscription is closed.
    async fn next_message(&mut self) -> Option<String>;

    /// Stop receiving; later reads return `None`.
    async fn unsubscribe(&mut self) -> DomainResult<()>;

    /// Release the underlying connection.
    async fn close(self: Box<Self>);
}
