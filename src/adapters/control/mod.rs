//! Control-store adapters for the run control plane.
//!
//! - `memory_store`: process-local lists + broadcast channels
//! - `redis_store`: Redis lists + pub/sub, shared between processes

pub mod memory_store;
pub mod redis_store;

pub use memory_store::MemoryControlStore;
pub use redis_store::RedisControlStore;

/// Match `key` against a glob pattern where `*` matches any run of characters.
pub(crate) fn glob_matches(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !key.starts_with(first) || key.len() < first.len() + last.len() || !key.ends_with(last) {
        return false;
    }

    let mut rest = &key[first.len()..key.len() - last.len()];
    for middle in &parts[1..parts.len() - 1] {
        match rest.find(middle) {
            Some(at) => rest = &rest[at + middle.len()..],
            None => return false,
        }
    }
    true
}
