//! Key-value store clients used as the counting backend.

mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub use memory::{spawn_eviction, MemoryStore};
pub use redis_store::RedisStore;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Remaining lifetime of a key as reported by the store.
///
/// Mirrors the Redis `PTTL` reply: a positive remaining time, `-1` for a key
/// without an expiry and `-2` for a key that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key expires after this long.
    Expires(Duration),
    /// The key exists but has no expiry.
    Persistent,
    /// The key does not exist (or expired since it was last read).
    Missing,
}

impl Ttl {
    /// Convert a raw `PTTL` reply in milliseconds.
    pub fn from_millis(millis: i64) -> Self {
        match millis {
            -1 => Ttl::Persistent,
            m if m < 0 => Ttl::Missing,
            m => Ttl::Expires(Duration::from_millis(m as u64)),
        }
    }

    /// Raw `PTTL` representation.
    pub fn as_millis(&self) -> i64 {
        match self {
            Ttl::Expires(d) => d.as_millis() as i64,
            Ttl::Persistent => -1,
            Ttl::Missing => -2,
        }
    }

    /// Whether the store reported a negative ttl.
    pub fn is_negative(&self) -> bool {
        !matches!(self, Ttl::Expires(_))
    }

    /// Remaining time, if the key is set to expire.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Ttl::Expires(d) => Some(*d),
            _ => None,
        }
    }
}

/// A remote (or in-process) key-value store holding integer counters.
///
/// Implementations must be shareable across request handlers.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the counter stored under `key`. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> StoreResult<Option<u64>>;

    /// Write `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: u64, ttl: Duration) -> StoreResult<()>;

    /// Read the remaining lifetime of `key`.
    async fn ttl(&self, key: &str) -> StoreResult<Ttl>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Check that the store is reachable.
    async fn ping(&self) -> StoreResult<()>;

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_from_millis() {
        assert_eq!(Ttl::from_millis(-1), Ttl::Persistent);
        assert_eq!(Ttl::from_millis(-2), Ttl::Missing);
        assert_eq!(Ttl::from_millis(0), Ttl::Expires(Duration::ZERO));
        assert_eq!(
            Ttl::from_millis(30_000),
            Ttl::Expires(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_ttl_negative() {
        assert!(Ttl::Persistent.is_negative());
        assert!(Ttl::Missing.is_negative());
        assert!(!Ttl::Expires(Duration::from_secs(1)).is_negative());
        assert_eq!(Ttl::Persistent.as_millis(), -1);
        assert_eq!(Ttl::Missing.as_millis(), -2);
        assert_eq!(Ttl::Persistent.remaining(), None);
    }
}
