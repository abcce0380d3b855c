//! Fixed-window visit counter backed by a key-value store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::identifier::ClientIdentifier;
use super::locks::KeyLocks;
use crate::error::{Result, StoreError};
use crate::store::KeyValueStore;

/// Length of a counting window, measured from a client's first visit.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Counts visits per client within a fixed one-minute window.
///
/// The count itself lives in the store under the client's identifier; the
/// window is the key's expiry. Later visits rewrite the count with the
/// remaining ttl the store reports, so the window never slides forward.
///
/// Within one process, visits for the same client are serialized. Several
/// processes sharing a store can still interleave their read and write and
/// lose an increment.
pub struct VisitCounter {
    store: Arc<dyn KeyValueStore>,
    locks: KeyLocks,
}

impl VisitCounter {
    /// Create a counter over the given store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            locks: KeyLocks::new(),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Record one visit from `identifier` and return its count in the current window.
    pub async fn record_visit(&self, identifier: &ClientIdentifier) -> Result<u64> {
        let key = identifier.as_str();
        let _guard = self.locks.lock(key).await;

        let Some(previous) = self.store.get(key).await? else {
            self.store.set(key, 1, WINDOW).await?;
            debug!(client = %identifier, window_secs = WINDOW.as_secs(), "Started visit window");
            return Ok(1);
        };

        let ttl = self.store.ttl(key).await?;
        let count = previous.checked_add(1).ok_or_else(|| StoreError::InvalidValue {
            key: key.to_string(),
            reason: format!("count {} cannot be incremented", previous),
        })?;

        match ttl.remaining() {
            Some(remaining) => {
                self.store.set(key, count, remaining).await?;
                trace!(
                    client = %identifier,
                    count,
                    remaining_ms = remaining.as_millis() as u64,
                    "Recorded visit"
                );
            }
            None => {
                // No usable expiry: drop the key so the next visit opens a fresh window.
                warn!(
                    client = %identifier,
                    ttl_ms = ttl.as_millis(),
                    count,
                    "Negative ttl on visit counter, deleting key"
                );
                self.store.delete(key).await?;
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VisitsError;
    use crate::store::{MemoryStore, StoreResult, Ttl};
    use async_trait::async_trait;

    fn setup() -> (Arc<MemoryStore>, VisitCounter) {
        let store = Arc::new(MemoryStore::new());
        let counter = VisitCounter::new(store.clone());
        (store, counter)
    }

    fn client(ip: &str) -> ClientIdentifier {
        ClientIdentifier::new(ip).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_visit_opens_window() {
        let (store, counter) = setup();
        let id = client("10.0.0.5");

        assert_eq!(counter.record_visit(&id).await.unwrap(), 1);
        assert_eq!(store.get("10.0.0.5").await.unwrap(), Some(1));
        assert_eq!(store.ttl("10.0.0.5").await.unwrap(), Ttl::Expires(WINDOW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_visit_preserves_remaining_ttl() {
        let (store, counter) = setup();
        store.set("10.0.0.5", 4, Duration::from_secs(30)).await.unwrap();

        let count = counter.record_visit(&client("10.0.0.5")).await.unwrap();

        assert_eq!(count, 5);
        assert_eq!(store.get("10.0.0.5").await.unwrap(), Some(5));
        assert_eq!(
            store.ttl("10.0.0.5").await.unwrap(),
            Ttl::Expires(Duration::from_secs(30))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_visits_keep_absolute_expiry() {
        let (store, counter) = setup();
        let id = client("192.168.1.20");

        assert_eq!(counter.record_visit(&id).await.unwrap(), 1);
        for expected in 2..=6u64 {
            tokio::time::advance(Duration::from_secs(5)).await;
            assert_eq!(counter.record_visit(&id).await.unwrap(), expected);
        }

        // 25 seconds elapsed since the window opened
        assert_eq!(
            store.ttl(id.as_str()).await.unwrap(),
            Ttl::Expires(Duration::from_secs(35))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_expiry() {
        let (_store, counter) = setup();
        let id = client("10.0.0.5");

        counter.record_visit(&id).await.unwrap();
        counter.record_visit(&id).await.unwrap();
        assert_eq!(counter.record_visit(&id).await.unwrap(), 3);

        tokio::time::advance(WINDOW).await;
        assert_eq!(counter.record_visit(&id).await.unwrap(), 1);
        assert_eq!(counter.record_visit(&id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_negative_ttl_deletes_key() {
        let (store, counter) = setup();
        store.set_persistent("10.0.0.5", 4);

        let count = counter.record_visit(&client("10.0.0.5")).await.unwrap();

        assert_eq!(count, 5);
        assert_eq!(store.get("10.0.0.5").await.unwrap(), None);
        assert_eq!(counter.record_visit(&client("10.0.0.5")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clients_counted_independently() {
        let (_store, counter) = setup();
        let a = client("10.0.0.1");
        let b = client("2001:db8::1");

        counter.record_visit(&a).await.unwrap();
        counter.record_visit(&a).await.unwrap();
        assert_eq!(counter.record_visit(&b).await.unwrap(), 1);
        assert_eq!(counter.record_visit(&a).await.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_visits_are_not_lost() {
        let (store, counter) = setup();
        let counter = Arc::new(counter);

        let mut handles = Vec::new();
        for _ in 0..50 {
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                counter.record_visit(&client("10.0.0.9")).await.unwrap()
            }));
        }

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();

        assert_eq!(counts, (1..=50).collect::<Vec<u64>>());
        assert_eq!(store.get("10.0.0.9").await.unwrap(), Some(50));
    }

    /// Store whose reads fail or return a fixed value.
    struct ScriptedStore {
        get: fn() -> StoreResult<Option<u64>>,
    }

    #[async_trait]
    impl KeyValueStore for ScriptedStore {
        async fn get(&self, _key: &str) -> StoreResult<Option<u64>> {
            (self.get)()
        }
        async fn set(&self, _key: &str, _value: u64, _ttl: Duration) -> StoreResult<()> {
            Ok(())
        }
        async fn ttl(&self, _key: &str) -> StoreResult<Ttl> {
            Ok(Ttl::Expires(WINDOW))
        }
        async fn delete(&self, _key: &str) -> StoreResult<()> {
            Ok(())
        }
        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
        fn backend_name(&self) -> &'static str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(ScriptedStore {
            get: || Err(StoreError::Unavailable("connection refused".into())),
        });
        let counter = VisitCounter::new(store);

        let err = counter.record_visit(&client("10.0.0.5")).await.unwrap_err();
        assert!(matches!(err, VisitsError::Store(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_invalid_value_propagates() {
        let store = Arc::new(ScriptedStore {
            get: || {
                Err(StoreError::InvalidValue {
                    key: "10.0.0.5".into(),
                    reason: "not an integer".into(),
                })
            },
        });
        let counter = VisitCounter::new(store);

        let err = counter.record_visit(&client("10.0.0.5")).await.unwrap_err();
        assert!(matches!(err, VisitsError::Store(StoreError::InvalidValue { .. })));
    }

    #[tokio::test]
    async fn test_saturated_count_is_rejected() {
        let store = Arc::new(ScriptedStore {
            get: || Ok(Some(u64::MAX)),
        });
        let counter = VisitCounter::new(store);

        assert!(counter.record_visit(&client("10.0.0.5")).await.is_err());
    }
}
