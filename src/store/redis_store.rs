//! Redis-backed store client.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ErrorKind, RedisError};
use tracing::{debug, info};

use super::{KeyValueStore, StoreResult, Ttl};
use crate::config::StoreConfig;
use crate::error::StoreError;

/// How long to wait for the initial connection before giving up.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for a Redis server.
///
/// Wraps a `ConnectionManager`, which reconnects on its own after the
/// connection drops; commands issued while the server is down fail with
/// `StoreError::Unavailable`.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    endpoint: String,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl RedisStore {
    /// Connect to the configured server and verify it answers `PING`.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let url = connection_url(config);
        let client = redis::Client::open(url.as_str())
            .map_err(|e| StoreError::Unavailable(format!("invalid endpoint {}: {}", config.endpoint, e)))?;

        let conn = tokio::time::timeout(CONNECT_TIMEOUT, client.get_connection_manager())
            .await
            .map_err(|_| {
                StoreError::Unavailable(format!(
                    "timed out connecting to {} after {:?}",
                    config.endpoint, CONNECT_TIMEOUT
                ))
            })?
            .map_err(map_redis_error)?;

        let store = Self {
            conn,
            endpoint: config.endpoint.clone(),
        };
        store.ping().await?;

        info!(endpoint = %store.endpoint, db = config.db, "Connected to Redis");
        Ok(store)
    }
}

fn connection_url(config: &StoreConfig) -> String {
    match &config.password {
        Some(password) => format!("redis://:{}@{}/{}", password, config.endpoint, config.db),
        None => format!("redis://{}/{}", config.endpoint, config.db),
    }
}

fn map_redis_error(err: RedisError) -> StoreError {
    if err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_io_error()
        || err.is_timeout()
    {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Command(err.to_string())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<u64>> {
        let mut conn = self.conn.clone();
        let value: Option<u64> = conn.get(key).await.map_err(|e| {
            if e.kind() == ErrorKind::TypeError {
                StoreError::InvalidValue {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            } else {
                map_redis_error(e)
            }
        })?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: u64, ttl: Duration) -> StoreResult<()> {
        // PSETEX rejects a zero expiry
        let millis = (ttl.as_millis() as u64).max(1);
        let mut conn = self.conn.clone();
        let _: () = conn
            .pset_ex(key, value, millis)
            .await
            .map_err(map_redis_error)?;
        debug!(key, value, ttl_ms = millis, "PSETEX");
        Ok(())
    }

    async fn ttl(&self, key: &str) -> StoreResult<Ttl> {
        let mut conn = self.conn.clone();
        let millis: i64 = conn.pttl(key).await.map_err(map_redis_error)?;
        Ok(Ttl::from_millis(millis))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(map_redis_error)?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        if pong != "PONG" {
            return Err(StoreError::Command(format!("unexpected PING reply: {}", pong)));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
