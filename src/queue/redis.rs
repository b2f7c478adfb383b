//! Redis-backed work queue.
//!
//! Job ids are plain-text items in a Redis list. Producers `RPUSH`, workers
//! `BLPOP` with a bounded timeout; popping removes the item, so each id is
//! delivered to exactly one consumer.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Pool, Runtime};

use crate::error::{Result, WorkerError};

use super::WorkQueue;

/// A named Redis list used as a work queue.
///
/// The connection pool is created once per process and reused for every
/// pop; dropped connections are replaced by the pool on the next call.
pub struct RedisQueue {
    pool: Pool,
    name: String,
}

impl RedisQueue {
    /// Connects to Redis and verifies the connection with `PING`.
    ///
    /// Fails if the broker is unreachable, which lets the caller decide
    /// whether to fall back to polling.
    pub async fn connect(url: &str, name: impl Into<String>) -> Result<Self> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| {
                WorkerError::queue_unavailable(format!("Invalid Redis URL {}: {}", url, e))
            })?;

        let queue = Self {
            pool,
            name: name.into(),
        };
        queue.ping().await?;
        tracing::info!(url, queue = %queue.name, "Connected to Redis");
        Ok(queue)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| WorkerError::queue_unavailable(format!("Redis connection failed: {}", e)))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| WorkerError::queue_unavailable(format!("Redis PING failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl WorkQueue for RedisQueue {
    async fn pop(&self, timeout: Duration) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let item: Option<(String, String)> = conn
            .blpop(&self.name, timeout.as_secs_f64())
            .await
            .map_err(|e| WorkerError::queue_unavailable(format!("Redis BLPOP failed: {}", e)))?;
        Ok(item.map(|(_, value)| value))
    }

    async fn push(&self, item: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: i64 = conn
            .rpush(&self.name, item)
            .await
            .map_err(|e| WorkerError::queue_unavailable(format!("Redis RPUSH failed: {}", e)))?;
        Ok(())
    }
}
