//! Redis stream client with connection pooling.
//!
//! One pool is built at construction and shared for the life of the
//! process; every operation multiplexes over it. Pool/transport failures
//! surface as [`CacheError::Connection`] and are logged here - a missing
//! value is never conflated with an unreachable cache.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tracing::{debug, warn};

use cadence_core::error::{CacheError, CacheResult};
use cadence_core::models::{BlockHeight, StreamMessage, StreamStorage};
use cadence_core::ports::StreamStore;

/// Set holding every registered stream key.
const STREAMS_SET_KEY: &str = "streams";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Redis stream client.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

// =============================================================================
// RedisStreamClient
// =============================================================================

/// Redis implementation of the [`StreamStore`] port.
pub struct RedisStreamClient {
    pool: Pool,
}

impl RedisStreamClient {
    /// Build the pool and verify the cache answers.
    pub async fn connect(config: RedisConfig) -> CacheResult<Self> {
        let pool = PoolConfig::from_url(config.url.as_str())
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        let client = Self { pool };

        let mut conn = client.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        debug!("Redis stream client connected");
        Ok(client)
    }

    /// Key holding the pre-assembled streamer message for a height.
    fn streamer_message_key(height: BlockHeight) -> String {
        format!("streamer_message:{height}")
    }

    /// Key holding the storage metadata document for a stream.
    fn storage_key(stream_key: &str) -> String {
        format!("{stream_key}:storage")
    }

    async fn connection(&self) -> CacheResult<Connection> {
        self.pool.get().await.map_err(|e| {
            warn!(error = %e, "Redis pool unavailable");
            CacheError::Connection(e.to_string())
        })
    }
}

/// Classify a command failure: transport-level breakage is a connection
/// problem, everything else is the command itself being rejected.
fn map_redis_error(e: redis::RedisError) -> CacheError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
        warn!(error = %e, "Redis transport failure");
        CacheError::Connection(e.to_string())
    } else {
        CacheError::Command(e.to_string())
    }
}

#[async_trait]
impl StreamStore for RedisStreamClient {
    async fn get_streamer_message(&self, height: BlockHeight) -> CacheResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn
            .get(Self::streamer_message_key(height))
            .await
            .map_err(map_redis_error)?;
        Ok(value)
    }

    async fn get_stream_messages(
        &self,
        stream_key: &str,
        after_id: &str,
        count: usize,
    ) -> CacheResult<Vec<StreamMessage>> {
        let mut conn = self.connection().await?;

        // Exclusive range start: strictly after the cursor.
        let entries: Vec<(String, HashMap<String, String>)> = redis::cmd("XRANGE")
            .arg(stream_key)
            .arg(format!("({after_id}"))
            .arg("+")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        entries
            .into_iter()
            .map(|(id, fields)| {
                let block_height = fields
                    .get("block_height")
                    .ok_or_else(|| {
                        CacheError::Decode(format!("entry {id} in {stream_key} has no block_height"))
                    })?
                    .parse::<BlockHeight>()
                    .map_err(|e| {
                        CacheError::Decode(format!(
                            "entry {id} in {stream_key} has a non-numeric block_height: {e}"
                        ))
                    })?;
                Ok(StreamMessage { id, block_height })
            })
            .collect()
    }

    async fn delete_stream_message(&self, stream_key: &str, id: &str) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        // XDEL of an absent id deletes zero entries; that is not an error.
        let _deleted: i64 = redis::cmd("XDEL")
            .arg(stream_key)
            .arg(id)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn get_unprocessed_stream_message_count(&self, stream_key: &str) -> CacheResult<u64> {
        let mut conn = self.connection().await?;
        let length: u64 = redis::cmd("XLEN")
            .arg(stream_key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(length)
    }

    async fn get_streams(&self) -> CacheResult<Vec<String>> {
        let mut conn = self.connection().await?;
        let streams: Vec<String> = conn
            .smembers(STREAMS_SET_KEY)
            .await
            .map_err(map_redis_error)?;
        Ok(streams)
    }

    async fn get_stream_storage(&self, stream_key: &str) -> CacheResult<StreamStorage> {
        let storage_key = Self::storage_key(stream_key);

        let mut conn = self.connection().await?;
        let raw: Option<String> = conn
            .get(&storage_key)
            .await
            .map_err(map_redis_error)?;

        // A stream existing does not imply its metadata does.
        let raw = raw.ok_or_else(|| CacheError::NotFound(storage_key.clone()))?;

        serde_json::from_str(&raw)
            .map_err(|e| CacheError::Decode(format!("{storage_key}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streamer_message_keys_are_height_addressed() {
        assert_eq!(
            RedisStreamClient::streamer_message_key(85376002),
            "streamer_message:85376002"
        );
    }

    #[test]
    fn storage_keys_suffix_the_stream_key() {
        assert_eq!(
            RedisStreamClient::storage_key("morgs.near/social_feed:block_stream"),
            "morgs.near/social_feed:block_stream:storage"
        );
    }

    #[test]
    fn default_config_targets_local_redis() {
        assert_eq!(RedisConfig::default().url, "redis://127.0.0.1:6379");
    }
}
