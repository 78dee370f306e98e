//! Object-store fetcher for raw lake block and shard objects.
//!
//! The lake is laid out as one bucket per network
//! (`near-lake-data-{network}`) with one prefix per height:
//! `{height:012}/block.json` and `{height:012}/shard_{n}.json`. Values
//! are JSON documents with snake_case field names at rest; every fetch
//! normalizes keys to camelCase in the same parse pass.
//!
//! Retry lives here and only here: the policy is an explicit constructor
//! parameter applied inside the transport layer. A `FetchError` that
//! escapes this module means the retry budget is already spent, and no
//! caller above retries again.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use cadence_core::error::{FetchError, FetchResult};
use cadence_core::models::{camel, BlockHeight, BlockPayload, ShardPayload};

// =============================================================================
// Configuration
// =============================================================================

/// Bounded exponential backoff applied to each object fetch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per object, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Delay ceiling.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Configuration for the object-store fetcher.
#[derive(Debug, Clone)]
pub struct LakeConfig {
    /// Network the lake bucket belongs to (e.g. "mainnet", "testnet").
    pub network: String,
    /// Endpoint override for S3-compatible stores (MinIO, localstack).
    /// `None` addresses AWS S3 directly.
    pub endpoint: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Retry policy for each object fetch.
    pub retry: RetryPolicy,
}

impl Default for LakeConfig {
    fn default() -> Self {
        Self {
            network: "mainnet".to_string(),
            endpoint: None,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl LakeConfig {
    /// Bucket this configuration addresses.
    pub fn bucket(&self) -> String {
        format!("near-lake-data-{}", self.network)
    }
}

// =============================================================================
// ObjectStore seam
// =============================================================================

/// Raw payload access by height, the seam between the lake client and the
/// transport below it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch and normalize the block object at `height`.
    async fn fetch_block(&self, height: BlockHeight) -> FetchResult<BlockPayload>;

    /// Fetch and normalize one shard object at `height`.
    async fn fetch_shard(&self, height: BlockHeight, shard_id: u64) -> FetchResult<ShardPayload>;
}

// =============================================================================
// ObjectStoreFetcher
// =============================================================================

/// S3-compatible HTTP fetcher for lake objects.
pub struct ObjectStoreFetcher {
    http: Client,
    config: LakeConfig,
}

impl ObjectStoreFetcher {
    /// Build a fetcher with the given configuration.
    pub fn new(config: LakeConfig) -> FetchResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        debug!(bucket = %config.bucket(), "Object store fetcher ready");

        Ok(Self { http, config })
    }

    /// Object key for the block document at `height`.
    fn block_key(height: BlockHeight) -> String {
        format!("{height:012}/block.json")
    }

    /// Object key for one shard document at `height`.
    fn shard_key(height: BlockHeight, shard_id: u64) -> String {
        format!("{height:012}/shard_{shard_id}.json")
    }

    /// Resolve the URL for a key, honoring the endpoint override.
    fn object_url(&self, key: &str) -> String {
        let bucket = self.config.bucket();
        match &self.config.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
            None => format!("https://{bucket}.s3.amazonaws.com/{key}"),
        }
    }

    /// Fetch one object, normalizing keys in the parse pass.
    async fn get_normalized(&self, key: &str) -> FetchResult<Value> {
        let bytes = self.get_object(key).await?;
        camel::from_slice(&bytes).map_err(|e| FetchError::Decode {
            bucket: self.config.bucket(),
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Fetch one object's bytes, applying the configured retry policy.
    async fn get_object(&self, key: &str) -> FetchResult<Vec<u8>> {
        let url = self.object_url(key);
        let attempts = self.config.retry.max_attempts.max(1);
        let mut delay = self.config.retry.base_delay;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.try_get(&url, key).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    warn!(key, attempt, error = %e, "Object fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.config.retry.max_delay);
                }
            }
        }
    }

    /// One GET attempt, without retry.
    async fn try_get(&self, url: &str, key: &str) -> FetchResult<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                bucket: self.config.bucket(),
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                bucket: self.config.bucket(),
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::Transport {
            bucket: self.config.bucket(),
            key: key.to_string(),
            message: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ObjectStore for ObjectStoreFetcher {
    #[instrument(skip(self))]
    async fn fetch_block(&self, height: BlockHeight) -> FetchResult<BlockPayload> {
        let key = Self::block_key(height);
        let value = self.get_normalized(&key).await?;
        serde_json::from_value(value).map_err(|e| FetchError::Decode {
            bucket: self.config.bucket(),
            key,
            message: e.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn fetch_shard(&self, height: BlockHeight, shard_id: u64) -> FetchResult<ShardPayload> {
        let key = Self::shard_key(height, shard_id);
        let value = self.get_normalized(&key).await?;
        serde_json::from_value(value).map_err(|e| FetchError::Decode {
            bucket: self.config.bucket(),
            key,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_keys_are_zero_padded_to_width_12() {
        assert_eq!(ObjectStoreFetcher::block_key(1), "000000000001/block.json");
        assert_eq!(
            ObjectStoreFetcher::block_key(85_376_002),
            "000085376002/block.json"
        );
        // Une hauteur plus large que 12 chiffres n'est pas tronquée
        assert_eq!(
            ObjectStoreFetcher::block_key(1_000_000_000_000),
            "1000000000000/block.json"
        );
    }

    #[test]
    fn shard_keys_carry_shard_index() {
        assert_eq!(
            ObjectStoreFetcher::shard_key(42, 3),
            "000000000042/shard_3.json"
        );
    }

    #[test]
    fn bucket_follows_network_convention() {
        let config = LakeConfig {
            network: "testnet".into(),
            ..Default::default()
        };
        assert_eq!(config.bucket(), "near-lake-data-testnet");
    }

    #[test]
    fn endpoint_override_uses_path_style_addressing() {
        let fetcher = ObjectStoreFetcher::new(LakeConfig {
            endpoint: Some("http://localhost:9000/".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            fetcher.object_url("000000000001/block.json"),
            "http://localhost:9000/near-lake-data-mainnet/000000000001/block.json"
        );
    }

    #[test]
    fn default_addressing_is_virtual_hosted() {
        let fetcher = ObjectStoreFetcher::new(LakeConfig::default()).unwrap();
        assert_eq!(
            fetcher.object_url("000000000001/block.json"),
            "https://near-lake-data-mainnet.s3.amazonaws.com/000000000001/block.json"
        );
    }
}
