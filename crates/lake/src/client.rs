//! Cache-first lake client.
//!
//! Composes the stream cache (check) with the object-store fetcher
//! (fallback) into a single `fetch_block` operation producing an
//! immutable [`Block`]. The cache is read-through only - population is an
//! external producer's responsibility.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{instrument, warn};

use cadence_core::error::FetchResult;
use cadence_core::metrics::{record_cache_hit, record_cache_miss, FetchTimer};
use cadence_core::models::{Block, BlockHeight, StreamerMessage};
use cadence_core::ports::{BlockSource, StreamStore};

use crate::fetcher::ObjectStore;

/// Cache-first block client implementing the [`BlockSource`] port.
pub struct LakeClient<S: StreamStore, F: ObjectStore> {
    cache: Arc<S>,
    fetcher: Arc<F>,
}

impl<S: StreamStore, F: ObjectStore> LakeClient<S, F> {
    pub fn new(cache: Arc<S>, fetcher: Arc<F>) -> Self {
        Self { cache, fetcher }
    }

    /// Try to serve the block from the cache. `None` means fall through
    /// to the object store - on a transport failure or a corrupt entry
    /// the lake remains the source of truth.
    async fn from_cache(&self, height: BlockHeight) -> Option<Block> {
        let raw = match self.cache.get_streamer_message(height).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(height, error = %e, "Cache lookup failed, falling back to object store");
                return None;
            }
        };

        match serde_json::from_str::<StreamerMessage>(&raw) {
            Ok(message) => Some(Block::new(message)),
            Err(e) => {
                warn!(height, error = %e, "Cached streamer message is corrupt, refetching");
                None
            }
        }
    }

    /// Assemble the block from the object store.
    ///
    /// The block object is fetched first to learn the shard count, then
    /// every shard is fetched concurrently. `try_join_all` fails fast:
    /// the first shard error drops the sibling futures and fails the
    /// whole call - a block is either fully assembled or absent.
    async fn from_object_store(&self, height: BlockHeight) -> FetchResult<Block> {
        let block = self.fetcher.fetch_block(height).await?;

        let shard_count = block.chunks.len() as u64;
        let shards = try_join_all(
            (0..shard_count).map(|shard_id| self.fetcher.fetch_shard(height, shard_id)),
        )
        .await?;

        // try_join_all preserves input order, so shard order is the shard
        // index regardless of fetch completion order.
        Ok(Block::new(StreamerMessage { block, shards }))
    }
}

#[async_trait]
impl<S: StreamStore, F: ObjectStore> BlockSource for LakeClient<S, F> {
    #[instrument(skip(self))]
    async fn fetch_block(&self, height: BlockHeight) -> FetchResult<Block> {
        let _timer = FetchTimer::new();

        if let Some(block) = self.from_cache(height).await {
            record_cache_hit();
            return Ok(block);
        }

        record_cache_miss();
        self.from_object_store(height).await
    }
}
