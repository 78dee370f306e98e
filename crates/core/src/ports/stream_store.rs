//! Port trait for the Redis-backed stream cache.
//!
//! Covers the three keyspaces the runner depends on: pre-assembled
//! streamer messages by height, per-tenant append-only height streams,
//! and per-stream storage metadata. The production implementation lives
//! in `cadence-cache`.

use async_trait::async_trait;

use crate::error::CacheResult;
use crate::models::{BlockHeight, StreamMessage, StreamStorage};

/// Port trait for the stream cache.
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Look up a pre-assembled streamer message by height.
    ///
    /// `None` is a cache miss, not an error.
    async fn get_streamer_message(&self, height: BlockHeight) -> CacheResult<Option<String>>;

    /// Read up to `count` entries strictly after `after_id`.
    ///
    /// Cursor-exclusive semantics consistent with append-only log reads;
    /// an empty vector means no new data.
    async fn get_stream_messages(
        &self,
        stream_key: &str,
        after_id: &str,
        count: usize,
    ) -> CacheResult<Vec<StreamMessage>>;

    /// Acknowledge a processed entry by removing it.
    ///
    /// Idempotent - deleting an id that is already gone is not an error.
    async fn delete_stream_message(&self, stream_key: &str, id: &str) -> CacheResult<()>;

    /// Current length of the stream (backlog approximation).
    async fn get_unprocessed_stream_message_count(&self, stream_key: &str) -> CacheResult<u64>;

    /// All registered stream keys (tenant discovery).
    async fn get_streams(&self) -> CacheResult<Vec<String>>;

    /// Storage metadata for one stream.
    ///
    /// Fails with [`crate::error::CacheError::NotFound`] when the storage
    /// key has no value - a stream existing does not imply its metadata
    /// does.
    async fn get_stream_storage(&self, stream_key: &str) -> CacheResult<StreamStorage>;
}
