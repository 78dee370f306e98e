//! Redis-backed stream cache for the Cadence indexing runner.
//!
//! Implements the `cadence-core` [`StreamStore`] port over three
//! keyspaces:
//!
//! - `streamer_message:{height}` - pre-assembled streamer messages
//! - `streams` - the set of registered stream keys (tenant discovery)
//! - `{stream_key}` / `{stream_key}:storage` - per-tenant append-only
//!   height streams and their metadata documents
//!
//! [`StreamStore`]: cadence_core::ports::StreamStore

pub mod redis_client;

pub use redis_client::{RedisConfig, RedisStreamClient};
