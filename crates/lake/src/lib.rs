//! Lake access layer for the Cadence indexing runner.
//!
//! This crate implements the `cadence-core` [`BlockSource`] port on top of
//! two collaborators:
//!
//! - [`fetcher::ObjectStoreFetcher`] - raw block/shard objects from the
//!   S3-compatible lake, with key normalization and a bounded retry policy
//! - [`client::LakeClient`] - cache-first composition that consults the
//!   stream cache before falling back to object-store fan-out
//!
//! [`BlockSource`]: cadence_core::ports::BlockSource

pub mod client;
pub mod fetcher;

pub use client::LakeClient;
pub use fetcher::{LakeConfig, ObjectStore, ObjectStoreFetcher, RetryPolicy};
