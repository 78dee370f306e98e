//! Port trait for block production.
//!
//! This trait defines the interface for obtaining fully assembled blocks
//! by height. The production implementation lives in the infrastructure
//! layer (`cadence-lake`) and composes a cache lookup with object-store
//! fan-out; the consumer service only sees this seam.

use async_trait::async_trait;

use crate::error::FetchResult;
use crate::models::{Block, BlockHeight};

/// Port trait for block production.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Produce the fully assembled block at `height`.
    ///
    /// A block is either complete or the call fails - implementations
    /// must never return partially assembled data.
    async fn fetch_block(&self, height: BlockHeight) -> FetchResult<Block>;
}
