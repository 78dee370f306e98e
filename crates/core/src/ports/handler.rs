//! Port trait for indexing workloads.
//!
//! This is the seam where user-defined indexing logic attaches to the
//! runner. The consumer service hands each assembled block to exactly one
//! handler and acknowledges the stream entry only after the handler
//! returns success.

use async_trait::async_trait;

use crate::error::HandlerResult;
use crate::models::Block;

/// Trait for per-tenant block consumers.
#[async_trait]
pub trait BlockHandler: Send + Sync {
    /// Process one assembled block.
    ///
    /// Returning an error leaves the stream entry unacknowledged; the
    /// consumer will hand the same height over again on a later poll.
    async fn handle_block(&self, block: &Block) -> HandlerResult<()>;
}
