//! Default block handler for discovered tenant streams.

use async_trait::async_trait;
use tracing::{debug, info};

use cadence_core::error::HandlerResult;
use cadence_core::identity::{LogLevel, TenantIdentity};
use cadence_core::models::Block;
use cadence_core::ports::BlockHandler;

/// Records each delivered block under the tenant's configured verbosity.
///
/// This is the seam where an executor runtime attaches; running the
/// tenant's indexing code itself is outside this binary.
pub struct TracingBlockHandler {
    identity: TenantIdentity,
    log_level: LogLevel,
}

impl TracingBlockHandler {
    pub fn new(identity: TenantIdentity, log_level: LogLevel) -> Self {
        Self {
            identity,
            log_level,
        }
    }
}

#[async_trait]
impl BlockHandler for TracingBlockHandler {
    async fn handle_block(&self, block: &Block) -> HandlerResult<()> {
        match self.log_level {
            LogLevel::Debug => debug!(
                tenant = %self.identity,
                block = block.block_height(),
                hash = block.block_hash(),
                shards = block.shards().len(),
                actions = block.actions().len(),
                "Block delivered"
            ),
            LogLevel::Info => info!(
                tenant = %self.identity,
                block = block.block_height(),
                "Block delivered"
            ),
            // The tenant asked for warnings and errors only; a delivered
            // block is neither.
            LogLevel::Warn | LogLevel::Error => {}
        }
        Ok(())
    }
}
