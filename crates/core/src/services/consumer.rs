//! Stream consumer service - drives one tenant's indexing workload.
//!
//! Polls the tenant's append-only height stream, assembles each block,
//! hands it to the workload, and acknowledges by deletion. An entry is
//! only deleted after the workload succeeds, so a crash or failure at any
//! point re-delivers the same height on a later poll (at-least-once,
//! delete-after-process).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{ConsumerError, ConsumerResult};
use crate::identity::TenantIdentity;
use crate::metrics::{record_block_processed, record_handler_error, record_stream_backlog};
use crate::models::StreamMessage;
use crate::ports::{BlockHandler, BlockSource, StreamStore};

/// Cursor addressing the origin of a stream.
///
/// Processed entries are deleted, so consumption always reads strictly
/// after the origin - the oldest surviving entry is the next one due.
const START_CURSOR: &str = "0";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for one stream consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Stream key this consumer drains.
    pub stream_key: String,
    /// Entries to claim per poll.
    pub batch_size: usize,
    /// Sleep between polls that return no data.
    pub poll_interval: Duration,
    /// First backoff delay after a stream read failure.
    pub initial_retry_delay: Duration,
    /// Backoff ceiling.
    pub max_retry_delay: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            stream_key: String::new(),
            batch_size: 1,
            poll_interval: Duration::from_millis(500),
            initial_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// StreamConsumer
// =============================================================================

/// Main consumer service for one tenant stream.
///
/// # Flow
///
/// 1. Poll the stream for the next unprocessed entries
/// 2. For each entry, assemble the block at its height
/// 3. Hand the block to the tenant's workload
/// 4. Acknowledge the entry by deleting it
/// 5. Record backlog and throughput metrics
///
/// Per-stream processing is serialized by construction: entries are
/// handled one at a time in stream order, and a failure stops the batch
/// so the failed height is retried before anything newer.
pub struct StreamConsumer<S: StreamStore, B: BlockSource> {
    config: ConsumerConfig,
    identity: TenantIdentity,
    store: Arc<S>,
    source: Arc<B>,
    handler: Arc<dyn BlockHandler>,
}

impl<S: StreamStore, B: BlockSource> StreamConsumer<S, B> {
    pub fn new(
        config: ConsumerConfig,
        identity: TenantIdentity,
        store: Arc<S>,
        source: Arc<B>,
        handler: Arc<dyn BlockHandler>,
    ) -> Self {
        Self {
            config,
            identity,
            store,
            source,
            handler,
        }
    }

    /// Drive the consumer until shutdown is requested.
    #[instrument(skip_all, fields(
        account_id = %self.identity.account_id,
        function_name = %self.identity.function_name,
    ))]
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> ConsumerResult<()> {
        info!(stream = %self.config.stream_key, "Starting stream consumer");

        let mut retry_delay = self.config.initial_retry_delay;

        loop {
            if *shutdown_rx.borrow() {
                debug!("Shutdown requested");
                return Err(ConsumerError::ShutdownRequested);
            }

            self.record_backlog().await;

            let read = self
                .store
                .get_stream_messages(&self.config.stream_key, START_CURSOR, self.config.batch_size)
                .await;

            match read {
                Ok(messages) if messages.is_empty() => {
                    retry_delay = self.config.initial_retry_delay;
                    if self.wait(self.config.poll_interval, &mut shutdown_rx).await {
                        return Err(ConsumerError::ShutdownRequested);
                    }
                }
                Ok(messages) => {
                    retry_delay = self.config.initial_retry_delay;
                    for message in &messages {
                        if *shutdown_rx.borrow() {
                            return Err(ConsumerError::ShutdownRequested);
                        }
                        match self.process_message(message).await {
                            Ok(()) => {
                                debug!(block = message.block_height, "Block processed");
                            }
                            Err(e) => {
                                warn!(
                                    block = message.block_height,
                                    error = %e,
                                    "Processing failed, entry left in stream for retry"
                                );
                                record_handler_error(&self.identity.account_id);
                                // Stop the batch so the failed height is
                                // retried before anything newer.
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_ms = retry_delay.as_millis(),
                        "Stream read failed, backing off"
                    );
                    if self.wait(retry_delay, &mut shutdown_rx).await {
                        return Err(ConsumerError::ShutdownRequested);
                    }
                    retry_delay = (retry_delay * 2).min(self.config.max_retry_delay);
                }
            }
        }
    }

    /// Assemble, hand off, and acknowledge one stream entry.
    #[instrument(skip_all, fields(block = message.block_height))]
    async fn process_message(&self, message: &StreamMessage) -> ConsumerResult<()> {
        trace!("Processing stream entry");

        let block = self.source.fetch_block(message.block_height).await?;
        self.handler.handle_block(&block).await?;
        self.store
            .delete_stream_message(&self.config.stream_key, &message.id)
            .await?;

        record_block_processed();
        Ok(())
    }

    /// Sleep for `delay`, waking early on shutdown. Returns true when
    /// shutdown was requested.
    async fn wait(&self, delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            changed = shutdown_rx.changed() => changed.is_err() || *shutdown_rx.borrow(),
        }
    }

    /// Export the stream backlog gauge. Probe failures are not worth more
    /// than a trace - the next loop iteration probes again.
    async fn record_backlog(&self) {
        match self
            .store
            .get_unprocessed_stream_message_count(&self.config.stream_key)
            .await
        {
            Ok(backlog) => record_stream_backlog(&self.config.stream_key, backlog),
            Err(e) => trace!(error = %e, "Backlog probe failed"),
        }
    }
}
