//! Domain models for lake blocks, stream entries, and provisioning tasks.
//!
//! Block and shard payloads are opaque JSON documents with a handful of
//! known structural fields. The typed structs below expose those fields
//! and carry everything else through untouched via `#[serde(flatten)]`.
//! All payload field names are camelCase on the wire - raw lake objects
//! are normalized during parsing (see [`camel`]).

pub mod camel;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Block Addressing
// =============================================================================

/// The universal addressing key for fetch, cache, and provisioning-scoped
/// logging operations.
pub type BlockHeight = u64;

// =============================================================================
// Lake Payloads
// =============================================================================

/// Header fields of a block payload that this core relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeaderPayload {
    /// Chain height of the block.
    pub height: BlockHeight,
    /// Base58 block hash.
    pub hash: String,
    /// Hash of the parent block.
    #[serde(default)]
    pub prev_hash: Option<String>,
    /// Remaining header fields, carried opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One block object as stored in the lake (normalized to camelCase).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPayload {
    /// Validator that produced the block.
    #[serde(default)]
    pub author: Option<String>,
    pub header: BlockHeaderPayload,
    /// Chunk headers. Only the count is structural - one shard object
    /// exists per chunk.
    #[serde(default)]
    pub chunks: Vec<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One shard object as stored in the lake (normalized to camelCase).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardPayload {
    /// Index of this shard within its block.
    pub shard_id: u64,
    /// The chunk carried by this shard, if any.
    #[serde(default)]
    pub chunk: Option<Value>,
    /// Execution outcomes of receipts applied in this shard.
    #[serde(default)]
    pub receipt_execution_outcomes: Vec<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The combined block + shards unit representing one chain height.
///
/// Ephemeral and immutable - assembled per request and never persisted by
/// this core. Persistence, if any, is the stream cache's concern, keyed
/// by height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerMessage {
    pub block: BlockPayload,
    pub shards: Vec<ShardPayload>,
}

// =============================================================================
// Block
// =============================================================================

/// Immutable view over a [`StreamerMessage`] with convenience accessors.
///
/// Owned exclusively by the caller that requested it; no shared mutable
/// state.
#[derive(Debug, Clone)]
pub struct Block {
    message: StreamerMessage,
}

impl Block {
    pub fn new(message: StreamerMessage) -> Self {
        Self { message }
    }

    /// Chain height of this block.
    pub fn block_height(&self) -> BlockHeight {
        self.message.block.header.height
    }

    /// Base58 hash of this block.
    pub fn block_hash(&self) -> &str {
        &self.message.block.header.hash
    }

    /// Hash of the parent block, when present.
    pub fn prev_block_hash(&self) -> Option<&str> {
        self.message.block.header.prev_hash.as_deref()
    }

    /// Full block header.
    pub fn header(&self) -> &BlockHeaderPayload {
        &self.message.block.header
    }

    /// Shards in shard-index order.
    pub fn shards(&self) -> &[ShardPayload] {
        &self.message.shards
    }

    /// Chunk headers of the underlying block payload.
    pub fn chunks(&self) -> &[Value] {
        &self.message.block.chunks
    }

    /// Receipt execution outcomes across all shards, flattened in shard
    /// order.
    pub fn receipts(&self) -> Vec<&Value> {
        self.message
            .shards
            .iter()
            .flat_map(|shard| shard.receipt_execution_outcomes.iter())
            .collect()
    }

    /// Outcomes whose receipt carries an `Action` body.
    ///
    /// Payloads stay opaque - this filters on the known structural path
    /// `receipt.receipt.Action` without interpreting the action itself.
    pub fn actions(&self) -> Vec<&Value> {
        self.receipts()
            .into_iter()
            .filter(|outcome| {
                outcome
                    .pointer("/receipt/receipt/Action")
                    .is_some()
            })
            .collect()
    }

    /// The underlying streamer message.
    pub fn streamer_message(&self) -> &StreamerMessage {
        &self.message
    }
}

// =============================================================================
// Stream Entries
// =============================================================================

/// One entry in a tenant's append-only block-height stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Backend-assigned cursor. Monotonically comparable, never reused
    /// after deletion.
    pub id: String,
    /// Height the entry points at.
    pub block_height: BlockHeight,
}

/// Per-stream metadata document stored under `{stream_key}:storage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStorage {
    pub account_id: String,
    pub function_name: String,
    /// Opaque user-submitted indexing code.
    pub code: String,
    /// Opaque user-submitted DDL.
    pub schema: String,
}

// =============================================================================
// Provisioning Tasks
// =============================================================================

/// Lifecycle phase of a provisioning task.
///
/// Transitions PENDING -> (COMPLETE | FAILED) and never leaves a terminal
/// phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Pending,
    Completed,
    Failed,
}

impl TaskPhase {
    /// Whether this phase can never be left.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskPhase::Completed | TaskPhase::Failed)
    }
}

/// Tenant-keyed record of one asynchronous provisioning attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningTask {
    pub phase: TaskPhase,
    /// Failure detail when the task is [`TaskPhase::Failed`].
    #[serde(default)]
    pub message: Option<String>,
    /// When the phase last changed.
    pub updated_at: DateTime<Utc>,
}

impl ProvisioningTask {
    /// A freshly admitted task.
    pub fn pending() -> Self {
        Self {
            phase: TaskPhase::Pending,
            message: None,
            updated_at: Utc::now(),
        }
    }

    /// Terminal success.
    pub fn completed() -> Self {
        Self {
            phase: TaskPhase::Completed,
            message: None,
            updated_at: Utc::now(),
        }
    }

    /// Terminal failure with detail.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            phase: TaskPhase::Failed,
            message: Some(message.into()),
            updated_at: Utc::now(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn streamer_fixture() -> StreamerMessage {
        serde_json::from_value(json!({
            "block": {
                "author": "node0",
                "header": {
                    "height": 85376002,
                    "hash": "8bVcL4RDN1omHzMwh95GJtSRmoCDinnkDAkBPTyqWqH3",
                    "prevHash": "4p1VDMPcgpdxM1HxFJLqRWNZAKxgkbYVTzBPRueppCti",
                    "timestampNanosec": "1676998951559179455"
                },
                "chunks": [{"shardId": 0}, {"shardId": 1}]
            },
            "shards": [
                {
                    "shardId": 0,
                    "chunk": {"transactions": []},
                    "receiptExecutionOutcomes": [
                        {"receipt": {"receipt": {"Action": {"actions": []}}}}
                    ]
                },
                {
                    "shardId": 1,
                    "receiptExecutionOutcomes": [
                        {"receipt": {"receipt": {"Data": {}}}}
                    ]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn block_accessors_expose_header_fields() {
        let block = Block::new(streamer_fixture());
        assert_eq!(block.block_height(), 85376002);
        assert_eq!(
            block.block_hash(),
            "8bVcL4RDN1omHzMwh95GJtSRmoCDinnkDAkBPTyqWqH3"
        );
        assert_eq!(
            block.prev_block_hash(),
            Some("4p1VDMPcgpdxM1HxFJLqRWNZAKxgkbYVTzBPRueppCti")
        );
        assert_eq!(block.chunks().len(), 2);
        assert_eq!(block.shards().len(), 2);
    }

    #[test]
    fn unknown_payload_fields_survive_roundtrip() {
        let block = Block::new(streamer_fixture());
        // timestampNanosec n'est pas un champ structurel, il doit survivre
        assert!(block.header().extra.contains_key("timestampNanosec"));
    }

    #[test]
    fn receipts_flatten_in_shard_order() {
        let block = Block::new(streamer_fixture());
        assert_eq!(block.receipts().len(), 2);
    }

    #[test]
    fn actions_filter_on_action_receipts_only() {
        let block = Block::new(streamer_fixture());
        assert_eq!(block.actions().len(), 1);
    }

    #[test]
    fn task_phases_classify_terminality() {
        assert!(!TaskPhase::Pending.is_terminal());
        assert!(TaskPhase::Completed.is_terminal());
        assert!(TaskPhase::Failed.is_terminal());
    }

    #[test]
    fn failed_task_carries_detail() {
        let task = ProvisioningTask::failed("schema creation failed");
        assert_eq!(task.phase, TaskPhase::Failed);
        assert_eq!(task.message.as_deref(), Some("schema creation failed"));
    }

    #[test]
    fn stream_storage_parses_wire_document() {
        let storage: StreamStorage = serde_json::from_value(json!({
            "account_id": "morgs.near",
            "function_name": "social_feed",
            "code": "return block.blockHeight;",
            "schema": "CREATE TABLE posts (id SERIAL PRIMARY KEY);"
        }))
        .unwrap();
        assert_eq!(storage.account_id, "morgs.near");
        assert_eq!(storage.function_name, "social_feed");
    }
}
