//! Error types for the runner domain layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`FetchError`] - Object-store fetch errors
//! - [`CacheError`] - Redis stream cache errors
//! - [`HandlerError`] - Indexing workload errors
//! - [`ProvisioningError`] - Tenant provisioning errors
//! - [`ConsumerError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Fetch Errors
// =============================================================================

/// Object-store fetch failures.
///
/// Every fetch-path variant carries the bucket and key that failed so a
/// single log line identifies the exact remote object. Fetches are not
/// retried above the transport layer - a surfaced `FetchError` means the
/// configured retry budget is already exhausted.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP client could not be constructed.
    #[error("Object store client error: {0}")]
    Client(String),

    /// Transport-level failure (connect, timeout, body read).
    #[error("Fetch failed for s3://{bucket}/{key}: {message}")]
    Transport {
        /// Bucket the request was issued against.
        bucket: String,
        /// Object key that failed.
        key: String,
        /// Underlying transport error.
        message: String,
    },

    /// The store answered with a non-success status code.
    #[error("Unexpected status {status} for s3://{bucket}/{key}")]
    Status {
        /// Bucket the request was issued against.
        bucket: String,
        /// Object key that failed.
        key: String,
        /// HTTP status code returned by the store.
        status: u16,
    },

    /// The object body could not be decoded into the expected payload.
    #[error("Failed to decode s3://{bucket}/{key}: {message}")]
    Decode {
        /// Bucket the request was issued against.
        bucket: String,
        /// Object key that failed.
        key: String,
        /// Decoding error details.
        message: String,
    },
}

// =============================================================================
// Cache Errors
// =============================================================================

/// Redis stream cache errors.
///
/// "Key has no value" is deliberately distinct from transport failure:
/// [`CacheError::NotFound`] means the cache answered and the key is empty,
/// while [`CacheError::Connection`] means the cache could not be reached
/// at all.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key has no value (a definitive miss, not a failure).
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The connection or pool is unavailable.
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// A command was issued and rejected by the cache.
    #[error("Cache command error: {0}")]
    Command(String),

    /// A stored value could not be decoded.
    #[error("Cache decode error: {0}")]
    Decode(String),
}

// =============================================================================
// Handler Errors
// =============================================================================

/// Errors raised by indexing workloads consuming blocks.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The workload rejected or failed to process the block.
    #[error("Handler failed: {0}")]
    Failed(String),

    /// Block data could not be decoded into the shape the workload expects.
    #[error("Decoding error: {0}")]
    Decode(String),
}

// =============================================================================
// Provisioning Errors
// =============================================================================

/// Tenant provisioning errors.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// Metadata export/apply call failed.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// SQL execution against the tenant backend failed.
    #[error("SQL error: {0}")]
    Sql(String),

    /// Transport-level failure reaching the provisioning backend.
    #[error("Provisioning transport error: {0}")]
    Transport(String),

    /// Unexpected internal failure.
    #[error("Internal provisioning error: {0}")]
    Internal(String),
}

// =============================================================================
// Consumer Errors
// =============================================================================

/// Top-level stream consumer orchestration errors.
///
/// This is the main error type returned by
/// [`crate::services::StreamConsumer`]. It wraps all lower-level errors
/// and adds consumer-specific variants.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Block fetch/assembly error.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Stream cache error.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Indexing workload error.
    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Graceful shutdown was requested.
    ///
    /// This is not really an error but uses the error type for control flow.
    #[error("Consumer shutdown requested")]
    ShutdownRequested,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for object-store fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type for indexing workloads.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Result type for provisioning operations.
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

/// Result type for consumer operations.
pub type ConsumerResult<T> = Result<T, ConsumerError>;

#[cfg(test)]
mod tests {
    use super::*;

    // Test critique: la chaîne de conversion d'erreurs fonctionne
    // Permet d'utiliser ? à travers les couches
    #[test]
    fn test_error_conversion_chain() {
        // Fetch -> Consumer
        let fetch_err = FetchError::Transport {
            bucket: "near-lake-data-mainnet".into(),
            key: "000000000001/block.json".into(),
            message: "connection reset".into(),
        };
        let consumer_err: ConsumerError = fetch_err.into();
        assert!(consumer_err.to_string().contains("connection reset"));

        // Cache -> Consumer
        let cache_err = CacheError::Command("WRONGTYPE".into());
        let consumer_err: ConsumerError = cache_err.into();
        assert!(consumer_err.to_string().contains("WRONGTYPE"));
    }

    // Test critique: FetchError identifie l'objet exact qui a échoué
    #[test]
    fn test_fetch_error_includes_bucket_and_key() {
        let err = FetchError::Status {
            bucket: "near-lake-data-testnet".into(),
            key: "000000000042/shard_3.json".into(),
            status: 403,
        };
        let msg = err.to_string();
        assert!(msg.contains("near-lake-data-testnet"));
        assert!(msg.contains("shard_3.json"));
        assert!(msg.contains("403"));
    }

    #[test]
    fn test_not_found_is_distinct_from_connection() {
        let not_found = CacheError::NotFound("streams".into());
        let connection = CacheError::Connection("pool exhausted".into());
        assert!(not_found.to_string().contains("not found"));
        assert!(!connection.to_string().contains("not found"));
    }
}
