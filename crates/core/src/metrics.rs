//! Metrics definitions for the runner.
//!
//! This module defines all metrics used throughout the runner.
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "lake_cache_hits_total",
        "Streamer messages served from the cache"
    );
    describe_counter!(
        "lake_cache_misses_total",
        "Streamer messages assembled from the object store"
    );
    describe_histogram!(
        "block_fetch_duration_seconds",
        "Time taken to produce a block (cache or object store) in seconds"
    );
    describe_counter!(
        "blocks_processed_total",
        "Blocks successfully handed to an indexing workload"
    );
    describe_counter!(
        "handler_errors_total",
        "Errors raised by indexing workloads while processing blocks"
    );
    describe_gauge!(
        "stream_backlog",
        "Unprocessed entries remaining in a tenant stream"
    );
    describe_counter!(
        "provisioning_tasks_total",
        "Provisioning tasks by terminal outcome"
    );
}

/// Record a streamer-message cache hit.
pub fn record_cache_hit() {
    counter!("lake_cache_hits_total").increment(1);
}

/// Record a streamer-message cache miss.
pub fn record_cache_miss() {
    counter!("lake_cache_misses_total").increment(1);
}

/// Record a block handed off to its indexing workload.
pub fn record_block_processed() {
    counter!("blocks_processed_total").increment(1);
}

/// Record an indexing workload error.
///
/// # Arguments
/// * `account_id` - The tenant account the workload belongs to
pub fn record_handler_error(account_id: &str) {
    counter!("handler_errors_total", "account_id" => account_id.to_string()).increment(1);
}

/// Record the current backlog of a tenant stream.
///
/// # Arguments
/// * `stream_key` - The stream the backlog was measured on
/// * `backlog` - Number of unprocessed entries
pub fn record_stream_backlog(stream_key: &str, backlog: u64) {
    gauge!("stream_backlog", "stream" => stream_key.to_string()).set(backlog as f64);
}

/// Record a provisioning task reaching a terminal phase.
///
/// # Arguments
/// * `outcome` - "completed" or "failed"
pub fn record_provisioning_outcome(outcome: &'static str) {
    counter!("provisioning_tasks_total", "outcome" => outcome).increment(1);
}

/// Record block fetch duration.
pub fn record_block_fetch_duration(duration_secs: f64) {
    histogram!("block_fetch_duration_seconds").record(duration_secs);
}

/// A timer that automatically records fetch duration when dropped.
pub struct FetchTimer {
    start: Instant,
}

impl FetchTimer {
    /// Start a new fetch timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for FetchTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FetchTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_block_fetch_duration(duration);
    }
}
