//! Core domain layer for the Cadence indexing runner.
//!
//! This crate contains the domain models, port traits (interfaces), and
//! business logic services for the NEAR data-lake indexing runner. It
//! follows hexagonal architecture principles - this is the innermost
//! layer with no dependencies on infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     cadence (binary)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │   cadence-lake    │   cadence-cache    │ cadence-provisioner│
//! │  (object store)   │      (Redis)       │  (Postgres/Hasura) │
//! ├───────────────────┴────────────────────┴────────────────────┤
//! │                     cadence-core  ← YOU ARE HERE            │
//! │               (models, ports, services)                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Domain models (Block, StreamerMessage, tasks, etc.)
//! - [`identity`] - Tenant identity and derived naming scheme
//! - [`ports`] - Interface traits for adapters to implement
//! - [`services`] - Core business logic (StreamConsumer)
//! - [`error`] - Domain error types
//! - [`metrics`] - Prometheus metrics definitions
//!
//! # Key Concepts
//!
//! ## Ports
//!
//! Ports define interfaces that external adapters must implement:
//!
//! - [`ports::BlockSource`] - Produce assembled blocks by height
//! - [`ports::StreamStore`] - Redis-backed stream cache operations
//! - [`ports::BlockHandler`] - Per-tenant indexing workload
//! - [`ports::TaskStore`] - Provisioning task registry backing store
//!
//! ## Consumer Lifecycle
//!
//! 1. Poll the tenant stream for unprocessed heights
//! 2. Assemble the block at each height (cache-first, lake fallback)
//! 3. Hand the block to the tenant's workload
//! 4. Acknowledge the entry by deleting it
//! 5. Record backlog and throughput metrics

pub mod error;
pub mod identity;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod services;
