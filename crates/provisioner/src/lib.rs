//! Multi-tenant Postgres/Hasura provisioning for the Cadence runner.
//!
//! Provisioning turns one tenant's configuration into a working backend:
//! a dedicated database and role, a Hasura source, the tenant schema and
//! tables, and full permissions on every table. The work is asynchronous
//! and tracked in a task registry exposed over gRPC.
//!
//! # Modules
//!
//! - [`hasura`] - metadata API client and metadata document types
//! - [`state`] - point-in-time provisioning state snapshot
//! - [`provision`] - idempotent plan execution
//! - [`registry`] - pending/completed/failed task registry
//! - [`rpc`] - gRPC service implementation
//! - [`proto`] - generated protobuf types

/// Generated protobuf types for the provisioning surface.
pub mod proto {
    tonic::include_proto!("provisioner");
}

pub mod hasura;
pub mod provision;
pub mod registry;
pub mod rpc;
pub mod state;

pub use hasura::{HasuraClient, HasuraConfig};
pub use provision::{Provisioner, ProvisionerConfig, ProvisioningBackend};
pub use registry::{InMemoryTaskStore, TaskRegistry};
pub use rpc::ProvisionerService;
pub use state::ProvisioningState;
