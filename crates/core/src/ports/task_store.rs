//! Port trait for the provisioning task registry's backing store.
//!
//! Modeled as an explicit injected store rather than a module-level
//! singleton so tests get per-case isolation and a durable/shared backend
//! can be swapped in later. Operations are synchronous single map writes;
//! implementations guard their map with a lock because the runtime is
//! multi-threaded.

use crate::models::ProvisioningTask;

/// Port trait for provisioning task storage, keyed by
/// [`crate::identity::TenantIdentity::task_key`].
pub trait TaskStore: Send + Sync {
    /// Current task for a tenant key, if any.
    fn get(&self, key: &str) -> Option<ProvisioningTask>;

    /// Record the task for a tenant key, replacing any previous value.
    fn set(&self, key: &str, task: ProvisioningTask);

    /// Remove the task for a tenant key.
    fn delete(&self, key: &str);
}
