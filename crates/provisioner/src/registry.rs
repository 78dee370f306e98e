//! Provisioning task registry.
//!
//! Tracks in-flight/completed/failed provisioning attempts per tenant
//! key. The backing store is injected (see
//! [`cadence_core::ports::TaskStore`]); the default is in-memory,
//! process-local, and non-durable by design - callers poll and re-issue
//! `Provision` after a restart if the record is gone.
//!
//! Phase transitions go PENDING -> (COMPLETE | FAILED) and terminal
//! phases are never revisited. Admission (get + set) is guarded by one
//! lock because the runtime is multi-threaded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use cadence_core::models::{ProvisioningTask, TaskPhase};
use cadence_core::ports::TaskStore;

// =============================================================================
// In-memory store
// =============================================================================

/// Default [`TaskStore`]: a mutex-guarded map.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<HashMap<String, ProvisioningTask>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, ProvisioningTask>> {
        // A poisoned lock only means another thread panicked mid-write;
        // the map itself is still usable.
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskStore for InMemoryTaskStore {
    fn get(&self, key: &str) -> Option<ProvisioningTask> {
        self.tasks().get(key).cloned()
    }

    fn set(&self, key: &str, task: ProvisioningTask) {
        self.tasks().insert(key.to_string(), task);
    }

    fn delete(&self, key: &str) {
        self.tasks().remove(key);
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Transition rules over an injected [`TaskStore`].
pub struct TaskRegistry {
    store: Arc<dyn TaskStore>,
    admission: Mutex<()>,
}

impl TaskRegistry {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            admission: Mutex::new(()),
        }
    }

    fn admission(&self) -> MutexGuard<'_, ()> {
        self.admission
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current task for a tenant key.
    pub fn get(&self, key: &str) -> Option<ProvisioningTask> {
        self.store.get(key)
    }

    /// Atomically admit a new attempt.
    ///
    /// Returns false when a PENDING or COMPLETED task already occupies
    /// the key; a FAILED task is replaced (failed attempts may be
    /// retried).
    pub fn try_begin(&self, key: &str) -> bool {
        let _guard = self.admission();
        match self.store.get(key) {
            Some(task) if task.phase != TaskPhase::Failed => false,
            _ => {
                self.store.set(key, ProvisioningTask::pending());
                true
            }
        }
    }

    /// Transition the task to COMPLETED.
    pub fn complete(&self, key: &str) {
        self.finish(key, ProvisioningTask::completed());
    }

    /// Transition the task to FAILED with detail.
    pub fn fail(&self, key: &str, message: impl Into<String>) {
        self.finish(key, ProvisioningTask::failed(message));
    }

    /// Apply a terminal phase. Only a PENDING task can reach a terminal
    /// phase - terminal tasks are never revisited.
    fn finish(&self, key: &str, task: ProvisioningTask) {
        let _guard = self.admission();
        match self.store.get(key) {
            Some(current) if current.phase == TaskPhase::Pending => {
                self.store.set(key, task);
            }
            other => {
                warn!(
                    key,
                    phase = ?other.map(|t| t.phase),
                    "Ignoring terminal transition for a task that is not pending"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TaskRegistry {
        TaskRegistry::new(Arc::new(InMemoryTaskStore::new()))
    }

    #[test]
    fn begin_then_complete() {
        let registry = registry();
        assert!(registry.try_begin("a.near:feed"));
        assert_eq!(
            registry.get("a.near:feed").unwrap().phase,
            TaskPhase::Pending
        );

        registry.complete("a.near:feed");
        assert_eq!(
            registry.get("a.near:feed").unwrap().phase,
            TaskPhase::Completed
        );
    }

    // Test critique: une tâche PENDING bloque toute nouvelle admission
    #[test]
    fn pending_task_blocks_admission() {
        let registry = registry();
        assert!(registry.try_begin("a.near:feed"));
        assert!(!registry.try_begin("a.near:feed"));
    }

    #[test]
    fn completed_task_blocks_admission() {
        let registry = registry();
        assert!(registry.try_begin("a.near:feed"));
        registry.complete("a.near:feed");
        assert!(!registry.try_begin("a.near:feed"));
    }

    #[test]
    fn failed_task_is_readmitted() {
        let registry = registry();
        assert!(registry.try_begin("a.near:feed"));
        registry.fail("a.near:feed", "schema creation failed");

        let task = registry.get("a.near:feed").unwrap();
        assert_eq!(task.phase, TaskPhase::Failed);
        assert_eq!(task.message.as_deref(), Some("schema creation failed"));

        assert!(registry.try_begin("a.near:feed"));
        assert_eq!(
            registry.get("a.near:feed").unwrap().phase,
            TaskPhase::Pending
        );
    }

    // Test critique: une phase terminale n'est jamais revisitée
    #[test]
    fn terminal_phase_is_never_revisited() {
        let registry = registry();
        assert!(registry.try_begin("a.near:feed"));
        registry.complete("a.near:feed");

        // Un fail tardif (worker zombie) ne doit pas écraser COMPLETED
        registry.fail("a.near:feed", "late failure");
        assert_eq!(
            registry.get("a.near:feed").unwrap().phase,
            TaskPhase::Completed
        );
    }

    #[test]
    fn keys_are_isolated() {
        let registry = registry();
        assert!(registry.try_begin("a.near:feed"));
        assert!(registry.try_begin("b.near:feed"));
        registry.complete("a.near:feed");
        assert_eq!(
            registry.get("b.near:feed").unwrap().phase,
            TaskPhase::Pending
        );
    }
}
