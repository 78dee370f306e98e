//! gRPC surface for the provisioning task registry.
//!
//! `Provision` admits a task and returns immediately; callers poll
//! `CheckProvisioningTaskStatus` until the task reaches a terminal
//! status. The remote pre-check ("is this tenant already provisioned?")
//! only runs when no local task is tracked, to avoid redundant remote
//! calls.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{error, info, instrument};

use cadence_core::identity::TenantIdentity;
use cadence_core::metrics::record_provisioning_outcome;
use cadence_core::models::TaskPhase;

use crate::proto::provisioner_server::Provisioner as ProvisionerRpc;
use crate::proto::{
    CheckTaskStatusRequest, CheckTaskStatusResponse, ProvisionRequest, ProvisionResponse,
    TaskStatus,
};
use crate::provision::ProvisioningBackend;
use crate::registry::TaskRegistry;

/// gRPC service implementation.
pub struct ProvisionerService {
    registry: Arc<TaskRegistry>,
    backend: Arc<dyn ProvisioningBackend>,
}

impl ProvisionerService {
    pub fn new(registry: Arc<TaskRegistry>, backend: Arc<dyn ProvisioningBackend>) -> Self {
        Self { registry, backend }
    }
}

fn phase_status(phase: TaskPhase) -> TaskStatus {
    match phase {
        TaskPhase::Pending => TaskStatus::Pending,
        TaskPhase::Completed => TaskStatus::Complete,
        TaskPhase::Failed => TaskStatus::Failed,
    }
}

#[tonic::async_trait]
impl ProvisionerRpc for ProvisionerService {
    #[instrument(skip_all, fields(account_id = %request.get_ref().account_id))]
    async fn provision(
        &self,
        request: Request<ProvisionRequest>,
    ) -> Result<Response<ProvisionResponse>, Status> {
        let req = request.into_inner();
        let identity = TenantIdentity::new(req.account_id, req.function_name);
        let key = identity.task_key();

        match self.registry.get(&key) {
            Some(task) => match task.phase {
                TaskPhase::Pending => {
                    return Err(Status::already_exists(format!(
                        "Provisioning already in progress for {identity}"
                    )));
                }
                TaskPhase::Completed => {
                    return Err(Status::already_exists(format!(
                        "{identity} is already provisioned"
                    )));
                }
                // A failed attempt may be retried.
                TaskPhase::Failed => {}
            },
            // No local task: consult the backend before admitting work.
            None => match self.backend.is_provisioned(&identity).await {
                Ok(true) => {
                    return Err(Status::already_exists(format!(
                        "{identity} is already provisioned"
                    )));
                }
                Ok(false) => {}
                Err(e) => return Err(Status::internal(e.to_string())),
            },
        }

        if !self.registry.try_begin(&key) {
            // A concurrent request won the race since the check above.
            return Err(Status::already_exists(format!(
                "Provisioning already in progress for {identity}"
            )));
        }

        info!(tenant = %identity, "Provisioning task admitted");

        let registry = self.registry.clone();
        let backend = self.backend.clone();
        let ddl = req.schema;
        tokio::spawn(async move {
            match backend.provision(&identity, &ddl).await {
                Ok(()) => {
                    info!(tenant = %identity, "Provisioning completed");
                    record_provisioning_outcome("completed");
                    registry.complete(&key);
                }
                Err(e) => {
                    error!(tenant = %identity, error = %e, "Provisioning failed");
                    record_provisioning_outcome("failed");
                    registry.fail(&key, e.to_string());
                }
            }
        });

        Ok(Response::new(ProvisionResponse {
            status: TaskStatus::Pending as i32,
        }))
    }

    #[instrument(skip_all, fields(account_id = %request.get_ref().account_id))]
    async fn check_provisioning_task_status(
        &self,
        request: Request<CheckTaskStatusRequest>,
    ) -> Result<Response<CheckTaskStatusResponse>, Status> {
        let req = request.into_inner();
        let identity = TenantIdentity::new(req.account_id, req.function_name);

        let task = self
            .registry
            .get(&identity.task_key())
            .ok_or_else(|| Status::not_found(format!("No provisioning task for {identity}")))?;

        Ok(Response::new(CheckTaskStatusResponse {
            status: phase_status(task.phase) as i32,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tonic::Code;

    use cadence_core::error::{ProvisioningError, ProvisioningResult};

    use crate::registry::InMemoryTaskStore;

    enum Behavior {
        /// Pre-check false, work never finishes.
        Hanging,
        /// Pre-check false, work succeeds immediately.
        Quick,
        /// Pre-check reports already provisioned.
        AlreadyProvisioned,
        /// Pre-check itself errors.
        PrecheckError,
    }

    struct MockBackend {
        behavior: Behavior,
        prechecks: AtomicUsize,
    }

    impl MockBackend {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                prechecks: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProvisioningBackend for MockBackend {
        async fn is_provisioned(&self, _identity: &TenantIdentity) -> ProvisioningResult<bool> {
            self.prechecks.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::AlreadyProvisioned => Ok(true),
                Behavior::PrecheckError => {
                    Err(ProvisioningError::Metadata("metadata export failed".into()))
                }
                _ => Ok(false),
            }
        }

        async fn provision(
            &self,
            _identity: &TenantIdentity,
            _ddl: &str,
        ) -> ProvisioningResult<()> {
            match self.behavior {
                Behavior::Hanging => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                _ => Ok(()),
            }
        }
    }

    fn service(backend: MockBackend) -> (ProvisionerService, Arc<TaskRegistry>, Arc<MockBackend>) {
        let registry = Arc::new(TaskRegistry::new(Arc::new(InMemoryTaskStore::new())));
        let backend = Arc::new(backend);
        (
            ProvisionerService::new(registry.clone(), backend.clone()),
            registry,
            backend,
        )
    }

    fn provision_request() -> Request<ProvisionRequest> {
        Request::new(ProvisionRequest {
            account_id: "morgs.near".into(),
            function_name: "social_feed".into(),
            schema: "CREATE TABLE posts (id SERIAL PRIMARY KEY);".into(),
        })
    }

    fn status_request() -> Request<CheckTaskStatusRequest> {
        Request::new(CheckTaskStatusRequest {
            account_id: "morgs.near".into(),
            function_name: "social_feed".into(),
        })
    }

    // Test critique: le deuxième Provision échoue ALREADY_EXISTS sans
    // réinterroger le backend distant
    #[tokio::test]
    async fn second_provision_skips_the_remote_precheck() {
        let (service, _registry, backend) = service(MockBackend::new(Behavior::Hanging));

        let first = service.provision(provision_request()).await.unwrap();
        assert_eq!(first.get_ref().status, TaskStatus::Pending as i32);
        assert_eq!(backend.prechecks.load(Ordering::SeqCst), 1);

        let second = service.provision(provision_request()).await.unwrap_err();
        assert_eq!(second.code(), Code::AlreadyExists);
        // Pas d'appel distant supplémentaire
        assert_eq!(backend.prechecks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn provisioned_backend_yields_already_exists() {
        let (service, _registry, _backend) =
            service(MockBackend::new(Behavior::AlreadyProvisioned));

        let err = service.provision(provision_request()).await.unwrap_err();
        assert_eq!(err.code(), Code::AlreadyExists);
    }

    #[tokio::test]
    async fn precheck_error_yields_internal_with_detail() {
        let (service, _registry, _backend) = service(MockBackend::new(Behavior::PrecheckError));

        let err = service.provision(provision_request()).await.unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert!(err.message().contains("metadata export failed"));
    }

    #[tokio::test]
    async fn status_is_not_found_without_a_task() {
        let (service, _registry, _backend) = service(MockBackend::new(Behavior::Quick));

        let err = service
            .check_provisioning_task_status(status_request())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn successful_work_reaches_complete_status() {
        let (service, _registry, _backend) = service(MockBackend::new(Behavior::Quick));

        service.provision(provision_request()).await.unwrap();

        // Le worker est asynchrone; on attend la transition terminale
        let mut status = TaskStatus::Pending as i32;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = service
                .check_provisioning_task_status(status_request())
                .await
                .unwrap()
                .get_ref()
                .status;
            if status != TaskStatus::Pending as i32 {
                break;
            }
        }
        assert_eq!(status, TaskStatus::Complete as i32);
    }

    #[tokio::test]
    async fn failed_task_is_reported_and_readmitted() {
        let (service, registry, _backend) = service(MockBackend::new(Behavior::Quick));
        // Simule un échec antérieur
        assert!(registry.try_begin("morgs.near:social_feed"));
        registry.fail("morgs.near:social_feed", "boom");

        let status = service
            .check_provisioning_task_status(status_request())
            .await
            .unwrap();
        assert_eq!(status.get_ref().status, TaskStatus::Failed as i32);

        // Un tenant en échec peut retenter
        let response = service.provision(provision_request()).await.unwrap();
        assert_eq!(response.get_ref().status, TaskStatus::Pending as i32);
    }
}
