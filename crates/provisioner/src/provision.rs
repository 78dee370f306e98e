//! Provisioning plan execution.
//!
//! Driven by one [`ProvisioningState`] snapshot, the plan applies only
//! the steps the snapshot says are missing:
//!
//! 1. no source  - create tenant database + role, register the source
//! 2. no schema  - create the schema, run the tenant's DDL
//! 3. track every created-but-untracked table
//! 4. grant full permissions to every table missing any of the four kinds
//!
//! Re-running the plan against an already provisioned tenant is a no-op.

use std::collections::HashSet;

use async_trait::async_trait;
use rand::RngCore;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

use cadence_core::error::{ProvisioningError, ProvisioningResult};
use cadence_core::identity::TenantIdentity;

use crate::hasura::HasuraClient;
use crate::state::ProvisioningState;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the provisioner.
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Host tenant databases live on, as Hasura should reach it.
    pub pg_host: String,
    /// Port of that host.
    pub pg_port: u16,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            pg_host: "localhost".to_string(),
            pg_port: 5432,
        }
    }
}

// =============================================================================
// Backend seam
// =============================================================================

/// The provisioning operations the RPC surface depends on.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    /// Whether the tenant's backend already reports provisioned.
    async fn is_provisioned(&self, identity: &TenantIdentity) -> ProvisioningResult<bool>;

    /// Run the idempotent provisioning plan for one tenant.
    async fn provision(&self, identity: &TenantIdentity, ddl: &str) -> ProvisioningResult<()>;
}

// =============================================================================
// Provisioner
// =============================================================================

/// Executes provisioning plans against Postgres and Hasura.
pub struct Provisioner {
    hasura: HasuraClient,
    admin_pool: PgPool,
    config: ProvisionerConfig,
}

impl Provisioner {
    pub fn new(hasura: HasuraClient, admin_pool: PgPool, config: ProvisionerConfig) -> Self {
        Self {
            hasura,
            admin_pool,
            config,
        }
    }

    async fn role_exists(&self, role: &str) -> ProvisioningResult<bool> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM pg_roles WHERE rolname = $1")
            .bind(role)
            .fetch_optional(&self.admin_pool)
            .await
            .map_err(|e| ProvisioningError::Sql(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn database_exists(&self, database: &str) -> ProvisioningResult<bool> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM pg_database WHERE datname = $1")
            .bind(database)
            .fetch_optional(&self.admin_pool)
            .await
            .map_err(|e| ProvisioningError::Sql(e.to_string()))?;
        Ok(row.is_some())
    }

    /// Create the tenant database and role if either is missing.
    ///
    /// Identifiers come from [`TenantIdentity`] sanitization and the
    /// password is generated hex, so interpolation is safe - `CREATE
    /// DATABASE` cannot be parameterized anyway.
    async fn create_database_and_role(
        &self,
        database: &str,
        role: &str,
        password: &str,
    ) -> ProvisioningResult<()> {
        if !self.role_exists(role).await? {
            sqlx::raw_sql(&format!("CREATE USER {role} WITH PASSWORD '{password}'"))
                .execute(&self.admin_pool)
                .await
                .map_err(|e| ProvisioningError::Sql(e.to_string()))?;
            debug!(role, "Role created");
        }

        if !self.database_exists(database).await? {
            sqlx::raw_sql(&format!("CREATE DATABASE {database} OWNER {role}"))
                .execute(&self.admin_pool)
                .await
                .map_err(|e| ProvisioningError::Sql(e.to_string()))?;
            debug!(database, "Database created");
        }

        sqlx::raw_sql(&format!("GRANT ALL PRIVILEGES ON DATABASE {database} TO {role}"))
            .execute(&self.admin_pool)
            .await
            .map_err(|e| ProvisioningError::Sql(e.to_string()))?;

        Ok(())
    }

    fn connection_string(&self, role: &str, password: &str, database: &str) -> String {
        format!(
            "postgres://{role}:{password}@{}:{}/{database}",
            self.config.pg_host, self.config.pg_port
        )
    }

    fn generate_password() -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

#[async_trait]
impl ProvisioningBackend for Provisioner {
    async fn is_provisioned(&self, identity: &TenantIdentity) -> ProvisioningResult<bool> {
        let state = ProvisioningState::load(&self.hasura, identity).await?;
        Ok(state.source_exists() && state.schema_exists())
    }

    #[instrument(skip(self, ddl), fields(
        account_id = %identity.account_id,
        function_name = %identity.function_name,
    ))]
    async fn provision(&self, identity: &TenantIdentity, ddl: &str) -> ProvisioningResult<()> {
        let state = ProvisioningState::load(&self.hasura, identity).await?;

        let database = identity.database_name();
        let role = identity.user_name();
        let schema = identity.schema_name();

        if !state.source_exists() {
            let password = Self::generate_password();
            self.create_database_and_role(&database, &role, &password)
                .await?;
            self.hasura
                .add_source(&database, &self.connection_string(&role, &password, &database))
                .await?;
        }

        if !state.schema_exists() {
            self.hasura
                .run_sql(&database, &format!("CREATE SCHEMA IF NOT EXISTS {schema}"), false)
                .await?;
        }

        if state.created_tables().is_empty() && !ddl.trim().is_empty() {
            let scoped = format!("SET search_path TO {schema};\n{ddl}");
            self.hasura.run_sql(&database, &scoped, false).await?;
        }

        // Re-list after DDL: the snapshot predates any tables just
        // created.
        let created = self.hasura.list_tables(&database, &schema).await?;

        let tracked: HashSet<String> = state.tracked_tables().into_iter().collect();
        let untracked: Vec<String> = created
            .iter()
            .filter(|table| !tracked.contains(*table))
            .cloned()
            .collect();
        self.hasura.track_tables(&database, &schema, &untracked).await?;

        let permissioned: HashSet<String> = state.tables_with_permissions().into_iter().collect();
        for table in created.iter().filter(|table| !permissioned.contains(*table)) {
            self.hasura
                .add_full_permissions(&database, &schema, table, &role)
                .await?;
        }

        info!(database, schema, tables = created.len(), "Tenant provisioned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_passwords_are_32_hex_chars() {
        let a = Provisioner::generate_password();
        let b = Provisioner::generate_password();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
