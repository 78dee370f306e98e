//! Point-in-time provisioning state for one tenant.
//!
//! Loading performs exactly two remote reads - the full metadata export
//! and a direct table listing for the tenant schema - and combines them
//! into one immutable snapshot. Every query method is pure over the
//! snapshot; the provisioning driver uses them to compute a minimal
//! idempotent diff instead of re-running full provisioning each time.
//!
//! "Created" (DB ground truth) is kept separate from "tracked" (Hasura's
//! view, which may lag reality) and from "permissioned" (fully
//! configured).

use cadence_core::error::ProvisioningResult;
use cadence_core::identity::TenantIdentity;

use crate::hasura::{HasuraClient, SourceMetadata};

/// Immutable snapshot of a tenant's remote provisioning state.
#[derive(Debug, Clone)]
pub struct ProvisioningState {
    source_name: String,
    schema_name: String,
    source: Option<SourceMetadata>,
    created_tables: Vec<String>,
}

impl ProvisioningState {
    /// Load the snapshot for one tenant.
    pub async fn load(
        hasura: &HasuraClient,
        identity: &TenantIdentity,
    ) -> ProvisioningResult<Self> {
        let metadata = hasura.export_metadata().await?;
        let source_name = identity.database_name();
        let schema_name = identity.schema_name();

        let source = metadata
            .sources
            .into_iter()
            .find(|source| source.name == source_name);

        // The direct listing can only be asked of a source Hasura knows;
        // without a source there is nothing to list.
        let created_tables = match &source {
            Some(_) => hasura.list_tables(&source_name, &schema_name).await?,
            None => Vec::new(),
        };

        Ok(Self::from_parts(
            source_name,
            schema_name,
            source,
            created_tables,
        ))
    }

    fn from_parts(
        source_name: impl Into<String>,
        schema_name: impl Into<String>,
        source: Option<SourceMetadata>,
        created_tables: Vec<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            schema_name: schema_name.into(),
            source,
            created_tables,
        }
    }

    /// Source name this snapshot was taken for.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Schema name this snapshot was taken for.
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// True iff a source named after the tenant database is present.
    pub fn source_exists(&self) -> bool {
        self.source.is_some()
    }

    /// True iff the source has at least one table in the tenant schema.
    pub fn schema_exists(&self) -> bool {
        self.source
            .as_ref()
            .is_some_and(|source| {
                source
                    .tables
                    .iter()
                    .any(|table| table.table.schema == self.schema_name)
            })
    }

    /// Tables that actually exist in the schema (DB ground truth).
    pub fn created_tables(&self) -> &[String] {
        &self.created_tables
    }

    /// Tables present in Hasura metadata for the schema (may lag
    /// reality).
    pub fn tracked_tables(&self) -> Vec<String> {
        self.source
            .as_ref()
            .map(|source| {
                source
                    .tables
                    .iter()
                    .filter(|table| table.table.schema == self.schema_name)
                    .map(|table| table.table.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tables carrying all four permission kinds. Partially permissioned
    /// tables are excluded - they are not yet fully configured.
    pub fn tables_with_permissions(&self) -> Vec<String> {
        self.source
            .as_ref()
            .map(|source| {
                source
                    .tables
                    .iter()
                    .filter(|table| {
                        table.table.schema == self.schema_name && table.has_full_permissions()
                    })
                    .map(|table| table.table.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source_fixture() -> SourceMetadata {
        serde_json::from_value(json!({
            "name": "morgs_near",
            "tables": [
                {
                    "table": {"schema": "morgs_near_social_feed", "name": "posts"},
                    "select_permissions": [{"role": "morgs_near"}],
                    "insert_permissions": [{"role": "morgs_near"}],
                    "update_permissions": [{"role": "morgs_near"}],
                    "delete_permissions": [{"role": "morgs_near"}]
                },
                {
                    "table": {"schema": "morgs_near_social_feed", "name": "comments"},
                    "select_permissions": [{"role": "morgs_near"}],
                    "insert_permissions": [{"role": "morgs_near"}],
                    "update_permissions": [{"role": "morgs_near"}]
                },
                {
                    "table": {"schema": "other_schema", "name": "unrelated"},
                    "select_permissions": [{"role": "other"}],
                    "insert_permissions": [{"role": "other"}],
                    "update_permissions": [{"role": "other"}],
                    "delete_permissions": [{"role": "other"}]
                }
            ]
        }))
        .unwrap()
    }

    fn state_with_source() -> ProvisioningState {
        ProvisioningState::from_parts(
            "morgs_near",
            "morgs_near_social_feed",
            Some(source_fixture()),
            vec!["posts".into(), "comments".into(), "reactions".into()],
        )
    }

    #[test]
    fn absent_source_means_nothing_exists() {
        let state =
            ProvisioningState::from_parts("morgs_near", "morgs_near_social_feed", None, vec![]);
        assert!(!state.source_exists());
        assert!(!state.schema_exists());
        assert!(state.created_tables().is_empty());
        assert!(state.tracked_tables().is_empty());
        assert!(state.tables_with_permissions().is_empty());
    }

    #[test]
    fn schema_exists_requires_a_table_in_that_schema() {
        let state = state_with_source();
        assert!(state.source_exists());
        assert!(state.schema_exists());

        let other = ProvisioningState::from_parts(
            "morgs_near",
            "morgs_near_another_feed",
            Some(source_fixture()),
            vec![],
        );
        // La source existe mais aucune table dans ce schéma
        assert!(other.source_exists());
        assert!(!other.schema_exists());
    }

    #[test]
    fn created_tables_are_the_literal_listing() {
        let state = state_with_source();
        // "reactions" existe en base mais n'est pas encore trackée
        assert_eq!(state.created_tables(), ["posts", "comments", "reactions"]);
    }

    #[test]
    fn tracked_tables_are_scoped_to_the_schema() {
        let state = state_with_source();
        assert_eq!(state.tracked_tables(), vec!["posts", "comments"]);
    }

    // Test critique: une table avec 3 permissions sur 4 est exclue
    #[test]
    fn tables_with_permissions_excludes_partial_configuration() {
        let state = state_with_source();
        assert_eq!(state.tables_with_permissions(), vec!["posts"]);
    }
}
