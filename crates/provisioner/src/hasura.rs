//! Hasura metadata API client.
//!
//! Two endpoints cover everything provisioning needs: `/v1/metadata` for
//! metadata operations (export, add source, track tables, permissions)
//! and `/v2/query` for SQL execution against a tenant source.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use cadence_core::error::{ProvisioningError, ProvisioningResult};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Hasura metadata client.
#[derive(Debug, Clone)]
pub struct HasuraConfig {
    /// Base URL of the Hasura instance.
    pub endpoint: String,
    /// Admin secret sent with every request.
    pub admin_secret: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for HasuraConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            admin_secret: String::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Metadata documents
// =============================================================================

/// Envelope returned by `export_metadata` (version 2).
#[derive(Debug, Clone, Deserialize)]
pub struct ExportMetadataResponse {
    #[serde(default)]
    pub resource_version: Option<u64>,
    pub metadata: HasuraMetadata,
}

/// The metadata document: all sources with their tables and permissions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HasuraMetadata {
    #[serde(default)]
    pub sources: Vec<SourceMetadata>,
}

/// One database source known to Hasura.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceMetadata {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableMetadata>,
}

/// Schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QualifiedTable {
    pub schema: String,
    pub name: String,
}

/// One tracked table with its permission metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct TableMetadata {
    pub table: QualifiedTable,
    #[serde(default)]
    pub select_permissions: Vec<Value>,
    #[serde(default)]
    pub insert_permissions: Vec<Value>,
    #[serde(default)]
    pub update_permissions: Vec<Value>,
    #[serde(default)]
    pub delete_permissions: Vec<Value>,
}

impl TableMetadata {
    /// Whether all four permission kinds are configured.
    ///
    /// A table with only some of select/insert/update/delete is treated
    /// as not yet fully configured.
    pub fn has_full_permissions(&self) -> bool {
        !self.select_permissions.is_empty()
            && !self.insert_permissions.is_empty()
            && !self.update_permissions.is_empty()
            && !self.delete_permissions.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RunSqlResponse {
    #[serde(default)]
    result: Vec<Vec<String>>,
}

// =============================================================================
// HasuraClient
// =============================================================================

/// HTTP client for the Hasura metadata and query APIs.
pub struct HasuraClient {
    http: Client,
    config: HasuraConfig,
}

impl HasuraClient {
    /// Build a client with the given configuration.
    pub fn new(config: HasuraConfig) -> ProvisioningResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProvisioningError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    async fn post(&self, path: &str, body: Value) -> ProvisioningResult<Value> {
        let url = format!("{}{}", self.config.endpoint.trim_end_matches('/'), path);

        let response = self
            .http
            .post(&url)
            .header("x-hasura-admin-secret", &self.config.admin_secret)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProvisioningError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProvisioningError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ProvisioningError::Metadata(format!("{status}: {text}")));
        }

        serde_json::from_str(&text).map_err(|e| ProvisioningError::Metadata(e.to_string()))
    }

    /// Export the full metadata document (all sources, tables,
    /// permissions).
    #[instrument(skip(self))]
    pub async fn export_metadata(&self) -> ProvisioningResult<HasuraMetadata> {
        let value = self
            .post(
                "/v1/metadata",
                json!({"type": "export_metadata", "version": 2, "args": {}}),
            )
            .await?;
        let response: ExportMetadataResponse =
            serde_json::from_value(value).map_err(|e| ProvisioningError::Metadata(e.to_string()))?;
        Ok(response.metadata)
    }

    /// Execute SQL against a tenant source.
    #[instrument(skip(self, sql))]
    pub async fn run_sql(
        &self,
        source: &str,
        sql: &str,
        read_only: bool,
    ) -> ProvisioningResult<Vec<Vec<String>>> {
        let value = self
            .post(
                "/v2/query",
                json!({
                    "type": "run_sql",
                    "args": {"source": source, "sql": sql, "read_only": read_only}
                }),
            )
            .await
            .map_err(|e| match e {
                ProvisioningError::Metadata(message) => ProvisioningError::Sql(message),
                other => other,
            })?;
        let response: RunSqlResponse =
            serde_json::from_value(value).map_err(|e| ProvisioningError::Sql(e.to_string()))?;
        Ok(response.result)
    }

    /// List the tables that actually exist in a schema (DB ground truth,
    /// independent of tracking metadata).
    pub async fn list_tables(&self, source: &str, schema: &str) -> ProvisioningResult<Vec<String>> {
        let sql =
            format!("SELECT table_name FROM information_schema.tables WHERE table_schema = '{schema}'");
        let rows = self.run_sql(source, &sql, true).await?;
        // First row is the column header.
        Ok(rows
            .into_iter()
            .skip(1)
            .filter_map(|row| row.into_iter().next())
            .collect())
    }

    /// Register a tenant database as a Hasura source.
    #[instrument(skip(self, database_url))]
    pub async fn add_source(&self, name: &str, database_url: &str) -> ProvisioningResult<()> {
        self.post(
            "/v1/metadata",
            json!({
                "type": "pg_add_source",
                "args": {
                    "name": name,
                    "configuration": {
                        "connection_info": {
                            "database_url": database_url,
                            "pool_settings": {"retries": 1, "idle_timeout": 180, "max_connections": 50}
                        }
                    }
                }
            }),
        )
        .await?;
        debug!(source = name, "Source added");
        Ok(())
    }

    /// Track a set of tables in one bulk metadata call.
    #[instrument(skip(self, tables), fields(count = tables.len()))]
    pub async fn track_tables(
        &self,
        source: &str,
        schema: &str,
        tables: &[String],
    ) -> ProvisioningResult<()> {
        if tables.is_empty() {
            return Ok(());
        }
        let operations: Vec<Value> = tables
            .iter()
            .map(|table| {
                json!({
                    "type": "pg_track_table",
                    "args": {"source": source, "table": {"schema": schema, "name": table}}
                })
            })
            .collect();
        self.post("/v1/metadata", json!({"type": "bulk", "args": operations}))
            .await?;
        Ok(())
    }

    /// Grant all four permission kinds on one table to a role.
    #[instrument(skip(self))]
    pub async fn add_full_permissions(
        &self,
        source: &str,
        schema: &str,
        table: &str,
        role: &str,
    ) -> ProvisioningResult<()> {
        let qualified = json!({"schema": schema, "name": table});
        let operations = json!([
            {
                "type": "pg_create_select_permission",
                "args": {
                    "source": source, "table": qualified, "role": role,
                    "permission": {"columns": "*", "filter": {}, "allow_aggregations": true}
                }
            },
            {
                "type": "pg_create_insert_permission",
                "args": {
                    "source": source, "table": qualified, "role": role,
                    "permission": {"columns": "*", "check": {}}
                }
            },
            {
                "type": "pg_create_update_permission",
                "args": {
                    "source": source, "table": qualified, "role": role,
                    "permission": {"columns": "*", "filter": {}, "check": {}}
                }
            },
            {
                "type": "pg_create_delete_permission",
                "args": {
                    "source": source, "table": qualified, "role": role,
                    "permission": {"filter": {}}
                }
            }
        ]);
        self.post("/v1/metadata", json!({"type": "bulk", "args": operations}))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_document_parses_sources_and_permissions() {
        let metadata: HasuraMetadata = serde_json::from_value(json!({
            "sources": [{
                "name": "morgs_near",
                "tables": [{
                    "table": {"schema": "morgs_near_social_feed", "name": "posts"},
                    "select_permissions": [{"role": "morgs_near"}],
                    "insert_permissions": [{"role": "morgs_near"}],
                    "update_permissions": [{"role": "morgs_near"}],
                    "delete_permissions": [{"role": "morgs_near"}]
                }]
            }]
        }))
        .unwrap();

        assert_eq!(metadata.sources.len(), 1);
        assert!(metadata.sources[0].tables[0].has_full_permissions());
    }

    // Test critique: 3 permissions sur 4 = pas complètement configurée
    #[test]
    fn three_of_four_permissions_is_not_full() {
        let table: TableMetadata = serde_json::from_value(json!({
            "table": {"schema": "s", "name": "posts"},
            "select_permissions": [{"role": "r"}],
            "insert_permissions": [{"role": "r"}],
            "update_permissions": [{"role": "r"}]
        }))
        .unwrap();

        assert!(!table.has_full_permissions());
    }

    #[test]
    fn absent_permission_arrays_default_to_empty() {
        let table: TableMetadata = serde_json::from_value(json!({
            "table": {"schema": "s", "name": "comments"}
        }))
        .unwrap();

        assert!(table.select_permissions.is_empty());
        assert!(!table.has_full_permissions());
    }
}
