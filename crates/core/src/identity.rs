//! Tenant identity and derived naming scheme.
//!
//! A tenant is an `(account_id, function_name)` pair identifying one
//! indexing workload. Everything addressable about a tenant derives from
//! this pair: the executor id used for lifecycle idempotency, and the
//! sanitized database/user/schema names used by provisioning.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::StreamStorage;

/// Identifies one indexing workload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantIdentity {
    /// NEAR account that registered the workload.
    pub account_id: String,
    /// Name of the indexing function within that account.
    pub function_name: String,
}

impl TenantIdentity {
    pub fn new(account_id: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            function_name: function_name.into(),
        }
    }

    /// Combined `account_id/function_name` form.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.account_id, self.function_name)
    }

    /// Stable one-way identifier for executor lifecycle operations.
    ///
    /// Defined as the lowercase hex SHA-256 of [`Self::full_name`] and must
    /// be bit-reproducible across implementations.
    pub fn executor_id(&self) -> String {
        hex::encode(Sha256::digest(self.full_name().as_bytes()))
    }

    /// Key under which provisioning tasks for this tenant are tracked.
    pub fn task_key(&self) -> String {
        format!("{}:{}", self.account_id, self.function_name)
    }

    /// Postgres role name for this tenant.
    pub fn user_name(&self) -> String {
        sanitize_name(&self.account_id)
    }

    /// Database name for this tenant.
    pub fn database_name(&self) -> String {
        sanitize_name(&self.account_id)
    }

    /// Schema name for this workload within the tenant database.
    pub fn schema_name(&self) -> String {
        sanitize_name(&self.full_name())
    }
}

impl std::fmt::Display for TenantIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// Derive a Postgres-safe identifier from an external name.
///
/// Every non-alphanumeric character becomes `_`, and a leading digit gets
/// an `_` prefix. Total over all input strings - there is no error path.
pub fn sanitize_name(input: &str) -> String {
    let mut out: String = input
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

// =============================================================================
// Indexer configuration
// =============================================================================

/// Log verbosity requested by a tenant for its workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// Configuration object describing one indexing workload.
///
/// Handed in by external collaborators (registry contract, editor UI).
/// The `code` string is opaque payload - this core never parses or
/// executes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub account_id: String,
    pub function_name: String,
    /// User-submitted indexing code. Opaque here.
    pub code: String,
    /// User-submitted DDL describing the workload's tables.
    pub schema: String,
    #[serde(default)]
    pub log_level: LogLevel,
}

impl IndexerConfig {
    /// Tenant identity for this workload.
    pub fn identity(&self) -> TenantIdentity {
        TenantIdentity::new(self.account_id.clone(), self.function_name.clone())
    }
}

impl From<StreamStorage> for IndexerConfig {
    fn from(storage: StreamStorage) -> Self {
        Self {
            account_id: storage.account_id,
            function_name: storage.function_name,
            code: storage.code,
            schema: storage.schema,
            log_level: LogLevel::default(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_id_matches_known_vector() {
        let identity = TenantIdentity::new("test-account.near", "test-indexer");
        assert_eq!(identity.full_name(), "test-account.near/test-indexer");
        assert_eq!(
            identity.executor_id(),
            "d43da7e3e466961f28ddaa99c8f7c2b44f25ef8d44931c677e48a6fd051bb966"
        );
    }

    #[test]
    fn executor_id_is_deterministic_64_char_hex() {
        let identity = TenantIdentity::new("morgs.near", "social_feed");
        let a = identity.executor_id();
        let b = identity.executor_id();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn executor_id_differs_for_different_tenants() {
        let a = TenantIdentity::new("alice.near", "feed").executor_id();
        let b = TenantIdentity::new("alice.near", "feeds").executor_id();
        let c = TenantIdentity::new("alicen.near", "feed").executor_id();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn sanitize_replaces_non_alphanumerics() {
        assert_eq!(sanitize_name("test-account.near"), "test_account_near");
    }

    #[test]
    fn sanitize_prefixes_leading_digit() {
        assert_eq!(sanitize_name("0xSome-Account"), "_0xSome_Account");
    }

    #[test]
    fn sanitize_is_total() {
        // Pas de chemin d'erreur, même pour les entrées dégénérées
        assert_eq!(sanitize_name(""), "");
        assert_eq!(sanitize_name("___"), "___");
        assert_eq!(sanitize_name("日本"), "__");
    }

    #[test]
    fn schema_name_combines_account_and_function() {
        let identity = TenantIdentity::new("test-account.near", "test-indexer");
        assert_eq!(identity.schema_name(), "test_account_near_test_indexer");
        assert_eq!(identity.database_name(), "test_account_near");
        assert_eq!(identity.user_name(), "test_account_near");
    }

    #[test]
    fn log_level_parses_uppercase() {
        let level: LogLevel = serde_json::from_str("\"WARN\"").unwrap();
        assert_eq!(level, LogLevel::Warn);
    }
}
