//! Command implementations

pub mod delete;
pub mod get;
pub mod list;
pub mod put;
pub mod setup;

use anyhow::{Context, Result};
use camino::Utf8Path;
use credstash_core::aws::{self, AwsClients};
use credstash_core::kms::parse_context;
use credstash_core::{ConfigFile, ConfigOverrides, EncryptionContext, SecretStore, StoreConfig};
use std::sync::Arc;
use tracing::debug;

use crate::cli::StoreArgs;

/// Resolved configuration and AWS clients for one invocation
pub struct Session {
    pub config: StoreConfig,
    pub clients: AwsClients,
}

impl Session {
    /// Resolve configuration and connect
    pub async fn open(args: &StoreArgs, config_path: Option<&Utf8Path>) -> Result<Self> {
        let file = ConfigFile::discover(config_path).context("Failed to load config file")?;
        let config = StoreConfig::resolve(&ConfigOverrides::from(args), &file);
        debug!(
            "Using table {} in {} with key {}",
            config.table, config.region, config.kms_key_id
        );

        let clients = aws::connect(&config).await;
        Ok(Self { config, clients })
    }

    /// Fail early with a setup hint if the table is missing
    pub async fn check_table(&self) -> Result<()> {
        self.clients
            .table
            .check_table()
            .await
            .with_context(|| format!("Failed to check table '{}'", self.config.table))
    }

    pub fn store(&self) -> SecretStore {
        SecretStore::new(
            Arc::new(self.clients.kms.clone()),
            Arc::new(self.clients.table.clone()),
            self.config.kms_key_id.clone(),
        )
    }
}

/// Parse the `--context` option
pub fn encryption_context(raw: Option<&str>) -> Result<EncryptionContext> {
    match raw {
        Some(json) => Ok(parse_context(json).context("Invalid --context")?),
        None => Ok(EncryptionContext::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_context_absent() {
        assert!(encryption_context(None).unwrap().is_empty());
    }

    #[test]
    fn test_encryption_context_json() {
        let ctx = encryption_context(Some(r#"{"env":"test"}"#)).unwrap();
        assert_eq!(ctx.get("env").map(String::as_str), Some("test"));
    }

    #[test]
    fn test_encryption_context_invalid() {
        let err = encryption_context(Some("env=test")).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid --context"));
    }
}
