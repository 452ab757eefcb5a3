//! Secret store orchestration
//!
//! Sequences the envelope cipher and the version resolver against a key
//! service and a record table. Holds no mutable state of its own; every
//! operation is one pass of collaborator calls.

use crate::envelope::{self, DataKey, HmacDigest, DATA_KEY_LEN};
use crate::error::{Error, Result};
use crate::kms::{EncryptionContext, KeyService};
use crate::record::{SecretListing, SecretRecord};
use crate::security::{AuditLog, SecureString};
use crate::table::SecretTable;
use crate::version;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options for [`SecretStore::put`]
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Explicit version; the next free version when `None`
    pub version: Option<String>,
    pub context: EncryptionContext,
    /// Overrides the store's digest
    pub digest: Option<HmacDigest>,
    /// Overrides the store's key id
    pub key_id: Option<String>,
}

/// Options for [`SecretStore::get`]
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Exact version; the highest version when `None`
    pub version: Option<String>,
    pub context: EncryptionContext,
}

/// Options for [`SecretStore::delete`]
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    /// Exact version; the highest version when `None`
    pub version: Option<String>,
    /// Delete every version, ignoring `version`
    pub all: bool,
}

/// Versioned secret store over a key service and a record table
#[derive(Clone)]
pub struct SecretStore {
    keys: Arc<dyn KeyService>,
    table: Arc<dyn SecretTable>,
    key_id: String,
    digest: HmacDigest,
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore")
            .field("key_id", &self.key_id)
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

impl SecretStore {
    pub fn new(
        keys: Arc<dyn KeyService>,
        table: Arc<dyn SecretTable>,
        key_id: impl Into<String>,
    ) -> Self {
        Self {
            keys,
            table,
            key_id: key_id.into(),
            digest: HmacDigest::default(),
        }
    }

    /// Digest used for new records unless a put overrides it
    pub fn with_digest(mut self, digest: HmacDigest) -> Self {
        self.digest = digest;
        self
    }

    /// Encrypt and store `secret`, returning the version written
    pub async fn put(&self, name: &str, secret: &str, options: &PutOptions) -> Result<String> {
        let mut audit = AuditLog::new("put", name);
        let result = self.put_inner(name, secret, options, &mut audit).await;
        audit.finish(&result);
        result
    }

    async fn put_inner(
        &self,
        name: &str,
        secret: &str,
        options: &PutOptions,
        audit: &mut AuditLog,
    ) -> Result<String> {
        let version = match &options.version {
            Some(requested) => {
                version::validate(requested)?;
                requested.clone()
            }
            None => {
                let existing = self.table.versions(name).await?;
                version::next(existing.iter().map(String::as_str))
            }
        };
        audit.version = Some(version.clone());

        let key_id = options.key_id.as_deref().unwrap_or(&self.key_id);
        let generated = self
            .keys
            .generate_data_key(key_id, DATA_KEY_LEN, &options.context)
            .await?;
        let (material, wrapped_key) = match (generated.plaintext, generated.wrapped) {
            (Some(material), Some(wrapped)) => (material, wrapped),
            (None, _) => {
                return Err(Error::KeyGeneration(
                    "key service returned no plaintext".to_string(),
                ))
            }
            (_, None) => {
                return Err(Error::KeyGeneration(
                    "key service returned no wrapped key".to_string(),
                ))
            }
        };

        let data_key = DataKey::split(&material)?;
        let sealed = envelope::encrypt(secret, &data_key, options.digest.unwrap_or(self.digest))?;

        let record = SecretRecord {
            name: name.to_string(),
            version,
            wrapped_key,
            ciphertext: sealed.ciphertext,
            hmac: sealed.hmac,
            digest: sealed.digest,
        };
        self.table.put(&record).await?;

        info!("Stored secret {} version {}", name, record.version);
        Ok(record.version)
    }

    /// Fetch and decrypt a secret
    pub async fn get(&self, name: &str, options: &GetOptions) -> Result<SecureString> {
        let mut audit = AuditLog::new("get", name);
        let result = self.get_inner(name, options, &mut audit).await;
        audit.finish(&result);
        result
    }

    async fn get_inner(
        &self,
        name: &str,
        options: &GetOptions,
        audit: &mut AuditLog,
    ) -> Result<SecureString> {
        let mut records = self.table.query(name, true, true).await?;
        version::sort_descending(&mut records);

        let selected = version::select_for_read(name, &records, options.version.as_deref())?;
        audit.version = Some(selected.version.clone());
        debug!("Selected {} version {}", name, selected.version);
        let record = selected.decode()?;

        let material = self
            .keys
            .decrypt(&record.wrapped_key, &options.context)
            .await?
            .ok_or_else(|| Error::KeyUnwrap("key service returned no plaintext".to_string()))?;
        let data_key = DataKey::split(&material)?;

        let plaintext =
            envelope::decrypt(&record.ciphertext, &record.hmac, record.digest, &data_key)?;
        Ok(SecureString::new(plaintext))
    }

    /// Delete one version, the latest version, or every version of a secret
    ///
    /// Every selected version is attempted even if an earlier delete fails.
    /// The first failure is returned after the rest have been tried. On
    /// success, returns the versions removed.
    pub async fn delete(&self, name: &str, options: &DeleteOptions) -> Result<Vec<String>> {
        let mut audit = AuditLog::new("delete", name);
        if !options.all {
            if let Some(v) = &options.version {
                audit = audit.with_version(v.clone());
            }
        }
        let result = self.delete_inner(name, options).await;
        audit.finish(&result);
        result
    }

    async fn delete_inner(&self, name: &str, options: &DeleteOptions) -> Result<Vec<String>> {
        let versions = self.table.versions(name).await?;
        if versions.is_empty() {
            return Err(Error::not_found(name));
        }

        if let (false, Some(requested)) = (options.all, &options.version) {
            if !versions.contains(requested) {
                return Err(Error::version_not_found(name, requested.clone()));
            }
        }

        let selected =
            version::select_for_delete(&versions, options.version.as_deref(), options.all);

        let mut deleted = Vec::with_capacity(selected.len());
        let mut first_error = None;
        for version in selected {
            match self.table.delete(name, &version).await {
                Ok(()) => deleted.push(version),
                Err(e) => {
                    warn!("Failed to delete {} version {}: {}", name, version, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        info!("Deleted {} version(s) of {}", deleted.len(), name);
        Ok(deleted)
    }

    /// Every `(name, version)` in the table
    pub async fn list(&self) -> Result<Vec<SecretListing>> {
        let audit = AuditLog::new("list", "*");
        let result = self.list_inner().await;
        audit.finish(&result);
        result
    }

    async fn list_inner(&self) -> Result<Vec<SecretListing>> {
        let mut listings = Vec::new();
        let mut cursor = None;

        loop {
            let page = self.table.scan_page(cursor.take()).await?;
            debug!("Scan page with {} item(s)", page.items.len());
            listings.extend(page.items);

            match page.last_key {
                Some(key) => cursor = Some(key),
                None => break,
            }
        }

        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kms::{GeneratedDataKey, MockKeyService};
    use crate::record::StoredRecord;
    use crate::table::{MockSecretTable, ScanPage};
    use zeroize::Zeroizing;

    fn material() -> Vec<u8> {
        (0..DATA_KEY_LEN as u8).collect()
    }

    fn store(keys: MockKeyService, table: MockSecretTable) -> SecretStore {
        SecretStore::new(Arc::new(keys), Arc::new(table), "alias/credstash")
    }

    fn sealed_record(version: &str, secret: &str) -> StoredRecord {
        let key = DataKey::split(&material()).unwrap();
        let sealed = envelope::encrypt(secret, &key, HmacDigest::Sha256).unwrap();
        StoredRecord::from(&SecretRecord {
            name: "db-pass".to_string(),
            version: version.to_string(),
            wrapped_key: b"wrapped".to_vec(),
            ciphertext: sealed.ciphertext,
            hmac: sealed.hmac,
            digest: sealed.digest,
        })
    }

    #[tokio::test]
    async fn test_put_without_plaintext_is_key_generation_error() {
        let mut keys = MockKeyService::new();
        keys.expect_generate_data_key().returning(|_, _, _| {
            Ok(GeneratedDataKey {
                plaintext: None,
                wrapped: Some(b"wrapped".to_vec()),
            })
        });
        let mut table = MockSecretTable::new();
        table.expect_versions().returning(|_| Ok(vec![]));
        table.expect_put().never();

        let err = store(keys, table)
            .put("db-pass", "s3cr3t", &PutOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::KeyGeneration(_)));
    }

    #[tokio::test]
    async fn test_put_without_wrapped_key_is_key_generation_error() {
        let mut keys = MockKeyService::new();
        keys.expect_generate_data_key().returning(|_, _, _| {
            Ok(GeneratedDataKey {
                plaintext: Some(Zeroizing::new(material())),
                wrapped: None,
            })
        });
        let mut table = MockSecretTable::new();
        table.expect_versions().returning(|_| Ok(vec![]));
        table.expect_put().never();

        let err = store(keys, table)
            .put("db-pass", "s3cr3t", &PutOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::KeyGeneration(_)));
    }

    #[tokio::test]
    async fn test_put_short_key_material() {
        let mut keys = MockKeyService::new();
        keys.expect_generate_data_key().returning(|_, _, _| {
            Ok(GeneratedDataKey {
                plaintext: Some(Zeroizing::new(vec![0u8; 32])),
                wrapped: Some(b"wrapped".to_vec()),
            })
        });
        let mut table = MockSecretTable::new();
        table.expect_versions().returning(|_| Ok(vec![]));
        table.expect_put().never();

        let err = store(keys, table)
            .put("db-pass", "s3cr3t", &PutOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidKeyMaterial {
                expected: 64,
                actual: 32
            }
        ));
    }

    #[tokio::test]
    async fn test_put_uses_key_override_and_next_version() {
        let mut keys = MockKeyService::new();
        keys.expect_generate_data_key()
            .withf(|key_id, num_bytes, _| key_id == "alias/other" && *num_bytes == 64)
            .times(1)
            .returning(|_, _, _| {
                Ok(GeneratedDataKey {
                    plaintext: Some(Zeroizing::new(material())),
                    wrapped: Some(b"wrapped".to_vec()),
                })
            });
        let mut table = MockSecretTable::new();
        table
            .expect_versions()
            .returning(|_| Ok(vec!["9".to_string(), "10".to_string(), "junk".to_string()]));
        table
            .expect_put()
            .withf(|record| {
                record.version == "11"
                    && record.wrapped_key == b"wrapped"
                    && record.digest == HmacDigest::Sha512
            })
            .times(1)
            .returning(|_| Ok(()));

        let options = PutOptions {
            key_id: Some("alias/other".to_string()),
            digest: Some(HmacDigest::Sha512),
            ..Default::default()
        };
        let version = store(keys, table)
            .put("db-pass", "s3cr3t", &options)
            .await
            .unwrap();
        assert_eq!(version, "11");
    }

    #[tokio::test]
    async fn test_put_rejects_non_canonical_version() {
        let mut keys = MockKeyService::new();
        keys.expect_generate_data_key().never();
        let mut table = MockSecretTable::new();
        table.expect_put().never();

        let options = PutOptions {
            version: Some("01".to_string()),
            ..Default::default()
        };
        let err = store(keys, table)
            .put("db-pass", "s3cr3t", &options)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidVersion(_)));
    }

    #[tokio::test]
    async fn test_get_uses_consistent_descending_query() {
        let record = sealed_record("1", "s3cr3t");
        let mut table = MockSecretTable::new();
        table
            .expect_query()
            .withf(|name, consistent, descending| name == "db-pass" && *consistent && *descending)
            .times(1)
            .returning(move |_, _, _| Ok(vec![record.clone()]));
        let mut keys = MockKeyService::new();
        keys.expect_decrypt()
            .withf(|wrapped, _| wrapped == b"wrapped")
            .returning(|_, _| Ok(Some(Zeroizing::new(material()))));

        let secret = store(keys, table)
            .get("db-pass", &GetOptions::default())
            .await
            .unwrap();
        assert_eq!(secret.as_str(), "s3cr3t");
    }

    #[tokio::test]
    async fn test_get_decodes_only_selected_record() {
        let good = sealed_record("2", "s3cr3t");
        let foreign = StoredRecord {
            digest: Some("SHA".to_string()),
            ..sealed_record("1", "old")
        };
        let mut table = MockSecretTable::new();
        table
            .expect_query()
            .returning(move |_, _, _| Ok(vec![good.clone(), foreign.clone()]));
        let mut keys = MockKeyService::new();
        keys.expect_decrypt()
            .times(1)
            .returning(|_, _| Ok(Some(Zeroizing::new(material()))));

        let store = store(keys, table);
        let secret = store.get("db-pass", &GetOptions::default()).await.unwrap();
        assert_eq!(secret.as_str(), "s3cr3t");

        let options = GetOptions {
            version: Some("1".to_string()),
            ..Default::default()
        };
        let err = store.get("db-pass", &options).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { .. }));
    }

    #[tokio::test]
    async fn test_get_without_plaintext_is_key_unwrap_error() {
        let record = sealed_record("1", "s3cr3t");
        let mut table = MockSecretTable::new();
        table
            .expect_query()
            .returning(move |_, _, _| Ok(vec![record.clone()]));
        let mut keys = MockKeyService::new();
        keys.expect_decrypt().returning(|_, _| Ok(None));

        let err = store(keys, table)
            .get("db-pass", &GetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::KeyUnwrap(_)));
        assert!(err.is_key_service_failure());
    }

    #[tokio::test]
    async fn test_get_propagates_table_failure() {
        let mut table = MockSecretTable::new();
        table
            .expect_query()
            .returning(|_, _, _| Err(Error::table("ProvisionedThroughputExceeded")));
        let mut keys = MockKeyService::new();
        keys.expect_decrypt().never();

        let err = store(keys, table)
            .get("db-pass", &GetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Table(_)));
        assert!(err.to_string().contains("ProvisionedThroughputExceeded"));
    }

    #[tokio::test]
    async fn test_delete_all_continues_past_failure() {
        let mut table = MockSecretTable::new();
        table
            .expect_versions()
            .returning(|_| Ok(vec!["1".to_string(), "2".to_string(), "3".to_string()]));
        table
            .expect_delete()
            .withf(|_, version| version == "2")
            .times(1)
            .returning(|_, _| Err(Error::table("throttled")));
        table
            .expect_delete()
            .withf(|_, version| version != "2")
            .times(2)
            .returning(|_, _| Ok(()));

        let options = DeleteOptions {
            all: true,
            ..Default::default()
        };
        let err = store(MockKeyService::new(), table)
            .delete("db-pass", &options)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Table(_)));
        assert!(err.to_string().contains("throttled"));
    }

    #[tokio::test]
    async fn test_delete_reports_first_failure() {
        let mut table = MockSecretTable::new();
        table
            .expect_versions()
            .returning(|_| Ok(vec!["1".to_string(), "2".to_string()]));
        table
            .expect_delete()
            .withf(|_, version| version == "1")
            .returning(|_, _| Err(Error::table("first")));
        table
            .expect_delete()
            .withf(|_, version| version == "2")
            .returning(|_, _| Err(Error::table("second")));

        let options = DeleteOptions {
            all: true,
            ..Default::default()
        };
        let err = store(MockKeyService::new(), table)
            .delete("db-pass", &options)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("first"));
    }

    #[tokio::test]
    async fn test_delete_missing_version() {
        let mut table = MockSecretTable::new();
        table
            .expect_versions()
            .returning(|_| Ok(vec!["1".to_string()]));
        table.expect_delete().never();

        let options = DeleteOptions {
            version: Some("4".to_string()),
            ..Default::default()
        };
        let err = store(MockKeyService::new(), table)
            .delete("db-pass", &options)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NotFound {
                version: Some(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_list_follows_cursor() {
        let mut table = MockSecretTable::new();
        table
            .expect_scan_page()
            .withf(|start| start.is_none())
            .times(1)
            .returning(|_| {
                Ok(ScanPage {
                    items: vec![SecretListing::new("a", "1")],
                    last_key: Some(SecretListing::new("a", "1")),
                })
            });
        table
            .expect_scan_page()
            .withf(|start| start.as_ref().is_some_and(|s| s.name == "a"))
            .times(1)
            .returning(|_| {
                Ok(ScanPage {
                    items: vec![SecretListing::new("b", "1"), SecretListing::new("b", "2")],
                    last_key: None,
                })
            });

        let listings = store(MockKeyService::new(), table).list().await.unwrap();
        assert_eq!(listings.len(), 3);
        assert_eq!(listings[2], SecretListing::new("b", "2"));
    }
}
