//! Versioned secret storage for credstash
//!
//! This crate provides:
//! - **Envelope encryption**: one 64-byte KMS data key per record, AES-256-CTR
//!   under the first half and an HMAC over the ciphertext under the second
//! - **Versioning**: append-only numeric versions per secret name
//! - **Storage**: records in DynamoDB, keys wrapped by AWS KMS, both behind
//!   traits so the store can run against other implementations
//!
//! ```no_run
//! use credstash_core::{aws, GetOptions, SecretStore, StoreConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> credstash_core::Result<()> {
//! let config = StoreConfig::default();
//! let clients = aws::connect(&config).await;
//! let store = SecretStore::new(
//!     Arc::new(clients.kms),
//!     Arc::new(clients.table),
//!     config.kms_key_id.clone(),
//! );
//! let secret = store.get("db-pass", &GetOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod aws;
pub mod config;
pub mod envelope;
pub mod error;
pub mod kms;
pub mod record;
pub mod security;
pub mod store;
pub mod table;
pub mod version;

pub use config::{ConfigFile, ConfigOverrides, StoreConfig};
pub use envelope::HmacDigest;
pub use error::{Error, Result};
pub use kms::{EncryptionContext, GeneratedDataKey, KeyService};
pub use record::{SecretListing, SecretRecord, StoredRecord};
pub use security::{AuditLog, SecureString};
pub use store::{DeleteOptions, GetOptions, PutOptions, SecretStore};
pub use table::{ScanCursor, ScanPage, SecretTable};
