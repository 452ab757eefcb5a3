//! Key service collaborator
//!
//! Generates per-record data keys and unwraps them again. The encryption
//! context is bound into both calls by the service; unwrapping under a
//! different context yields no plaintext.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

/// Key/value pairs bound into data key wrapping
///
/// An empty map means no context.
pub type EncryptionContext = BTreeMap<String, String>;

/// Plaintext key material, zeroed on drop
pub type KeyMaterial = Zeroizing<Vec<u8>>;

/// Response to a data key request
///
/// Either half may be missing if the service returned an incomplete answer.
#[derive(Default)]
pub struct GeneratedDataKey {
    pub plaintext: Option<KeyMaterial>,
    pub wrapped: Option<Vec<u8>>,
}

impl fmt::Debug for GeneratedDataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedDataKey")
            .field("plaintext", &self.plaintext.as_ref().map(|_| "[REDACTED]"))
            .field("wrapped", &self.wrapped.as_ref().map(Vec::len))
            .finish()
    }
}

/// Trait for key management services
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyService: Send + Sync {
    /// Generate `num_bytes` of fresh key material under `key_id`
    async fn generate_data_key(
        &self,
        key_id: &str,
        num_bytes: usize,
        context: &EncryptionContext,
    ) -> Result<GeneratedDataKey>;

    /// Unwrap a data key
    ///
    /// Returns Ok(None) if the service answered without plaintext.
    async fn decrypt(
        &self,
        wrapped: &[u8],
        context: &EncryptionContext,
    ) -> Result<Option<KeyMaterial>>;
}

/// Parse an encryption context from a JSON object of strings
///
/// ```
/// let ctx = credstash_core::kms::parse_context(r#"{"env":"prod"}"#).unwrap();
/// assert_eq!(ctx["env"], "prod");
/// ```
pub fn parse_context(json: &str) -> Result<EncryptionContext> {
    serde_json::from_str(json).map_err(|e| {
        Error::Config(format!(
            "encryption context must be a JSON object of string values: {}",
            e
        ))
    })
}
