//! Error types for credstash-core

use thiserror::Error;

/// Result type alias using credstash-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Opaque error raised by a KMS or table client
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error types for the secret store
#[derive(Error, Debug)]
pub enum Error {
    /// No record, or no record with the requested version, exists for a name
    #[error("{}", not_found_message(.name, .version.as_deref()))]
    NotFound {
        name: String,
        version: Option<String>,
    },

    /// Stored HMAC does not match the ciphertext
    #[error("HMAC verification failed: the record is corrupt, tampered with, or was written under a different encryption context")]
    Integrity,

    /// Decrypted bytes are not valid UTF-8
    #[error("Decrypted secret is not valid UTF-8")]
    Decoding,

    /// The key service did not return usable key material for a new data key
    #[error("Failed to generate data key: {0}")]
    KeyGeneration(String),

    /// The key service did not return plaintext for a wrapped data key
    #[error("Failed to decrypt data key: {0}")]
    KeyUnwrap(String),

    /// Data key material has the wrong length
    #[error("Invalid data key material: expected {expected} bytes, got {actual}")]
    InvalidKeyMaterial { expected: usize, actual: usize },

    /// HMAC digest name not recognised
    #[error("Unsupported HMAC digest: {0}")]
    UnsupportedDigest(String),

    /// Explicit version is not a canonical positive integer
    #[error("Invalid version '{0}': versions must be positive integers without leading zeros")]
    InvalidVersion(String),

    /// A record already exists for this name and version
    #[error("Version {version} of secret '{name}' already exists")]
    VersionExists { name: String, version: String },

    /// Stored record fields could not be decoded
    #[error("Invalid record for secret '{name}' version {version}: {reason}")]
    InvalidRecord {
        name: String,
        version: String,
        reason: String,
    },

    /// Table does not exist
    #[error("Credential table '{0}' not found. Run 'credstash setup' to create it")]
    TableNotFound(String),

    /// Key service request failed
    #[error("KMS request failed: {0}")]
    Kms(#[source] BoxError),

    /// Table request failed
    #[error("Table request failed: {0}")]
    Table(#[source] BoxError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn not_found_message(name: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!("Version '{}' of secret '{}' not found", version, name),
        None => format!("Secret '{}' not found", name),
    }
}

impl Error {
    /// Create a not found error for a name
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            version: None,
        }
    }

    /// Create a not found error for a specific version of a name
    pub fn version_not_found(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            version: Some(version.into()),
        }
    }

    /// Create an invalid record error
    pub fn invalid_record(
        name: impl Into<String>,
        version: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRecord {
            name: name.into(),
            version: version.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a KMS client failure
    pub fn kms(err: impl Into<BoxError>) -> Self {
        Self::Kms(err.into())
    }

    /// Wrap a table client failure
    pub fn table(err: impl Into<BoxError>) -> Self {
        Self::Table(err.into())
    }

    /// The secret (or the requested version) does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The secret exists but could not be trusted or decoded
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::Integrity | Self::Decoding | Self::InvalidRecord { .. }
        )
    }

    /// The key service failed or returned unusable key material
    pub fn is_key_service_failure(&self) -> bool {
        matches!(
            self,
            Self::KeyGeneration(_)
                | Self::KeyUnwrap(_)
                | Self::InvalidKeyMaterial { .. }
                | Self::Kms(_)
        )
    }
}
