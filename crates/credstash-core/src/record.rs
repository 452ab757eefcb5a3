//! Secret record schema
//!
//! One record per `(name, version)`. At rest the wrapped data key and the
//! ciphertext are base64 text under the attribute names `key` and `contents`;
//! existing stores depend on exactly this shape.

use crate::envelope::HmacDigest;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// A stored secret version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    pub name: String,
    pub version: String,
    /// KMS-wrapped 64-byte data key
    #[serde(rename = "key", with = "base64_bytes")]
    pub wrapped_key: Vec<u8>,
    /// Counter-mode ciphertext of the secret
    #[serde(rename = "contents", with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// Lowercase hex HMAC over `ciphertext`
    pub hmac: String,
    #[serde(default)]
    pub digest: HmacDigest,
}

impl SecretRecord {
    /// Base64 text of the wrapped data key, as stored in `key`
    pub fn encoded_key(&self) -> String {
        BASE64.encode(&self.wrapped_key)
    }

    /// Base64 text of the ciphertext, as stored in `contents`
    pub fn encoded_contents(&self) -> String {
        BASE64.encode(&self.ciphertext)
    }
}

/// A record as read back from the table, attributes still undecoded
///
/// Reads fetch every version of a name but decode only the one selected, so
/// a corrupt or foreign sibling cannot break reads of the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredRecord {
    pub name: String,
    pub version: String,
    pub key: Option<String>,
    pub contents: Option<String>,
    pub hmac: Option<String>,
    pub digest: Option<String>,
}

impl StoredRecord {
    /// Decode the attributes into a [`SecretRecord`]
    ///
    /// A missing `digest` means the record predates digest selection and was
    /// written with SHA-256. Every failure is `Error::InvalidRecord`.
    pub fn decode(&self) -> Result<SecretRecord> {
        let invalid = |reason: String| Error::invalid_record(&self.name, &self.version, reason);
        let required = |attr: &str, value: &Option<String>| -> Result<String> {
            value
                .clone()
                .ok_or_else(|| invalid(format!("missing attribute '{}'", attr)))
        };

        let wrapped_key = BASE64
            .decode(required("key", &self.key)?)
            .map_err(|e| invalid(format!("key: {}", e)))?;
        let ciphertext = BASE64
            .decode(required("contents", &self.contents)?)
            .map_err(|e| invalid(format!("contents: {}", e)))?;
        let hmac = required("hmac", &self.hmac)?;
        let digest = match &self.digest {
            Some(d) => d
                .parse::<HmacDigest>()
                .map_err(|_| invalid(format!("unsupported digest '{}'", d)))?,
            None => HmacDigest::default(),
        };

        Ok(SecretRecord {
            name: self.name.clone(),
            version: self.version.clone(),
            wrapped_key,
            ciphertext,
            hmac,
            digest,
        })
    }
}

impl From<&SecretRecord> for StoredRecord {
    fn from(record: &SecretRecord) -> Self {
        Self {
            name: record.name.clone(),
            version: record.version.clone(),
            key: Some(record.encoded_key()),
            contents: Some(record.encoded_contents()),
            hmac: Some(record.hmac.clone()),
            digest: Some(record.digest.to_string()),
        }
    }
}

/// `(name, version)` projection returned by list operations
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecretListing {
    pub name: String,
    pub version: String,
}

impl SecretListing {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

mod base64_bytes {
    use super::BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        BASE64.decode(text).map_err(serde::de::Error::custom)
    }
}
