//! AWS KMS key service

use crate::error::{Error, Result};
use crate::kms::{EncryptionContext, GeneratedDataKey, KeyMaterial, KeyService};
use async_trait::async_trait;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::Client;
use std::collections::HashMap;
use tracing::debug;
use zeroize::Zeroizing;

/// Data keys from AWS KMS
#[derive(Clone)]
pub struct AwsKms {
    client: Client,
}

impl std::fmt::Debug for AwsKms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsKms").finish_non_exhaustive()
    }
}

impl AwsKms {
    /// Build a client from a shared SDK config with optional overrides
    pub fn new(
        sdk_config: &aws_config::SdkConfig,
        region: Option<&str>,
        endpoint: Option<&str>,
    ) -> Self {
        let mut builder = aws_sdk_kms::config::Builder::from(sdk_config);

        if let Some(region) = region {
            builder = builder.region(aws_sdk_kms::config::Region::new(region.to_string()));
        }

        if let Some(endpoint) = endpoint {
            debug!("Using custom KMS endpoint: {}", endpoint);
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

fn request_context(context: &EncryptionContext) -> Option<HashMap<String, String>> {
    if context.is_empty() {
        None
    } else {
        Some(
            context
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

#[async_trait]
impl KeyService for AwsKms {
    async fn generate_data_key(
        &self,
        key_id: &str,
        num_bytes: usize,
        context: &EncryptionContext,
    ) -> Result<GeneratedDataKey> {
        let num_bytes = i32::try_from(num_bytes)
            .map_err(|_| Error::KeyGeneration(format!("key length {} out of range", num_bytes)))?;

        debug!("Generating {}-byte data key under {}", num_bytes, key_id);
        let output = self
            .client
            .generate_data_key()
            .key_id(key_id)
            .number_of_bytes(num_bytes)
            .set_encryption_context(request_context(context))
            .send()
            .await
            .map_err(|e| Error::kms(e.into_service_error()))?;

        Ok(GeneratedDataKey {
            plaintext: output
                .plaintext()
                .map(|blob| Zeroizing::new(blob.as_ref().to_vec())),
            wrapped: output.ciphertext_blob().map(|blob| blob.as_ref().to_vec()),
        })
    }

    async fn decrypt(
        &self,
        wrapped: &[u8],
        context: &EncryptionContext,
    ) -> Result<Option<KeyMaterial>> {
        debug!("Unwrapping {}-byte data key", wrapped.len());
        let output = match self
            .client
            .decrypt()
            .ciphertext_blob(Blob::new(wrapped))
            .set_encryption_context(request_context(context))
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let err = e.into_service_error();
                // KMS reports a context mismatch as an invalid ciphertext
                if err.is_invalid_ciphertext_exception() {
                    return Err(Error::KeyUnwrap(format!(
                        "wrapped key rejected, check the encryption context ({})",
                        err
                    )));
                }
                return Err(Error::kms(err));
            }
        };

        Ok(output
            .plaintext()
            .map(|blob| Zeroizing::new(blob.as_ref().to_vec())))
    }
}
