//! Envelope cipher
//!
//! Pure transform between a plaintext secret and a tamper-evident ciphertext
//! bundle, keyed by 64 bytes of data key material from the key service:
//!
//! - bytes `0..32` are the AES-256 key for counter-mode encryption
//! - bytes `32..64` are the HMAC key, applied to the ciphertext (encrypt-then-MAC)
//!
//! Every data key encrypts exactly one value. The counter block therefore
//! carries a zero nonce and starts at 1, which keeps records readable by
//! other credstash implementations sharing the same table.

use crate::error::{Error, Result};
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{digest::KeyInit, Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Length of the data key requested from the key service
pub const DATA_KEY_LEN: usize = 64;

/// Length of each half of the data key
const HALF_KEY_LEN: usize = 32;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Initial counter block: zero nonce, counter starting at 1
const INITIAL_COUNTER: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];

/// HMAC digest algorithm recorded alongside each ciphertext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HmacDigest {
    Sha224,
    /// Default for new records
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HmacDigest {
    /// Name stored in the `digest` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            HmacDigest::Sha224 => "sha224",
            HmacDigest::Sha256 => "sha256",
            HmacDigest::Sha384 => "sha384",
            HmacDigest::Sha512 => "sha512",
        }
    }

    /// Compute the HMAC of `data` under `key`
    pub fn sign(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        match self {
            HmacDigest::Sha224 => sign::<Hmac<Sha224>>(key, data),
            HmacDigest::Sha256 => sign::<Hmac<Sha256>>(key, data),
            HmacDigest::Sha384 => sign::<Hmac<Sha384>>(key, data),
            HmacDigest::Sha512 => sign::<Hmac<Sha512>>(key, data),
        }
    }

    /// Check `tag` against the HMAC of `data` in constant time
    pub fn verify(&self, key: &[u8], data: &[u8], tag: &[u8]) -> Result<bool> {
        match self {
            HmacDigest::Sha224 => verify::<Hmac<Sha224>>(key, data, tag),
            HmacDigest::Sha256 => verify::<Hmac<Sha256>>(key, data, tag),
            HmacDigest::Sha384 => verify::<Hmac<Sha384>>(key, data, tag),
            HmacDigest::Sha512 => verify::<Hmac<Sha512>>(key, data, tag),
        }
    }
}

impl fmt::Display for HmacDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HmacDigest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha224" => Ok(HmacDigest::Sha224),
            "sha256" => Ok(HmacDigest::Sha256),
            "sha384" => Ok(HmacDigest::Sha384),
            "sha512" => Ok(HmacDigest::Sha512),
            _ => Err(Error::UnsupportedDigest(s.to_string())),
        }
    }
}

impl TryFrom<String> for HmacDigest {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<HmacDigest> for String {
    fn from(digest: HmacDigest) -> Self {
        digest.as_str().to_string()
    }
}

fn keyed<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<M> {
    let mut mac = <M as Mac>::new_from_slice(key).map_err(|_| Error::InvalidKeyMaterial {
        expected: HALF_KEY_LEN,
        actual: key.len(),
    })?;
    mac.update(data);
    Ok(mac)
}

fn sign<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    Ok(keyed::<M>(key, data)?.finalize().into_bytes().to_vec())
}

fn verify<M: Mac + KeyInit>(key: &[u8], data: &[u8], tag: &[u8]) -> Result<bool> {
    Ok(keyed::<M>(key, data)?.verify_slice(tag).is_ok())
}

/// Unwrapped data key, split into its cipher and integrity halves
///
/// Both halves are zeroed on drop. A `DataKey` must encrypt at most one value.
pub struct DataKey {
    cipher_key: Zeroizing<[u8; HALF_KEY_LEN]>,
    hmac_key: Zeroizing<[u8; HALF_KEY_LEN]>,
}

impl DataKey {
    /// Split 64 bytes of key material into cipher key and HMAC key
    pub fn split(material: &[u8]) -> Result<Self> {
        if material.len() != DATA_KEY_LEN {
            return Err(Error::InvalidKeyMaterial {
                expected: DATA_KEY_LEN,
                actual: material.len(),
            });
        }

        let mut cipher_key = Zeroizing::new([0u8; HALF_KEY_LEN]);
        let mut hmac_key = Zeroizing::new([0u8; HALF_KEY_LEN]);
        cipher_key.copy_from_slice(&material[..HALF_KEY_LEN]);
        hmac_key.copy_from_slice(&material[HALF_KEY_LEN..]);

        Ok(Self {
            cipher_key,
            hmac_key,
        })
    }

    fn apply_keystream(&self, buf: &mut [u8]) -> Result<()> {
        let mut cipher = Aes256Ctr::new_from_slices(self.cipher_key.as_ref(), &INITIAL_COUNTER)
            .map_err(|_| Error::InvalidKeyMaterial {
                expected: HALF_KEY_LEN,
                actual: self.cipher_key.len(),
            })?;
        cipher.apply_keystream(buf);
        Ok(())
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataKey([REDACTED])")
    }
}

/// Output of [`encrypt`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSecret {
    pub ciphertext: Vec<u8>,
    /// Lowercase hex HMAC over `ciphertext`
    pub hmac: String,
    pub digest: HmacDigest,
}

/// Encrypt `plaintext` under `key`, then MAC the ciphertext
pub fn encrypt(plaintext: &str, key: &DataKey, digest: HmacDigest) -> Result<SealedSecret> {
    let mut ciphertext = plaintext.as_bytes().to_vec();
    key.apply_keystream(&mut ciphertext)?;

    let tag = digest.sign(key.hmac_key.as_ref(), &ciphertext)?;

    Ok(SealedSecret {
        ciphertext,
        hmac: hex::encode(tag),
        digest,
    })
}

/// Verify the HMAC over `ciphertext` and only then decrypt it
///
/// The stored tag is compared in constant time. A tag that is not valid hex
/// is treated as a mismatch.
pub fn decrypt(ciphertext: &[u8], hmac: &str, digest: HmacDigest, key: &DataKey) -> Result<String> {
    let tag = hex::decode(hmac.trim()).map_err(|_| Error::Integrity)?;

    if !digest.verify(key.hmac_key.as_ref(), ciphertext, &tag)? {
        return Err(Error::Integrity);
    }

    let mut plaintext = Zeroizing::new(ciphertext.to_vec());
    key.apply_keystream(&mut plaintext)?;

    String::from_utf8(plaintext.to_vec()).map_err(|_| Error::Decoding)
}
