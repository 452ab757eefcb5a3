//! In-memory key service and record table

use async_trait::async_trait;
use credstash_core::kms::KeyMaterial;
use credstash_core::{
    EncryptionContext, Error, GeneratedDataKey, KeyService, Result, ScanCursor, ScanPage,
    SecretListing, SecretRecord, SecretTable, StoredRecord,
};
use rand::RngCore;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use zeroize::Zeroizing;

pub const DEFAULT_PAGE_SIZE: usize = 100;

struct WrappedKey {
    key_id: String,
    material: Vec<u8>,
    context: EncryptionContext,
}

/// Key service that binds each wrapped key to the context it was made under
///
/// Unwrapping under any other context answers without plaintext, the way
/// the real service refuses a mismatched context.
#[derive(Default)]
pub struct FakeKms {
    keys: Mutex<HashMap<Vec<u8>, WrappedKey>>,
    generated: Mutex<Vec<String>>,
}

impl FakeKms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key ids passed to each data key request, in order
    pub fn generated_key_ids(&self) -> Vec<String> {
        self.generated.lock().unwrap().clone()
    }

    /// Number of distinct data keys handed out
    pub fn key_count(&self) -> usize {
        self.keys.lock().unwrap().len()
    }
}

#[async_trait]
impl KeyService for FakeKms {
    async fn generate_data_key(
        &self,
        key_id: &str,
        num_bytes: usize,
        context: &EncryptionContext,
    ) -> Result<GeneratedDataKey> {
        let mut material = vec![0u8; num_bytes];
        let mut wrapped = vec![0u8; 24];
        rand::rng().fill_bytes(&mut material);
        rand::rng().fill_bytes(&mut wrapped);

        self.generated.lock().unwrap().push(key_id.to_string());
        self.keys.lock().unwrap().insert(
            wrapped.clone(),
            WrappedKey {
                key_id: key_id.to_string(),
                material: material.clone(),
                context: context.clone(),
            },
        );

        Ok(GeneratedDataKey {
            plaintext: Some(Zeroizing::new(material)),
            wrapped: Some(wrapped),
        })
    }

    async fn decrypt(
        &self,
        wrapped: &[u8],
        context: &EncryptionContext,
    ) -> Result<Option<KeyMaterial>> {
        let keys = self.keys.lock().unwrap();
        let entry = keys
            .get(wrapped)
            .ok_or_else(|| Error::kms("InvalidCiphertextException: unknown wrapped key"))?;

        if &entry.context != context {
            return Ok(None);
        }
        Ok(Some(Zeroizing::new(entry.material.clone())))
    }
}

/// Record table keyed and sorted like the real one: by name, then by the
/// version string
pub struct MemoryTable {
    records: Mutex<BTreeMap<(String, String), StoredRecord>>,
    page_size: usize,
    failing_deletes: Mutex<HashSet<String>>,
    scans: Mutex<usize>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            page_size: page_size.max(1),
            failing_deletes: Mutex::new(HashSet::new()),
            scans: Mutex::new(0),
        }
    }

    /// Store a record directly, bypassing the conditional write
    pub fn insert_raw(&self, record: SecretRecord) {
        self.insert_stored(StoredRecord::from(&record));
    }

    /// Store undecoded attributes directly, as a foreign writer might
    pub fn insert_stored(&self, stored: StoredRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((stored.name.clone(), stored.version.clone()), stored);
    }

    /// Current decoded copy of one record
    pub fn record(&self, name: &str, version: &str) -> Option<SecretRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(name.to_string(), version.to_string()))
            .map(|stored| stored.decode().unwrap())
    }

    /// Edit a stored record in place
    pub fn tamper<F: FnOnce(&mut SecretRecord)>(&self, name: &str, version: &str, edit: F) {
        let mut records = self.records.lock().unwrap();
        if let Some(stored) = records.get_mut(&(name.to_string(), version.to_string())) {
            let mut record = stored.decode().unwrap();
            edit(&mut record);
            *stored = StoredRecord::from(&record);
        }
    }

    /// Edit the undecoded attributes of a stored record in place
    pub fn tamper_stored<F: FnOnce(&mut StoredRecord)>(&self, name: &str, version: &str, edit: F) {
        let mut records = self.records.lock().unwrap();
        if let Some(stored) = records.get_mut(&(name.to_string(), version.to_string())) {
            edit(stored);
        }
    }

    /// Make deletes of `version` fail
    pub fn fail_deletes_of(&self, version: &str) {
        self.failing_deletes
            .lock()
            .unwrap()
            .insert(version.to_string());
    }

    /// Stored versions of `name`, in table order
    pub fn stored_versions(&self, name: &str) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .keys()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Number of scan pages served
    pub fn scan_count(&self) -> usize {
        *self.scans.lock().unwrap()
    }
}

impl Default for MemoryTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretTable for MemoryTable {
    async fn put(&self, record: &SecretRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let key = (record.name.clone(), record.version.clone());
        if records.contains_key(&key) {
            return Err(Error::VersionExists {
                name: record.name.clone(),
                version: record.version.clone(),
            });
        }
        records.insert(key, StoredRecord::from(record));
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        _consistent_read: bool,
        descending: bool,
    ) -> Result<Vec<StoredRecord>> {
        let records = self.records.lock().unwrap();
        let mut matching: Vec<StoredRecord> = records
            .values()
            .filter(|r| r.name == name)
            .cloned()
            .collect();
        if descending {
            matching.reverse();
        }
        Ok(matching)
    }

    async fn scan_page(&self, start: Option<ScanCursor>) -> Result<ScanPage> {
        *self.scans.lock().unwrap() += 1;
        let records = self.records.lock().unwrap();

        let mut remaining = records
            .keys()
            .filter(|(name, version)| match &start {
                Some(cursor) => {
                    (name.as_str(), version.as_str())
                        > (cursor.name.as_str(), cursor.version.as_str())
                }
                None => true,
            })
            .map(|(name, version)| SecretListing::new(name.clone(), version.clone()))
            .peekable();

        let mut items = Vec::new();
        while items.len() < self.page_size {
            match remaining.next() {
                Some(item) => items.push(item),
                None => break,
            }
        }

        let last_key = if remaining.peek().is_some() {
            items.last().cloned()
        } else {
            None
        };
        Ok(ScanPage { items, last_key })
    }

    async fn delete(&self, name: &str, version: &str) -> Result<()> {
        if self.failing_deletes.lock().unwrap().contains(version) {
            return Err(Error::table(format!(
                "injected failure deleting {} version {}",
                name, version
            )));
        }
        self.records
            .lock()
            .unwrap()
            .remove(&(name.to_string(), version.to_string()));
        Ok(())
    }
}
