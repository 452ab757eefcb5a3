//! Common test utilities for credstash-core
//!
//! In-memory stand-ins for the key service and the record table, so the
//! store can be driven end to end without AWS.

#![allow(dead_code)]

pub mod fakes;

pub use fakes::*;

use credstash_core::{EncryptionContext, SecretStore};
use std::sync::Arc;

pub const KEY_ID: &str = "alias/credstash";

/// A store over fresh fakes, plus handles to inspect them
pub fn memory_store() -> (SecretStore, Arc<FakeKms>, Arc<MemoryTable>) {
    memory_store_with_page_size(DEFAULT_PAGE_SIZE)
}

pub fn memory_store_with_page_size(
    page_size: usize,
) -> (SecretStore, Arc<FakeKms>, Arc<MemoryTable>) {
    let kms = Arc::new(FakeKms::new());
    let table = Arc::new(MemoryTable::with_page_size(page_size));
    let store = SecretStore::new(kms.clone(), table.clone(), KEY_ID);
    (store, kms, table)
}

/// Build an encryption context from pairs
pub fn context(pairs: &[(&str, &str)]) -> EncryptionContext {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
