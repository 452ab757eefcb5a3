//! Record table collaborator

use crate::error::Result;
use crate::record::{SecretListing, SecretRecord, StoredRecord};
use async_trait::async_trait;

/// Position to resume a scan from, the key of the last item returned
pub type ScanCursor = SecretListing;

/// One page of a full-table scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub items: Vec<SecretListing>,
    /// `None` once the scan is exhausted
    pub last_key: Option<ScanCursor>,
}

/// Trait for tables holding secret records keyed by `(name, version)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretTable: Send + Sync {
    /// Write a new record
    ///
    /// Fails with `Error::VersionExists` if `(name, version)` is taken.
    async fn put(&self, record: &SecretRecord) -> Result<()>;

    /// All records for `name`, ordered by the table's version sort key
    ///
    /// Attributes are returned undecoded; a malformed record is the
    /// caller's problem only if it selects that record.
    async fn query(
        &self,
        name: &str,
        consistent_read: bool,
        descending: bool,
    ) -> Result<Vec<StoredRecord>>;

    /// All version strings stored for `name`
    async fn versions(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .query(name, true, false)
            .await?
            .into_iter()
            .map(|r| r.version)
            .collect())
    }

    /// One page of `(name, version)` pairs, starting after `start`
    async fn scan_page(&self, start: Option<ScanCursor>) -> Result<ScanPage>;

    /// Remove one record
    async fn delete(&self, name: &str, version: &str) -> Result<()>;
}
