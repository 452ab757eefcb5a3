//! Version arithmetic and selection policy
//!
//! Versions are decimal text in the table but are always ordered numerically
//! here: `"9" < "10"`. Strings that do not parse as integers are ignored for
//! ordering so a foreign writer cannot wedge a name.

use crate::error::{Error, Result};
use crate::record::StoredRecord;
use tracing::warn;

/// Parse a stored version string, `None` if it is not a non-negative integer
pub fn parse(version: &str) -> Option<u64> {
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    version.parse().ok()
}

/// Validate an explicitly requested version
///
/// Accepts positive integers written without leading zeros.
pub fn validate(version: &str) -> Result<()> {
    match parse(version) {
        Some(n) if n > 0 && n.to_string() == version => Ok(()),
        _ => Err(Error::InvalidVersion(version.to_string())),
    }
}

/// Highest numeric version among `versions`
pub fn latest<'a, I>(versions: I) -> Option<u64>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .filter_map(|v| {
            let parsed = parse(v);
            if parsed.is_none() {
                warn!("Ignoring malformed version string: {:?}", v);
            }
            parsed
        })
        .max()
}

/// Version to assign to the next write
pub fn next<'a, I>(versions: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    match latest(versions) {
        Some(max) => max.saturating_add(1).to_string(),
        None => "1".to_string(),
    }
}

/// Sort records highest version first
///
/// Records with unparseable versions sort after every numeric one.
pub fn sort_descending(records: &mut [StoredRecord]) {
    records.sort_by(|a, b| parse(&b.version).cmp(&parse(&a.version)));
}

/// Select the record a read should decrypt
///
/// `records` must already be ordered highest version first.
pub fn select_for_read<'a>(
    name: &str,
    records: &'a [StoredRecord],
    requested: Option<&str>,
) -> Result<&'a StoredRecord> {
    match requested {
        Some(version) => records
            .iter()
            .find(|r| r.version == version)
            .ok_or_else(|| Error::version_not_found(name, version)),
        None => records.first().ok_or_else(|| Error::not_found(name)),
    }
}

/// Select the versions a delete should remove
pub fn select_for_delete(
    versions: &[String],
    requested: Option<&str>,
    delete_all: bool,
) -> Vec<String> {
    if delete_all {
        return versions.to_vec();
    }

    match requested {
        Some(version) => vec![version.to_string()],
        None => vec![latest(versions.iter().map(String::as_str))
            .map(|v| v.to_string())
            .unwrap_or_else(|| "1".to_string())],
    }
}
