//! Store configuration with precedence
//!
//! Each field resolves independently, highest precedence first:
//! 1. Explicit overrides (CLI flags or library caller)
//! 2. Environment variables
//! 3. Config file (`~/.credstash/config.yaml` or `--config <path>`)
//! 4. Built-in defaults
//!
//! Empty values at any layer count as unset.

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_TABLE: &str = "credential-store";
pub const DEFAULT_KMS_KEY_ID: &str = "alias/credstash";
pub const DEFAULT_PROFILE: &str = "default";

pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_KMS_REGION: &str = "KMS_REGION";
pub const ENV_TABLE: &str = "CREDSTASH_TABLE";
pub const ENV_KMS_KEY_ID: &str = "CREDSTASH_KMS_KEY_ID";
pub const ENV_PROFILE: &str = "AWS_PROFILE";
pub const ENV_DYNAMODB_ENDPOINT: &str = "DYNAMODB_ENDPOINT";
pub const ENV_KMS_ENDPOINT: &str = "KMS_ENDPOINT";

/// Fully resolved store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    pub region: String,
    pub kms_region: String,
    pub table: String,
    pub kms_key_id: String,
    pub profile: String,
    pub dynamodb_endpoint: Option<String>,
    pub kms_endpoint: Option<String>,
}

/// Settings given explicitly by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub region: Option<String>,
    pub kms_region: Option<String>,
    pub table: Option<String>,
    pub kms_key_id: Option<String>,
    pub profile: Option<String>,
    pub dynamodb_endpoint: Option<String>,
    pub kms_endpoint: Option<String>,
}

/// Optional YAML config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigFile {
    pub region: Option<String>,
    pub kms_region: Option<String>,
    pub table: Option<String>,
    pub kms_key_id: Option<String>,
    pub profile: Option<String>,
    pub dynamodb_endpoint: Option<String>,
    pub kms_endpoint: Option<String>,
}

impl ConfigFile {
    /// Load and parse a config file
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path, e)))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path, e)))
    }

    /// Load `explicit` if given, otherwise the default file if it exists
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn discover(explicit: Option<&Utf8Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// `~/.credstash/config.yaml`
///
/// Prefers `HOME` over `dirs::home_dir()` so container overrides apply.
pub fn default_config_path() -> Option<Utf8PathBuf> {
    let home = env::var("HOME")
        .ok()
        .filter(|h| !h.is_empty())
        .map(std::path::PathBuf::from)
        .or_else(dirs::home_dir)?;
    let home = Utf8PathBuf::from_path_buf(home).ok()?;
    Some(home.join(".credstash").join("config.yaml"))
}

fn pick(candidates: [Option<String>; 3]) -> Option<String> {
    candidates.into_iter().flatten().find(|v| !v.is_empty())
}

impl StoreConfig {
    /// Resolve against the process environment
    pub fn resolve(overrides: &ConfigOverrides, file: &ConfigFile) -> Self {
        Self::resolve_with(overrides, file, |key| env::var(key).ok())
    }

    /// Resolve with `lookup` standing in for the environment
    pub fn resolve_with<F>(overrides: &ConfigOverrides, file: &ConfigFile, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let field = |explicit: &Option<String>, var: &str, from_file: &Option<String>| {
            pick([explicit.clone(), lookup(var), from_file.clone()])
        };

        let region = field(&overrides.region, ENV_REGION, &file.region)
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let kms_region = field(&overrides.kms_region, ENV_KMS_REGION, &file.kms_region)
            .unwrap_or_else(|| region.clone());

        Self {
            kms_region,
            table: field(&overrides.table, ENV_TABLE, &file.table)
                .unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            kms_key_id: field(&overrides.kms_key_id, ENV_KMS_KEY_ID, &file.kms_key_id)
                .unwrap_or_else(|| DEFAULT_KMS_KEY_ID.to_string()),
            profile: field(&overrides.profile, ENV_PROFILE, &file.profile)
                .unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
            dynamodb_endpoint: field(
                &overrides.dynamodb_endpoint,
                ENV_DYNAMODB_ENDPOINT,
                &file.dynamodb_endpoint,
            ),
            kms_endpoint: field(&overrides.kms_endpoint, ENV_KMS_ENDPOINT, &file.kms_endpoint),
            region,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::resolve_with(&ConfigOverrides::default(), &ConfigFile::default(), |_| None)
    }
}
