//! Secret value handling and audit logging
//!
//! Provides:
//! - SecureString with zeroize
//! - Audit logging (never logs secret values)

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A decrypted secret that is zeroed on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    pub fn new(value: String) -> Self {
        Self { inner: value }
    }

    /// Get the string value (use with caution)
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to owned String (consumes self)
    pub fn into_string(mut self) -> String {
        std::mem::take(&mut self.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureString([REDACTED {} bytes])", self.len())
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Audit log entry for store operations
#[derive(Debug, Clone)]
pub struct AuditLog {
    pub operation: &'static str,
    pub secret_name: String,
    pub version: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: std::time::SystemTime,
}

impl AuditLog {
    pub fn new(operation: &'static str, secret_name: impl Into<String>) -> Self {
        Self {
            operation,
            secret_name: secret_name.into(),
            version: None,
            success: true,
            error: None,
            timestamp: std::time::SystemTime::now(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        self.success = false;
        self.error = Some(error.to_string());
        self
    }

    /// Record the outcome of `result` and emit the entry
    pub fn finish<T, E: fmt::Display>(self, result: &std::result::Result<T, E>) {
        match result {
            Ok(_) => self.log(),
            Err(e) => self.with_error(e).log(),
        }
    }

    /// Log the audit entry (never logs secret values)
    pub fn log(&self) {
        if self.success {
            tracing::info!(
                operation = %self.operation,
                secret_name = %self.secret_name,
                version = ?self.version,
                timestamp = ?self.timestamp,
                "Secret operation successful"
            );
        } else {
            tracing::warn!(
                operation = %self.operation,
                secret_name = %self.secret_name,
                version = ?self.version,
                error = ?self.error,
                timestamp = ?self.timestamp,
                "Secret operation failed"
            );
        }
    }
}
