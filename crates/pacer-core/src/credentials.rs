//! Credential resolution
//!
//! Tasks never hold secret values. A task carries a [`CredentialRef`], a pair of
//! reference names, and the secrets are looked up through a
//! [`CredentialProvider`] only when a job is about to run.
//!
//! ## Security Features
//!
//! - **SecureString**: Uses `zeroize` crate for cryptographic memory wiping
//! - **Debug Safety**: Sensitive values are redacted in Debug output

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Default environment prefix used by [`EnvCredentialProvider`]
pub const DEFAULT_ENV_PREFIX: &str = "PACER_CRED";

/// Credential resolution errors
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Reference name does not resolve to anything
    #[error("Credential not found: {0}")]
    NotFound(String),

    /// Reference resolved but holds no value
    #[error("Credential is empty: {0}")]
    Empty(String),

    /// Backend error
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for credential operations
pub type Result<T> = std::result::Result<T, CredentialError>;

/// A string that is cryptographically cleared from memory when dropped
///
/// # Example
///
/// ```
/// use pacer_core::credentials::SecureString;
///
/// let secret = SecureString::new("account-secret");
/// assert_eq!(secret.expose(), "account-secret");
///
/// // Debug output is redacted
/// let debug = format!("{:?}", secret);
/// assert!(!debug.contains("account"));
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Create a new secure string
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self { inner: s.into() }
    }

    /// Temporarily expose the string value
    ///
    /// The returned reference should not be stored or cloned unnecessarily.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Check if the secret is empty (whitespace counts as empty)
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.inner.trim().is_empty()
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString([REDACTED, {} bytes])", self.inner.len())
    }
}

impl std::fmt::Display for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Pair of reference names identifying the two secrets a job needs.
///
/// Only the names are persisted; the values live with the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRef {
    /// Reference to the account key
    pub key: String,
    /// Reference to the account secret
    pub secret: String,
}

impl CredentialRef {
    /// Create a new credential reference pair
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// True when either reference name is blank
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.key.trim().is_empty() || self.secret.trim().is_empty()
    }
}

/// Resolved secret pair handed to the network client
#[derive(Clone, Debug)]
pub struct CredentialPair {
    /// Account key
    pub key: SecureString,
    /// Account secret
    pub secret: SecureString,
}

impl CredentialPair {
    /// Build a pair from raw values
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: SecureString::new(key),
            secret: SecureString::new(secret),
        }
    }
}

/// Source of secret values, looked up by reference name
#[cfg_attr(test, mockall::automock)]
pub trait CredentialProvider: Send + Sync {
    /// Look up the secret stored under `name`
    fn secret(&self, name: &str) -> Result<SecureString>;
}

/// Resolve both halves of a reference pair, rejecting blank values
pub fn resolve_pair(provider: &dyn CredentialProvider, refs: &CredentialRef) -> Result<CredentialPair> {
    let key = provider.secret(&refs.key)?;
    if key.is_blank() {
        return Err(CredentialError::Empty(refs.key.clone()));
    }
    let secret = provider.secret(&refs.secret)?;
    if secret.is_blank() {
        return Err(CredentialError::Empty(refs.secret.clone()));
    }
    Ok(CredentialPair { key, secret })
}

/// Resolves reference names from environment variables.
///
/// A reference `billing-key` maps to `PACER_CRED_BILLING_KEY`.
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    prefix: String,
}

impl EnvCredentialProvider {
    /// Create a provider with a custom variable prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable name for a reference
    #[must_use]
    pub fn var_name(&self, name: &str) -> String {
        let suffix: String = name
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{}", self.prefix, suffix)
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_PREFIX)
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn secret(&self, name: &str) -> Result<SecureString> {
        let var = self.var_name(name);
        match std::env::var(&var) {
            Ok(value) => Ok(SecureString::new(value)),
            Err(std::env::VarError::NotPresent) => Err(CredentialError::NotFound(name.to_string())),
            Err(e) => Err(CredentialError::Backend(format!("{var}: {e}"))),
        }
    }
}

/// In-memory provider (for testing and embedding)
#[derive(Default)]
pub struct MemoryCredentialProvider {
    secrets: RwLock<HashMap<String, SecureString>>,
}

impl MemoryCredentialProvider {
    /// Create an empty provider
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a secret under a reference name
    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        let mut secrets = self
            .secrets
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        secrets.insert(name.into(), SecureString::new(value));
    }
}

impl CredentialProvider for MemoryCredentialProvider {
    fn secret(&self, name: &str) -> Result<SecureString> {
        let secrets = self
            .secrets
            .read()
            .map_err(|e| CredentialError::Backend(format!("Lock poisoned: {}", e)))?;
        secrets
            .get(name)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound(name.to_string()))
    }
}
