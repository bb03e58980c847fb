//! Secret lookup
//!
//! Secrets are addressed by a short key (`github_secret`,
//! `access_token/{organization}`) qualified under a deployment prefix as
//! `/{prefix}/{key}`.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use crate::error::DbResult;

/// Read-only secret store
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Look up the secret stored under `key`
    ///
    /// Returns `Ok(None)` if the secret does not exist.
    async fn get_secret(&self, key: &str) -> DbResult<Option<String>>;
}

/// Fully qualified secret name
pub fn qualified_name(prefix: &str, key: &str) -> String {
    format!("/{}/{}", prefix.trim_matches('/'), key.trim_start_matches('/'))
}

/// Secrets read from environment variables
///
/// `/{prefix}/access_token/acme` is read from `{PREFIX}_ACCESS_TOKEN_ACME`:
/// the qualified name upper-cased with every non-alphanumeric run turned
/// into `_`.
#[derive(Debug, Clone)]
pub struct EnvSecretStore {
    prefix: String,
}

impl EnvSecretStore {
    /// Create a store reading secrets under `prefix`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable holding `key`
    pub fn variable_name(&self, key: &str) -> String {
        let mut name = String::new();
        for c in qualified_name(&self.prefix, key).chars() {
            if c.is_ascii_alphanumeric() {
                name.push(c.to_ascii_uppercase());
            } else if !name.is_empty() && !name.ends_with('_') {
                name.push('_');
            }
        }
        name.trim_end_matches('_').to_string()
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, key: &str) -> DbResult<Option<String>> {
        let variable = self.variable_name(key);
        debug!(secret = %qualified_name(&self.prefix, key), "Reading secret from {}", variable);
        Ok(std::env::var(&variable).ok().filter(|v| !v.is_empty()))
    }
}

/// Secrets held in memory, keyed by their short key
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret
    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(key.into(), value.into());
        self
    }
}

impl From<HashMap<String, String>> for StaticSecretStore {
    fn from(secrets: HashMap<String, String>) -> Self {
        Self { secrets }
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, key: &str) -> DbResult<Option<String>> {
        Ok(self.secrets.get(key).cloned())
    }
}
