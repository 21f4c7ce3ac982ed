//! # Key Vault Module
//!
//! Resolves named secrets and access tokens without callers knowing which
//! backend holds them.
//!
//! ## Backends
//!
//! Selected by `APIGEN_VAULT_TYPE`:
//!
//! | Value | Provider | Protocol |
//! |-------|----------|----------|
//! | `azure` | [`AzureKeyVaultProvider`] | client-credentials OAuth, then Key Vault REST |
//! | `aws` | [`AwsSecretsManagerProvider`] | SigV4-signed `GetSecretValue` |
//! | `hashicorp` | [`HashiCorpVaultProvider`] | KV v2, `data.data.value` |
//!
//! When no vault type is set every lookup returns `Ok(None)` without touching
//! the network. "Not found" is always `Ok(None)`; any other provider failure is
//! a [`KeyVaultError`].
//!
//! ## Caching
//!
//! Resolved values are cached in memory for the lifetime of the manager.
//! [`KeyVaultManager::clear_cache`] empties it; [`KeyVaultManager::dispose`]
//! (also run on drop) clears it and releases the HTTP transport.
//!
//! ## Token precedence
//!
//! [`KeyVaultManager::get_pat_token`]:
//! 1. `APIGEN_PAT_TOKEN`
//! 2. secret named by `APIGEN_PAT_SECRET_NAME`
//! 3. CI variables, in order: Azure Pipelines, GitHub Actions, Jenkins
//! 4. none
//!
//! [`KeyVaultManager::get_template_pat_token`] checks the template-specific
//! token and secret name first, then falls back to the chain above.

mod aws;
mod azure;
mod hashicorp;

#[cfg(test)]
mod tests;

pub use aws::AwsSecretsManagerProvider;
pub use azure::AzureKeyVaultProvider;
pub use hashicorp::HashiCorpVaultProvider;

use crate::config::Configuration;
use crate::error::KeyVaultError;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for OAuth and secret calls.
pub const SECRET_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// CI systems checked for an ambient access token, in order.
pub const CI_TOKEN_SOURCES: &[(&str, &str)] = &[
    ("Azure Pipelines", "SYSTEM_ACCESSTOKEN"),
    ("GitHub Actions", "GITHUB_TOKEN"),
    ("Jenkins", "GIT_TOKEN"),
];

/// A secret backend.
///
/// `Ok(None)` means the backend answered and the secret does not exist.
pub trait SecretProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch_secret(&self, name: &str) -> Result<Option<String>, KeyVaultError>;
}

/// Supported `APIGEN_VAULT_TYPE` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultType {
    Azure,
    Aws,
    HashiCorp,
}

impl FromStr for VaultType {
    type Err = KeyVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "azure" | "azurekeyvault" | "akv" => Ok(VaultType::Azure),
            "aws" | "awssecretsmanager" | "secretsmanager" => Ok(VaultType::Aws),
            "hashicorp" | "hashicorpvault" | "vault" => Ok(VaultType::HashiCorp),
            other => Err(KeyVaultError::new(format!(
                "Unsupported vault type '{other}' (expected azure, aws or hashicorp)"
            ))),
        }
    }
}

impl fmt::Display for VaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VaultType::Azure => "azure",
            VaultType::Aws => "aws",
            VaultType::HashiCorp => "hashicorp",
        })
    }
}

enum Backend {
    Unset,
    /// Bad vault type or incomplete settings; reported on first use.
    Invalid(String),
    Ready(Box<dyn SecretProvider>),
    Disposed,
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Secret resolution with an in-memory cache.
///
/// Not designed for concurrent use by several pipeline runs; each run owns
/// its own manager.
pub struct KeyVaultManager {
    config: Arc<Configuration>,
    backend: Mutex<Backend>,
    cache: Mutex<HashMap<String, String>>,
    env: EnvLookup,
}

impl KeyVaultManager {
    /// Build the backend selected by the configuration.
    ///
    /// Configuration problems are deferred to the first secret lookup so a run
    /// that never needs a secret is not failed by them.
    pub fn new(config: Arc<Configuration>) -> Self {
        let backend = match build_provider(&config) {
            Ok(Some(provider)) => Backend::Ready(provider),
            Ok(None) => Backend::Unset,
            Err(e) => Backend::Invalid(e.message().to_string()),
        };
        Self::from_backend(config, backend)
    }

    /// Use a caller-supplied backend regardless of the configured vault type.
    pub fn with_provider(config: Arc<Configuration>, provider: Box<dyn SecretProvider>) -> Self {
        Self::from_backend(config, Backend::Ready(provider))
    }

    /// Replace the environment lookup used for CI token detection.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    fn from_backend(config: Arc<Configuration>, backend: Backend) -> Self {
        Self {
            config,
            backend: Mutex::new(backend),
            cache: Mutex::new(HashMap::new()),
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Resolve a secret by name.
    ///
    /// Returns `Ok(None)` for a blank name, when no vault is configured, or
    /// when the provider reports the secret as missing.
    pub fn get_secret(&self, name: &str) -> Result<Option<String>, KeyVaultError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let backend = self.lock_backend();
        let provider = match &*backend {
            Backend::Unset => {
                debug!(secret = name, "No vault configured, skipping secret lookup");
                return Ok(None);
            }
            Backend::Invalid(reason) => return Err(KeyVaultError::new(reason.clone())),
            Backend::Disposed => {
                return Err(KeyVaultError::new("Key vault manager has been disposed"))
            }
            Backend::Ready(provider) => provider,
        };

        if let Some(value) = self.lock_cache().get(name) {
            debug!(secret = name, "Secret cache hit");
            return Ok(Some(value.clone()));
        }

        debug!(secret = name, provider = provider.name(), "Fetching secret");
        match provider.fetch_secret(name)? {
            Some(value) => {
                info!(
                    secret = name,
                    provider = provider.name(),
                    length = value.len(),
                    "Secret resolved"
                );
                self.lock_cache().insert(name.to_string(), value.clone());
                Ok(Some(value))
            }
            None => {
                info!(secret = name, provider = provider.name(), "Secret not found");
                Ok(None)
            }
        }
    }

    /// Access token for the target repository.
    pub fn get_pat_token(&self) -> Result<Option<String>, KeyVaultError> {
        if let Some(token) = non_blank(self.config.pat_token.as_deref()) {
            debug!("Using configured PAT token");
            return Ok(Some(token));
        }
        if let Some(secret_name) = non_blank(self.config.pat_secret_name.as_deref()) {
            if let Some(token) = self.get_secret(&secret_name)? {
                debug!(secret = %secret_name, "Using PAT token from vault");
                return Ok(Some(token));
            }
        }
        Ok(self.detect_ci_token())
    }

    /// Access token for the template repository, falling back to
    /// [`Self::get_pat_token`].
    pub fn get_template_pat_token(&self) -> Result<Option<String>, KeyVaultError> {
        if let Some(token) = non_blank(self.config.template_pat_token.as_deref()) {
            debug!("Using configured template PAT token");
            return Ok(Some(token));
        }
        if let Some(secret_name) = non_blank(self.config.template_pat_secret_name.as_deref()) {
            if let Some(token) = self.get_secret(&secret_name)? {
                debug!(secret = %secret_name, "Using template PAT token from vault");
                return Ok(Some(token));
            }
        }
        self.get_pat_token()
    }

    fn detect_ci_token(&self) -> Option<String> {
        for (system, var) in CI_TOKEN_SOURCES {
            if let Some(token) = non_blank((self.env)(var).as_deref()) {
                info!(ci = *system, variable = *var, "Using CI-provided access token");
                return Some(token);
            }
        }
        None
    }

    /// Empty the secret cache. Idempotent.
    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    pub fn cached_secret_count(&self) -> usize {
        self.lock_cache().len()
    }

    /// Clear the cache and release the HTTP transport. Safe to call repeatedly.
    pub fn dispose(&self) {
        self.clear_cache();
        let mut backend = self.lock_backend();
        if !matches!(*backend, Backend::Disposed) {
            debug!("Disposing key vault manager");
            *backend = Backend::Disposed;
        }
    }

    fn lock_backend(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.cache.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for KeyVaultManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn http_client() -> Result<reqwest::blocking::Client, KeyVaultError> {
    reqwest::blocking::Client::builder()
        .timeout(SECRET_HTTP_TIMEOUT)
        .build()
        .map_err(|e| KeyVaultError::with_source("Failed to build HTTP client", e))
}

fn build_provider(
    config: &Configuration,
) -> Result<Option<Box<dyn SecretProvider>>, KeyVaultError> {
    let Some(raw) = non_blank(config.vault_type.as_deref()) else {
        return Ok(None);
    };
    let vault_type: VaultType = raw.parse()?;
    let provider: Box<dyn SecretProvider> = match vault_type {
        VaultType::Azure => Box::new(AzureKeyVaultProvider::from_config(config, http_client()?)?),
        VaultType::Aws => Box::new(AwsSecretsManagerProvider::from_config(
            config,
            http_client()?,
        )?),
        VaultType::HashiCorp => Box::new(HashiCorpVaultProvider::from_config(
            config,
            http_client()?,
        )?),
    };
    debug!(vault = %vault_type, "Key vault provider configured");
    Ok(Some(provider))
}

/// Required setting or a [`KeyVaultError`] naming the variable.
pub(crate) fn required(value: &Option<String>, variable: &str) -> Result<String, KeyVaultError> {
    non_blank(value.as_deref()).ok_or_else(|| {
        warn!(variable, "Missing vault setting");
        KeyVaultError::new(format!("Missing required vault setting APIGEN_{variable}"))
    })
}
