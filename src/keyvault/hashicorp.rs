use super::{required, SecretProvider};
use crate::config::Configuration;
use crate::error::KeyVaultError;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::warn;

/// HashiCorp Vault KV v2 engine.
///
/// Reads `GET {VAULT_URL}/v1/{mount}/data/{name}` and returns the
/// `data.data.value` field.
pub struct HashiCorpVaultProvider {
    client: Client,
    vault_url: String,
    mount: String,
    token: String,
}

impl HashiCorpVaultProvider {
    pub fn from_config(config: &Configuration, client: Client) -> Result<Self, KeyVaultError> {
        Ok(Self {
            client,
            vault_url: required(&config.vault_url, "VAULT_URL")?
                .trim_end_matches('/')
                .to_string(),
            mount: config.vault_mount.trim_matches('/').to_string(),
            token: required(&config.vault_token, "VAULT_TOKEN")?,
        })
    }
}

impl SecretProvider for HashiCorpVaultProvider {
    fn name(&self) -> &'static str {
        "hashicorp-vault"
    }

    fn fetch_secret(&self, name: &str) -> Result<Option<String>, KeyVaultError> {
        let url = format!("{}/v1/{}/data/{}", self.vault_url, self.mount, name);
        let response = self
            .client
            .get(&url)
            .header("X-Vault-Token", &self.token)
            .send()
            .map_err(|e| KeyVaultError::with_source("HashiCorp Vault request failed", e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(KeyVaultError::new(format!(
                "HashiCorp Vault returned HTTP {status} for secret '{name}'"
            )));
        }
        let body: Value = response
            .json()
            .map_err(|e| KeyVaultError::with_source("Invalid HashiCorp Vault response", e))?;
        match body.pointer("/data/data/value") {
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Ok(Some(other.to_string())),
            None => {
                warn!(secret = name, "Secret has no 'value' field");
                Ok(None)
            }
        }
    }
}
