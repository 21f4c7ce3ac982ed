use super::{required, SecretProvider};
use crate::config::Configuration;
use crate::error::KeyVaultError;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

const KEY_VAULT_API_VERSION: &str = "7.4";
const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

/// Azure Key Vault over REST, authenticated with a client-credentials token.
pub struct AzureKeyVaultProvider {
    client: Client,
    vault_url: String,
    authority_url: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    // bearer token and the instant it stops being reused
    token: Mutex<Option<(String, Instant)>>,
}

impl AzureKeyVaultProvider {
    pub fn from_config(config: &Configuration, client: Client) -> Result<Self, KeyVaultError> {
        Ok(Self {
            client,
            vault_url: required(&config.vault_url, "VAULT_URL")?
                .trim_end_matches('/')
                .to_string(),
            authority_url: config.azure_authority_url.trim_end_matches('/').to_string(),
            tenant_id: required(&config.azure_tenant_id, "AZURE_TENANT_ID")?,
            client_id: required(&config.azure_client_id, "AZURE_CLIENT_ID")?,
            client_secret: required(&config.azure_client_secret, "AZURE_CLIENT_SECRET")?,
            token: Mutex::new(None),
        })
    }

    fn access_token(&self) -> Result<String, KeyVaultError> {
        let mut guard = self.token.lock().unwrap_or_else(|p| p.into_inner());
        if let Some((token, valid_until)) = &*guard {
            if Instant::now() < *valid_until {
                return Ok(token.clone());
            }
        }

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_url, self.tenant_id
        );
        let body = format!(
            "grant_type=client_credentials&client_id={}&client_secret={}&scope={}",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.client_secret),
            urlencoding::encode(KEY_VAULT_SCOPE),
        );
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .map_err(|e| KeyVaultError::with_source("Azure token request failed", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(KeyVaultError::new(format!(
                "Failed to obtain Azure access token: HTTP {status}"
            )));
        }
        let parsed: TokenResponse = response
            .json()
            .map_err(|e| KeyVaultError::with_source("Invalid Azure token response", e))?;

        // renew a minute before the advertised expiry
        let lifetime = parsed.expires_in.unwrap_or(3600).saturating_sub(60);
        *guard = Some((
            parsed.access_token.clone(),
            Instant::now() + Duration::from_secs(lifetime),
        ));
        debug!(tenant = %self.tenant_id, "Obtained Azure access token");
        Ok(parsed.access_token)
    }
}

impl SecretProvider for AzureKeyVaultProvider {
    fn name(&self) -> &'static str {
        "azure-key-vault"
    }

    fn fetch_secret(&self, name: &str) -> Result<Option<String>, KeyVaultError> {
        let token = self.access_token()?;
        let url = format!(
            "{}/secrets/{}?api-version={}",
            self.vault_url,
            urlencoding::encode(name),
            KEY_VAULT_API_VERSION
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .map_err(|e| KeyVaultError::with_source("Azure Key Vault request failed", e))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bundle: SecretBundle = response.json().map_err(|e| {
                    KeyVaultError::with_source("Invalid Azure Key Vault response", e)
                })?;
                Ok(bundle.value)
            }
            status => Err(KeyVaultError::new(format!(
                "Azure Key Vault returned HTTP {status} for secret '{name}'"
            ))),
        }
    }
}
