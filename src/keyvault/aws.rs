use super::{required, SecretProvider};
use crate::config::Configuration;
use crate::error::KeyVaultError;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "secretsmanager";
const TARGET: &str = "secretsmanager.GetSecretValue";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResponse {
    secret_string: Option<String>,
}

#[derive(Deserialize)]
struct AwsErrorBody {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(default, alias = "Message")]
    message: String,
}

/// AWS Secrets Manager `GetSecretValue`, signed with Signature Version 4.
pub struct AwsSecretsManagerProvider {
    client: Client,
    endpoint: Url,
    region: String,
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsSecretsManagerProvider {
    pub fn from_config(config: &Configuration, client: Client) -> Result<Self, KeyVaultError> {
        let region = required(&config.aws_region, "AWS_REGION")?;
        let endpoint = config
            .aws_secrets_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{SERVICE}.{region}.amazonaws.com/"));
        let endpoint = Url::parse(&endpoint).map_err(|e| {
            KeyVaultError::with_source(format!("Invalid Secrets Manager endpoint '{endpoint}'"), e)
        })?;
        Ok(Self {
            client,
            endpoint,
            region,
            access_key_id: required(&config.aws_access_key_id, "AWS_ACCESS_KEY_ID")?,
            secret_access_key: required(&config.aws_secret_access_key, "AWS_SECRET_ACCESS_KEY")?,
            session_token: config
                .aws_session_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
        })
    }

    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }
}

impl SecretProvider for AwsSecretsManagerProvider {
    fn name(&self) -> &'static str {
        "aws-secrets-manager"
    }

    fn fetch_secret(&self, name: &str) -> Result<Option<String>, KeyVaultError> {
        let payload = json!({ "SecretId": name }).to_string();

        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), CONTENT_TYPE.to_string());
        headers.insert("host".to_string(), self.host_header());
        headers.insert("x-amz-target".to_string(), TARGET.to_string());
        if let Some(token) = &self.session_token {
            headers.insert("x-amz-security-token".to_string(), token.clone());
        }

        let request = SigningRequest {
            method: "POST",
            path: self.endpoint.path(),
            query: "",
            headers,
            payload: payload.as_bytes(),
        };
        let credentials = Credentials {
            access_key_id: &self.access_key_id,
            secret_access_key: &self.secret_access_key,
            region: &self.region,
            service: SERVICE,
        };
        let signed = sign(&request, &credentials, Utc::now());

        let mut builder = self.client.post(self.endpoint.clone()).body(payload.clone());
        for (header, value) in &signed.headers {
            // reqwest derives Host from the URL
            if header != "host" {
                builder = builder.header(header.as_str(), value.as_str());
            }
        }
        let response = builder
            .header("authorization", signed.authorization)
            .send()
            .map_err(|e| KeyVaultError::with_source("Secrets Manager request failed", e))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| KeyVaultError::with_source("Failed to read Secrets Manager response", e))?;
        if status.is_success() {
            let parsed: GetSecretValueResponse = serde_json::from_str(&body).map_err(|e| {
                KeyVaultError::with_source("Invalid Secrets Manager response", e)
            })?;
            return Ok(parsed.secret_string);
        }

        let error: AwsErrorBody = serde_json::from_str(&body).unwrap_or(AwsErrorBody {
            error_type: String::new(),
            message: body.clone(),
        });
        if error.error_type.ends_with("ResourceNotFoundException") {
            return Ok(None);
        }
        Err(KeyVaultError::new(format!(
            "Secrets Manager returned HTTP {status} for secret '{name}': {} {}",
            error.error_type, error.message
        )))
    }
}

pub(crate) struct Credentials<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
}

/// Request parts covered by the signature. Header names must be lowercase.
pub(crate) struct SigningRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    /// Already in canonical form (sorted, encoded).
    pub query: &'a str,
    pub headers: BTreeMap<String, String>,
    pub payload: &'a [u8],
}

pub(crate) struct SignedRequest {
    /// Input headers plus `x-amz-date`.
    pub headers: BTreeMap<String, String>,
    pub authorization: String,
}

pub(crate) fn sign(
    request: &SigningRequest<'_>,
    credentials: &Credentials<'_>,
    now: DateTime<Utc>,
) -> SignedRequest {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();

    let mut headers = request.headers.clone();
    headers.insert("x-amz-date".to_string(), amz_date.clone());

    let canonical = canonical_request(request, &headers);
    let scope = format!(
        "{date_stamp}/{}/{}/aws4_request",
        credentials.region, credentials.service
    );
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical.as_bytes()))
    );
    let key = signing_key(
        credentials.secret_access_key,
        &date_stamp,
        credentials.region,
        credentials.service,
    );
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));
    let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");

    SignedRequest {
        headers,
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
    }
}

pub(crate) fn canonical_request(
    request: &SigningRequest<'_>,
    headers: &BTreeMap<String, String>,
) -> String {
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{k}:{}\n", v.trim()))
        .collect();
    let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");
    let path = if request.path.is_empty() { "/" } else { request.path };
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        path,
        request.query,
        canonical_headers,
        signed_headers,
        hex::encode(Sha256::digest(request.payload))
    )
}

pub(crate) fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
