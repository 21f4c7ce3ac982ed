#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use apigen::config::Configuration;
use apigen::error::ExitCode;
use apigen::keyvault::KeyVaultManager;
use common::mock_http::{MockResponse, MockServer};
use std::sync::Arc;

fn manager(config: Configuration) -> KeyVaultManager {
    KeyVaultManager::new(Arc::new(config)).with_env_lookup(|_| None)
}

#[test]
fn test_unset_vault_makes_no_requests() {
    let server = MockServer::start(|_| MockResponse::status(500));
    let manager = manager(Configuration {
        vault_url: Some(server.url().to_string()),
        vault_token: Some("root".to_string()),
        ..Configuration::default()
    });

    assert_eq!(manager.get_secret("template-pat").unwrap(), None);
    assert_eq!(manager.get_pat_token().unwrap(), None);
    assert_eq!(server.request_count(), 0);
}

fn hashicorp_server() -> MockServer {
    MockServer::start(|req| match req.path() {
        "/v1/kv/data/template-pat" => {
            MockResponse::json(200, r#"{"data":{"data":{"value":"hv-secret"},"metadata":{}}}"#)
        }
        _ => MockResponse::json(404, r#"{"errors":[]}"#),
    })
}

fn hashicorp_config(server: &MockServer) -> Configuration {
    Configuration {
        vault_type: Some("hashicorp".to_string()),
        vault_url: Some(format!("{}/", server.url())),
        vault_token: Some("s.root".to_string()),
        vault_mount: "kv".to_string(),
        ..Configuration::default()
    }
}

#[test]
fn test_hashicorp_reads_kv2_value_and_caches_it() {
    let server = hashicorp_server();
    let manager = manager(hashicorp_config(&server));

    assert_eq!(
        manager.get_secret("template-pat").unwrap().as_deref(),
        Some("hv-secret")
    );
    assert_eq!(
        manager.get_secret("template-pat").unwrap().as_deref(),
        Some("hv-secret")
    );

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].header("X-Vault-Token"), Some("s.root"));
    assert_eq!(manager.cached_secret_count(), 1);
}

#[test]
fn test_hashicorp_missing_secret_is_none() {
    let server = hashicorp_server();
    let manager = manager(hashicorp_config(&server));

    assert_eq!(manager.get_secret("absent").unwrap(), None);
    assert_eq!(manager.cached_secret_count(), 0);
}

#[test]
fn test_hashicorp_server_error_is_keyvault_error() {
    let server = MockServer::start(|_| MockResponse::status(503));
    let manager = manager(hashicorp_config(&server));

    let err = manager.get_secret("template-pat").unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::KeyVault);
    assert!(err.to_string().contains("503"), "{err}");
}

#[test]
fn test_template_pat_resolved_through_vault() {
    let server = hashicorp_server();
    let mut config = hashicorp_config(&server);
    config.template_pat_secret_name = Some("template-pat".to_string());
    let manager = manager(config);

    assert_eq!(
        manager.get_template_pat_token().unwrap().as_deref(),
        Some("hv-secret")
    );
}

#[test]
fn test_azure_key_vault_reuses_access_token() {
    let server = MockServer::start(|req| match (req.method.as_str(), req.path()) {
        ("POST", "/tenant-1/oauth2/v2.0/token") => MockResponse::json(
            200,
            r#"{"token_type":"Bearer","expires_in":3600,"access_token":"aad-token"}"#,
        ),
        ("GET", "/secrets/db-password") => MockResponse::json(200, r#"{"value":"p@ss"}"#),
        ("GET", "/secrets/api-key") => MockResponse::json(200, r#"{"value":"k-123"}"#),
        _ => MockResponse::json(404, r#"{"error":{"code":"SecretNotFound"}}"#),
    });
    let manager = manager(Configuration {
        vault_type: Some("azure".to_string()),
        vault_url: Some(server.url().to_string()),
        azure_authority_url: server.url().to_string(),
        azure_tenant_id: Some("tenant-1".to_string()),
        azure_client_id: Some("client-1".to_string()),
        azure_client_secret: Some("shh".to_string()),
        ..Configuration::default()
    });

    assert_eq!(manager.get_secret("db-password").unwrap().as_deref(), Some("p@ss"));
    assert_eq!(manager.get_secret("api-key").unwrap().as_deref(), Some("k-123"));
    assert_eq!(manager.get_secret("missing").unwrap(), None);

    let requests = server.requests();
    let token_requests: Vec<_> = requests.iter().filter(|r| r.method == "POST").collect();
    assert_eq!(token_requests.len(), 1);
    assert!(token_requests[0].body.contains("grant_type=client_credentials"));
    assert!(token_requests[0].body.contains("client_id=client-1"));

    let secret_request = requests
        .iter()
        .find(|r| r.path() == "/secrets/db-password")
        .unwrap();
    assert!(secret_request.url.contains("api-version=7.4"));
    assert_eq!(secret_request.header("Authorization"), Some("Bearer aad-token"));
}

#[test]
fn test_azure_token_failure_is_keyvault_error() {
    let server = MockServer::start(|_| MockResponse::json(401, r#"{"error":"invalid_client"}"#));
    let manager = manager(Configuration {
        vault_type: Some("azure".to_string()),
        vault_url: Some(server.url().to_string()),
        azure_authority_url: server.url().to_string(),
        azure_tenant_id: Some("tenant-1".to_string()),
        azure_client_id: Some("client-1".to_string()),
        azure_client_secret: Some("wrong".to_string()),
        ..Configuration::default()
    });

    let err = manager.get_secret("db-password").unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::KeyVault);
}

fn aws_config(server: &MockServer) -> Configuration {
    Configuration {
        vault_type: Some("aws".to_string()),
        aws_region: Some("eu-west-1".to_string()),
        aws_access_key_id: Some("AKIDEXAMPLE".to_string()),
        aws_secret_access_key: Some("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string()),
        aws_session_token: Some("session-1".to_string()),
        aws_secrets_endpoint: Some(format!("{}/", server.url())),
        ..Configuration::default()
    }
}

#[test]
fn test_aws_get_secret_value_is_signed() {
    let server = MockServer::start(|req| {
        if req.body.contains("\"SecretId\":\"template-pat\"") {
            MockResponse::json(200, r#"{"Name":"template-pat","SecretString":"aws-secret"}"#)
        } else {
            MockResponse::json(
                400,
                r#"{"__type":"ResourceNotFoundException","message":"Secrets Manager can't find the specified secret."}"#,
            )
        }
    });
    let manager = manager(aws_config(&server));

    assert_eq!(
        manager.get_secret("template-pat").unwrap().as_deref(),
        Some("aws-secret")
    );
    assert_eq!(manager.get_secret("other").unwrap(), None);

    let requests = server.requests();
    let first = &requests[0];
    assert_eq!(first.method, "POST");
    assert_eq!(
        first.header("X-Amz-Target"),
        Some("secretsmanager.GetSecretValue")
    );
    assert_eq!(first.header("Content-Type"), Some("application/x-amz-json-1.1"));
    assert_eq!(first.header("X-Amz-Security-Token"), Some("session-1"));
    assert!(first.header("X-Amz-Date").is_some());

    let authorization = first.header("Authorization").unwrap();
    assert!(
        authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"),
        "{authorization}"
    );
    assert!(
        authorization.contains("/eu-west-1/secretsmanager/aws4_request"),
        "{authorization}"
    );
    assert!(authorization.contains("SignedHeaders="), "{authorization}");
}

#[test]
fn test_aws_access_denied_is_keyvault_error() {
    let server = MockServer::start(|_| {
        MockResponse::json(
            400,
            r#"{"__type":"AccessDeniedException","Message":"not authorized"}"#,
        )
    });
    let manager = manager(aws_config(&server));

    let err = manager.get_secret("template-pat").unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::KeyVault);
    assert!(err.to_string().contains("AccessDeniedException"), "{err}");
}

#[test]
fn test_incomplete_vault_settings_fail_on_first_lookup() {
    let manager = manager(Configuration {
        vault_type: Some("aws".to_string()),
        ..Configuration::default()
    });
    let err = manager.get_secret("anything").unwrap_err();
    assert!(err.to_string().contains("AWS_REGION"), "{err}");
}
