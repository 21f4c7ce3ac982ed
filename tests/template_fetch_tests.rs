#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use apigen::config::Configuration;
use apigen::error::ExitCode;
use apigen::keyvault::KeyVaultManager;
use apigen::templates::TemplateManager;
use common::fixtures::{zip_archive, TEMPLATE_REPO};
use common::mock_http::{MockResponse, MockServer};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn manager(config: Configuration) -> TemplateManager {
    let config = Arc::new(config);
    let key_vault = KeyVaultManager::new(Arc::clone(&config)).with_env_lookup(|_| None);
    TemplateManager::new(config, Arc::new(key_vault)).unwrap()
}

fn github_config(cache: &Path, server: &MockServer) -> Configuration {
    Configuration {
        template_repository_url: Some("https://github.com/acme/api-templates".to_string()),
        template_branch: "release".to_string(),
        template_cache_dir: cache.to_path_buf(),
        github_api_url: server.url().to_string(),
        ..Configuration::default()
    }
}

fn serve_templates() -> MockServer {
    let archive = zip_archive(Some("acme-api-templates-9c1e2d7"), TEMPLATE_REPO);
    MockServer::start(move |_| MockResponse::bytes(archive.clone()))
}

#[test]
fn test_github_zipball_is_flattened_and_validated() {
    let tmp = TempDir::new().unwrap();
    let server = serve_templates();
    let manager = manager(github_config(tmp.path(), &server));

    let local = manager.fetch_templates().unwrap();

    assert!(local.starts_with(tmp.path()));
    assert!(local.join("README.md").is_file());
    assert!(local.join("templates/typescript-azure/package.json").is_file());
    assert!(!local.join("acme-api-templates-9c1e2d7").exists());
    assert_eq!(
        manager.get_available_templates(&local).unwrap(),
        vec!["python-aws".to_string(), "typescript-azure".to_string()]
    );

    let requests = server.requests();
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path(), "/repos/acme/api-templates/zipball/release");
}

#[test]
fn test_second_fetch_is_served_from_cache() {
    let tmp = TempDir::new().unwrap();
    let server = serve_templates();
    let manager = manager(github_config(tmp.path(), &server));

    let first = manager.fetch_templates().unwrap();
    let second = manager.fetch_templates().unwrap();

    assert_eq!(first, second);
    assert_eq!(server.request_count(), 1);
}

#[test]
fn test_expired_entry_is_fetched_again() {
    let tmp = TempDir::new().unwrap();
    let server = serve_templates();
    let mut config = github_config(tmp.path(), &server);
    config.template_cache_ttl_seconds = 1;
    let manager = manager(config);

    manager.fetch_templates().unwrap();
    thread::sleep(Duration::from_millis(1500));
    let local = manager.fetch_templates().unwrap();

    assert_eq!(server.request_count(), 2);
    assert!(local.join("templates/typescript-azure/package.json").is_file());
}

#[test]
fn test_github_token_is_sent_as_bearer() {
    let tmp = TempDir::new().unwrap();
    let server = serve_templates();
    let mut config = github_config(tmp.path(), &server);
    config.template_pat_token = Some("ghp_template".to_string());
    let manager = manager(config);

    manager.fetch_templates().unwrap();

    let requests = server.requests();
    assert_eq!(
        requests[0].header("Authorization"),
        Some("Bearer ghp_template")
    );
}

#[test]
fn test_azure_devops_uses_basic_auth_and_items_api() {
    let tmp = TempDir::new().unwrap();
    let archive = zip_archive(None, TEMPLATE_REPO);
    let server = MockServer::start(move |_| MockResponse::bytes(archive.clone()));
    let config = Configuration {
        template_repository_url: Some(
            "https://dev.azure.com/acme/Platform/_git/api-templates".to_string(),
        ),
        template_pat_token: Some("tok".to_string()),
        template_cache_dir: tmp.path().to_path_buf(),
        azure_devops_url: server.url().to_string(),
        ..Configuration::default()
    };
    let manager = manager(config);

    let local = manager.fetch_templates().unwrap();
    assert!(local.join("templates/python-aws/requirements.txt").is_file());

    let requests = server.requests();
    assert_eq!(
        requests[0].path(),
        "/acme/Platform/_apis/git/repositories/api-templates/items"
    );
    assert!(requests[0].url.contains("versionDescriptor.version=main"));
    assert!(requests[0].url.contains("$format=zip"));
    // base64(":tok")
    assert_eq!(requests[0].header("Authorization"), Some("Basic OnRvaw=="));
}

#[test]
fn test_archive_without_templates_fails_validation() {
    let tmp = TempDir::new().unwrap();
    let archive = zip_archive(Some("wrapper"), &[("templates/docs/notes.md", "nothing here")]);
    let server = MockServer::start(move |_| MockResponse::bytes(archive.clone()));
    let manager = manager(github_config(tmp.path(), &server));

    let err = manager.fetch_templates().unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::Template);
    assert!(err.to_string().contains("No valid templates"), "{err}");

    // failed fetches are not memoized
    manager.fetch_templates().unwrap_err();
    assert_eq!(server.request_count(), 2);
}

#[test]
fn test_unauthorized_download_mentions_pat() {
    let tmp = TempDir::new().unwrap();
    let server = MockServer::start(|_| MockResponse::status(401));
    let manager = manager(github_config(tmp.path(), &server));

    let err = manager.fetch_templates().unwrap_err();
    assert!(err.to_string().contains("401"), "{err}");
    assert!(err.to_string().contains("PAT"), "{err}");
}

#[test]
fn test_dispose_removes_cache_directory() {
    let tmp = TempDir::new().unwrap();
    let cache = tmp.path().join("cache");
    let server = serve_templates();
    let manager = manager(github_config(&cache, &server));

    manager.fetch_templates().unwrap();
    assert!(fs::read_dir(&cache).unwrap().next().is_some());

    manager.dispose();
    manager.dispose();
    assert!(!cache.exists());
    assert!(manager.fetch_templates().is_err());
}
