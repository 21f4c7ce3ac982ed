#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

struct CountingProvider {
    calls: Arc<AtomicUsize>,
    secrets: HashMap<String, String>,
}

impl CountingProvider {
    fn new(secrets: &[(&str, &str)]) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Self {
            calls: calls.clone(),
            secrets: secrets
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        (provider, calls)
    }
}

impl SecretProvider for CountingProvider {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn fetch_secret(&self, name: &str) -> Result<Option<String>, KeyVaultError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if name == "explode" {
            return Err(KeyVaultError::new("backend unavailable"));
        }
        Ok(self.secrets.get(name).cloned())
    }
}

fn no_env(_: &str) -> Option<String> {
    None
}

fn manager(config: Configuration, secrets: &[(&str, &str)]) -> (KeyVaultManager, Arc<AtomicUsize>) {
    let (provider, calls) = CountingProvider::new(secrets);
    let mgr = KeyVaultManager::with_provider(Arc::new(config), Box::new(provider))
        .with_env_lookup(no_env);
    (mgr, calls)
}

#[test]
fn test_unset_vault_returns_none() {
    let mgr = KeyVaultManager::new(Arc::new(Configuration::default()));
    assert_eq!(mgr.get_secret("github-pat").unwrap(), None);
    assert_eq!(mgr.cached_secret_count(), 0);
}

#[test]
fn test_blank_name_skips_provider() {
    let (mgr, calls) = manager(Configuration::default(), &[("a", "1")]);
    assert_eq!(mgr.get_secret("").unwrap(), None);
    assert_eq!(mgr.get_secret("   ").unwrap(), None);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_second_lookup_served_from_cache() {
    let (mgr, calls) = manager(Configuration::default(), &[("db-password", "hunter2")]);
    assert_eq!(mgr.get_secret("db-password").unwrap().as_deref(), Some("hunter2"));
    assert_eq!(mgr.get_secret("db-password").unwrap().as_deref(), Some("hunter2"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    mgr.clear_cache();
    mgr.clear_cache();
    assert_eq!(mgr.get_secret("db-password").unwrap().as_deref(), Some("hunter2"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_missing_secret_is_not_cached() {
    let (mgr, calls) = manager(Configuration::default(), &[]);
    assert_eq!(mgr.get_secret("nope").unwrap(), None);
    assert_eq!(mgr.get_secret("nope").unwrap(), None);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(mgr.cached_secret_count(), 0);
}

#[test]
fn test_provider_failure_is_keyvault_error() {
    let (mgr, _) = manager(Configuration::default(), &[]);
    let err = mgr.get_secret("explode").unwrap_err();
    assert!(err.to_string().contains("backend unavailable"));
    assert_eq!(err.exit_code(), crate::error::ExitCode::KeyVault);
}

#[test]
fn test_unsupported_vault_type_errors_on_lookup() {
    let config = Configuration {
        vault_type: Some("keepass".into()),
        ..Configuration::default()
    };
    let mgr = KeyVaultManager::new(Arc::new(config));
    let err = mgr.get_secret("x").unwrap_err();
    assert!(err.to_string().contains("keepass"));
    // blank names still short-circuit
    assert_eq!(mgr.get_secret("").unwrap(), None);
}

#[test]
fn test_incomplete_vault_settings_error_on_lookup() {
    let config = Configuration {
        vault_type: Some("hashicorp".into()),
        vault_url: Some("http://127.0.0.1:1".into()),
        ..Configuration::default()
    };
    let mgr = KeyVaultManager::new(Arc::new(config));
    let err = mgr.get_secret("x").unwrap_err();
    assert!(err.to_string().contains("APIGEN_VAULT_TOKEN"));
}

#[test]
fn test_dispose_is_idempotent_and_blocks_lookups() {
    let (mgr, calls) = manager(Configuration::default(), &[("a", "1")]);
    mgr.get_secret("a").unwrap();
    mgr.dispose();
    mgr.dispose();
    assert_eq!(mgr.cached_secret_count(), 0);
    assert!(mgr.get_secret("a").is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_pat_precedence_configured_token_first() {
    let config = Configuration {
        pat_token: Some("direct".into()),
        pat_secret_name: Some("pat".into()),
        ..Configuration::default()
    };
    let (mgr, calls) = manager(config, &[("pat", "from-vault")]);
    let mgr = mgr.with_env_lookup(|_| Some("from-ci".into()));
    assert_eq!(mgr.get_pat_token().unwrap().as_deref(), Some("direct"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_pat_precedence_vault_before_ci() {
    let config = Configuration {
        pat_secret_name: Some("pat".into()),
        ..Configuration::default()
    };
    let (mgr, _) = manager(config, &[("pat", "from-vault")]);
    let mgr = mgr.with_env_lookup(|_| Some("from-ci".into()));
    assert_eq!(mgr.get_pat_token().unwrap().as_deref(), Some("from-vault"));
}

#[test]
fn test_pat_falls_through_to_ci_in_order() {
    let config = Configuration {
        pat_secret_name: Some("missing".into()),
        ..Configuration::default()
    };
    let (mgr, _) = manager(config, &[]);
    let mgr = mgr.with_env_lookup(|key| match key {
        "GITHUB_TOKEN" => Some("gh".into()),
        "GIT_TOKEN" => Some("jenkins".into()),
        _ => None,
    });
    assert_eq!(mgr.get_pat_token().unwrap().as_deref(), Some("gh"));

    let mgr = mgr.with_env_lookup(|key| match key {
        "SYSTEM_ACCESSTOKEN" => Some("ado".into()),
        "GITHUB_TOKEN" => Some("gh".into()),
        _ => None,
    });
    assert_eq!(mgr.get_pat_token().unwrap().as_deref(), Some("ado"));
}

#[test]
fn test_pat_none_when_nothing_available() {
    let (mgr, _) = manager(Configuration::default(), &[]);
    assert_eq!(mgr.get_pat_token().unwrap(), None);
}

#[test]
fn test_template_pat_prefers_template_settings() {
    let config = Configuration {
        pat_token: Some("repo".into()),
        template_pat_secret_name: Some("tpl".into()),
        ..Configuration::default()
    };
    let (mgr, _) = manager(config, &[("tpl", "template-token")]);
    assert_eq!(
        mgr.get_template_pat_token().unwrap().as_deref(),
        Some("template-token")
    );
}

#[test]
fn test_template_pat_falls_back_to_repo_token() {
    let config = Configuration {
        pat_token: Some("repo".into()),
        template_pat_secret_name: Some("missing".into()),
        ..Configuration::default()
    };
    let (mgr, _) = manager(config, &[]);
    assert_eq!(mgr.get_template_pat_token().unwrap().as_deref(), Some("repo"));
}

#[test]
fn test_vault_type_parse() {
    assert_eq!("Azure".parse::<VaultType>().unwrap(), VaultType::Azure);
    assert_eq!("aws".parse::<VaultType>().unwrap(), VaultType::Aws);
    assert_eq!(" vault ".parse::<VaultType>().unwrap(), VaultType::HashiCorp);
    assert!("gcp".parse::<VaultType>().is_err());
}
