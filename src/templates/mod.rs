//! # Template Manager Module
//!
//! Obtains a local, validated copy of a template repository and memoizes it.
//!
//! ## Fetching
//!
//! | Host | Method | Auth |
//! |------|--------|------|
//! | GitHub | REST `zipball` download | `Bearer <PAT>` |
//! | Azure DevOps | Items API, `$format=zip` | `Basic base64(":" + PAT)` |
//! | anything else | `git clone --depth 1 --branch <branch>` | PAT in the clone URL |
//!
//! Archives are extracted and a single top-level wrapper directory (as GitHub
//! and Azure DevOps exports produce) is flattened away. Clones have their
//! `.git` directory removed.
//!
//! ## Cache
//!
//! Entries are keyed by a hash of `(repository_url, branch, sub_path)` and
//! expire `template_cache_ttl_seconds` after they were fetched. An expired
//! entry is replaced the next time it is read. [`TemplateManager::dispose`]
//! (also run on drop) deletes the whole cache directory.
//!
//! ## Validation
//!
//! A template directory is valid when it directly contains one of
//! [`TEMPLATE_MARKER_FILES`] or a `*.csproj` file. With structure validation
//! enabled, a fetch that yields no valid template under the template root
//! fails with [`TemplateError`].

mod archive;
mod host;


pub use archive::{extract_zip, flatten_single_wrapper};
pub use host::{redact_url, RepositoryHost};

use crate::config::Configuration;
use crate::error::TemplateError;
use crate::keyvault::KeyVaultManager;
use crate::telemetry::{log_template_validation, TimedOperation};
use crate::text_files::{copy_tree_with_tokens, is_vcs_dir, CopiedFile};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

/// Timeout for template downloads.
pub const TEMPLATE_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Files whose presence marks a directory as a template.
pub const TEMPLATE_MARKER_FILES: &[&str] = &[
    "template.json",
    "main.bicep",
    "main.tf",
    "package.json",
    "pom.xml",
    "go.mod",
    "requirements.txt",
    "template.yaml",
    "build.gradle",
    "tsconfig.json",
];

const USER_AGENT: &str = concat!("apigen/", env!("CARGO_PKG_VERSION"));

/// Whether `dir` directly contains a template marker file.
pub fn is_valid_template_dir(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.filter_map(Result::ok).any(|entry| {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            return false;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        TEMPLATE_MARKER_FILES.contains(&name.as_ref()) || name.ends_with(".csproj")
    })
}

/// Stable cache key for one repository/branch/sub-path combination.
pub fn cache_key(repository_url: &str, branch: &str, sub_path: &str) -> String {
    let digest = Sha256::digest(format!("{repository_url}|{branch}|{sub_path}").as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// One memoized fetch.
#[derive(Debug, Clone)]
pub struct TemplateCacheEntry {
    pub local_path: PathBuf,
    pub fetch_time_utc: DateTime<Utc>,
    pub repository_url: String,
    pub branch: String,
    pub sub_path: String,
}

impl TemplateCacheEntry {
    pub fn is_expired(&self, ttl_seconds: u64, now: DateTime<Utc>) -> bool {
        let age_ms = (now - self.fetch_time_utc).num_milliseconds();
        age_ms > (ttl_seconds as i64).saturating_mul(1000)
    }
}

/// Fetches, caches and validates template trees.
///
/// Owns its cache directory exclusively; two managers must not share one.
pub struct TemplateManager {
    config: Arc<Configuration>,
    key_vault: Arc<KeyVaultManager>,
    client: Client,
    cache_dir: PathBuf,
    cache: Mutex<HashMap<String, TemplateCacheEntry>>,
    disposed: AtomicBool,
}

impl TemplateManager {
    pub fn new(
        config: Arc<Configuration>,
        key_vault: Arc<KeyVaultManager>,
    ) -> Result<Self, TemplateError> {
        let client = Client::builder()
            .timeout(TEMPLATE_HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TemplateError::with_source("Failed to build HTTP client", e))?;
        let cache_dir = config.template_cache_dir.clone();
        Ok(Self {
            config,
            key_vault,
            client,
            cache_dir,
            cache: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Local root of the configured template repository, fetching it when
    /// there is no live cache entry.
    pub fn fetch_templates(&self) -> Result<PathBuf, TemplateError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(TemplateError::new("Template manager has been disposed"));
        }
        let repository_url = self
            .config
            .template_repository_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| TemplateError::new("No template repository configured"))?
            .to_string();
        let branch = self.config.template_branch.clone();
        let sub_path = self.config.template_sub_path.clone();
        let key = cache_key(&repository_url, &branch, &sub_path);

        let mut cache = self.lock_cache();
        if let Some(entry) = cache.get(&key) {
            let ttl = self.config.template_cache_ttl_seconds;
            if !entry.is_expired(ttl, Utc::now()) && entry.local_path.is_dir() {
                debug!(key = %key, path = %entry.local_path.display(), "Template cache hit");
                let path = entry.local_path.clone();
                if self.config.validate_template_structure {
                    self.validate_structure(&path)?;
                }
                return Ok(path);
            }
            debug!(key = %key, "Template cache entry expired");
        }

        let _timer = TimedOperation::start("template-fetch");
        let token = self.key_vault.get_template_pat_token().map_err(|e| {
            TemplateError::with_source("Failed to resolve template repository token", e)
        })?;

        let local_path = self.cache_dir.join(&key);
        if local_path.exists() {
            fs::remove_dir_all(&local_path).map_err(|e| {
                TemplateError::with_source(
                    format!("Failed to clear stale cache at {}", local_path.display()),
                    e,
                )
            })?;
        }
        fs::create_dir_all(&self.cache_dir).map_err(|e| {
            TemplateError::with_source(
                format!("Failed to create cache directory {}", self.cache_dir.display()),
                e,
            )
        })?;

        let host = RepositoryHost::detect(&repository_url);
        info!(
            repository = %redact_url(&repository_url),
            branch = %branch,
            host = host.kind(),
            authenticated = token.is_some(),
            "Fetching templates"
        );
        match &host {
            RepositoryHost::GitHub { owner, repo } => {
                let url = format!(
                    "{}/repos/{}/{}/zipball/{}",
                    self.config.github_api_url.trim_end_matches('/'),
                    owner,
                    repo,
                    urlencoding::encode(&branch)
                );
                let bytes = self.download(&url, token.as_deref().map(Auth::Bearer))?;
                extract_zip(&bytes, &local_path)?;
            }
            RepositoryHost::AzureDevOps {
                organization,
                project,
                repo,
            } => {
                let url = format!(
                    "{}/{}/{}/_apis/git/repositories/{}/items?path=/&versionDescriptor.version={}&versionDescriptor.versionType=branch&$format=zip&download=true&api-version=7.0",
                    self.config.azure_devops_url.trim_end_matches('/'),
                    urlencoding::encode(organization),
                    urlencoding::encode(project),
                    urlencoding::encode(repo),
                    urlencoding::encode(&branch)
                );
                let bytes = self.download(&url, token.as_deref().map(Auth::Basic))?;
                extract_zip(&bytes, &local_path)?;
            }
            RepositoryHost::Generic => {
                self.git_clone(&repository_url, &branch, token.as_deref(), &local_path)?;
            }
        }

        if self.config.validate_template_structure {
            self.validate_structure(&local_path)?;
        }
        cache.insert(
            key.clone(),
            TemplateCacheEntry {
                local_path: local_path.clone(),
                fetch_time_utc: Utc::now(),
                repository_url,
                branch,
                sub_path,
            },
        );
        info!(key = %key, path = %local_path.display(), "Templates fetched");
        Ok(local_path)
    }

    /// Names of valid template directories directly under the template root,
    /// sorted.
    pub fn get_available_templates(&self, local_path: &Path) -> Result<Vec<String>, TemplateError> {
        let root = self.template_root(local_path);
        let entries = fs::read_dir(&root).map_err(|e| {
            TemplateError::with_source(format!("Template root {} is not readable", root.display()), e)
        })?;
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter(|e| {
                let valid = is_valid_template_dir(&e.path());
                log_template_validation(&e.path(), valid, "marker file check");
                valid
            })
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Directory of one named template.
    ///
    /// Looks under `<base>/<sub_path>/<name>` first, then `<base>/<name>` so a
    /// template root can be passed directly.
    pub fn get_template_path(&self, base_path: &Path, template_name: &str) -> Result<PathBuf, TemplateError> {
        let candidates = [
            self.template_root(base_path).join(template_name),
            base_path.join(template_name),
        ];
        candidates
            .into_iter()
            .find(|p| p.is_dir())
            .ok_or_else(|| {
                TemplateError::new(format!(
                    "Template '{}' not found under {}",
                    template_name,
                    base_path.display()
                ))
            })
    }

    /// Copy a template tree, substituting tokens in text files.
    pub fn copy_template(
        &self,
        src: &Path,
        dest: &Path,
        tokens: &HashMap<String, String>,
    ) -> Result<Vec<CopiedFile>, TemplateError> {
        if !src.is_dir() {
            return Err(TemplateError::new(format!(
                "Template source {} does not exist",
                src.display()
            )));
        }
        copy_tree_with_tokens(src, dest, tokens).map_err(|e| {
            TemplateError::with_source(
                format!("Failed to copy template {} to {}", src.display(), dest.display()),
                e,
            )
        })
    }

    /// Fail unless at least one valid template exists under the template root.
    pub fn validate_structure(&self, local_path: &Path) -> Result<(), TemplateError> {
        let root = self.template_root(local_path);
        if !root.is_dir() {
            return Err(TemplateError::new(format!(
                "Template root {} does not exist",
                root.display()
            )));
        }
        let valid = WalkDir::new(&root)
            .into_iter()
            .filter_entry(|e| !is_vcs_dir(e.path()))
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_dir())
            .filter(|e| is_valid_template_dir(e.path()))
            .count();
        log_template_validation(&root, valid > 0, "structure validation");
        if valid == 0 {
            return Err(TemplateError::new(format!(
                "No valid templates found under {}",
                root.display()
            )));
        }
        debug!(root = %root.display(), valid, "Template structure validated");
        Ok(())
    }

    fn template_root(&self, local_path: &Path) -> PathBuf {
        let sub_path = self.config.template_sub_path.trim_matches('/');
        if sub_path.is_empty() {
            local_path.to_path_buf()
        } else {
            local_path.join(sub_path)
        }
    }

    fn download(&self, url: &str, auth: Option<Auth<'_>>) -> Result<Vec<u8>, TemplateError> {
        let mut request = self.client.get(url);
        request = match auth {
            Some(Auth::Bearer(token)) => request.bearer_auth(token),
            Some(Auth::Basic(token)) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(format!(":{token}"));
                request.header("Authorization", format!("Basic {encoded}"))
            }
            None => request,
        };
        let response = request.send().map_err(|e| {
            TemplateError::with_source(format!("Template download failed: {}", redact_url(url)), e)
        })?;
        let status = response.status();
        if !status.is_success() {
            let hint = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => " (check the template PAT)",
                StatusCode::NOT_FOUND => " (check repository URL and branch)",
                _ => "",
            };
            return Err(TemplateError::new(format!(
                "Template download returned HTTP {status}{hint}"
            )));
        }
        let bytes = response
            .bytes()
            .map_err(|e| TemplateError::with_source("Failed to read template archive", e))?;
        debug!(size_bytes = bytes.len(), "Template archive downloaded");
        Ok(bytes.to_vec())
    }

    fn git_clone(
        &self,
        repository_url: &str,
        branch: &str,
        token: Option<&str>,
        dest: &Path,
    ) -> Result<(), TemplateError> {
        let clone_url = authenticated_clone_url(repository_url, token);
        let output = Command::new(&self.config.git_bin)
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg("--branch")
            .arg(branch)
            .arg("--")
            .arg(&clone_url)
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|e| {
                TemplateError::with_source(format!("Failed to run '{}'", self.config.git_bin), e)
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = match token {
                Some(t) if !t.is_empty() => stderr.replace(t, "***"),
                _ => stderr.into_owned(),
            };
            return Err(TemplateError::new(format!(
                "git clone of {} failed: {}",
                redact_url(repository_url),
                stderr.trim()
            )));
        }

        let git_dir = dest.join(".git");
        if git_dir.exists() {
            fs::remove_dir_all(&git_dir).map_err(|e| {
                TemplateError::with_source("Failed to remove .git from cloned templates", e)
            })?;
        }
        Ok(())
    }

    /// Delete the cache directory. Safe to call repeatedly; failures are logged.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.lock_cache().clear();
        if self.cache_dir.exists() {
            match fs::remove_dir_all(&self.cache_dir) {
                Ok(()) => debug!(dir = %self.cache_dir.display(), "Template cache removed"),
                Err(e) => warn!(
                    dir = %self.cache_dir.display(),
                    error = %e,
                    "Failed to remove template cache"
                ),
            }
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<String, TemplateCacheEntry>> {
        self.cache.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for TemplateManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

enum Auth<'a> {
    Bearer(&'a str),
    Basic(&'a str),
}

/// Embed `token` as HTTP basic credentials for http(s) remotes.
fn authenticated_clone_url(repository_url: &str, token: Option<&str>) -> String {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return repository_url.to_string();
    };
    match Url::parse(repository_url) {
        Ok(mut url) if matches!(url.scheme(), "http" | "https") => {
            if url.set_username("oauth2").is_ok() && url.set_password(Some(token)).is_ok() {
                url.to_string()
            } else {
                repository_url.to_string()
            }
        }
        _ => repository_url.to_string(),
    }
}
