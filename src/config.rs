//! # Configuration Module
//!
//! Read-only settings for one pipeline run, loaded from `APIGEN_*` environment
//! variables with an optional TOML file underneath.
//!
//! ## Sources
//!
//! 1. `Configuration::default()` values
//! 2. TOML file passed to [`Configuration::load`] (keys match the field names)
//! 3. Environment variables (always win)
//!
//! ## Language selection
//!
//! Exactly one of `APIGEN_CSHARP`, `APIGEN_JAVA`, `APIGEN_PYTHON`,
//! `APIGEN_JAVASCRIPT`, `APIGEN_TYPESCRIPT`, `APIGEN_GO` must be `true`.
//!
//! ```bash
//! export APIGEN_TYPESCRIPT=true
//! export APIGEN_CLOUD=azure
//! export APIGEN_TRACKING_MARKER=Entity
//! export APIGEN_TEMPLATE_REPOSITORY_URL=https://github.com/acme/api-templates
//! apigen generate --version 1.2.0
//! ```

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix shared by every setting.
pub const ENV_PREFIX: &str = "APIGEN_";

/// Target language of both discovery and generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    CSharp,
    Java,
    Python,
    JavaScript,
    TypeScript,
    Go,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::CSharp,
        Language::Java,
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Go,
    ];

    /// Lowercase identifier used in tokens, template names and metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            Language::CSharp => "csharp",
            Language::Java => "java",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
        }
    }

    /// Name of the boolean selector variable (without prefix).
    fn selector(self) -> &'static str {
        match self {
            Language::CSharp => "CSHARP",
            Language::Java => "JAVA",
            Language::Python => "PYTHON",
            Language::JavaScript => "JAVASCRIPT",
            Language::TypeScript => "TYPESCRIPT",
            Language::Go => "GO",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csharp" | "c#" | "dotnet" | "cs" => Ok(Language::CSharp),
            "java" => Ok(Language::Java),
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" => Ok(Language::JavaScript),
            "typescript" | "ts" => Ok(Language::TypeScript),
            "go" | "golang" => Ok(Language::Go),
            other => Err(ConfigurationError::new(format!(
                "Unsupported language '{other}'"
            ))),
        }
    }
}

/// Target cloud for the generated deployment artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cloud {
    Azure,
    Aws,
    Gcp,
}

impl Cloud {
    pub fn as_str(self) -> &'static str {
        match self {
            Cloud::Azure => "azure",
            Cloud::Aws => "aws",
            Cloud::Gcp => "gcp",
        }
    }
}

impl fmt::Display for Cloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cloud {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "azure" => Ok(Cloud::Azure),
            "aws" | "amazon" => Ok(Cloud::Aws),
            "gcp" | "google" => Ok(Cloud::Gcp),
            other => Err(ConfigurationError::new(format!(
                "Unsupported cloud '{other}'"
            ))),
        }
    }
}

/// Settings for one pipeline run.
///
/// Shared as `Arc<Configuration>` once built; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub language: Option<Language>,
    pub cloud: Option<Cloud>,
    pub tracking_marker: String,
    pub ignore_marker: bool,
    pub source_paths: Vec<PathBuf>,
    pub build_output_path: Option<PathBuf>,

    pub repository_url: Option<String>,
    pub repository_branch: Option<String>,

    pub template_repository_url: Option<String>,
    pub template_branch: String,
    pub template_sub_path: String,
    pub template_name: Option<String>,
    pub template_cache_ttl_seconds: u64,
    pub template_cache_dir: PathBuf,
    pub validate_template_structure: bool,

    pub pat_token: Option<String>,
    pub pat_secret_name: Option<String>,
    pub template_pat_token: Option<String>,
    pub template_pat_secret_name: Option<String>,

    /// Raw vault selector; validated when a secret is first requested.
    pub vault_type: Option<String>,
    pub vault_url: Option<String>,
    pub vault_token: Option<String>,
    pub vault_mount: String,
    pub azure_tenant_id: Option<String>,
    pub azure_client_id: Option<String>,
    pub azure_client_secret: Option<String>,
    pub aws_region: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_session_token: Option<String>,

    pub azure_subscription_id: Option<String>,
    pub azure_resource_group: Option<String>,
    pub aws_account_id: Option<String>,
    pub gcp_project_id: Option<String>,

    pub output_dir: PathBuf,
    pub noop_mode: bool,

    pub github_api_url: String,
    pub azure_devops_url: String,
    pub azure_authority_url: String,
    pub aws_secrets_endpoint: Option<String>,
    pub git_bin: String,
}

impl Default for Configuration {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            language: None,
            cloud: None,
            tracking_marker: "ApiEntity".to_string(),
            ignore_marker: false,
            source_paths: Vec::new(),
            build_output_path: None,
            repository_url: None,
            repository_branch: None,
            template_repository_url: None,
            template_branch: "main".to_string(),
            template_sub_path: "templates".to_string(),
            template_name: None,
            template_cache_ttl_seconds: 3600,
            template_cache_dir: std::env::temp_dir().join("apigen-template-cache"),
            validate_template_structure: true,
            pat_token: None,
            pat_secret_name: None,
            template_pat_token: None,
            template_pat_secret_name: None,
            vault_type: None,
            vault_url: None,
            vault_token: None,
            vault_mount: "secret".to_string(),
            azure_tenant_id: None,
            azure_client_id: None,
            azure_client_secret: None,
            aws_region: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_session_token: None,
            azure_subscription_id: None,
            azure_resource_group: None,
            aws_account_id: None,
            gcp_project_id: None,
            output_dir: cwd.join("generated-api"),
            noop_mode: false,
            github_api_url: "https://api.github.com".to_string(),
            azure_devops_url: "https://dev.azure.com".to_string(),
            azure_authority_url: "https://login.microsoftonline.com".to_string(),
            aws_secrets_endpoint: None,
            git_bin: "git".to_string(),
        }
    }
}

impl Configuration {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load an optional TOML file, then overlay the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let base = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        base.overlay(|key| std::env::var(key).ok())
    }

    /// Build from defaults plus an arbitrary variable lookup.
    ///
    /// `lookup` receives fully-prefixed names such as `APIGEN_CLOUD`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().overlay(lookup)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigurationError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::with_source(
                format!("Failed to read configuration file: {}", path.display()),
                e,
            )
        })?;
        toml::from_str(&contents).map_err(|e| {
            ConfigurationError::with_source(
                format!("Failed to parse configuration file: {}", path.display()),
                e,
            )
        })
    }

    fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let flag = |name: &str| var(name).map(|v| parse_bool(&v));

        let mut selected = Vec::new();
        for lang in Language::ALL {
            if flag(lang.selector()) == Some(true) {
                selected.push(lang);
            }
        }
        match selected.len() {
            0 => {}
            1 => self.language = Some(selected[0]),
            _ => {
                let names: Vec<_> = selected.iter().map(|l| l.as_str()).collect();
                return Err(ConfigurationError::new(format!(
                    "Exactly one language must be selected, found: {}",
                    names.join(", ")
                )));
            }
        }

        if let Some(cloud) = var("CLOUD") {
            self.cloud = Some(cloud.parse()?);
        }

        set_string(&mut self.tracking_marker, var("TRACKING_MARKER"));
        set_bool(&mut self.ignore_marker, flag("IGNORE_MARKER"));
        if let Some(paths) = var("SOURCE_PATHS") {
            self.source_paths = paths
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect();
        }
        set_opt(&mut self.build_output_path, var("BUILD_OUTPUT_PATH").map(PathBuf::from));

        set_opt(&mut self.repository_url, var("REPOSITORY_URL"));
        set_opt(&mut self.repository_branch, var("REPOSITORY_BRANCH"));

        set_opt(&mut self.template_repository_url, var("TEMPLATE_REPOSITORY_URL"));
        set_string(&mut self.template_branch, var("TEMPLATE_BRANCH"));
        if let Some(sub) = lookup(&format!("{ENV_PREFIX}TEMPLATE_SUB_PATH")) {
            // an explicitly empty sub-path means "repository root"
            self.template_sub_path = sub.trim().trim_matches('/').to_string();
        }
        set_opt(&mut self.template_name, var("TEMPLATE_NAME"));
        if let Some(ttl) = var("TEMPLATE_CACHE_TTL_SECONDS") {
            self.template_cache_ttl_seconds = ttl.parse().map_err(|e| {
                ConfigurationError::with_source(
                    format!("Invalid {ENV_PREFIX}TEMPLATE_CACHE_TTL_SECONDS '{ttl}'"),
                    e,
                )
            })?;
        }
        if let Some(dir) = var("TEMPLATE_CACHE_DIR") {
            self.template_cache_dir = PathBuf::from(dir);
        }
        set_bool(
            &mut self.validate_template_structure,
            flag("VALIDATE_TEMPLATE_STRUCTURE"),
        );

        set_opt(&mut self.pat_token, var("PAT_TOKEN"));
        set_opt(&mut self.pat_secret_name, var("PAT_SECRET_NAME"));
        set_opt(&mut self.template_pat_token, var("TEMPLATE_PAT_TOKEN"));
        set_opt(&mut self.template_pat_secret_name, var("TEMPLATE_PAT_SECRET_NAME"));

        set_opt(&mut self.vault_type, var("VAULT_TYPE"));
        set_opt(&mut self.vault_url, var("VAULT_URL"));
        set_opt(&mut self.vault_token, var("VAULT_TOKEN"));
        set_string(&mut self.vault_mount, var("VAULT_MOUNT"));
        set_opt(&mut self.azure_tenant_id, var("AZURE_TENANT_ID"));
        set_opt(&mut self.azure_client_id, var("AZURE_CLIENT_ID"));
        set_opt(&mut self.azure_client_secret, var("AZURE_CLIENT_SECRET"));
        set_opt(&mut self.aws_region, var("AWS_REGION"));
        set_opt(&mut self.aws_access_key_id, var("AWS_ACCESS_KEY_ID"));
        set_opt(&mut self.aws_secret_access_key, var("AWS_SECRET_ACCESS_KEY"));
        set_opt(&mut self.aws_session_token, var("AWS_SESSION_TOKEN"));

        set_opt(&mut self.azure_subscription_id, var("AZURE_SUBSCRIPTION_ID"));
        set_opt(&mut self.azure_resource_group, var("AZURE_RESOURCE_GROUP"));
        set_opt(&mut self.aws_account_id, var("AWS_ACCOUNT_ID"));
        set_opt(&mut self.gcp_project_id, var("GCP_PROJECT_ID"));

        if let Some(dir) = var("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        set_bool(&mut self.noop_mode, flag("NOOP_MODE"));

        set_string(&mut self.github_api_url, var("GITHUB_API_URL"));
        set_string(&mut self.azure_devops_url, var("AZURE_DEVOPS_URL"));
        set_string(&mut self.azure_authority_url, var("AZURE_AUTHORITY_URL"));
        set_opt(&mut self.aws_secrets_endpoint, var("AWS_SECRETS_ENDPOINT"));
        set_string(&mut self.git_bin, var("GIT_BIN"));

        Ok(self)
    }

    /// The selected language, or a configuration error when none was chosen.
    pub fn require_language(&self) -> Result<Language, ConfigurationError> {
        self.language.ok_or_else(|| {
            ConfigurationError::new(
                "No target language selected (set exactly one APIGEN_<LANGUAGE>=true)",
            )
        })
    }

    pub fn require_cloud(&self) -> Result<Cloud, ConfigurationError> {
        self.cloud
            .ok_or_else(|| ConfigurationError::new("No target cloud selected (APIGEN_CLOUD)"))
    }

    /// Template directory name to generate from: explicit, else `<language>-<cloud>`.
    pub fn resolved_template_name(&self) -> Result<String, ConfigurationError> {
        if let Some(name) = &self.template_name {
            return Ok(name.clone());
        }
        Ok(format!(
            "{}-{}",
            self.require_language()?,
            self.require_cloud()?
        ))
    }
}

/// `true`, `1`, `yes`, `on` (any case) are true; everything else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn set_string(target: &mut String, value: Option<String>) {
    if let Some(v) = value {
        *target = v;
    }
}

fn set_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

fn set_bool(target: &mut bool, value: Option<bool>) {
    if let Some(v) = value {
        *target = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::from_lookup(|_| None).unwrap();
        assert_eq!(config.language, None);
        assert_eq!(config.tracking_marker, "ApiEntity");
        assert_eq!(config.template_branch, "main");
        assert_eq!(config.template_sub_path, "templates");
        assert_eq!(config.template_cache_ttl_seconds, 3600);
        assert!(config.validate_template_structure);
        assert!(config.output_dir.ends_with("generated-api"));
    }

    #[test]
    fn test_single_language_selected() {
        let config =
            Configuration::from_lookup(lookup(&[("TYPESCRIPT", "true"), ("CLOUD", "Azure")]))
                .unwrap();
        assert_eq!(config.language, Some(Language::TypeScript));
        assert_eq!(config.cloud, Some(Cloud::Azure));
        assert_eq!(config.resolved_template_name().unwrap(), "typescript-azure");
    }

    #[test]
    fn test_two_languages_rejected() {
        let err = Configuration::from_lookup(lookup(&[("JAVA", "true"), ("GO", "1")]))
            .unwrap_err();
        assert!(err.message().contains("java"));
        assert!(err.message().contains("go"));
    }

    #[test]
    fn test_false_flags_are_ignored() {
        let config =
            Configuration::from_lookup(lookup(&[("JAVA", "false"), ("GO", "yes")])).unwrap();
        assert_eq!(config.language, Some(Language::Go));
    }

    #[test]
    fn test_unsupported_cloud() {
        assert!(Configuration::from_lookup(lookup(&[("CLOUD", "oracle")])).is_err());
    }

    #[test]
    fn test_source_paths_and_ttl() {
        let config = Configuration::from_lookup(lookup(&[
            ("SOURCE_PATHS", "src, lib ,,"),
            ("TEMPLATE_CACHE_TTL_SECONDS", "60"),
            ("VALIDATE_TEMPLATE_STRUCTURE", "false"),
        ]))
        .unwrap();
        assert_eq!(
            config.source_paths,
            vec![PathBuf::from("src"), PathBuf::from("lib")]
        );
        assert_eq!(config.template_cache_ttl_seconds, 60);
        assert!(!config.validate_template_structure);
    }

    #[test]
    fn test_invalid_ttl() {
        let err = Configuration::from_lookup(lookup(&[("TEMPLATE_CACHE_TTL_SECONDS", "soon")]))
            .unwrap_err();
        assert!(err.message().contains("TTL"));
    }

    #[test]
    fn test_toml_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apigen.toml");
        std::fs::write(
            &path,
            "language = \"python\"\ncloud = \"gcp\"\ntracking_marker = \"Model\"\n",
        )
        .unwrap();
        let base = Configuration::from_toml_file(&path).unwrap();
        assert_eq!(base.language, Some(Language::Python));
        assert_eq!(base.tracking_marker, "Model");
        // defaults survive for keys the file does not mention
        assert_eq!(base.template_branch, "main");

        let merged = base
            .overlay(lookup(&[("TRACKING_MARKER", "Tracked")]))
            .unwrap();
        assert_eq!(merged.tracking_marker, "Tracked");
        assert_eq!(merged.cloud, Some(Cloud::Gcp));
    }

    #[test]
    fn test_language_parse_aliases() {
        assert_eq!("C#".parse::<Language>().unwrap(), Language::CSharp);
        assert_eq!("ts".parse::<Language>().unwrap(), Language::TypeScript);
        assert!("cobol".parse::<Language>().is_err());
    }
}
