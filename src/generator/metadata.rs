//! `api-metadata.json`, the summary a deployment step reads.

use crate::config::{Cloud, Configuration, Language};
use crate::error::CodeGenerationError;
use crate::model::{DiscoveredEntity, FileType, GeneratedFile, GeneratedProject};
use crate::templates::redact_url;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const METADATA_FILE: &str = "api-metadata.json";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMetadata<'a> {
    pub generator_version: &'static str,
    pub generated_at_utc: DateTime<Utc>,
    pub language: Language,
    pub cloud: Cloud,
    pub version: &'a str,
    pub deployment_tag: Option<&'a str>,
    pub template_path: &'a Path,
    pub output_path: &'a Path,
    pub entity_count: usize,
    pub property_count: usize,
    pub file_count: usize,
    pub total_size_bytes: u64,
    pub entities: &'a [DiscoveredEntity],
    pub generated_files: &'a [GeneratedFile],
    pub configuration: ConfigurationSummary<'a>,
}

/// The non-secret settings that shaped the run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSummary<'a> {
    pub tracking_marker: &'a str,
    pub ignore_marker: bool,
    pub repository_url: Option<&'a str>,
    pub repository_branch: Option<&'a str>,
    pub template_repository_url: Option<String>,
    pub template_branch: &'a str,
    pub template_sub_path: &'a str,
    pub template_name: Option<&'a str>,
    pub validate_template_structure: bool,
    pub vault_type: Option<&'a str>,
}

impl<'a> ConfigurationSummary<'a> {
    pub fn from_config(config: &'a Configuration) -> Self {
        Self {
            tracking_marker: &config.tracking_marker,
            ignore_marker: config.ignore_marker,
            repository_url: config.repository_url.as_deref(),
            repository_branch: config.repository_branch.as_deref(),
            template_repository_url: config.template_repository_url.as_deref().map(redact_url),
            template_branch: &config.template_branch,
            template_sub_path: &config.template_sub_path,
            template_name: config.template_name.as_deref(),
            validate_template_structure: config.validate_template_structure,
            vault_type: config.vault_type.as_deref(),
        }
    }
}

impl<'a> ApiMetadata<'a> {
    pub fn new(project: &'a GeneratedProject, config: &'a Configuration) -> Self {
        Self {
            generator_version: env!("CARGO_PKG_VERSION"),
            generated_at_utc: project.generated_at_utc,
            language: project.language,
            cloud: project.cloud,
            version: &project.version,
            deployment_tag: project.token_replacements.get("deployment-tag").map(String::as_str),
            template_path: &project.template_path,
            output_path: &project.output_path,
            entity_count: project.entities.len(),
            property_count: project.entities.iter().map(|e| e.properties.len()).sum(),
            file_count: project.generated_files.len(),
            total_size_bytes: project.total_size_bytes(),
            entities: &project.entities,
            generated_files: &project.generated_files,
            configuration: ConfigurationSummary::from_config(config),
        }
    }
}

/// Write [`METADATA_FILE`] into the project's output root.
///
/// Every file already recorded must exist on disk; a missing one fails the
/// write.
pub fn write_metadata(
    project: &GeneratedProject,
    config: &Configuration,
) -> Result<GeneratedFile, CodeGenerationError> {
    if let Some(missing) = project.generated_files.iter().find(|f| !f.full_path.is_file()) {
        return Err(CodeGenerationError::new(format!(
            "Generated file {} is missing from {}",
            missing.relative_path,
            project.output_path.display()
        )));
    }

    let json = serde_json::to_string_pretty(&ApiMetadata::new(project, config))
        .map_err(|e| CodeGenerationError::with_source("Failed to serialize project metadata", e))?;
    let full_path = project.output_path.join(METADATA_FILE);
    fs::write(&full_path, json.as_bytes()).map_err(|e| {
        CodeGenerationError::with_source(format!("Failed to write {}", full_path.display()), e)
    })?;
    Ok(GeneratedFile {
        relative_path: METADATA_FILE.to_string(),
        full_path,
        file_type: FileType::Metadata,
        associated_entity: None,
        size_bytes: json.len() as u64,
    })
}
