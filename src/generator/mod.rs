//! # Generator Module
//!
//! Turns discovered entities and a template directory into a project tree on
//! disk.
//!
//! ## Steps
//!
//! 1. Recreate the output directory (default `<cwd>/generated-api`).
//! 2. Build the base token map (see [`base_tokens`]), including the deployment
//!    tag from the [`TagTemplateProcessor`].
//! 3. Copy the template tree, substituting `{token}` placeholders in text files
//!    and byte-copying the rest. Each copy is recorded as [`FileType::Template`].
//! 4. For each entity, merge [`entity_tokens`] over the base map and write the
//!    language emitter's files, recorded as [`FileType::Model`].
//! 5. Write [`METADATA_FILE`], recorded as [`FileType::Metadata`].
//!
//! Two entities emitting the same model path abort the run before the second
//! write. Any failure aborts the run with [`CodeGenerationError`]. Files already
//! written stay on disk; cleanup is the caller's decision.
//!
//! ## Tokens
//!
//! | Token | Value |
//! |-------|-------|
//! | `project-name` | template directory name as an identifier |
//! | `namespace` | PascalCase template name as an identifier |
//! | `cloud-provider` | PascalCase cloud as an identifier |
//! | `version`, `language`, `cloud` | run inputs |
//! | `repository-url`, `repository-branch` | source repository settings |
//! | `entity-count`, `property-count`, `entity-names` | discovery summary |
//! | `generator-version`, `generated-at` | this tool |
//! | `deployment-tag`, `deployment-tag-safe` | computed tag and its identifier form |
//! | `azure-subscription-id`, `aws-account-id`, ... | per-cloud ids, when configured |

pub mod emitters;
mod metadata;
mod tag;
mod tokens;


pub use emitters::{EmittedFile, EmitterRegistry, FieldType, LanguageEmitter};
pub use metadata::{write_metadata, ApiMetadata, ConfigurationSummary, METADATA_FILE};
pub use tag::{
    render_tag, safe_tag, FileTagTemplateProcessor, TagTemplateProcessor, DEFAULT_TAG_PATTERN,
    TAG_TEMPLATE_FILE,
};
pub use tokens::{base_tokens, entity_tokens, TokenContext};

use crate::config::Configuration;
use crate::error::CodeGenerationError;
use crate::model::{DiscoveredEntity, FileType, GeneratedFile, GeneratedProject};
use crate::telemetry::{log_file_generated, TimedOperation};
use crate::text_files::copy_tree_with_tokens;
use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Writes a [`GeneratedProject`] for the configured language and cloud.
pub struct CodeGenerator {
    config: Arc<Configuration>,
    emitters: EmitterRegistry,
    tag_processor: Box<dyn TagTemplateProcessor>,
    output_dir: PathBuf,
}

impl CodeGenerator {
    pub fn new(config: Arc<Configuration>) -> Self {
        let output_dir = config.output_dir.clone();
        Self {
            config,
            emitters: EmitterRegistry::with_defaults(),
            tag_processor: Box::new(FileTagTemplateProcessor),
            output_dir,
        }
    }

    pub fn with_emitters(mut self, emitters: EmitterRegistry) -> Self {
        self.emitters = emitters;
        self
    }

    pub fn with_tag_processor(mut self, processor: impl TagTemplateProcessor + 'static) -> Self {
        self.tag_processor = Box::new(processor);
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Generate the project for `entities` from the template at
    /// `template_path`.
    pub fn generate(
        &self,
        entities: &[DiscoveredEntity],
        template_path: &Path,
        version: &str,
    ) -> Result<GeneratedProject, CodeGenerationError> {
        let _timer = TimedOperation::start("code-generation");
        let language = self
            .config
            .require_language()
            .map_err(|e| CodeGenerationError::with_source("Cannot generate without a language", e))?;
        let cloud = self
            .config
            .require_cloud()
            .map_err(|e| CodeGenerationError::with_source("Cannot generate without a cloud", e))?;
        if !template_path.is_dir() {
            return Err(CodeGenerationError::new(format!(
                "Template directory {} does not exist",
                template_path.display()
            )));
        }
        let emitter = self.emitters.create(language)?;
        self.prepare_output_dir(template_path)?;

        let generated_at = Utc::now();
        let deployment_tag = self
            .tag_processor
            .process_tag_template(version, template_path)?;
        let tokens = base_tokens(
            &self.config,
            &TokenContext {
                language,
                cloud,
                template_path,
                version,
                entities,
                deployment_tag: &deployment_tag,
                generated_at,
            },
        );
        info!(
            language = %language,
            cloud = %cloud,
            template = %template_path.display(),
            output = %self.output_dir.display(),
            entities = entities.len(),
            deployment_tag = %deployment_tag,
            "Generating project"
        );

        let mut project = GeneratedProject {
            output_path: self.output_dir.clone(),
            language,
            cloud,
            version: version.to_string(),
            template_path: template_path.to_path_buf(),
            generated_at_utc: generated_at,
            entities: entities.to_vec(),
            generated_files: Vec::new(),
            token_replacements: tokens.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        };

        let copied = copy_tree_with_tokens(template_path, &self.output_dir, &tokens).map_err(|e| {
            CodeGenerationError::with_source(
                format!("Failed to copy template {}", template_path.display()),
                e,
            )
        })?;
        for file in copied {
            let file = GeneratedFile {
                relative_path: file.relative_path,
                full_path: file.full_path,
                file_type: FileType::Template,
                associated_entity: None,
                size_bytes: file.size_bytes,
            };
            log_file_generated(&file);
            project.record(file);
        }

        // model path -> index of the entity that owns it
        let mut model_owners: HashMap<String, usize> = HashMap::new();
        for (index, entity) in entities.iter().enumerate() {
            let mut entity_map = tokens.clone();
            entity_map.extend(entity_tokens(entity));
            for emitted in emitter.generate_entity_files(entity, &entity_map)? {
                let owner = *model_owners
                    .entry(emitted.relative_path.clone())
                    .or_insert(index);
                if owner != index {
                    let other = &entities[owner];
                    return Err(CodeGenerationError::new(format!(
                        "Entities {} ({}) and {} ({}) both generate {}",
                        other.fully_qualified_name,
                        other.source_location.display(),
                        entity.fully_qualified_name,
                        entity.source_location.display(),
                        emitted.relative_path
                    )));
                }
                let file = self.write_emitted(&emitted, entity)?;
                log_file_generated(&file);
                project.record(file);
            }
        }

        let metadata = write_metadata(&project, &self.config)?;
        log_file_generated(&metadata);
        project.record(metadata);

        info!(
            files = project.generated_files.len(),
            total_size_bytes = project.total_size_bytes(),
            "Project generated"
        );
        Ok(project)
    }

    /// Remove and recreate the output directory.
    fn prepare_output_dir(&self, template_path: &Path) -> Result<(), CodeGenerationError> {
        let output = &self.output_dir;
        if output.as_os_str().is_empty() || output.parent().is_none() {
            return Err(CodeGenerationError::new(format!(
                "Refusing to use {} as the output directory",
                output.display()
            )));
        }
        let canonical_template =
            fs::canonicalize(template_path).unwrap_or_else(|_| template_path.to_path_buf());
        if output.exists() {
            let canonical_output = fs::canonicalize(output).unwrap_or_else(|_| output.clone());
            if canonical_template.starts_with(&canonical_output) {
                return Err(CodeGenerationError::new(format!(
                    "Output directory {} contains the template {}",
                    output.display(),
                    template_path.display()
                )));
            }
            debug!(output = %output.display(), "Clearing previous output");
            fs::remove_dir_all(output).map_err(|e| {
                CodeGenerationError::with_source(format!("Failed to clear {}", output.display()), e)
            })?;
        }
        fs::create_dir_all(output).map_err(|e| {
            CodeGenerationError::with_source(format!("Failed to create {}", output.display()), e)
        })?;
        let canonical_output = fs::canonicalize(output).unwrap_or_else(|_| output.clone());
        if canonical_output.starts_with(&canonical_template) {
            return Err(CodeGenerationError::new(format!(
                "Output directory {} is inside the template {}",
                output.display(),
                template_path.display()
            )));
        }
        Ok(())
    }

    fn write_emitted(
        &self,
        emitted: &EmittedFile,
        entity: &DiscoveredEntity,
    ) -> Result<GeneratedFile, CodeGenerationError> {
        let relative = Path::new(&emitted.relative_path);
        let safe = relative.components().count() > 0
            && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(CodeGenerationError::new(format!(
                "Emitter produced an invalid path '{}' for {}",
                emitted.relative_path, entity.fully_qualified_name
            )));
        }
        let full_path = self.output_dir.join(relative);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CodeGenerationError::with_source(format!("Failed to create {}", parent.display()), e)
            })?;
        }
        fs::write(&full_path, emitted.content.as_bytes()).map_err(|e| {
            CodeGenerationError::with_source(format!("Failed to write {}", full_path.display()), e)
        })?;
        Ok(GeneratedFile {
            relative_path: emitted.relative_path.clone(),
            full_path,
            file_type: FileType::Model,
            associated_entity: Some(entity.fully_qualified_name.clone()),
            size_bytes: emitted.content.len() as u64,
        })
    }
}
