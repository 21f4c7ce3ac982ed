//! # Pipeline Module
//!
//! Runs one generation end to end:
//!
//! ```text
//! discovery → template fetch → generation
//! ```
//!
//! Phases are strictly sequential and each is wrapped in a
//! [`PhaseScope`]. In NOOP mode only discovery runs and its result is
//! returned.
//!
//! The pipeline owns its [`KeyVaultManager`] and [`TemplateManager`]; both are
//! disposed when the pipeline is dropped, which deletes the template cache.

use crate::config::Configuration;
use crate::discovery::EntityDiscovery;
use crate::error::PipelineError;
use crate::generator::CodeGenerator;
use crate::keyvault::KeyVaultManager;
use crate::model::{DiscoveredEntity, GeneratedProject};
use crate::telemetry::PhaseScope;
use crate::templates::{is_valid_template_dir, TemplateManager};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Per-run inputs that do not come from [`Configuration`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub version: String,
    /// Use this directory instead of fetching. Either a template itself or a
    /// directory that contains the configured template.
    pub template_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            template_dir: None,
            output_dir: None,
        }
    }
}

#[derive(Debug)]
pub enum PipelineOutcome {
    /// NOOP mode: discovery only.
    Analyzed(Vec<DiscoveredEntity>),
    Generated(GeneratedProject),
}

pub struct Pipeline {
    config: Arc<Configuration>,
    key_vault: Arc<KeyVaultManager>,
    discovery: EntityDiscovery,
    templates: TemplateManager,
}

impl Pipeline {
    pub fn new(config: Arc<Configuration>) -> Result<Self, PipelineError> {
        let key_vault = Arc::new(KeyVaultManager::new(Arc::clone(&config)));
        Self::with_key_vault(config, key_vault)
    }

    /// Build around an existing vault manager (custom providers, tests).
    pub fn with_key_vault(
        config: Arc<Configuration>,
        key_vault: Arc<KeyVaultManager>,
    ) -> Result<Self, PipelineError> {
        let discovery = EntityDiscovery::new(Arc::clone(&config));
        let templates = TemplateManager::new(Arc::clone(&config), Arc::clone(&key_vault))?;
        Ok(Self {
            config,
            key_vault,
            discovery,
            templates,
        })
    }

    /// Directory discovery resolves relative search paths against.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.discovery.set_base_dir(base_dir);
        self
    }

    pub fn key_vault(&self) -> &KeyVaultManager {
        &self.key_vault
    }

    pub fn templates(&self) -> &TemplateManager {
        &self.templates
    }

    pub fn discover(&self) -> Result<Vec<DiscoveredEntity>, PipelineError> {
        let _phase = PhaseScope::begin("discovery");
        Ok(self.discovery.discover_entities()?)
    }

    pub fn run(&self, options: &PipelineOptions) -> Result<PipelineOutcome, PipelineError> {
        let language = self.config.require_language()?;
        let cloud = self.config.require_cloud()?;
        info!(
            language = %language,
            cloud = %cloud,
            version = %options.version,
            noop = self.config.noop_mode,
            "Pipeline started"
        );

        let entities = self.discover()?;
        if self.config.noop_mode {
            info!(
                entities = entities.len(),
                "NOOP mode: skipping template fetch and generation"
            );
            return Ok(PipelineOutcome::Analyzed(entities));
        }

        let template_path = {
            let _phase = PhaseScope::begin("template-fetch");
            self.resolve_template(options.template_dir.as_deref())?
        };

        let project = {
            let _phase = PhaseScope::begin("generation");
            let mut generator = CodeGenerator::new(Arc::clone(&self.config));
            if let Some(output) = &options.output_dir {
                generator = generator.with_output_dir(output);
            }
            generator.generate(&entities, &template_path, &options.version)?
        };
        info!(
            output = %project.output_path.display(),
            files = project.generated_files.len(),
            "Pipeline finished"
        );
        Ok(PipelineOutcome::Generated(project))
    }

    fn resolve_template(&self, template_dir: Option<&Path>) -> Result<PathBuf, PipelineError> {
        let template_name = self.config.resolved_template_name()?;
        if let Some(dir) = template_dir {
            if is_valid_template_dir(dir) {
                return Ok(dir.to_path_buf());
            }
            return Ok(self.templates.get_template_path(dir, &template_name)?);
        }
        let local = self.templates.fetch_templates()?;
        Ok(self.templates.get_template_path(&local, &template_name)?)
    }

    /// Release the template cache and vault state now instead of on drop.
    pub fn dispose(&self) {
        self.templates.dispose();
        self.key_vault.dispose();
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.dispose();
    }
}
