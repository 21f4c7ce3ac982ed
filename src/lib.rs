//! # apigen
//!
//! **apigen** finds the types a code base marks as API entities and turns them,
//! together with a cloud/language template repository, into a ready-to-deploy
//! API project.
//!
//! ## Overview
//!
//! One run is a fixed sequence of phases:
//!
//! ```text
//! Configuration → EntityDiscovery → TemplateManager → CodeGenerator → generated-api/
//!                       ↑                  ↑
//!                  source tree      KeyVaultManager (PATs)
//! ```
//!
//! 1. **Discovery** reads the source tree of one of six languages and collects
//!    every type flagged with the tracking marker, members in declaration order.
//! 2. **Template fetch** downloads (GitHub, Azure DevOps) or clones (any other
//!    git host) the template repository into a TTL cache and validates it.
//! 3. **Generation** copies the selected template with `{token}` substitution,
//!    writes one model file per entity through the language emitter, and
//!    records everything in `api-metadata.json`.
//!
//! Credentials for private template repositories come from configuration, a
//! secret vault (Azure Key Vault, AWS Secrets Manager, HashiCorp Vault) or the
//! CI system's token variable.
//!
//! ## Modules
//!
//! - **[`config`]** - `APIGEN_*` settings, language and cloud selectors
//! - **[`keyvault`]** - secret lookup with per-instance caching
//! - **[`discovery`]** - per-language source-text entity discovery
//! - **[`templates`]** - template fetching, caching and validation
//! - **[`generator`]** - project generation, language emitters, metadata
//! - **[`pipeline`]** - phase sequencing and NOOP mode
//! - **[`cli`]** - the `apigen` command line
//! - **[`error`]** - typed phase errors and the exit-code domain
//! - **[`telemetry`]** - `tracing` setup and pipeline log records
//!
//! ## Quick Start
//!
//! ```bash
//! export APIGEN_TYPESCRIPT=true
//! export APIGEN_CLOUD=azure
//! export APIGEN_TRACKING_MARKER=Entity
//! export APIGEN_TEMPLATE_REPOSITORY_URL=https://github.com/acme/api-templates
//! apigen generate --version 1.0.0
//! ```
//!
//! ```rust,no_run
//! use apigen::config::Configuration;
//! use apigen::pipeline::{Pipeline, PipelineOptions};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(Configuration::from_env()?);
//! let pipeline = Pipeline::new(config)?;
//! pipeline.run(&PipelineOptions::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Exit codes
//!
//! Every phase error carries an [`error::ExitCode`]; the binary exits with it.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod generator;
pub mod keyvault;
pub mod model;
pub mod naming;
pub mod pipeline;
pub mod telemetry;
pub mod templates;
pub mod text_files;

pub use config::{Cloud, Configuration, Language};
pub use error::{ExitCode, PipelineError};
pub use model::{DiscoveredEntity, EntityProperty, GeneratedFile, GeneratedProject};
pub use pipeline::{Pipeline, PipelineOptions, PipelineOutcome};
