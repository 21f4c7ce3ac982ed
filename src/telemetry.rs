//! # Telemetry Module
//!
//! Structured logging for the pipeline, built on `tracing`.
//!
//! ## Environment Variables
//!
//! - `APIGEN_LOG_LEVEL` - trace/debug/info/warn/error (default: `info`)
//! - `APIGEN_LOG_FORMAT` - `json` or `pretty` (default: `json`)
//! - `APIGEN_LOG_TARGET_FILTER` - extra comma-separated `EnvFilter` directives
//!
//! ## Pipeline records
//!
//! - [`PhaseScope`] - phase start/end markers with elapsed time
//! - [`TimedOperation`] - debug-level timing around a single operation
//! - [`log_file_generated`] / [`log_template_validation`] - per-artifact records
//!
//! Secret values never reach a log line; only presence or length is recorded.

use crate::model::GeneratedFile;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for CI, pretty-print for local runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub format: LogFormat,
    /// Extra filter directives (comma-separated)
    pub target_filter: Option<String>,
    /// Include file:line location
    pub include_location: bool,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("APIGEN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: LogFormat::parse(
                &env::var("APIGEN_LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            ),
            target_filter: env::var("APIGEN_LOG_TARGET_FILTER").ok(),
            include_location: env::var("APIGEN_LOG_INCLUDE_LOCATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
        }
    }

    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            target_filter: None,
            include_location: true,
        }
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let mut env_filter = EnvFilter::try_new(&config.log_level)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to build log filter")?;

    if let Some(target_filter) = &config.target_filter {
        for filter in target_filter.split(',') {
            let filter = filter.trim();
            if filter.is_empty() {
                continue;
            }
            match filter.parse() {
                Ok(directive) => env_filter = env_filter.add_directive(directive),
                Err(_) => eprintln!("Warning: Invalid log filter directive: {}", filter),
            }
        }
    }

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}

/// Marks the start of a pipeline phase; logs the end with elapsed time on drop.
#[must_use = "the phase ends when the scope is dropped"]
pub struct PhaseScope {
    name: &'static str,
    started: Instant,
    _span: tracing::span::EnteredSpan,
}

impl PhaseScope {
    pub fn begin(name: &'static str) -> Self {
        let span = tracing::info_span!("phase", phase = name).entered();
        info!(phase = name, "Phase started");
        Self {
            name,
            started: Instant::now(),
            _span: span,
        }
    }
}

impl Drop for PhaseScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        info!(phase = self.name, elapsed_ms, "Phase finished");
    }
}

/// Debug-level timing around one operation.
#[must_use = "the operation is timed until the guard is dropped"]
pub struct TimedOperation {
    name: String,
    started: Instant,
}

impl TimedOperation {
    pub fn start(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!(operation = %name, "Operation started");
        Self {
            name,
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl Drop for TimedOperation {
    fn drop(&mut self) {
        debug!(
            operation = %self.name,
            elapsed_ms = self.elapsed_ms(),
            "Operation completed"
        );
    }
}

pub fn log_file_generated(file: &GeneratedFile) {
    debug!(
        path = %file.relative_path,
        file_type = ?file.file_type,
        entity = file.associated_entity.as_deref().unwrap_or(""),
        size_bytes = file.size_bytes,
        "File generated"
    );
}

pub fn log_template_validation(path: &Path, valid: bool, reason: &str) {
    if valid {
        debug!(template = %path.display(), reason, "Template directory valid");
    } else {
        debug!(template = %path.display(), reason, "Template directory rejected");
    }
}
