//! # Entity Discovery Module
//!
//! Finds the types in a code base that are flagged as API entities and turns
//! them into [`DiscoveredEntity`] values.
//!
//! ## Strategies
//!
//! One [`DiscoveryStrategy`] per [`Language`], looked up in a
//! [`StrategyRegistry`]. Every strategy reads source text; compiled-artifact
//! inspection is not supported, so C# is discovered from `*.cs` files too.
//!
//! | Language | Marker | Members |
//! |----------|--------|---------|
//! | C# | `[Marker]` attribute | `public T Name { get; ... }`, record parameters |
//! | Java | `@Marker` annotation | non-static fields, record components |
//! | Python | `@Marker` decorator or `# @Marker` | class annotations, `self.x = ...` in `__init__` |
//! | JavaScript | `@Marker` decorator, JSDoc or `// @Marker` | class fields, `this.x = ...` in the constructor |
//! | TypeScript | `@Marker` decorator or comment | interface / class members |
//! | Go | `// @Marker` comment | exported struct fields |
//!
//! A marker tags the first declaration that starts within
//! [`LOOKAHEAD_BYTES`] after it. With `ignore_marker` every declaration is
//! taken.
//!
//! ## Failure policy
//!
//! A file that cannot be read or parsed is logged and skipped. An unknown
//! language or having no readable search path fails the whole pass with
//! [`EntityDiscoveryError`].

mod csharp;
mod go;
mod java;
mod javascript;
mod python;
pub mod source;
mod typescript;


pub use csharp::{normalize_clr_type, CSharpStrategy};
pub use go::GoStrategy;
pub use java::JavaStrategy;
pub use javascript::JavaScriptStrategy;
pub use python::PythonStrategy;
pub use source::{SourceFile, LOOKAHEAD_BYTES, SKIPPED_DIRS};
pub use typescript::TypeScriptStrategy;

use crate::config::{Configuration, Language};
use crate::error::EntityDiscoveryError;
use crate::model::DiscoveredEntity;
use crate::telemetry::TimedOperation;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

macro_rules! lazy_regex {
    ($pattern:expr) => {
        once_cell::sync::Lazy::new(|| {
            #[allow(clippy::expect_used)]
            regex::Regex::new($pattern).expect("static pattern is valid")
        })
    };
}
pub(crate) use lazy_regex;

/// What marks a type as an entity.
#[derive(Debug, Clone)]
pub struct MarkerSettings {
    pub marker: String,
    pub ignore_marker: bool,
}

impl MarkerSettings {
    pub fn new(marker: impl Into<String>, ignore_marker: bool) -> Self {
        Self {
            marker: marker.into(),
            ignore_marker,
        }
    }

    pub fn from_config(config: &Configuration) -> Self {
        Self::new(config.tracking_marker.trim(), config.ignore_marker)
    }

    /// Compile a marker pattern; `{marker}` in `template` is replaced with
    /// the escaped marker text.
    pub(crate) fn compile(&self, template: &str) -> Result<Regex, EntityDiscoveryError> {
        let pattern = template.replace("{marker}", &regex::escape(&self.marker));
        Regex::new(&pattern).map_err(|e| {
            EntityDiscoveryError::with_source(
                format!("Invalid tracking marker '{}'", self.marker),
                e,
            )
        })
    }

    /// Entity markers to record for a declaration.
    pub(crate) fn recorded(&self, marker_present: bool) -> BTreeSet<String> {
        let mut markers = BTreeSet::new();
        if marker_present {
            markers.insert(self.marker.clone());
        }
        markers
    }
}

/// Per-language discovery over source text.
pub trait DiscoveryStrategy: Send + Sync {
    fn language(&self) -> Language;

    /// File extensions (without dot) this strategy reads.
    fn file_extensions(&self) -> &'static [&'static str];

    /// Directories, relative to the base directory, tried in order when no
    /// search path is configured. The first existing one is used.
    fn fallback_paths(&self) -> &'static [&'static str] {
        &["src", "."]
    }

    /// Entities declared in one file, members in declaration order.
    fn discover_in_file(
        &self,
        file: &SourceFile<'_>,
    ) -> Result<Vec<DiscoveredEntity>, EntityDiscoveryError>;
}

pub type StrategyFactory =
    fn(&MarkerSettings) -> Result<Box<dyn DiscoveryStrategy>, EntityDiscoveryError>;

/// Strategies keyed by language. Adding a language is one `register` call.
pub struct StrategyRegistry {
    factories: HashMap<Language, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Language::CSharp, |m| Ok(Box::new(CSharpStrategy::new(m)?)));
        registry.register(Language::Java, |m| Ok(Box::new(JavaStrategy::new(m)?)));
        registry.register(Language::Python, |m| Ok(Box::new(PythonStrategy::new(m)?)));
        registry.register(Language::JavaScript, |m| {
            Ok(Box::new(JavaScriptStrategy::new(m)?))
        });
        registry.register(Language::TypeScript, |m| {
            Ok(Box::new(TypeScriptStrategy::new(m)?))
        });
        registry.register(Language::Go, |m| Ok(Box::new(GoStrategy::new(m)?)));
        registry
    }

    pub fn register(&mut self, language: Language, factory: StrategyFactory) {
        self.factories.insert(language, factory);
    }

    pub fn create(
        &self,
        language: Language,
        markers: &MarkerSettings,
    ) -> Result<Box<dyn DiscoveryStrategy>, EntityDiscoveryError> {
        let factory = self.factories.get(&language).ok_or_else(|| {
            EntityDiscoveryError::new(format!("No discovery strategy for language '{language}'"))
        })?;
        factory(markers)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Runs the configured language's strategy over the search paths.
pub struct EntityDiscovery {
    config: Arc<Configuration>,
    registry: StrategyRegistry,
    base_dir: PathBuf,
}

impl EntityDiscovery {
    pub fn new(config: Arc<Configuration>) -> Self {
        Self {
            config,
            registry: StrategyRegistry::with_defaults(),
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Directory relative and fallback search paths are resolved against.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.set_base_dir(base_dir);
        self
    }

    pub fn set_base_dir(&mut self, base_dir: impl Into<PathBuf>) {
        self.base_dir = base_dir.into();
    }

    pub fn discover_entities(&self) -> Result<Vec<DiscoveredEntity>, EntityDiscoveryError> {
        let language = self.config.require_language().map_err(|e| {
            EntityDiscoveryError::with_source("Cannot determine the language to discover", e)
        })?;
        let markers = MarkerSettings::from_config(&self.config);
        if markers.marker.is_empty() && !markers.ignore_marker {
            return Err(EntityDiscoveryError::new(
                "Tracking marker is empty and ignore-marker mode is off",
            ));
        }
        let strategy = self.registry.create(language, &markers)?;
        let roots = self.search_roots(strategy.as_ref())?;
        let _timer = TimedOperation::start(format!("discover:{language}"));

        let mut entities = Vec::new();
        let mut seen = BTreeSet::new();
        let mut files_scanned = 0usize;
        for root in &roots {
            for path in source_files(root, strategy.file_extensions()) {
                files_scanned += 1;
                for entity in scan_file(strategy.as_ref(), root, &path) {
                    let key = (entity.fully_qualified_name.clone(), entity.source_location.clone());
                    if seen.insert(key) {
                        entities.push(entity);
                    }
                }
            }
        }

        info!(
            language = %language,
            roots = roots.len(),
            files_scanned,
            entities = entities.len(),
            "Entity discovery complete"
        );
        Ok(entities)
    }

    fn search_roots(
        &self,
        strategy: &dyn DiscoveryStrategy,
    ) -> Result<Vec<PathBuf>, EntityDiscoveryError> {
        let mut configured: Vec<PathBuf> = self.config.source_paths.clone();
        if let Some(build_output) = &self.config.build_output_path {
            configured.push(build_output.clone());
        }

        let roots: Vec<PathBuf> = if configured.is_empty() {
            strategy
                .fallback_paths()
                .iter()
                .map(|p| self.base_dir.join(p))
                .find(|p| p.exists())
                .into_iter()
                .collect()
        } else {
            configured
                .into_iter()
                .map(|p| {
                    if p.is_relative() {
                        self.base_dir.join(p)
                    } else {
                        p
                    }
                })
                .filter(|p| {
                    let exists = p.exists();
                    if !exists {
                        warn!(path = %p.display(), "Search path does not exist, skipping");
                    }
                    exists
                })
                .collect()
        };

        if roots.is_empty() {
            return Err(EntityDiscoveryError::new(format!(
                "No readable search path for {} discovery",
                strategy.language()
            )));
        }
        Ok(roots)
    }
}

/// Files under `root` with one of `extensions`, in sorted walk order.
fn source_files(root: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.depth() > 0
                && e.file_type().is_dir()
                && e.file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable path during discovery");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
        })
        .collect()
}

fn scan_file(strategy: &dyn DiscoveryStrategy, root: &Path, path: &Path) -> Vec<DiscoveredEntity> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Failed to read source file, skipping");
            return Vec::new();
        }
    };
    // a root that is itself a file keeps its own name as the relative path
    let relative_path = match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => Path::new(path.file_name().unwrap_or(path.as_os_str())),
    };
    let file = SourceFile {
        path,
        relative_path,
        content: &content,
    };
    match strategy.discover_in_file(&file) {
        Ok(found) => {
            if !found.is_empty() {
                debug!(file = %path.display(), count = found.len(), "Entities found");
            }
            found
        }
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Failed to parse source file, skipping");
            Vec::new()
        }
    }
}
