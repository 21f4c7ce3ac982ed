use super::source::{brace_block, marked_declarations, strip_c_comments};
use super::{lazy_regex, DiscoveryStrategy, MarkerSettings, SourceFile};
use crate::config::Language;
use crate::error::EntityDiscoveryError;
use crate::model::{DiscoveredEntity, EntityKind, EntityProperty};
use once_cell::sync::Lazy;
use regex::Regex;

static DECLARATION: Lazy<Regex> =
    lazy_regex!(r"(?m)^\s*type\s+(?P<name>[A-Za-z_]\w*)\s+struct\s*\{");

static PACKAGE: Lazy<Regex> = lazy_regex!(r"(?m)^\s*package\s+(?P<name>\w+)");

static FIELD: Lazy<Regex> = lazy_regex!(
    r"^(?P<names>[A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s+(?P<type>[^\s`].*?)\s*(?:`(?P<tag>[^`]*)`)?$"
);

pub struct GoStrategy {
    markers: MarkerSettings,
    marker: Regex,
}

impl GoStrategy {
    pub fn new(markers: &MarkerSettings) -> Result<Self, EntityDiscoveryError> {
        Ok(Self {
            markers: markers.clone(),
            // `// @Marker` or `// Marker` comment above the type
            marker: markers.compile(r"//[ \t]*@?{marker}\b")?,
        })
    }
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn struct_fields(body: &str) -> Vec<EntityProperty> {
    let mut fields = Vec::new();
    let mut depth = 0i32;
    for line in body.lines() {
        let trimmed = line.trim();
        let starting_depth = depth;
        depth += trimmed.matches('{').count() as i32 - trimmed.matches('}').count() as i32;
        // members of nested anonymous structs belong to the nested type
        if starting_depth > 0 || trimmed.is_empty() {
            continue;
        }
        let Some(caps) = FIELD.captures(trimmed) else {
            // embedded type
            continue;
        };
        let (Some(names), Some(ty)) = (caps.name("names"), caps.name("type")) else {
            continue;
        };
        let ty = ty.as_str().trim();
        let (ty, nullable) = match ty.strip_prefix('*') {
            Some(inner) => (inner.to_string(), true),
            None => (ty.to_string(), false),
        };
        for name in names.as_str().split(',').map(str::trim) {
            if !is_exported(name) {
                continue;
            }
            let mut property = EntityProperty::new(name, ty.clone()).nullable(nullable);
            if let Some(tag) = caps.name("tag") {
                property = property.with_marker(tag.as_str().to_string());
            }
            fields.push(property);
        }
    }
    fields
}

impl DiscoveryStrategy for GoStrategy {
    fn language(&self) -> Language {
        Language::Go
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn fallback_paths(&self) -> &'static [&'static str] {
        &["."]
    }

    fn discover_in_file(
        &self,
        file: &SourceFile<'_>,
    ) -> Result<Vec<DiscoveredEntity>, EntityDiscoveryError> {
        if file.path.to_string_lossy().ends_with("_test.go") {
            return Ok(Vec::new());
        }
        let package = PACKAGE
            .captures(file.content)
            .and_then(|c| c.name("name"))
            .map_or("", |m| m.as_str());

        let mut entities = Vec::new();
        for caps in marked_declarations(
            file.content,
            &self.marker,
            &DECLARATION,
            self.markers.ignore_marker,
        ) {
            let Some(name) = caps.name("name") else {
                continue;
            };
            let properties = brace_block(file.content, name.end())
                .map(|body| struct_fields(&strip_c_comments(&file.content[body])))
                .unwrap_or_default();

            let mut entity =
                DiscoveredEntity::new(name.as_str(), package, Language::Go, file.path)
                    .with_kind(EntityKind::Struct);
            entity.is_public = is_exported(name.as_str());
            entity.markers = self.markers.recorded(!self.markers.ignore_marker);
            entity.properties = properties;
            entities.push(entity);
        }
        Ok(entities)
    }
}
