use super::source::{
    brace_block, marked_declarations, paren_list, skip_whitespace, split_top_level,
    strip_c_comments, top_level_segments,
};
use super::{lazy_regex, DiscoveryStrategy, MarkerSettings, SourceFile};
use crate::config::Language;
use crate::error::EntityDiscoveryError;
use crate::model::{DiscoveredEntity, EntityKind, EntityProperty};
use once_cell::sync::Lazy;
use regex::Regex;

static DECLARATION: Lazy<Regex> = lazy_regex!(
    r"(?P<mods>(?:\b(?:public|protected|private|abstract|final|static|sealed)\s+)*)\b(?P<kind>class|interface|record)\s+(?P<name>[A-Za-z_$][\w$]*)"
);

static PACKAGE: Lazy<Regex> = lazy_regex!(r"(?m)^\s*package\s+(?P<name>[\w.]+)\s*;");

static ANNOTATION: Lazy<Regex> = lazy_regex!(r"@(?P<name>[\w.]+)(?:\s*\([^)]*\))?");

static FIELD: Lazy<Regex> = lazy_regex!(
    r"(?s)^(?P<mods>(?:(?:private|protected|public|final|transient|volatile|static)\s+)*)(?P<type>[\w.$]+(?:\s*<.*>)?(?:\s*\[\s*\])*)\s+(?P<name>[A-Za-z_$][\w$]*)\s*(?:=.*)?$"
);

const NULLABLE_ANNOTATIONS: &[&str] = &["Nullable", "CheckForNull"];

pub struct JavaStrategy {
    markers: MarkerSettings,
    marker: Regex,
}

impl JavaStrategy {
    pub fn new(markers: &MarkerSettings) -> Result<Self, EntityDiscoveryError> {
        Ok(Self {
            markers: markers.clone(),
            marker: markers.compile(r"@(?:[\w.]+\.)?{marker}\b")?,
        })
    }
}

/// One field from a depth-zero statement, or `None` for anything else.
fn parse_field(statement: &str) -> Option<EntityProperty> {
    let mut property_markers = Vec::new();
    for caps in ANNOTATION.captures_iter(statement) {
        if let Some(name) = caps.name("name") {
            property_markers.push(name.as_str().rsplit('.').next().unwrap_or("").to_string());
        }
    }
    let declaration = ANNOTATION.replace_all(statement, "");
    let declaration = declaration.trim();

    // methods and constructors have a parameter list before any initializer
    let head = declaration.split('=').next().unwrap_or(declaration);
    if head.contains('(') {
        return None;
    }

    let caps = FIELD.captures(declaration)?;
    let mods = caps.name("mods").map_or("", |m| m.as_str());
    if mods.split_whitespace().any(|m| m == "static") {
        return None;
    }
    let ty = caps.name("type")?.as_str();
    let name = caps.name("name")?.as_str();
    if matches!(ty, "return" | "throw" | "package" | "import") {
        return None;
    }

    let (ty, optional) = unwrap_optional(ty);
    let nullable = optional
        || property_markers
            .iter()
            .any(|m| NULLABLE_ANNOTATIONS.contains(&m.as_str()));
    let mut property = EntityProperty::new(name, ty).nullable(nullable);
    for marker in property_markers {
        property = property.with_marker(marker);
    }
    Some(property)
}

fn unwrap_optional(ty: &str) -> (String, bool) {
    let compact: String = ty.split_whitespace().collect::<Vec<_>>().join(" ");
    match compact
        .strip_prefix("Optional<")
        .and_then(|rest| rest.strip_suffix('>'))
    {
        Some(inner) => (inner.trim().to_string(), true),
        None => (compact, false),
    }
}

impl DiscoveryStrategy for JavaStrategy {
    fn language(&self) -> Language {
        Language::Java
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn fallback_paths(&self) -> &'static [&'static str] {
        &["src/main/java", "src", "."]
    }

    fn discover_in_file(
        &self,
        file: &SourceFile<'_>,
    ) -> Result<Vec<DiscoveredEntity>, EntityDiscoveryError> {
        let content = file.content;
        let package = PACKAGE
            .captures(content)
            .and_then(|c| c.name("name"))
            .map_or("", |m| m.as_str());

        let mut entities = Vec::new();
        for caps in marked_declarations(content, &self.marker, &DECLARATION, self.markers.ignore_marker)
        {
            let (Some(name), Some(kind)) = (caps.name("name"), caps.name("kind")) else {
                continue;
            };
            let mods = caps.name("mods").map_or("", |m| m.as_str());
            let kind = match kind.as_str() {
                "interface" => EntityKind::Interface,
                "record" => EntityKind::Record,
                _ => EntityKind::Class,
            };

            let mut properties = Vec::new();
            if kind == EntityKind::Record {
                let mut at = skip_whitespace(content, name.end());
                if content[at..].starts_with('<') {
                    if let Some(close) = content[at..].find('>') {
                        at = skip_whitespace(content, at + close + 1);
                    }
                }
                if let Some(components) = paren_list(content, at) {
                    properties.extend(
                        split_top_level(components, ',')
                            .into_iter()
                            .filter_map(parse_field),
                    );
                }
            }
            if kind != EntityKind::Interface {
                if let Some(body) = brace_block(content, name.end()) {
                    let body = strip_c_comments(&content[body]);
                    properties.extend(
                        top_level_segments(&body, &[';'])
                            .into_iter()
                            .filter(|s| !s.ends_with_block)
                            .filter_map(|s| parse_field(&s.text)),
                    );
                }
            }

            let mut entity = DiscoveredEntity::new(name.as_str(), package, Language::Java, file.path)
                .with_kind(kind);
            entity.is_public = mods.contains("public");
            entity.markers = self.markers.recorded(!self.markers.ignore_marker);
            entity.properties = properties;
            entities.push(entity);
        }
        Ok(entities)
    }
}
