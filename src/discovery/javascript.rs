use super::source::{
    brace_block, marked_declarations, paren_list, strip_c_comments, top_level_segments,
};
use super::{lazy_regex, DiscoveryStrategy, MarkerSettings, SourceFile};
use crate::config::Language;
use crate::error::EntityDiscoveryError;
use crate::model::{DiscoveredEntity, EntityProperty};
use once_cell::sync::Lazy;
use regex::Regex;

static DECLARATION: Lazy<Regex> = lazy_regex!(
    r"(?P<export>\bexport\s+(?:default\s+)?)?\bclass\s+(?P<name>[A-Za-z_$][\w$]*)"
);

static CLASS_FIELD: Lazy<Regex> = lazy_regex!(
    r"(?s)^(?P<name>[A-Za-z_$][\w$]*)\s*(?:=\s*(?P<value>.+))?$"
);

static THIS_ASSIGNMENT: Lazy<Regex> = lazy_regex!(
    r"(?m)^\s*this\.(?P<name>[A-Za-z_$][\w$]*)\s*=\s*(?P<value>[^;\n]+?)\s*;?\s*$"
);

static CONSTRUCTOR: Lazy<Regex> = lazy_regex!(r"\bconstructor\s*\(");

static NUMBER_LITERAL: Lazy<Regex> = lazy_regex!(r"^-?(?:\d[\d_]*\.?\d*(?:[eE][-+]?\d+)?|0x[0-9a-fA-F]+)$");

/// JSDoc `@type {T}` directly above a field.
static JSDOC_TYPE: Lazy<Regex> = lazy_regex!(r"@type\s*\{(?P<type>[^}]+)\}");

pub struct JavaScriptStrategy {
    markers: MarkerSettings,
    marker: Regex,
}

impl JavaScriptStrategy {
    pub fn new(markers: &MarkerSettings) -> Result<Self, EntityDiscoveryError> {
        Ok(Self {
            markers: markers.clone(),
            // decorator, JSDoc tag, or `// Marker` comment
            marker: markers.compile(r"(?:@|//[ \t]*@?){marker}\b")?,
        })
    }
}

/// Type of an initializer expression; `any` when it cannot be told.
pub(crate) fn infer_js_type(value: &str) -> (String, bool) {
    let value = value.trim();
    let ty = match value {
        "null" | "undefined" => return ("any".to_string(), true),
        "true" | "false" => "boolean",
        v if NUMBER_LITERAL.is_match(v) => "number",
        v if v.starts_with('"') || v.starts_with('\'') || v.starts_with('`') => "string",
        v if v.starts_with('[') || v.starts_with("new Array") => "Array",
        v if v.starts_with("new Date") => "Date",
        v if v.starts_with("new Map") => "Map",
        v if v.starts_with("new Set") => "Set",
        v if v.starts_with('{') => "Object",
        _ => "any",
    };
    (ty.to_string(), false)
}

fn jsdoc_types(raw_body: &str) -> Vec<(String, String)> {
    // (field name, type) pairs for `/** @type {T} */ name` patterns
    let mut found = Vec::new();
    for caps in JSDOC_TYPE.captures_iter(raw_body) {
        let (Some(whole), Some(ty)) = (caps.get(0), caps.name("type")) else {
            continue;
        };
        let after = &raw_body[whole.end()..];
        let after = after.find("*/").map_or(after, |i| &after[i + 2..]);
        let name: String = after
            .trim_start()
            .trim_start_matches("this.")
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
            .collect();
        if !name.is_empty() {
            found.push((name, ty.as_str().trim().to_string()));
        }
    }
    found
}

impl JavaScriptStrategy {
    fn class_properties(&self, raw_body: &str) -> Vec<EntityProperty> {
        let annotated = jsdoc_types(raw_body);
        let body = strip_c_comments(raw_body);
        let mut properties: Vec<EntityProperty> = Vec::new();
        let mut push = |name: &str, value: Option<&str>| {
            if properties.iter().any(|p| p.name == name) {
                return;
            }
            let (ty, nullable) = match annotated.iter().find(|(n, _)| n == name) {
                Some((_, ty)) => split_jsdoc_nullable(ty),
                None => value.map_or(("any".to_string(), false), infer_js_type),
            };
            properties.push(EntityProperty::new(name, ty).nullable(nullable));
        };

        // class fields: `name = value;` or `name;`
        for segment in top_level_segments(&body, &[';', '\n']) {
            if segment.ends_with_block || segment.text.starts_with("static ") {
                continue;
            }
            if let Some(caps) = CLASS_FIELD.captures(&segment.text) {
                if let Some(name) = caps.name("name") {
                    push(name.as_str(), caps.name("value").map(|v| v.as_str()));
                }
            }
        }

        // `this.x = ...` in the constructor
        if let Some(ctor) = CONSTRUCTOR.find(&body) {
            let params_end = paren_list(&body, ctor.end() - 1)
                .map_or(ctor.end(), |p| ctor.end() + p.len());
            if let Some(block) = brace_block(&body, params_end) {
                for caps in THIS_ASSIGNMENT.captures_iter(&body[block]) {
                    if let (Some(name), Some(value)) = (caps.name("name"), caps.name("value")) {
                        push(name.as_str(), Some(value.as_str()));
                    }
                }
            }
        }
        properties
    }
}

fn split_jsdoc_nullable(ty: &str) -> (String, bool) {
    let ty = ty.trim();
    if let Some(inner) = ty.strip_prefix('?') {
        return (inner.to_string(), true);
    }
    let parts: Vec<&str> = ty.split('|').map(str::trim).collect();
    if parts.len() > 1 && parts.iter().any(|p| *p == "null" || *p == "undefined") {
        let rest: Vec<&str> = parts
            .into_iter()
            .filter(|p| *p != "null" && *p != "undefined")
            .collect();
        return (rest.join(" | "), true);
    }
    (ty.to_string(), false)
}

impl DiscoveryStrategy for JavaScriptStrategy {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["js", "mjs", "cjs", "jsx"]
    }

    fn discover_in_file(
        &self,
        file: &SourceFile<'_>,
    ) -> Result<Vec<DiscoveredEntity>, EntityDiscoveryError> {
        let module = file.module_path(".");
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
                .map(|body| self.class_properties(&file.content[body]))
                .unwrap_or_default();

            let mut entity = DiscoveredEntity::new(
                name.as_str(),
                module.as_str(),
                Language::JavaScript,
                file.path,
            );
            entity.is_public = caps.name("export").is_some();
            entity.markers = self.markers.recorded(!self.markers.ignore_marker);
            entity.properties = properties;
            entities.push(entity);
        }
        Ok(entities)
    }
}
