use super::source::marked_declarations;
use super::{lazy_regex, DiscoveryStrategy, MarkerSettings, SourceFile};
use crate::config::Language;
use crate::error::EntityDiscoveryError;
use crate::model::{DiscoveredEntity, EntityProperty};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static DECLARATION: Lazy<Regex> = lazy_regex!(
    r"(?m)^(?P<indent>[ \t]*)class\s+(?P<name>[A-Za-z_]\w*)\s*(?:\([^)]*\))?\s*:"
);

static ANNOTATED_ATTRIBUTE: Lazy<Regex> = lazy_regex!(
    r"^(?P<name>[A-Za-z_]\w*)\s*:\s*(?P<type>[^=#]+?)\s*(?:=\s*(?P<value>[^#]*?))?\s*(?:#.*)?$"
);

static INIT: Lazy<Regex> = lazy_regex!(r"^def\s+__init__\s*\((?P<params>[^)]*)\)");

static SELF_ASSIGNMENT: Lazy<Regex> = lazy_regex!(
    r"^self\.(?P<name>[A-Za-z_]\w*)\s*(?::\s*(?P<type>[^=]+?))?\s*=\s*(?P<value>.+?)\s*(?:#.*)?$"
);

static INT_LITERAL: Lazy<Regex> = lazy_regex!(r"^-?\d[\d_]*$");
static FLOAT_LITERAL: Lazy<Regex> = lazy_regex!(r"^-?\d[\d_]*\.\d*(?:[eE][-+]?\d+)?$");

pub struct PythonStrategy {
    markers: MarkerSettings,
    marker: Regex,
}

impl PythonStrategy {
    pub fn new(markers: &MarkerSettings) -> Result<Self, EntityDiscoveryError> {
        Ok(Self {
            markers: markers.clone(),
            // decorator, or a comment convention such as `# @Marker`
            marker: markers.compile(r"(?m)(?:^[ \t]*@(?:[\w.]+\.)?{marker}\b|#[ \t]*@?{marker}\b)")?,
        })
    }
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Lines of an indented block, starting after `header_end`.
fn block_lines(content: &str, header_end: usize, header_indent: usize) -> Vec<&str> {
    let rest = &content[header_end..];
    // the header line itself may carry trailing text after ':'
    let mut block = Vec::new();
    for line in rest.lines().skip(1) {
        if !line.trim().is_empty() && indent_width(line) <= header_indent {
            break;
        }
        block.push(line);
    }
    while block.last().is_some_and(|l| l.trim().is_empty()) {
        block.pop();
    }
    block
}

/// Strip `Optional[...]` / `X | None` and report nullability.
fn split_optional(annotation: &str) -> (String, bool) {
    let ty = annotation.trim().trim_matches(|c| c == '"' || c == '\'');
    if let Some(inner) = ty
        .strip_prefix("Optional[")
        .or_else(|| ty.strip_prefix("typing.Optional["))
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return (inner.trim().to_string(), true);
    }
    let parts: Vec<&str> = ty.split('|').map(str::trim).collect();
    if parts.len() > 1 && parts.contains(&"None") {
        let rest: Vec<&str> = parts.into_iter().filter(|p| *p != "None").collect();
        return (rest.join(" | "), true);
    }
    (ty.to_string(), false)
}

/// Type of a literal initializer, or `None` when it cannot be told.
fn infer_literal_type(value: &str) -> Option<(&'static str, bool)> {
    let value = value.trim();
    let ty = match value {
        "None" => return Some(("Any", true)),
        "True" | "False" => "bool",
        v if INT_LITERAL.is_match(v) => "int",
        v if FLOAT_LITERAL.is_match(v) => "float",
        v if v.starts_with('"') || v.starts_with('\'') || v.starts_with("f\"") || v.starts_with("f'") => "str",
        v if v.starts_with('[') || v.starts_with("list(") => "list",
        v if v.starts_with('{') || v.starts_with("dict(") => "dict",
        v if v.starts_with("set(") => "set",
        v if v.starts_with('(') => "tuple",
        v if v.starts_with("datetime") => "datetime",
        _ => return None,
    };
    Some((ty, false))
}

fn init_parameters(params: &str) -> HashMap<String, (String, Option<String>)> {
    params
        .split(',')
        .filter_map(|param| {
            let (head, default) = match param.split_once('=') {
                Some((h, d)) => (h, Some(d.trim().to_string())),
                None => (param, None),
            };
            let (name, annotation) = match head.split_once(':') {
                Some((n, a)) => (n.trim(), a.trim().to_string()),
                None => (head.trim(), String::new()),
            };
            if name.is_empty() || name == "self" || name.starts_with('*') {
                return None;
            }
            Some((name.to_string(), (annotation, default)))
        })
        .collect()
}

impl PythonStrategy {
    fn class_properties(&self, body: &[&str]) -> Vec<EntityProperty> {
        let Some(body_indent) = body
            .iter()
            .find(|l| !l.trim().is_empty())
            .map(|l| indent_width(l))
        else {
            return Vec::new();
        };

        let mut properties: Vec<EntityProperty> = Vec::new();
        let push = |properties: &mut Vec<EntityProperty>, property: EntityProperty| {
            if !properties.iter().any(|p| p.name == property.name) {
                properties.push(property);
            }
        };

        // class-level annotated attributes (dataclass / pydantic style)
        for line in body.iter().filter(|l| indent_width(l) == body_indent) {
            let Some(caps) = ANNOTATED_ATTRIBUTE.captures(line.trim()) else {
                continue;
            };
            let (Some(name), Some(annotation)) = (caps.name("name"), caps.name("type")) else {
                continue;
            };
            if name.as_str().starts_with('_') || annotation.as_str().starts_with("ClassVar") {
                continue;
            }
            let (ty, mut nullable) = split_optional(annotation.as_str());
            if caps.name("value").is_some_and(|v| v.as_str().trim() == "None") {
                nullable = true;
            }
            push(&mut properties, EntityProperty::new(name.as_str(), ty).nullable(nullable));
        }

        // `self.x = ...` inside __init__
        let Some(init_index) = body.iter().position(|l| {
            indent_width(l) == body_indent && INIT.is_match(l.trim())
        }) else {
            return properties;
        };
        let params = INIT
            .captures(body[init_index].trim())
            .and_then(|c| c.name("params"))
            .map(|m| init_parameters(m.as_str()))
            .unwrap_or_default();

        for line in body[init_index + 1..].iter() {
            if line.trim().is_empty() {
                continue;
            }
            if indent_width(line) <= body_indent {
                break;
            }
            let Some(caps) = SELF_ASSIGNMENT.captures(line.trim()) else {
                continue;
            };
            let (Some(name), Some(value)) = (caps.name("name"), caps.name("value")) else {
                continue;
            };
            if name.as_str().starts_with('_') {
                continue;
            }
            let value = value.as_str();
            let (ty, nullable) = if let Some(annotation) = caps.name("type") {
                split_optional(annotation.as_str())
            } else if let Some((annotation, default)) = params.get(value) {
                let (ty, nullable) = if annotation.is_empty() {
                    ("Any".to_string(), false)
                } else {
                    split_optional(annotation)
                };
                (ty, nullable || default.as_deref() == Some("None"))
            } else if let Some((ty, nullable)) = infer_literal_type(value) {
                (ty.to_string(), nullable)
            } else {
                ("Any".to_string(), false)
            };
            push(&mut properties, EntityProperty::new(name.as_str(), ty).nullable(nullable));
        }
        properties
    }
}

impl DiscoveryStrategy for PythonStrategy {
    fn language(&self) -> Language {
        Language::Python
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn fallback_paths(&self) -> &'static [&'static str] {
        &["."]
    }

    fn discover_in_file(
        &self,
        file: &SourceFile<'_>,
    ) -> Result<Vec<DiscoveredEntity>, EntityDiscoveryError> {
        let module = file.module_path(".");
        let module = module.strip_suffix(".__init__").unwrap_or(&module).to_string();

        let mut entities = Vec::new();
        for caps in marked_declarations(
            file.content,
            &self.marker,
            &DECLARATION,
            self.markers.ignore_marker,
        ) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.name("name")) else {
                continue;
            };
            let header_indent = caps.name("indent").map_or(0, |m| m.as_str().len());
            let line_start = file.content[..whole.start()].rfind('\n').map_or(0, |i| i + 1);
            let body = block_lines(file.content, line_start, header_indent);

            let mut entity =
                DiscoveredEntity::new(name.as_str(), module.as_str(), Language::Python, file.path);
            entity.is_public = !name.as_str().starts_with('_');
            entity.markers = self.markers.recorded(!self.markers.ignore_marker);
            entity.properties = self.class_properties(&body);
            entities.push(entity);
        }
        Ok(entities)
    }
}
