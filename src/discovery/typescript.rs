use super::source::{
    brace_block, marked_declarations, split_top_level, strip_c_comments, top_level_segments,
};
use super::{lazy_regex, DiscoveryStrategy, MarkerSettings, SourceFile};
use crate::config::Language;
use crate::error::EntityDiscoveryError;
use crate::model::{DiscoveredEntity, EntityKind, EntityProperty};
use once_cell::sync::Lazy;
use regex::Regex;

static DECLARATION: Lazy<Regex> = lazy_regex!(
    r"(?P<export>\bexport\s+(?:default\s+)?)?(?:\b(?:abstract|declare)\s+)*\b(?P<kind>class|interface)\s+(?P<name>[A-Za-z_$][\w$]*)"
);

static MEMBER: Lazy<Regex> = lazy_regex!(
    r"(?s)^(?P<mods>(?:(?:public|private|protected|readonly|declare|static|override|abstract)\s+)*)(?P<name>[A-Za-z_$][\w$]*)(?P<optional>\?)?!?\s*:\s*(?P<type>[^=]+?)\s*(?:=.*)?$"
);

static DECORATOR: Lazy<Regex> = lazy_regex!(r"@[\w.]+(?:\([^)]*\))?\s*");

pub struct TypeScriptStrategy {
    markers: MarkerSettings,
    marker: Regex,
}

impl TypeScriptStrategy {
    pub fn new(markers: &MarkerSettings) -> Result<Self, EntityDiscoveryError> {
        Ok(Self {
            markers: markers.clone(),
            marker: markers.compile(r"(?:@|//[ \t]*@?){marker}\b")?,
        })
    }
}

/// Remove `null` / `undefined` from a union type.
pub(crate) fn split_ts_nullable(ty: &str) -> (String, bool) {
    let parts: Vec<&str> = ty.split('|').map(str::trim).filter(|p| !p.is_empty()).collect();
    let nullable = parts.iter().any(|p| *p == "null" || *p == "undefined");
    if !nullable {
        return (ty.trim().to_string(), false);
    }
    let rest: Vec<&str> = parts
        .into_iter()
        .filter(|p| *p != "null" && *p != "undefined")
        .collect();
    let ty = if rest.is_empty() { "any".to_string() } else { rest.join(" | ") };
    (ty, true)
}

fn parse_member(statement: &str) -> Option<EntityProperty> {
    let statement = DECORATOR.replace_all(statement, "");
    let caps = MEMBER.captures(statement.trim())?;
    let mods = caps.name("mods").map_or("", |m| m.as_str());
    if mods
        .split_whitespace()
        .any(|m| matches!(m, "private" | "protected" | "static"))
    {
        return None;
    }
    let name = caps.name("name")?.as_str();
    let (ty, union_nullable) = split_ts_nullable(caps.name("type")?.as_str());
    let nullable = caps.name("optional").is_some() || union_nullable;
    Some(EntityProperty::new(name, ty).nullable(nullable))
}

impl DiscoveryStrategy for TypeScriptStrategy {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "mts", "cts"]
    }

    fn discover_in_file(
        &self,
        file: &SourceFile<'_>,
    ) -> Result<Vec<DiscoveredEntity>, EntityDiscoveryError> {
        // declaration files only describe shapes declared elsewhere
        if file.path.to_string_lossy().ends_with(".d.ts") {
            return Ok(Vec::new());
        }
        let module = file.module_path(".");

        let mut entities = Vec::new();
        for caps in marked_declarations(
            file.content,
            &self.marker,
            &DECLARATION,
            self.markers.ignore_marker,
        ) {
            let (Some(name), Some(kind)) = (caps.name("name"), caps.name("kind")) else {
                continue;
            };
            let is_interface = kind.as_str() == "interface";
            let kind = if is_interface {
                EntityKind::Interface
            } else {
                EntityKind::Class
            };
            let properties = brace_block(file.content, name.end())
                .map(|body| {
                    let body = strip_c_comments(&file.content[body]);
                    let mut properties = Vec::new();
                    for segment in top_level_segments(&body, &[';', '\n']) {
                        if segment.ends_with_block {
                            continue;
                        }
                        // interface members may also be comma separated
                        let members = if is_interface {
                            split_top_level(&segment.text, ',')
                        } else {
                            vec![segment.text.as_str()]
                        };
                        properties.extend(members.into_iter().filter_map(parse_member));
                    }
                    properties
                })
                .unwrap_or_default();

            let mut entity = DiscoveredEntity::new(
                name.as_str(),
                module.as_str(),
                Language::TypeScript,
                file.path,
            )
            .with_kind(kind);
            entity.is_public = caps.name("export").is_some();
            entity.markers = self.markers.recorded(!self.markers.ignore_marker);
            entity.properties = properties;
            entities.push(entity);
        }
        Ok(entities)
    }
}
