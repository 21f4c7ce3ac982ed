use super::source::{
    brace_block, marked_declarations, paren_list, skip_whitespace, split_top_level,
    strip_c_comments,
};
use super::{lazy_regex, DiscoveryStrategy, MarkerSettings, SourceFile};
use crate::config::Language;
use crate::error::EntityDiscoveryError;
use crate::model::{DiscoveredEntity, EntityKind, EntityProperty};
use once_cell::sync::Lazy;
use regex::Regex;

static DECLARATION: Lazy<Regex> = lazy_regex!(
    r"(?P<mods>(?:\b(?:public|internal|private|protected|sealed|abstract|static|partial|readonly)\s+)*)\b(?P<kind>record\s+struct|record\s+class|record|class|struct|interface)\s+(?P<name>[A-Za-z_]\w*)"
);

static NAMESPACE: Lazy<Regex> = lazy_regex!(r"(?m)^\s*namespace\s+(?P<name>[\w.]+)");

static PROPERTY: Lazy<Regex> = lazy_regex!(
    r"(?m)^\s*(?P<mods>(?:(?:public|private|protected|internal|static|virtual|override|required|new|sealed|abstract|readonly)\s+)*)(?P<type>[\w.]+(?:\s*<[^{};=]*>)?(?:\s*\[\s*\])*\??)\s+(?P<name>[A-Za-z_]\w*)\s*\{\s*(?:(?:public|private|protected|internal|init)\s+)*(?:get|set|init)\b"
);

/// CLR type names and their C# keyword spellings.
const CLR_TYPE_NAMES: &[(&str, &str)] = &[
    ("String", "string"),
    ("Int32", "int"),
    ("Int64", "long"),
    ("Int16", "short"),
    ("UInt32", "uint"),
    ("UInt64", "ulong"),
    ("UInt16", "ushort"),
    ("Byte", "byte"),
    ("SByte", "sbyte"),
    ("Boolean", "bool"),
    ("Double", "double"),
    ("Single", "float"),
    ("Decimal", "decimal"),
    ("Char", "char"),
    ("Object", "object"),
];

/// Normalize a C# type as written in source.
///
/// Returns the type text and whether it is nullable. `System.` prefixes and
/// CLR names are mapped to keywords, `T?` and `Nullable<T>` are unwrapped,
/// generic arguments are normalized recursively (`List<Int32>` becomes
/// `List<int>`).
pub fn normalize_clr_type(raw: &str) -> (String, bool) {
    let raw = raw.trim();
    if let Some(inner) = raw.strip_suffix('?') {
        return (normalize_clr_type(inner).0, true);
    }
    let unprefixed = raw.strip_prefix("System.").unwrap_or(raw);
    if let Some(inner) = unprefixed
        .strip_prefix("Nullable<")
        .and_then(|rest| rest.strip_suffix('>'))
    {
        return (normalize_clr_type(inner).0, true);
    }
    if let Some(element) = raw.strip_suffix("[]") {
        let (element, element_nullable) = normalize_clr_type(element);
        let element = if element_nullable { format!("{element}?") } else { element };
        return (format!("{element}[]"), false);
    }
    if let Some(open) = raw.find('<') {
        if raw.ends_with('>') {
            let outer = raw[..open].trim();
            let outer = outer.strip_prefix("System.").unwrap_or(outer);
            let args = split_top_level(&raw[open + 1..raw.len() - 1], ',')
                .into_iter()
                .map(|arg| {
                    let (ty, nullable) = normalize_clr_type(arg);
                    if nullable {
                        format!("{ty}?")
                    } else {
                        ty
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            return (format!("{}<{args}>", map_clr_name(outer)), false);
        }
    }
    (map_clr_name(unprefixed).to_string(), false)
}

fn map_clr_name(name: &str) -> &str {
    CLR_TYPE_NAMES
        .iter()
        .find(|(clr, _)| *clr == name)
        .map_or(name, |(_, keyword)| keyword)
}

pub struct CSharpStrategy {
    markers: MarkerSettings,
    marker: Regex,
}

impl CSharpStrategy {
    pub fn new(markers: &MarkerSettings) -> Result<Self, EntityDiscoveryError> {
        Ok(Self {
            markers: markers.clone(),
            // [Marker], [Marker(...)], [MarkerAttribute], [Serializable, Marker]
            marker: markers.compile(r"\[[^\]\n]*\b(?:[\w.]+\.)?{marker}(?:Attribute)?\b[^\]\n]*\]")?,
        })
    }

    fn record_parameters(&self, content: &str, after_name: usize) -> Vec<EntityProperty> {
        let mut at = skip_whitespace(content, after_name);
        if content[at..].starts_with('<') {
            // generic parameter list
            if let Some(close) = content[at..].find('>') {
                at = skip_whitespace(content, at + close + 1);
            }
        }
        let Some(params) = paren_list(content, at) else {
            return Vec::new();
        };
        split_top_level(params, ',')
            .into_iter()
            .filter_map(|param| {
                let param = param.split('=').next().unwrap_or(param).trim();
                let param = strip_attributes(param);
                let (ty, name) = param.rsplit_once(char::is_whitespace)?;
                let (ty, nullable) = normalize_clr_type(ty);
                Some(EntityProperty::new(name.trim(), ty).nullable(nullable))
            })
            .collect()
    }
}

fn strip_attributes(text: &str) -> &str {
    let mut rest = text.trim_start();
    while rest.starts_with('[') {
        match rest.find(']') {
            Some(close) => rest = rest[close + 1..].trim_start(),
            None => break,
        }
    }
    rest
}

fn entity_kind(kind: &str) -> EntityKind {
    match kind.split_whitespace().collect::<Vec<_>>().as_slice() {
        ["interface"] => EntityKind::Interface,
        ["struct"] | ["record", "struct"] => EntityKind::Struct,
        ["record"] | ["record", "class"] => EntityKind::Record,
        _ => EntityKind::Class,
    }
}

impl DiscoveryStrategy for CSharpStrategy {
    fn language(&self) -> Language {
        Language::CSharp
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["cs"]
    }

    fn discover_in_file(
        &self,
        file: &SourceFile<'_>,
    ) -> Result<Vec<DiscoveredEntity>, EntityDiscoveryError> {
        let content = file.content;
        let namespace = NAMESPACE
            .captures(content)
            .and_then(|c| c.name("name"))
            .map_or("", |m| m.as_str());

        let declarations = marked_declarations(
            content,
            &self.marker,
            &DECLARATION,
            self.markers.ignore_marker,
        );
        let mut entities = Vec::new();
        for caps in declarations {
            let (Some(name), Some(kind)) = (caps.name("name"), caps.name("kind")) else {
                continue;
            };
            let mods = caps.name("mods").map_or("", |m| m.as_str());
            let kind = entity_kind(kind.as_str());

            let mut properties = self.record_parameters(content, name.end());
            if let Some(body) = brace_block(content, name.end()) {
                // a record without a body ends in ';' before any later '{'
                let terminator = content[name.end()..].find(';').map(|i| name.end() + i);
                if terminator.map_or(true, |t| t > body.start) {
                    let body_text = strip_c_comments(&content[body]);
                    properties.extend(self.body_properties(&body_text, kind));
                }
            }

            let mut entity =
                DiscoveredEntity::new(name.as_str(), namespace, Language::CSharp, file.path)
                    .with_kind(kind);
            entity.is_public = mods.contains("public");
            entity.markers = self.markers.recorded(!self.markers.ignore_marker);
            entity.properties = properties;
            entities.push(entity);
        }
        Ok(entities)
    }
}

impl CSharpStrategy {
    fn body_properties(&self, body: &str, kind: EntityKind) -> Vec<EntityProperty> {
        let mut depth = 0i32;
        let mut depth_at = Vec::with_capacity(body.len() + 1);
        for b in body.bytes() {
            depth_at.push(depth);
            match b {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
        }
        depth_at.push(depth);

        PROPERTY
            .captures_iter(body)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                if depth_at.get(whole.start()).copied().unwrap_or(0) != 0 {
                    return None;
                }
                let mods = caps.name("mods").map_or("", |m| m.as_str());
                if mods.contains("static") {
                    return None;
                }
                let visible = mods.contains("public") || kind == EntityKind::Interface;
                if !visible {
                    return None;
                }
                let (ty, nullable) = normalize_clr_type(caps.name("type")?.as_str());
                Some(EntityProperty::new(caps.name("name")?.as_str(), ty).nullable(nullable))
            })
            .collect()
    }
}
