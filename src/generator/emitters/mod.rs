//! # Language Emitters
//!
//! One [`LanguageEmitter`] per target language turns a [`DiscoveredEntity`]
//! into model source files. Emitters are looked up in an [`EmitterRegistry`]
//! keyed by [`Language`], so a new language is one `register` call and
//! never touches [`crate::generator::CodeGenerator`].
//!
//! | Language | Output | Shape |
//! |----------|--------|-------|
//! | C# | `Models/{Name}.cs` | class with auto-properties, nullable-aware |
//! | Java | `src/main/java/{package}/{Name}.java` | private boxed fields with getters/setters |
//! | Python | `models/{name}.py` | class with an `__init__` taking `None` defaults |
//! | JavaScript | `models/{Name}.js` | ES class initialised in the constructor |
//! | TypeScript | `models/{Name}.ts` | exported interface, `?` for nullable members |
//! | Go | `models/{name}.go` | exported struct with JSON tags, pointers for nullable fields |
//!
//! Source type names are first read into a [`FieldType`]; each emitter owns
//! the table that maps a `FieldType` onto its own type syntax. Every emitter
//! writes members in the entity's declaration order.
//!
//! File bodies are rendered through the Askama templates in
//! `templates/models/`.

mod csharp;
mod go;
mod java;
mod javascript;
mod python;
mod typescript;


pub use csharp::CSharpEmitter;
pub use go::GoEmitter;
pub use java::JavaEmitter;
pub use javascript::JavaScriptEmitter;
pub use python::PythonEmitter;
pub use typescript::TypeScriptEmitter;

use crate::config::Language;
use crate::discovery::source::split_top_level;
use crate::error::CodeGenerationError;
use crate::model::{DiscoveredEntity, EntityProperty};
use askama::Template;
use std::collections::HashMap;

/// A file produced by an emitter, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    /// `/`-separated, never absolute, never containing `..`.
    pub relative_path: String,
    pub content: String,
}

/// Per-language model writer.
pub trait LanguageEmitter: Send + Sync {
    fn language(&self) -> Language;

    /// Member declarations for `properties`, in order.
    fn generate_properties(&self, properties: &[EntityProperty]) -> String;

    /// Files for one entity. `tokens` carries the merged base and entity
    /// replacement map.
    fn generate_entity_files(
        &self,
        entity: &DiscoveredEntity,
        tokens: &HashMap<String, String>,
    ) -> Result<Vec<EmittedFile>, CodeGenerationError>;
}

pub type EmitterFactory = fn() -> Box<dyn LanguageEmitter>;

/// Emitters keyed by language.
pub struct EmitterRegistry {
    factories: HashMap<Language, EmitterFactory>,
}

impl EmitterRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Language::CSharp, || Box::new(CSharpEmitter));
        registry.register(Language::Java, || Box::new(JavaEmitter));
        registry.register(Language::Python, || Box::new(PythonEmitter));
        registry.register(Language::JavaScript, || Box::new(JavaScriptEmitter));
        registry.register(Language::TypeScript, || Box::new(TypeScriptEmitter));
        registry.register(Language::Go, || Box::new(GoEmitter));
        registry
    }

    pub fn register(&mut self, language: Language, factory: EmitterFactory) {
        self.factories.insert(language, factory);
    }

    pub fn create(&self, language: Language) -> Result<Box<dyn LanguageEmitter>, CodeGenerationError> {
        self.factories
            .get(&language)
            .map(|factory| factory())
            .ok_or_else(|| {
                CodeGenerationError::new(format!("No emitter registered for language '{language}'"))
            })
    }
}

impl Default for EmitterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Language-neutral reading of a source type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Long,
    Float,
    Double,
    Decimal,
    Boolean,
    String,
    DateTime,
    Uuid,
    Bytes,
    Any,
    List(Box<FieldType>),
    Map(Box<FieldType>, Box<FieldType>),
    /// Anything unrecognised, kept verbatim (usually another entity).
    Named(String),
}

const LIST_NAMES: &[&str] = &[
    "list", "ilist", "ienumerable", "icollection", "ireadonlylist", "ireadonlycollection",
    "collection", "arraylist", "linkedlist", "set", "hashset", "iset", "sortedset", "frozenset",
    "sequence", "iterable", "array", "readonlyarray",
];

const MAP_NAMES: &[&str] = &[
    "dictionary", "idictionary", "ireadonlydictionary", "map", "hashmap", "treemap",
    "linkedhashmap", "dict", "mapping", "record",
];

impl FieldType {
    /// Parse a source type name. The flag is `true` when the type text itself
    /// marks the value as optional (`T?`, `*T`, `Optional[T]`, `T | null`).
    pub fn parse(raw: &str) -> (FieldType, bool) {
        let raw = raw.trim();
        if raw.is_empty() {
            return (FieldType::Any, false);
        }

        let union = split_top_level(raw, '|');
        if union.len() > 1 {
            let concrete: Vec<&str> = union
                .iter()
                .copied()
                .filter(|p| !matches!(*p, "None" | "null" | "undefined" | "nil"))
                .collect();
            let optional = concrete.len() < union.len();
            return match concrete.as_slice() {
                [single] => {
                    let (ty, inner_optional) = Self::parse(single);
                    (ty, optional || inner_optional)
                }
                _ => (FieldType::Any, optional),
            };
        }

        if let Some(inner) = raw.strip_suffix('?') {
            return (Self::parse(inner).0, true);
        }
        if let Some(inner) = raw.strip_prefix('*') {
            return (Self::parse(inner).0, true);
        }
        if matches!(raw, "byte[]" | "[]byte" | "Byte[]") {
            return (FieldType::Bytes, false);
        }
        if let Some(inner) = raw.strip_suffix("[]") {
            return (FieldType::List(Box::new(Self::parse(inner).0)), false);
        }
        if let Some(inner) = raw.strip_prefix("[]") {
            return (FieldType::List(Box::new(Self::parse(inner).0)), false);
        }
        if let Some(rest) = raw.strip_prefix("map[") {
            if let Some(close) = rest.find(']') {
                let key = Self::parse(&rest[..close]).0;
                let value = Self::parse(&rest[close + 1..]).0;
                return (FieldType::Map(Box::new(key), Box::new(value)), false);
            }
        }

        if let Some((name, args)) = generic_parts(raw) {
            let base = last_segment(name).to_ascii_lowercase();
            let args = split_top_level(args, ',');
            if matches!(base.as_str(), "optional" | "nullable") {
                return (Self::parse(args.first().copied().unwrap_or_default()).0, true);
            }
            if LIST_NAMES.contains(&base.as_str()) {
                let item = args.first().map(|a| Self::parse(a).0).unwrap_or(FieldType::Any);
                return (FieldType::List(Box::new(item)), false);
            }
            if MAP_NAMES.contains(&base.as_str()) {
                let key = args.first().map(|a| Self::parse(a).0).unwrap_or(FieldType::String);
                let value = args.get(1).map(|a| Self::parse(a).0).unwrap_or(FieldType::Any);
                return (FieldType::Map(Box::new(key), Box::new(value)), false);
            }
            return (FieldType::Named(raw.to_string()), false);
        }

        (Self::scalar(raw), false)
    }

    fn scalar(raw: &str) -> FieldType {
        let lower = raw.to_ascii_lowercase();
        match lower.as_str() {
            "time.time" => return FieldType::DateTime,
            "interface{}" => return FieldType::Any,
            _ => {}
        }
        match last_segment(&lower) {
            "int" | "int32" | "integer" | "short" | "int16" | "int8" | "uint" | "uint8"
            | "uint16" | "uint32" | "byte" | "sbyte" | "ushort" | "rune" => FieldType::Integer,
            "long" | "int64" | "uint64" | "ulong" | "bigint" | "biginteger" => FieldType::Long,
            "float" | "single" | "float32" => FieldType::Float,
            "double" | "float64" | "number" => FieldType::Double,
            "decimal" | "bigdecimal" => FieldType::Decimal,
            "bool" | "boolean" => FieldType::Boolean,
            "string" | "str" | "char" | "character" => FieldType::String,
            "datetime" | "datetimeoffset" | "date" | "localdate" | "localdatetime"
            | "offsetdatetime" | "zoneddatetime" | "instant" => FieldType::DateTime,
            "guid" | "uuid" => FieldType::Uuid,
            "bytes" | "bytearray" | "buffer" | "uint8array" => FieldType::Bytes,
            "object" | "any" | "unknown" | "dynamic" => FieldType::Any,
            "list" | "array" | "set" | "tuple" => FieldType::List(Box::new(FieldType::Any)),
            "dict" | "map" => FieldType::Map(Box::new(FieldType::String), Box::new(FieldType::Any)),
            _ => FieldType::Named(raw.to_string()),
        }
    }
}

/// `List<int>` → (`List`, `int`); `dict[str, int]` → (`dict`, `str, int`).
fn generic_parts(raw: &str) -> Option<(&str, &str)> {
    let open = raw.find(['<', '['])?;
    let close = match raw.as_bytes()[open] {
        b'<' => '>',
        _ => ']',
    };
    if open == 0 || !raw.ends_with(close) {
        return None;
    }
    Some((&raw[..open], &raw[open + 1..raw.len() - 1]))
}

fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

pub(crate) fn token<'a>(tokens: &'a HashMap<String, String>, key: &str) -> &'a str {
    tokens.get(key).map(String::as_str).unwrap_or_default()
}

/// Render a template, guaranteeing a trailing newline.
pub(crate) fn render<T: Template>(template: &T, what: &str) -> Result<String, CodeGenerationError> {
    let mut out = template.render().map_err(|e| {
        CodeGenerationError::with_source(format!("Failed to render {what}"), e)
    })?;
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}
