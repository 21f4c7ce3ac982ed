use super::{render, token, EmittedFile, FieldType, LanguageEmitter};
use crate::config::Language;
use crate::error::CodeGenerationError;
use crate::model::{DiscoveredEntity, EntityProperty};
use crate::naming::to_snake_case;
use askama::Template;
use std::collections::HashMap;

#[derive(Template)]
#[template(path = "models/go.go.txt", escape = "none")]
struct StructTemplate<'a> {
    imports: Vec<&'static str>,
    name: &'a str,
    full_name: &'a str,
    generator_version: &'a str,
    properties: &'a str,
}

/// Words written fully upper-case in exported Go names.
const INITIALISMS: &[&str] = &["id", "url", "uri", "api", "http", "json", "uuid", "sql", "ip", "xml"];

/// Exported structs in package `models`, gofmt-aligned.
pub struct GoEmitter;

impl GoEmitter {
    fn map_type(ty: &FieldType) -> String {
        match ty {
            FieldType::Integer => "int".to_string(),
            FieldType::Long => "int64".to_string(),
            FieldType::Float => "float32".to_string(),
            FieldType::Double | FieldType::Decimal => "float64".to_string(),
            FieldType::Boolean => "bool".to_string(),
            FieldType::String | FieldType::Uuid => "string".to_string(),
            FieldType::DateTime => "time.Time".to_string(),
            FieldType::Bytes => "[]byte".to_string(),
            FieldType::Any => "interface{}".to_string(),
            FieldType::List(item) => format!("[]{}", Self::map_type(item)),
            FieldType::Map(key, value) => {
                format!("map[{}]{}", Self::map_type(key), Self::map_type(value))
            }
            FieldType::Named(name) => name.clone(),
        }
    }

    /// Slices, maps and interfaces are already nil-able.
    fn pointer_allowed(ty: &FieldType) -> bool {
        !matches!(
            ty,
            FieldType::List(_) | FieldType::Map(..) | FieldType::Bytes | FieldType::Any
        )
    }

    fn uses_time(ty: &FieldType) -> bool {
        match ty {
            FieldType::DateTime => true,
            FieldType::List(item) => Self::uses_time(item),
            FieldType::Map(key, value) => Self::uses_time(key) || Self::uses_time(value),
            _ => false,
        }
    }

    /// `customer_id` → `CustomerID`
    fn exported_name(name: &str) -> String {
        to_snake_case(name)
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                if INITIALISMS.contains(&w) {
                    w.to_ascii_uppercase()
                } else {
                    let mut chars = w.chars();
                    chars
                        .next()
                        .map(|c| c.to_ascii_uppercase().to_string() + chars.as_str())
                        .unwrap_or_default()
                }
            })
            .collect()
    }
}

impl LanguageEmitter for GoEmitter {
    fn language(&self) -> Language {
        Language::Go
    }

    fn generate_properties(&self, properties: &[EntityProperty]) -> String {
        let rows: Vec<(String, String, String)> = properties
            .iter()
            .map(|p| {
                let (ty, optional) = FieldType::parse(&p.source_type_name);
                let nullable = p.is_nullable || optional;
                let mut type_name = Self::map_type(&ty);
                let json = to_snake_case(&p.name);
                let tag = if nullable {
                    if Self::pointer_allowed(&ty) {
                        type_name.insert(0, '*');
                    }
                    format!("`json:\"{json},omitempty\"`")
                } else {
                    format!("`json:\"{json}\"`")
                };
                (Self::exported_name(&p.name), type_name, tag)
            })
            .collect();

        let name_width = rows.iter().map(|r| r.0.len()).max().unwrap_or(0);
        let type_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(0);
        rows.iter()
            .map(|(name, ty, tag)| format!("\t{name:<name_width$} {ty:<type_width$} {tag}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn generate_entity_files(
        &self,
        entity: &DiscoveredEntity,
        tokens: &HashMap<String, String>,
    ) -> Result<Vec<EmittedFile>, CodeGenerationError> {
        let imports = if entity
            .properties
            .iter()
            .any(|p| Self::uses_time(&FieldType::parse(&p.source_type_name).0))
        {
            vec!["time"]
        } else {
            Vec::new()
        };
        let properties = self.generate_properties(&entity.properties);
        let content = render(
            &StructTemplate {
                imports,
                name: &entity.name,
                full_name: &entity.fully_qualified_name,
                generator_version: token(tokens, "generator-version"),
                properties: &properties,
            },
            "Go model",
        )?;
        Ok(vec![EmittedFile {
            relative_path: format!("models/{}.go", to_snake_case(&entity.name)),
            content,
        }])
    }
}
