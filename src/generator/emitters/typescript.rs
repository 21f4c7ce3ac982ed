use super::{render, token, EmittedFile, FieldType, LanguageEmitter};
use crate::config::Language;
use crate::error::CodeGenerationError;
use crate::model::{DiscoveredEntity, EntityProperty};
use crate::naming::to_camel_case;
use askama::Template;
use std::collections::HashMap;

#[derive(Template)]
#[template(path = "models/typescript.ts.txt", escape = "none")]
struct InterfaceTemplate<'a> {
    name: &'a str,
    full_name: &'a str,
    generator_version: &'a str,
    properties: &'a str,
}

/// Exported interfaces under `models/`.
pub struct TypeScriptEmitter;

impl TypeScriptEmitter {
    fn map_type(ty: &FieldType) -> String {
        match ty {
            FieldType::Integer
            | FieldType::Long
            | FieldType::Float
            | FieldType::Double
            | FieldType::Decimal => "number".to_string(),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::String | FieldType::Uuid => "string".to_string(),
            FieldType::DateTime => "Date".to_string(),
            FieldType::Bytes => "Uint8Array".to_string(),
            FieldType::Any => "unknown".to_string(),
            FieldType::List(item) => format!("{}[]", Self::map_type(item)),
            FieldType::Map(key, value) => {
                format!("Record<{}, {}>", Self::map_type(key), Self::map_type(value))
            }
            FieldType::Named(name) => name.clone(),
        }
    }
}

impl LanguageEmitter for TypeScriptEmitter {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn generate_properties(&self, properties: &[EntityProperty]) -> String {
        properties
            .iter()
            .map(|p| {
                let (ty, optional) = FieldType::parse(&p.source_type_name);
                let marker = if p.is_nullable || optional { "?" } else { "" };
                format!(
                    "  {}{}: {};",
                    to_camel_case(&p.name),
                    marker,
                    Self::map_type(&ty)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn generate_entity_files(
        &self,
        entity: &DiscoveredEntity,
        tokens: &HashMap<String, String>,
    ) -> Result<Vec<EmittedFile>, CodeGenerationError> {
        let properties = self.generate_properties(&entity.properties);
        let content = render(
            &InterfaceTemplate {
                name: &entity.name,
                full_name: &entity.fully_qualified_name,
                generator_version: token(tokens, "generator-version"),
                properties: &properties,
            },
            "TypeScript interface",
        )?;
        Ok(vec![EmittedFile {
            relative_path: format!("models/{}.ts", entity.name),
            content,
        }])
    }
}
