use super::{render, token, EmittedFile, FieldType, LanguageEmitter};
use crate::config::Language;
use crate::error::CodeGenerationError;
use crate::model::{DiscoveredEntity, EntityProperty};
use crate::naming::to_pascal_case;
use askama::Template;
use std::collections::HashMap;

#[derive(Template)]
#[template(path = "models/csharp.cs.txt", escape = "none")]
struct ClassTemplate<'a> {
    namespace: &'a str,
    name: &'a str,
    full_name: &'a str,
    generator_version: &'a str,
    properties: &'a str,
}

/// Classes with auto-properties under `Models/`, nullable reference types on.
pub struct CSharpEmitter;

impl CSharpEmitter {
    fn map_type(ty: &FieldType) -> String {
        match ty {
            FieldType::Integer => "int".to_string(),
            FieldType::Long => "long".to_string(),
            FieldType::Float => "float".to_string(),
            FieldType::Double => "double".to_string(),
            FieldType::Decimal => "decimal".to_string(),
            FieldType::Boolean => "bool".to_string(),
            FieldType::String => "string".to_string(),
            FieldType::DateTime => "DateTime".to_string(),
            FieldType::Uuid => "Guid".to_string(),
            FieldType::Bytes => "byte[]".to_string(),
            FieldType::Any => "object".to_string(),
            FieldType::List(item) => format!("List<{}>", Self::map_type(item)),
            FieldType::Map(key, value) => {
                format!("Dictionary<{}, {}>", Self::map_type(key), Self::map_type(value))
            }
            FieldType::Named(name) => name.clone(),
        }
    }

    /// Initializer for a non-nullable reference-typed property.
    fn initializer(ty: &FieldType) -> &'static str {
        match ty {
            FieldType::String => " = string.Empty;",
            FieldType::List(_) | FieldType::Map(..) => " = new();",
            FieldType::Bytes => " = Array.Empty<byte>();",
            FieldType::Any | FieldType::Named(_) => " = default!;",
            _ => "",
        }
    }
}

impl LanguageEmitter for CSharpEmitter {
    fn language(&self) -> Language {
        Language::CSharp
    }

    fn generate_properties(&self, properties: &[EntityProperty]) -> String {
        properties
            .iter()
            .map(|p| {
                let (ty, optional) = FieldType::parse(&p.source_type_name);
                let nullable = p.is_nullable || optional;
                let type_name = Self::map_type(&ty);
                let (suffix, init) = if nullable {
                    ("?", "")
                } else {
                    ("", Self::initializer(&ty))
                };
                format!(
                    "    public {}{} {} {{ get; set; }}{}",
                    type_name,
                    suffix,
                    to_pascal_case(&p.name),
                    init
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
        let namespace = match token(tokens, "namespace") {
            "" => "Models".to_string(),
            ns => format!("{ns}.Models"),
        };
        let properties = self.generate_properties(&entity.properties);
        let content = render(
            &ClassTemplate {
                namespace: &namespace,
                name: &entity.name,
                full_name: &entity.fully_qualified_name,
                generator_version: token(tokens, "generator-version"),
                properties: &properties,
            },
            "C# model",
        )?;
        Ok(vec![EmittedFile {
            relative_path: format!("Models/{}.cs", entity.name),
            content,
        }])
    }
}
