use super::{render, token, EmittedFile, FieldType, LanguageEmitter};
use crate::config::Language;
use crate::error::CodeGenerationError;
use crate::model::{DiscoveredEntity, EntityProperty};
use crate::naming::to_camel_case;
use askama::Template;
use std::collections::HashMap;

#[derive(Template)]
#[template(path = "models/javascript.js.txt", escape = "none")]
struct ClassTemplate<'a> {
    name: &'a str,
    full_name: &'a str,
    generator_version: &'a str,
    properties: &'a str,
}

/// CommonJS classes whose constructor copies members from an `init` object.
pub struct JavaScriptEmitter;

impl JavaScriptEmitter {
    /// JSDoc type expression.
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
            FieldType::Any => "*".to_string(),
            FieldType::List(item) => format!("Array<{}>", Self::map_type(item)),
            FieldType::Map(key, value) => {
                format!("Object<{}, {}>", Self::map_type(key), Self::map_type(value))
            }
            FieldType::Named(name) => name.clone(),
        }
    }
}

impl LanguageEmitter for JavaScriptEmitter {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn generate_properties(&self, properties: &[EntityProperty]) -> String {
        if properties.is_empty() {
            return "  constructor() {}".to_string();
        }
        let members: Vec<(String, String)> = properties
            .iter()
            .map(|p| {
                let (ty, optional) = FieldType::parse(&p.source_type_name);
                let ty = Self::map_type(&ty);
                let ty = if p.is_nullable || optional { format!("?{ty}") } else { ty };
                (to_camel_case(&p.name), ty)
            })
            .collect();

        let mut out = vec![
            "  /**".to_string(),
            "   * @param {Object} [init]".to_string(),
        ];
        for (name, ty) in &members {
            out.push(format!("   * @param {{{ty}}} [init.{name}]"));
        }
        out.push("   */".to_string());
        out.push("  constructor(init = {}) {".to_string());
        for (name, ty) in &members {
            out.push(format!("    /** @type {{{ty}}} */"));
            out.push(format!("    this.{name} = init.{name} ?? null;"));
        }
        out.push("  }".to_string());
        out.join("\n")
    }

    fn generate_entity_files(
        &self,
        entity: &DiscoveredEntity,
        tokens: &HashMap<String, String>,
    ) -> Result<Vec<EmittedFile>, CodeGenerationError> {
        let properties = self.generate_properties(&entity.properties);
        let content = render(
            &ClassTemplate {
                name: &entity.name,
                full_name: &entity.fully_qualified_name,
                generator_version: token(tokens, "generator-version"),
                properties: &properties,
            },
            "JavaScript model",
        )?;
        Ok(vec![EmittedFile {
            relative_path: format!("models/{}.js", entity.name),
            content,
        }])
    }
}
