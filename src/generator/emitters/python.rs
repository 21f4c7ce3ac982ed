use super::{render, token, EmittedFile, FieldType, LanguageEmitter};
use crate::config::Language;
use crate::error::CodeGenerationError;
use crate::model::{DiscoveredEntity, EntityProperty};
use crate::naming::to_snake_case;
use askama::Template;
use std::collections::{BTreeSet, HashMap};

#[derive(Template)]
#[template(path = "models/python.py.txt", escape = "none")]
struct ModuleTemplate<'a> {
    imports: Vec<String>,
    name: &'a str,
    full_name: &'a str,
    generator_version: &'a str,
    properties: &'a str,
}

/// Plain classes whose `__init__` takes every member as `Optional[...] = None`.
pub struct PythonEmitter;

impl PythonEmitter {
    fn map_type(ty: &FieldType) -> String {
        match ty {
            FieldType::Integer | FieldType::Long => "int".to_string(),
            FieldType::Float | FieldType::Double => "float".to_string(),
            FieldType::Decimal => "Decimal".to_string(),
            FieldType::Boolean => "bool".to_string(),
            FieldType::String => "str".to_string(),
            FieldType::DateTime => "datetime".to_string(),
            FieldType::Uuid => "UUID".to_string(),
            FieldType::Bytes => "bytes".to_string(),
            FieldType::Any => "Any".to_string(),
            FieldType::List(item) => format!("List[{}]", Self::map_type(item)),
            FieldType::Map(key, value) => {
                format!("Dict[{}, {}]", Self::map_type(key), Self::map_type(value))
            }
            FieldType::Named(name) => name.clone(),
        }
    }

    fn collect_imports(
        ty: &FieldType,
        typing: &mut BTreeSet<&'static str>,
        other: &mut BTreeSet<&'static str>,
    ) {
        match ty {
            FieldType::Any => {
                typing.insert("Any");
            }
            FieldType::Decimal => {
                other.insert("from decimal import Decimal");
            }
            FieldType::DateTime => {
                other.insert("from datetime import datetime");
            }
            FieldType::Uuid => {
                other.insert("from uuid import UUID");
            }
            FieldType::List(item) => {
                typing.insert("List");
                Self::collect_imports(item, typing, other);
            }
            FieldType::Map(key, value) => {
                typing.insert("Dict");
                Self::collect_imports(key, typing, other);
                Self::collect_imports(value, typing, other);
            }
            _ => {}
        }
    }

    fn imports(properties: &[EntityProperty]) -> Vec<String> {
        if properties.is_empty() {
            return Vec::new();
        }
        let mut typing = BTreeSet::from(["Optional"]);
        let mut other = BTreeSet::new();
        for property in properties {
            let (ty, _) = FieldType::parse(&property.source_type_name);
            Self::collect_imports(&ty, &mut typing, &mut other);
        }
        let mut lines: Vec<String> = other.into_iter().map(str::to_string).collect();
        lines.push(format!(
            "from typing import {}",
            typing.into_iter().collect::<Vec<_>>().join(", ")
        ));
        lines
    }
}

impl LanguageEmitter for PythonEmitter {
    fn language(&self) -> Language {
        Language::Python
    }

    fn generate_properties(&self, properties: &[EntityProperty]) -> String {
        if properties.is_empty() {
            return "    def __init__(self) -> None:\n        pass".to_string();
        }
        let members: Vec<(String, String)> = properties
            .iter()
            .map(|p| {
                let (ty, _) = FieldType::parse(&p.source_type_name);
                (to_snake_case(&p.name), Self::map_type(&ty))
            })
            .collect();

        let mut out = vec!["    def __init__(".to_string(), "        self,".to_string()];
        for (name, ty) in &members {
            out.push(format!("        {name}: Optional[{ty}] = None,"));
        }
        out.push("    ) -> None:".to_string());
        for (name, _) in &members {
            out.push(format!("        self.{name} = {name}"));
        }
        out.join("\n")
    }

    fn generate_entity_files(
        &self,
        entity: &DiscoveredEntity,
        tokens: &HashMap<String, String>,
    ) -> Result<Vec<EmittedFile>, CodeGenerationError> {
        let properties = self.generate_properties(&entity.properties);
        let content = render(
            &ModuleTemplate {
                imports: Self::imports(&entity.properties),
                name: &entity.name,
                full_name: &entity.fully_qualified_name,
                generator_version: token(tokens, "generator-version"),
                properties: &properties,
            },
            "Python model",
        )?;
        Ok(vec![EmittedFile {
            relative_path: format!("models/{}.py", to_snake_case(&entity.name)),
            content,
        }])
    }
}
