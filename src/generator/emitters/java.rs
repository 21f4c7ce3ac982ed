use super::{render, token, EmittedFile, FieldType, LanguageEmitter};
use crate::config::Language;
use crate::error::CodeGenerationError;
use crate::model::{DiscoveredEntity, EntityProperty};
use crate::naming::{to_camel_case, to_pascal_case};
use askama::Template;
use std::collections::{BTreeSet, HashMap};

#[derive(Template)]
#[template(path = "models/java.java.txt", escape = "none")]
struct ClassTemplate<'a> {
    package: &'a str,
    imports: Vec<&'static str>,
    name: &'a str,
    full_name: &'a str,
    generator_version: &'a str,
    properties: &'a str,
}

/// POJOs with boxed field types, placed under the package's directory.
pub struct JavaEmitter;

impl JavaEmitter {
    fn map_type(ty: &FieldType) -> String {
        match ty {
            FieldType::Integer => "Integer".to_string(),
            FieldType::Long => "Long".to_string(),
            FieldType::Float => "Float".to_string(),
            FieldType::Double => "Double".to_string(),
            FieldType::Decimal => "BigDecimal".to_string(),
            FieldType::Boolean => "Boolean".to_string(),
            FieldType::String => "String".to_string(),
            FieldType::DateTime => "OffsetDateTime".to_string(),
            FieldType::Uuid => "UUID".to_string(),
            FieldType::Bytes => "byte[]".to_string(),
            FieldType::Any => "Object".to_string(),
            FieldType::List(item) => format!("List<{}>", Self::map_type(item)),
            FieldType::Map(key, value) => {
                format!("Map<{}, {}>", Self::map_type(key), Self::map_type(value))
            }
            FieldType::Named(name) => name.clone(),
        }
    }

    fn collect_imports(ty: &FieldType, imports: &mut BTreeSet<&'static str>) {
        match ty {
            FieldType::Decimal => {
                imports.insert("java.math.BigDecimal");
            }
            FieldType::DateTime => {
                imports.insert("java.time.OffsetDateTime");
            }
            FieldType::Uuid => {
                imports.insert("java.util.UUID");
            }
            FieldType::List(item) => {
                imports.insert("java.util.List");
                Self::collect_imports(item, imports);
            }
            FieldType::Map(key, value) => {
                imports.insert("java.util.Map");
                Self::collect_imports(key, imports);
                Self::collect_imports(value, imports);
            }
            _ => {}
        }
    }

    fn package_for(entity: &DiscoveredEntity, tokens: &HashMap<String, String>) -> String {
        if !entity.namespace_or_package.is_empty() {
            return entity.namespace_or_package.clone();
        }
        match token(tokens, "project-name") {
            "" => "models".to_string(),
            project => format!("com.{}.models", project.to_ascii_lowercase()),
        }
    }
}

impl LanguageEmitter for JavaEmitter {
    fn language(&self) -> Language {
        Language::Java
    }

    fn generate_properties(&self, properties: &[EntityProperty]) -> String {
        let members: Vec<(String, String, String)> = properties
            .iter()
            .map(|p| {
                let (ty, _) = FieldType::parse(&p.source_type_name);
                (Self::map_type(&ty), to_camel_case(&p.name), to_pascal_case(&p.name))
            })
            .collect();
        if members.is_empty() {
            return String::new();
        }

        let mut out: Vec<String> = members
            .iter()
            .map(|(ty, field, _)| format!("    private {ty} {field};"))
            .collect();
        for (ty, field, accessor) in &members {
            out.push(String::new());
            out.push(format!("    public {ty} get{accessor}() {{"));
            out.push(format!("        return {field};"));
            out.push("    }".to_string());
            out.push(String::new());
            out.push(format!("    public void set{accessor}({ty} {field}) {{"));
            out.push(format!("        this.{field} = {field};"));
            out.push("    }".to_string());
        }
        out.join("\n")
    }

    fn generate_entity_files(
        &self,
        entity: &DiscoveredEntity,
        tokens: &HashMap<String, String>,
    ) -> Result<Vec<EmittedFile>, CodeGenerationError> {
        let package = Self::package_for(entity, tokens);
        let mut imports = BTreeSet::new();
        for property in &entity.properties {
            Self::collect_imports(&FieldType::parse(&property.source_type_name).0, &mut imports);
        }
        let properties = self.generate_properties(&entity.properties);
        let content = render(
            &ClassTemplate {
                package: &package,
                imports: imports.into_iter().collect(),
                name: &entity.name,
                full_name: &entity.fully_qualified_name,
                generator_version: token(tokens, "generator-version"),
                properties: &properties,
            },
            "Java model",
        )?;
        Ok(vec![EmittedFile {
            relative_path: format!(
                "src/main/java/{}/{}.java",
                package.replace('.', "/"),
                entity.name
            ),
            content,
        }])
    }
}
