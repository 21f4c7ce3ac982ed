//! # Model Module
//!
//! Data shared across the pipeline: entities found by discovery and the
//! aggregate produced by one generation run.

use crate::config::{Cloud, Language};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// One field or member of a [`DiscoveredEntity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityProperty {
    pub name: String,
    /// Language-native type text. Only emitters interpret it.
    pub source_type_name: String,
    pub is_nullable: bool,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub markers: BTreeSet<String>,
}

impl EntityProperty {
    pub fn new(name: impl Into<String>, source_type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_type_name: source_type_name.into(),
            is_nullable: false,
            markers: BTreeSet::new(),
        }
    }

    pub fn nullable(mut self, is_nullable: bool) -> Self {
        self.is_nullable = is_nullable;
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.insert(marker.into());
        self
    }
}

/// What kind of declaration an entity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Class,
    Interface,
    Struct,
    Record,
}

/// One type found in the target code base.
///
/// `properties` keeps declaration order; generated field order follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredEntity {
    pub name: String,
    pub fully_qualified_name: String,
    pub namespace_or_package: String,
    pub source_language: Language,
    pub source_location: PathBuf,
    pub properties: Vec<EntityProperty>,
    pub markers: BTreeSet<String>,
    pub is_public: bool,
    pub kind: EntityKind,
}

impl DiscoveredEntity {
    pub fn new(
        name: impl Into<String>,
        namespace_or_package: impl Into<String>,
        source_language: Language,
        source_location: impl Into<PathBuf>,
    ) -> Self {
        let name = name.into();
        let namespace_or_package = namespace_or_package.into();
        let fully_qualified_name = if namespace_or_package.is_empty() {
            name.clone()
        } else {
            format!("{namespace_or_package}.{name}")
        };
        Self {
            name,
            fully_qualified_name,
            namespace_or_package,
            source_language,
            source_location: source_location.into(),
            properties: Vec::new(),
            markers: BTreeSet::new(),
            is_public: true,
            kind: EntityKind::Class,
        }
    }

    pub fn with_property(mut self, property: EntityProperty) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.insert(marker.into());
        self
    }

    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, EntityKind::Class | EntityKind::Record)
    }

    pub fn is_interface(&self) -> bool {
        self.kind == EntityKind::Interface
    }
}

/// Tag describing where a generated file came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Template,
    Model,
    Metadata,
    #[serde(untagged)]
    Other(String),
}

/// One artifact written by a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFile {
    pub relative_path: String,
    pub full_path: PathBuf,
    #[serde(rename = "type")]
    pub file_type: FileType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub associated_entity: Option<String>,
    pub size_bytes: u64,
}

/// Aggregate result of one generation run.
///
/// Every entry in `generated_files` exists on disk when the metadata file is
/// written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedProject {
    pub output_path: PathBuf,
    pub language: Language,
    pub cloud: Cloud,
    pub version: String,
    pub template_path: PathBuf,
    pub generated_at_utc: DateTime<Utc>,
    pub entities: Vec<DiscoveredEntity>,
    pub generated_files: Vec<GeneratedFile>,
    pub token_replacements: BTreeMap<String, String>,
}

impl GeneratedProject {
    /// Record a file, replacing an earlier entry for the same relative path.
    pub fn record(&mut self, file: GeneratedFile) {
        self.generated_files
            .retain(|f| f.relative_path != file.relative_path);
        self.generated_files.push(file);
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.generated_files.iter().map(|f| f.size_bytes).sum()
    }

    pub fn files_of_type(&self, file_type: &FileType) -> impl Iterator<Item = &GeneratedFile> {
        let file_type = file_type.clone();
        self.generated_files
            .iter()
            .filter(move |f| f.file_type == file_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fully_qualified_name() {
        let e = DiscoveredEntity::new("Customer", "Shop.Models", Language::CSharp, "a.cs");
        assert_eq!(e.fully_qualified_name, "Shop.Models.Customer");
        let e = DiscoveredEntity::new("Customer", "", Language::Go, "a.go");
        assert_eq!(e.fully_qualified_name, "Customer");
    }

    #[test]
    fn test_file_type_serialization() {
        assert_eq!(
            serde_json::to_string(&FileType::Model).unwrap(),
            "\"model\""
        );
        assert_eq!(
            serde_json::to_string(&FileType::Other("docs".into())).unwrap(),
            "\"docs\""
        );
    }

    #[test]
    fn test_record_replaces_same_path() {
        let mut project = GeneratedProject {
            output_path: PathBuf::from("/tmp/out"),
            language: Language::Go,
            cloud: Cloud::Gcp,
            version: "1.0.0".into(),
            template_path: PathBuf::from("/tmp/t"),
            generated_at_utc: Utc::now(),
            entities: vec![],
            generated_files: vec![],
            token_replacements: BTreeMap::new(),
        };
        let file = |ty: FileType, size| GeneratedFile {
            relative_path: "models/customer.go".into(),
            full_path: PathBuf::from("/tmp/out/models/customer.go"),
            file_type: ty,
            associated_entity: None,
            size_bytes: size,
        };
        project.record(file(FileType::Template, 10));
        project.record(file(FileType::Model, 25));
        assert_eq!(project.generated_files.len(), 1);
        assert_eq!(project.generated_files[0].file_type, FileType::Model);
        assert_eq!(project.total_size_bytes(), 25);
    }
}
