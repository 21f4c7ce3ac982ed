//! Replacement maps for `{token}` placeholders.

use crate::config::{Cloud, Configuration, Language};
use crate::model::DiscoveredEntity;
use crate::naming::{sanitize_identifier, to_camel_case, to_pascal_case, to_snake_case};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::path::Path;

use super::tag::safe_tag;

/// Inputs of one generation run that feed the base token map.
pub struct TokenContext<'a> {
    pub language: Language,
    pub cloud: Cloud,
    pub template_path: &'a Path,
    pub version: &'a str,
    pub entities: &'a [DiscoveredEntity],
    pub deployment_tag: &'a str,
    pub generated_at: DateTime<Utc>,
}

/// Tokens shared by every file of a run.
///
/// Per-cloud identifiers are only present when configured, so their
/// placeholders stay verbatim otherwise.
pub fn base_tokens(config: &Configuration, ctx: &TokenContext<'_>) -> HashMap<String, String> {
    let template_name = ctx
        .template_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let property_count: usize = ctx.entities.iter().map(|e| e.properties.len()).sum();
    let entity_names = ctx
        .entities
        .iter()
        .map(|e| e.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut tokens: HashMap<String, String> = [
        ("project-name", sanitize_identifier(&template_name)),
        ("namespace", sanitize_identifier(&to_pascal_case(&template_name))),
        ("cloud-provider", sanitize_identifier(&to_pascal_case(ctx.cloud.as_str()))),
        ("template-name", template_name.clone()),
        ("version", ctx.version.to_string()),
        ("language", ctx.language.to_string()),
        ("cloud", ctx.cloud.to_string()),
        ("repository-url", config.repository_url.clone().unwrap_or_default()),
        ("repository-branch", config.repository_branch.clone().unwrap_or_default()),
        ("entity-count", ctx.entities.len().to_string()),
        ("property-count", property_count.to_string()),
        ("entity-names", entity_names),
        ("generator-version", env!("CARGO_PKG_VERSION").to_string()),
        (
            "generated-at",
            ctx.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        ("deployment-tag", ctx.deployment_tag.to_string()),
        ("deployment-tag-safe", safe_tag(ctx.deployment_tag)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let cloud_ids = [
        ("azure-subscription-id", &config.azure_subscription_id),
        ("azure-resource-group", &config.azure_resource_group),
        ("aws-account-id", &config.aws_account_id),
        ("aws-region", &config.aws_region),
        ("gcp-project-id", &config.gcp_project_id),
    ];
    for (key, value) in cloud_ids {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            tokens.insert(key.to_string(), value.to_string());
        }
    }
    tokens
}

/// Tokens describing one entity; merged over the base map per entity.
pub fn entity_tokens(entity: &DiscoveredEntity) -> HashMap<String, String> {
    [
        ("entity-name", entity.name.clone()),
        ("entity-namespace", entity.namespace_or_package.clone()),
        ("entity-full-name", entity.fully_qualified_name.clone()),
        ("entity-name-lower", entity.name.to_lowercase()),
        ("entity-name-snake", to_snake_case(&entity.name)),
        ("entity-name-camel", to_camel_case(&entity.name)),
        ("entity-property-count", entity.properties.len().to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
