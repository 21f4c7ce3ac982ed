#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use apigen::config::{Cloud, Configuration, Language};
use apigen::error::ExitCode;
use apigen::keyvault::KeyVaultManager;
use apigen::model::FileType;
use apigen::pipeline::{Pipeline, PipelineOptions, PipelineOutcome};
use common::fixtures::{write_tree, zip_archive, CUSTOMER_TS, TEMPLATE_REPO};
use common::mock_http::{MockResponse, MockServer};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn typescript_config(root: &Path) -> Configuration {
    write_tree(&root.join("src"), &[("customer.ts", CUSTOMER_TS)]);
    Configuration {
        language: Some(Language::TypeScript),
        cloud: Some(Cloud::Azure),
        tracking_marker: "Entity".to_string(),
        source_paths: vec![root.join("src")],
        template_cache_dir: root.join("cache"),
        output_dir: root.join("generated-api"),
        ..Configuration::default()
    }
}

/// Pipeline whose CI token detection sees an empty environment.
fn pipeline(config: Configuration) -> Pipeline {
    let config = Arc::new(config);
    let key_vault = KeyVaultManager::new(Arc::clone(&config)).with_env_lookup(|_| None);
    Pipeline::with_key_vault(config, Arc::new(key_vault)).unwrap()
}

fn generated(outcome: PipelineOutcome) -> apigen::model::GeneratedProject {
    match outcome {
        PipelineOutcome::Generated(project) => project,
        PipelineOutcome::Analyzed(_) => panic!("expected a generated project"),
    }
}

#[test]
fn test_generate_typescript_from_local_templates() {
    let tmp = TempDir::new().unwrap();
    write_tree(&tmp.path().join("repo"), TEMPLATE_REPO);
    let pipeline = pipeline(typescript_config(tmp.path()));

    let options = PipelineOptions {
        version: "1.2.0".to_string(),
        template_dir: Some(tmp.path().join("repo/templates")),
        output_dir: None,
    };
    let project = generated(pipeline.run(&options).unwrap());

    let out = tmp.path().join("generated-api");
    assert_eq!(project.output_path, out);
    assert_eq!(project.entities.len(), 1);

    let model = fs::read_to_string(out.join("models/Customer.ts")).unwrap();
    assert!(model.contains("export interface Customer"), "{model}");
    assert!(model.contains("  id: number;"), "{model}");
    assert!(model.contains("  email?: string;"), "{model}");

    let package = fs::read_to_string(out.join("package.json")).unwrap();
    assert!(package.contains("\"version\": \"1.2.0\""), "{package}");
    let bicep = fs::read_to_string(out.join("infra/main.bicep")).unwrap();
    assert_eq!(
        bicep,
        "param location string = 'azure'\n// 1 entities: Customer\n"
    );

    let metadata: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("api-metadata.json")).unwrap()).unwrap();
    assert_eq!(metadata["entityCount"], 1);
    assert_eq!(metadata["propertyCount"], 2);
    assert_eq!(metadata["language"], "typescript");
    assert_eq!(metadata["version"], "1.2.0");

    let models: Vec<_> = project.files_of_type(&FileType::Model).collect();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].relative_path, "models/Customer.ts");
    assert_eq!(
        models[0].associated_entity.as_deref(),
        Some(project.entities[0].fully_qualified_name.as_str())
    );
}

#[test]
fn test_generate_fetches_github_zipball() {
    let tmp = TempDir::new().unwrap();
    let archive = zip_archive(Some("acme-api-templates-3f2a1b"), TEMPLATE_REPO);
    let server = MockServer::start(move |_| MockResponse::bytes(archive.clone()));

    let mut config = typescript_config(tmp.path());
    config.template_repository_url = Some("https://github.com/acme/api-templates".to_string());
    config.github_api_url = server.url().to_string();
    let pipeline = pipeline(config);

    let project = generated(pipeline.run(&PipelineOptions::default()).unwrap());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path(), "/repos/acme/api-templates/zipball/main");
    assert!(requests[0].header("Authorization").is_none());

    assert!(project.template_path.ends_with("templates/typescript-azure"));
    let out = tmp.path().join("generated-api");
    assert!(out.join("models/Customer.ts").is_file());
    assert!(out.join("infra/main.bicep").is_file());
    assert!(!out.join("requirements.txt").exists());
}

#[test]
fn test_noop_mode_only_discovers() {
    let tmp = TempDir::new().unwrap();
    let server = MockServer::start(|_| MockResponse::status(500));

    let mut config = typescript_config(tmp.path());
    config.noop_mode = true;
    config.template_repository_url = Some("https://github.com/acme/api-templates".to_string());
    config.github_api_url = server.url().to_string();
    let pipeline = pipeline(config);

    match pipeline.run(&PipelineOptions::default()).unwrap() {
        PipelineOutcome::Analyzed(entities) => {
            assert_eq!(entities.len(), 1);
            assert_eq!(entities[0].name, "Customer");
            assert_eq!(entities[0].properties.len(), 2);
        }
        PipelineOutcome::Generated(_) => panic!("NOOP mode must not generate"),
    }
    assert_eq!(server.request_count(), 0);
    assert!(!tmp.path().join("generated-api").exists());
}

#[test]
fn test_missing_language_exits_with_configuration_code() {
    let tmp = TempDir::new().unwrap();
    let mut config = typescript_config(tmp.path());
    config.language = None;
    let err = pipeline(config)
        .run(&PipelineOptions::default())
        .unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::Configuration);
}

#[test]
fn test_download_failure_exits_with_template_code() {
    let tmp = TempDir::new().unwrap();
    let server = MockServer::start(|_| MockResponse::status(404));

    let mut config = typescript_config(tmp.path());
    config.template_repository_url = Some("https://github.com/acme/missing".to_string());
    config.github_api_url = server.url().to_string();

    let err = pipeline(config)
        .run(&PipelineOptions::default())
        .unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::Template);
    assert!(err.to_string().contains("404"), "{err}");
    assert!(!tmp.path().join("generated-api").exists());
}

#[test]
fn test_unknown_template_name_is_template_error() {
    let tmp = TempDir::new().unwrap();
    write_tree(&tmp.path().join("repo"), TEMPLATE_REPO);
    let mut config = typescript_config(tmp.path());
    config.template_name = Some("java-gcp".to_string());

    let options = PipelineOptions {
        template_dir: Some(tmp.path().join("repo/templates")),
        ..PipelineOptions::default()
    };
    let err = pipeline(config).run(&options).unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::Template);
}

#[test]
fn test_drop_removes_template_cache() {
    let tmp = TempDir::new().unwrap();
    let archive = zip_archive(Some("wrapper"), TEMPLATE_REPO);
    let server = MockServer::start(move |_| MockResponse::bytes(archive.clone()));

    let mut config = typescript_config(tmp.path());
    config.template_repository_url = Some("https://github.com/acme/api-templates".to_string());
    config.github_api_url = server.url().to_string();

    {
        let pipeline = pipeline(config);
        pipeline.run(&PipelineOptions::default()).unwrap();
        assert!(tmp.path().join("cache").is_dir());
    }
    assert!(!tmp.path().join("cache").exists());
    assert!(tmp.path().join("generated-api/api-metadata.json").is_file());
}
